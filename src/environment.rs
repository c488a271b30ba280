//! Environmental drivers: temperature and soil moisture.
//!
//! Drivers are supplied as per-step minimum/maximum bounds, each either a
//! fixed scalar or a series with one entry per requested output time. The
//! interpolators never leave the supplied envelope: temperature follows a
//! smooth diurnal cycle between the step's bounds, moisture is held
//! constant within a step.

use crate::constants::DAYS_PER_YEAR;
use crate::errors::{CorpseError, CorpseResult};
use ndarray::Array1;
use std::f64::consts::TAU;

/// A scalar held for the whole run, or one value per requested output
/// time.
#[derive(Debug, Clone, PartialEq)]
pub enum Driver {
    Constant(f64),
    Series(Array1<f64>),
}

impl Driver {
    fn value_at(&self, step: usize) -> f64 {
        match self {
            Driver::Constant(v) => *v,
            Driver::Series(values) => values[step],
        }
    }

    fn check_len(&self, n_steps: usize, name: &str) -> CorpseResult<()> {
        if let Driver::Series(values) = self {
            if values.len() < n_steps {
                return Err(CorpseError::InvalidDriver {
                    driver: name.to_string(),
                    reason: format!(
                        "series has {} entries, time grid has {}",
                        values.len(),
                        n_steps
                    ),
                });
            }
        }
        Ok(())
    }
}

impl From<f64> for Driver {
    fn from(value: f64) -> Self {
        Driver::Constant(value)
    }
}

impl From<Array1<f64>> for Driver {
    fn from(values: Array1<f64>) -> Self {
        Driver::Series(values)
    }
}

/// Per-step temperature bounds with a diurnal interpolation law.
/// unit: K
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureBounds {
    pub min: Driver,
    pub max: Driver,
}

impl TemperatureBounds {
    pub fn new(min: impl Into<Driver>, max: impl Into<Driver>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
        }
    }

    /// A fixed temperature for the whole run.
    pub fn constant(temperature: f64) -> Self {
        Self::new(temperature, temperature)
    }

    pub fn validate(&self, n_steps: usize) -> CorpseResult<()> {
        self.min.check_len(n_steps, "temperature")?;
        self.max.check_len(n_steps, "temperature")?;
        for step in 0..n_steps {
            let (min, max) = (self.min.value_at(step), self.max.value_at(step));
            if min > max {
                return Err(CorpseError::InvalidDriver {
                    driver: "temperature".to_string(),
                    reason: format!("min {} exceeds max {} at step {}", min, max, step),
                });
            }
        }
        Ok(())
    }

    /// Instantaneous temperature at simulation time `time` (years) within
    /// step `step`.
    ///
    /// A sinusoid with a period of one day interpolates between the step's
    /// bounds: the minimum at midnight, the maximum at midday, never
    /// outside the envelope.
    pub fn at(&self, step: usize, time: f64) -> f64 {
        let min = self.min.value_at(step);
        let max = self.max.value_at(step);
        let day = time * DAYS_PER_YEAR;
        min + (max - min) * 0.5 * (1.0 - (TAU * day).cos())
    }
}

/// Per-step soil moisture bounds as a saturation fraction.
/// unit: dimensionless, clamped to [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct MoistureBounds {
    pub min: Driver,
    pub max: Driver,
}

impl MoistureBounds {
    pub fn new(min: impl Into<Driver>, max: impl Into<Driver>) -> Self {
        Self {
            min: min.into(),
            max: max.into(),
        }
    }

    /// A fixed saturation for the whole run.
    pub fn constant(theta: f64) -> Self {
        Self::new(theta, theta)
    }

    pub fn validate(&self, n_steps: usize) -> CorpseResult<()> {
        self.min.check_len(n_steps, "moisture")?;
        self.max.check_len(n_steps, "moisture")?;
        for step in 0..n_steps {
            let (min, max) = (self.min.value_at(step), self.max.value_at(step));
            if min > max {
                return Err(CorpseError::InvalidDriver {
                    driver: "moisture".to_string(),
                    reason: format!("min {} exceeds max {} at step {}", min, max, step),
                });
            }
        }
        Ok(())
    }

    /// Saturation used throughout step `step`: the midpoint of the step's
    /// bounds, clamped to the physical range.
    pub fn at(&self, step: usize) -> f64 {
        let mid = 0.5 * (self.min.value_at(step) + self.max.value_at(step));
        mid.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn diurnal_cycle_stays_within_bounds() {
        let bounds = TemperatureBounds::new(291.15, 297.15);
        for i in 0..200 {
            let time = i as f64 * 0.013 / DAYS_PER_YEAR;
            let temperature = bounds.at(0, time);
            assert!(temperature >= 291.15 - 1e-12);
            assert!(temperature <= 297.15 + 1e-12);
        }
    }

    #[test]
    fn diurnal_cycle_hits_min_at_midnight_and_max_at_midday() {
        let bounds = TemperatureBounds::new(291.15, 297.15);
        assert_relative_eq!(bounds.at(0, 0.0), 291.15);
        assert_relative_eq!(bounds.at(0, 0.5 / DAYS_PER_YEAR), 297.15, epsilon = 1e-9);
        // Period is one day.
        assert_relative_eq!(
            bounds.at(0, 3.0 / DAYS_PER_YEAR),
            291.15,
            epsilon = 1e-9
        );
    }

    #[test]
    fn series_bounds_are_read_per_step() {
        let bounds = TemperatureBounds::new(
            array![280.0, 285.0, 290.0],
            array![282.0, 287.0, 292.0],
        );
        assert!(bounds.validate(3).is_ok());
        assert_relative_eq!(bounds.at(1, 0.0), 285.0);
        assert_relative_eq!(bounds.at(2, 0.5 / DAYS_PER_YEAR), 292.0, epsilon = 1e-9);
    }

    #[test]
    fn short_series_is_rejected_before_a_run() {
        let bounds = TemperatureBounds::new(array![280.0, 285.0], 290.0);
        let err = bounds.validate(5).unwrap_err();
        assert!(matches!(err, CorpseError::InvalidDriver { driver, .. } if driver == "temperature"));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let bounds = TemperatureBounds::new(300.0, 290.0);
        assert!(bounds.validate(1).is_err());

        let moisture = MoistureBounds::new(0.7, 0.5);
        assert!(moisture.validate(1).is_err());
    }

    #[test]
    fn moisture_is_the_step_midpoint() {
        let bounds = MoistureBounds::new(0.5, 0.7);
        assert_relative_eq!(bounds.at(0), 0.6);

        let constant = MoistureBounds::constant(0.6);
        assert_relative_eq!(constant.at(0), 0.6);
    }

    #[test]
    fn moisture_is_clamped_to_saturation_range() {
        let wet = MoistureBounds::new(1.1, 1.3);
        assert_relative_eq!(wet.at(0), 1.0);
        let dry = MoistureBounds::new(-0.4, -0.2);
        assert_relative_eq!(dry.at(0), 0.0);
    }
}

//! Simulation output: an ordered sequence of pool states on a time grid.

use crate::errors::NumericalWarning;
use crate::pools::SoilCarbon;
use ndarray::Array1;

/// The output of one simulation run.
///
/// Holds one [`SoilCarbon`] per requested output time (the first entry is
/// the initial condition unchanged), the environmental driver values the
/// integrator actually used, and any numerical warnings raised along the
/// way. Reporting and calibration code consume this value; the engine
/// never mutates it after the run.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    times: Array1<f64>,
    states: Vec<SoilCarbon>,
    temperature: Array1<f64>,
    moisture: Array1<f64>,
    warnings: Vec<NumericalWarning>,
}

impl Trajectory {
    pub(crate) fn new(
        times: Array1<f64>,
        states: Vec<SoilCarbon>,
        temperature: Array1<f64>,
        moisture: Array1<f64>,
        warnings: Vec<NumericalWarning>,
    ) -> Self {
        debug_assert_eq!(times.len(), states.len());
        Self {
            times,
            states,
            temperature,
            moisture,
            warnings,
        }
    }

    /// Number of output times.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Output times in years.
    pub fn times(&self) -> &Array1<f64> {
        &self.times
    }

    /// Pool states, one per output time.
    pub fn states(&self) -> &[SoilCarbon] {
        &self.states
    }

    /// The state at output index `i`.
    pub fn state(&self, i: usize) -> &SoilCarbon {
        &self.states[i]
    }

    /// The initial condition (t = 0 pass-through).
    pub fn initial(&self) -> &SoilCarbon {
        &self.states[0]
    }

    /// The state at the final output time.
    pub fn last(&self) -> &SoilCarbon {
        self.states.last().expect("trajectory is never empty")
    }

    /// Temperature actually used at each output time.
    /// unit: K
    pub fn temperature(&self) -> &Array1<f64> {
        &self.temperature
    }

    /// Saturation actually used at each output time.
    pub fn moisture(&self) -> &Array1<f64> {
        &self.moisture
    }

    /// Numerical warnings raised during the run (explicit strategy only).
    pub fn warnings(&self) -> &[NumericalWarning] {
        &self.warnings
    }

    /// Series of one pool over time, by state key (`uFastC`, `pSlowC`,
    /// `MBC_1`, `CO2`, ...).
    pub fn pool_series(&self, key: &str) -> Option<Array1<f64>> {
        // Probe the first state so an unknown key is None, not zeros.
        self.states.first()?.get(key)?;
        Some(Array1::from_iter(
            self.states.iter().map(|s| s.get(key).unwrap_or(f64::NAN)),
        ))
    }

    /// Cumulative respired carbon over time.
    pub fn co2(&self) -> Array1<f64> {
        Array1::from_iter(self.states.iter().map(|s| s.co2))
    }

    /// Total carbon stock over time, excluding respired CO2: the
    /// reporting aggregate of unprotected, protected, and biomass pools.
    pub fn total_carbon(&self) -> Array1<f64> {
        Array1::from_iter(self.states.iter().map(|s| s.total_carbon()))
    }

    /// Total carbon including cumulative CO2. With no external inputs this
    /// is conserved up to integrator tolerance.
    pub fn total_with_respired(&self) -> Array1<f64> {
        Array1::from_iter(self.states.iter().map(|s| s.total_carbon() + s.co2))
    }
}

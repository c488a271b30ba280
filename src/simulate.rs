//! Time integration of the pool equations.
//!
//! Two interchangeable strategies advance the state across the requested
//! output times:
//!
//! - [`IntegrationStrategy::Explicit`]: first-order forward stepping with
//!   one rate evaluation per interval. Deterministic and cheap, but only
//!   stable when the step stays well below the fastest microbial lifetime
//!   ([`Parameters::max_stable_step`]); oversized steps drive pools
//!   negative, which is surfaced as [`NumericalWarning`]s rather than
//!   corrected.
//! - [`IntegrationStrategy::Adaptive`]: adaptive Dormand-Prince
//!   integration of the same derivative over each requested interval,
//!   sampling output only at the requested times. Preferred for stiff
//!   parameter regimes (fast microbial pools against slow substrate).
//!
//! Both record the environmental driver values actually used and return a
//! [`Trajectory`] whose first entry is the initial state unchanged.

use crate::environment::{MoistureBounds, TemperatureBounds};
use crate::errors::{CorpseError, CorpseResult, NumericalWarning};
use crate::kinetics::derivative_unchecked;
use crate::parameters::Parameters;
use crate::pools::SoilCarbon;
use crate::trajectory::Trajectory;
use nalgebra::DVector;
use ndarray::Array1;
use ode_solvers::dopri5::Dopri5;

/// Choice of time-stepping scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationStrategy {
    /// Fixed first-order forward steps on the requested time grid.
    Explicit,
    /// Adaptive Dormand-Prince solver sampled at the requested times.
    Adaptive,
}

/// Tolerances for the adaptive solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    pub rtol: f64,
    pub atol: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-8,
        }
    }
}

/// ODE right-hand side for one requested interval: moisture and the step
/// index are frozen, temperature follows its diurnal law continuously.
struct PoolOde<'a> {
    params: &'a Parameters,
    temperature: &'a TemperatureBounds,
    theta: f64,
    step: usize,
    clay_modifier: f64,
    inputs: DVector<f64>,
}

impl<'a> ode_solvers::System<f64, DVector<f64>> for PoolOde<'a> {
    fn system(&self, t: f64, y: &DVector<f64>, dy: &mut DVector<f64>) {
        let state = SoilCarbon::from_vector(y);
        let temperature = self.temperature.at(self.step, t);
        let deriv = derivative_unchecked(
            &state,
            temperature,
            self.theta,
            self.params,
            self.clay_modifier,
        );
        let rhs = deriv.to_vector() + &self.inputs;
        dy.copy_from(&rhs);
    }
}

/// Run one simulation with default solver tolerances.
///
/// `inputs` holds constant external carbon input rates per pool (all zero
/// for a closed incubation); `clay_modifier` scales protected-carbon
/// formation for soil texture (see
/// [`clay_modifier`](crate::parameters::clay_modifier)). The call is pure
/// and reentrant: independent scenarios can be fanned out across threads
/// with no shared mutable state.
#[allow(clippy::too_many_arguments)]
pub fn run_simulation(
    strategy: IntegrationStrategy,
    temperature: &TemperatureBounds,
    moisture: &MoistureBounds,
    times: &Array1<f64>,
    inputs: &SoilCarbon,
    clay_modifier: f64,
    initial: &SoilCarbon,
    params: &Parameters,
) -> CorpseResult<Trajectory> {
    run_simulation_with_options(
        strategy,
        temperature,
        moisture,
        times,
        inputs,
        clay_modifier,
        initial,
        params,
        &SolverOptions::default(),
    )
}

/// Run one simulation with explicit solver tolerances.
#[allow(clippy::too_many_arguments)]
pub fn run_simulation_with_options(
    strategy: IntegrationStrategy,
    temperature: &TemperatureBounds,
    moisture: &MoistureBounds,
    times: &Array1<f64>,
    inputs: &SoilCarbon,
    clay_modifier: f64,
    initial: &SoilCarbon,
    params: &Parameters,
    options: &SolverOptions,
) -> CorpseResult<Trajectory> {
    params.validate()?;
    let n_pools = params.n_microbe_pools();
    initial.check_shape(n_pools)?;
    initial.check_non_negative()?;
    inputs.check_shape(n_pools)?;

    if times.is_empty() {
        return Err(CorpseError::InvalidTimeGrid { index: 0 });
    }
    for i in 1..times.len() {
        if times[i] <= times[i - 1] {
            return Err(CorpseError::InvalidTimeGrid { index: i });
        }
    }
    temperature.validate(times.len())?;
    moisture.validate(times.len())?;

    // Driver values as used: the explicit scheme evaluates each interval
    // at its start time, and both schemes hold moisture per step.
    let temperature_used =
        Array1::from_iter((0..times.len()).map(|i| temperature.at(i, times[i])));
    let moisture_used = Array1::from_iter((0..times.len()).map(|i| moisture.at(i)));

    let input_vec = inputs.to_vector();
    let mut states = Vec::with_capacity(times.len());
    states.push(initial.clone());
    let mut warnings = Vec::new();
    let mut y = initial.to_vector();

    for i in 0..times.len() - 1 {
        let dt = times[i + 1] - times[i];
        match strategy {
            IntegrationStrategy::Explicit => {
                let state = SoilCarbon::from_vector(&y);
                let deriv = derivative_unchecked(
                    &state,
                    temperature_used[i],
                    moisture_used[i],
                    params,
                    clay_modifier,
                );
                y += (deriv.to_vector() + &input_vec) * dt;
                let next = SoilCarbon::from_vector(&y);
                record_sign_changes(&state, &next, times[i + 1], &mut warnings);
                states.push(next);
            }
            IntegrationStrategy::Adaptive => {
                let ode = PoolOde {
                    params,
                    temperature,
                    theta: moisture_used[i],
                    step: i,
                    clay_modifier,
                    inputs: input_vec.clone(),
                };
                let mut stepper = Dopri5::new(
                    ode,
                    times[i],
                    times[i + 1],
                    dt,
                    y.clone(),
                    options.rtol,
                    options.atol,
                );
                stepper
                    .integrate()
                    .map_err(|e| CorpseError::Solver(format!("{:?}", e)))?;
                y = stepper
                    .y_out()
                    .last()
                    .ok_or_else(|| {
                        CorpseError::Solver("solver produced no output".to_string())
                    })?
                    .clone();
                states.push(SoilCarbon::from_vector(&y));
            }
        }
    }

    Ok(Trajectory::new(
        times.clone(),
        states,
        temperature_used,
        moisture_used,
        warnings,
    ))
}

/// Report pools that an explicit step has just driven negative. The state
/// is left untouched so the mass budget still closes; the caller decides
/// whether the step size was adequate.
fn record_sign_changes(
    previous: &SoilCarbon,
    next: &SoilCarbon,
    time: f64,
    warnings: &mut Vec<NumericalWarning>,
) {
    for ((pool, before), (_, after)) in previous.iter_pools().zip(next.iter_pools()) {
        if before >= 0.0 && after < 0.0 {
            let warning = NumericalWarning {
                time,
                pool,
                value: after,
            };
            log::warn!("{}", warning);
            warnings.push(warning);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DAYS_PER_YEAR, TREF};
    use crate::kinetics::compute_derivative;
    use crate::pools::{ByClass, ChemClass};
    use approx::assert_relative_eq;
    use ndarray::Array1;

    fn incubation_state() -> SoilCarbon {
        let mut state = SoilCarbon::zero(1);
        state.unprotected = ByClass::new(3.0, 88.0, 3.0, 4.0);
        state.biomass[0] = 4.5;
        state
    }

    fn daily_grid(days: usize) -> Array1<f64> {
        Array1::from_iter((0..=days).map(|d| d as f64 / DAYS_PER_YEAR))
    }

    fn constant_drivers() -> (TemperatureBounds, MoistureBounds) {
        (
            TemperatureBounds::constant(TREF),
            MoistureBounds::constant(0.6),
        )
    }

    #[test]
    fn first_entry_is_the_initial_state() {
        let (temperature, moisture) = constant_drivers();
        let initial = incubation_state();
        let params = Parameters::default();
        for strategy in [IntegrationStrategy::Explicit, IntegrationStrategy::Adaptive] {
            let trajectory = run_simulation(
                strategy,
                &temperature,
                &moisture,
                &daily_grid(5),
                &SoilCarbon::zero(1),
                1.0,
                &initial,
                &params,
            )
            .unwrap();
            assert_eq!(trajectory.initial(), &initial);
            assert_eq!(trajectory.len(), 6);
        }
    }

    #[test]
    fn explicit_step_matches_hand_euler() {
        let (temperature, moisture) = constant_drivers();
        let initial = incubation_state();
        let params = Parameters::default();
        let times = daily_grid(1);
        let trajectory = run_simulation(
            IntegrationStrategy::Explicit,
            &temperature,
            &moisture,
            &times,
            &SoilCarbon::zero(1),
            1.0,
            &initial,
            &params,
        )
        .unwrap();

        let dt = 1.0 / DAYS_PER_YEAR;
        let deriv = compute_derivative(&initial, TREF, 0.6, &params, 1.0).unwrap();
        let stepped = trajectory.state(1);
        assert_relative_eq!(
            stepped.unprotected.fast,
            initial.unprotected.fast + deriv.unprotected.fast * dt,
            max_relative = 1e-12
        );
        assert_relative_eq!(
            stepped.co2,
            deriv.co2 * dt,
            max_relative = 1e-12
        );
    }

    #[test]
    fn strategies_agree_on_a_smooth_trajectory() {
        let (temperature, moisture) = constant_drivers();
        let initial = incubation_state();
        let params = Parameters::default();
        let times = daily_grid(10);
        let zero = SoilCarbon::zero(1);

        let explicit = run_simulation(
            IntegrationStrategy::Explicit,
            &temperature,
            &moisture,
            &times,
            &zero,
            1.0,
            &initial,
            &params,
        )
        .unwrap();
        let adaptive = run_simulation(
            IntegrationStrategy::Adaptive,
            &temperature,
            &moisture,
            &times,
            &zero,
            1.0,
            &initial,
            &params,
        )
        .unwrap();

        assert_relative_eq!(
            explicit.last().co2,
            adaptive.last().co2,
            max_relative = 0.05
        );
        assert_relative_eq!(
            explicit.last().total_carbon(),
            adaptive.last().total_carbon(),
            max_relative = 0.01
        );
    }

    #[test]
    fn oversized_explicit_steps_are_reported_not_corrected() {
        let (temperature, moisture) = constant_drivers();
        let mut params = Parameters::default();
        // Sub-hour lifetime against a daily step.
        params.tmic[0] = 1e-3;
        let mut initial = SoilCarbon::zero(1);
        initial.unprotected[ChemClass::Slow] = 0.5;
        initial.biomass[0] = 1.0;

        let trajectory = run_simulation(
            IntegrationStrategy::Explicit,
            &temperature,
            &moisture,
            &daily_grid(2),
            &SoilCarbon::zero(1),
            1.0,
            &initial,
            &params,
        )
        .unwrap();

        assert!(!trajectory.warnings().is_empty());
        assert!(trajectory
            .warnings()
            .iter()
            .any(|w| w.pool == "MBC_1"));
        // The negative mass is preserved, not clamped away.
        assert!(trajectory.pool_series("MBC_1").unwrap()[1] < 0.0);
        assert!(params.max_stable_step() < 1.0 / DAYS_PER_YEAR);
    }

    #[test]
    fn constant_inputs_accumulate_linearly_without_microbes() {
        let (temperature, moisture) = constant_drivers();
        let params = Parameters::default();
        let mut initial = SoilCarbon::zero(1);
        initial.unprotected[ChemClass::Py] = 1.0;
        let mut inputs = SoilCarbon::zero(1);
        inputs.unprotected[ChemClass::Py] = 10.0;
        let times = daily_grid(10);

        for strategy in [IntegrationStrategy::Explicit, IntegrationStrategy::Adaptive] {
            let trajectory = run_simulation(
                strategy,
                &temperature,
                &moisture,
                &times,
                &inputs,
                1.0,
                &initial,
                &params,
            )
            .unwrap();
            // No biomass and no protection of pyrogenic C: the pool just
            // integrates the input rate.
            let expected = 1.0 + 10.0 * times[times.len() - 1];
            assert_relative_eq!(
                trajectory.last().unprotected[ChemClass::Py],
                expected,
                max_relative = 1e-6
            );
        }
    }

    #[test]
    fn invalid_time_grids_are_fatal() {
        let (temperature, moisture) = constant_drivers();
        let params = Parameters::default();
        let initial = incubation_state();
        let zero = SoilCarbon::zero(1);

        let err = run_simulation(
            IntegrationStrategy::Explicit,
            &temperature,
            &moisture,
            &Array1::from_vec(vec![]),
            &zero,
            1.0,
            &initial,
            &params,
        )
        .unwrap_err();
        assert_eq!(err, CorpseError::InvalidTimeGrid { index: 0 });

        let err = run_simulation(
            IntegrationStrategy::Explicit,
            &temperature,
            &moisture,
            &Array1::from_vec(vec![0.0, 0.002, 0.001]),
            &zero,
            1.0,
            &initial,
            &params,
        )
        .unwrap_err();
        assert_eq!(err, CorpseError::InvalidTimeGrid { index: 2 });
    }

    #[test]
    fn invalid_initial_state_is_fatal() {
        let (temperature, moisture) = constant_drivers();
        let params = Parameters::default();
        let mut initial = incubation_state();
        initial.unprotected[ChemClass::Fast] = -1.0;

        let err = run_simulation(
            IntegrationStrategy::Adaptive,
            &temperature,
            &moisture,
            &daily_grid(2),
            &SoilCarbon::zero(1),
            1.0,
            &initial,
            &params,
        )
        .unwrap_err();
        assert!(matches!(err, CorpseError::NegativeMass { .. }));
    }

    #[test]
    fn drivers_used_are_recorded() {
        let temperature = TemperatureBounds::new(291.15, 297.15);
        let moisture = MoistureBounds::new(0.5, 0.7);
        let params = Parameters::default();
        let trajectory = run_simulation(
            IntegrationStrategy::Explicit,
            &temperature,
            &moisture,
            &daily_grid(3),
            &SoilCarbon::zero(1),
            1.0,
            &incubation_state(),
            &params,
        )
        .unwrap();

        assert_eq!(trajectory.temperature().len(), 4);
        assert_relative_eq!(trajectory.temperature()[0], 291.15);
        for theta in trajectory.moisture() {
            assert_relative_eq!(*theta, 0.6);
        }
    }
}

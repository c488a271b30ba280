//! Decomposition rate laws.
//!
//! Everything here is a pure function of (state, environment, parameters):
//! the integrator may evaluate the derivative once per step or several
//! times per solver sub-stage and must get identical results for identical
//! inputs. Input states are read-only; derivatives come back as a new
//! [`SoilCarbon`] of the same shape whose entries are rates of change
//! (mass / yr).
//!
//! The rate model combines
//!
//! 1. Arrhenius temperature scaling of the maximum decomposition rate,
//!    normalised to [`TREF`],
//! 2. a dual power-law moisture response in saturation fraction,
//! 3. Michaelis-Menten substrate-consumer kinetics per
//!    (consumer, substrate) pair,
//! 4. floor-protected microbial turnover with a maintenance-respiration
//!    split, and
//! 5. first-order exchange between protected and unprotected carbon.

use crate::constants::{RUGAS, TREF};
use crate::errors::CorpseResult;
use crate::parameters::Parameters;
use crate::pools::{ByClass, ChemClass, SoilCarbon};

/// Temperature-adjusted maximum decomposition rate per substrate class.
///
/// Scales the reference rate by `exp(-Ea/R * (1/T - 1/Tref))`: equal to
/// `vmaxref` at the reference temperature and strictly positive for any
/// finite temperature above absolute zero.
pub fn vmax(vmaxref: &ByClass<f64>, ea: &ByClass<f64>, temperature: f64) -> ByClass<f64> {
    let mut out = ByClass::default();
    for t in ChemClass::ALL {
        out[t] =
            vmaxref[t] * (-ea[t] * (1.0 / (RUGAS * temperature) - 1.0 / (RUGAS * TREF))).exp();
    }
    out
}

/// Maximum of the raw moisture response `theta^p * (1-theta)^q` over
/// saturation, attained at `theta = p / (p + q)`.
///
/// With `new_resp_units` the response is divided by this ceiling so its
/// maximum is exactly one and `vmaxref` keeps per-year units; otherwise
/// the divisor is one and `vmaxref` must be pre-scaled by the caller.
pub fn moisture_ceiling(params: &Parameters) -> f64 {
    if params.new_resp_units {
        let p = params.substrate_diffusion_exp;
        let q = params.gas_diffusion_exp;
        let theta_opt = p / (p + q);
        theta_opt.powf(p) * (1.0 - theta_opt).powf(q)
    } else {
        1.0
    }
}

/// Combined moisture multiplier `theta^p * (1-theta)^q / ceiling`.
///
/// Saturation is clamped to [0, 1] before evaluation.
pub fn moisture_response(theta: f64, params: &Parameters) -> f64 {
    let theta = theta.clamp(0.0, 1.0);
    theta.powf(params.substrate_diffusion_exp) * (1.0 - theta).powf(params.gas_diffusion_exp)
        / moisture_ceiling(params)
}

/// Michaelis-Menten decomposition rate for every (consumer, substrate)
/// pair, one [`ByClass`] record per microbial pool.
///
/// If the total unprotected substrate is zero, or the saturation is zero,
/// or a consumer's biomass is zero, every rate for that consumer is
/// exactly zero; the guard is evaluated once per consumer per call and
/// protects the division by `total_u * kC + biomass`.
pub fn decomposition_rates(
    state: &SoilCarbon,
    temperature: f64,
    theta: f64,
    params: &Parameters,
) -> Vec<ByClass<f64>> {
    let theta = theta.clamp(0.0, 1.0);
    let total_u = state.total_unprotected();
    let moisture = moisture_response(theta, params);

    (0..params.n_microbe_pools())
        .map(|m| {
            let biomass = state.biomass[m];
            if total_u == 0.0 || theta == 0.0 || biomass == 0.0 {
                return ByClass::default();
            }
            let vmax_m = vmax(&params.vmaxref[m], &params.ea, temperature);
            let mut rates = ByClass::default();
            for t in ChemClass::ALL {
                rates[t] = vmax_m[t] * moisture * state.unprotected[t] * biomass
                    / (total_u * params.kc[m][t] + biomass);
            }
            rates
        })
        .collect()
}

/// Instantaneous rate of change of every pool.
///
/// Validates the state shape against the parameter set and rejects
/// negative masses, then delegates to the raw rate assembly. The returned
/// derivatives close the carbon budget exactly: summed over all substrate,
/// protected, and biomass pools plus CO2 they add to zero.
pub fn compute_derivative(
    state: &SoilCarbon,
    temperature: f64,
    theta: f64,
    params: &Parameters,
    clay_modifier: f64,
) -> CorpseResult<SoilCarbon> {
    params.validate()?;
    state.check_shape(params.n_microbe_pools())?;
    state.check_non_negative()?;
    Ok(derivative_unchecked(
        state,
        temperature,
        theta,
        params,
        clay_modifier,
    ))
}

/// Rate assembly without input validation.
///
/// The integrators call this after validating the initial state once;
/// mid-run states that have been driven negative by an oversized explicit
/// step are evaluated as-is, so the instability surfaces in the output
/// instead of being corrected away.
pub(crate) fn derivative_unchecked(
    state: &SoilCarbon,
    temperature: f64,
    theta: f64,
    params: &Parameters,
    clay_modifier: f64,
) -> SoilCarbon {
    let theta = theta.clamp(0.0, 1.0);
    let n = params.n_microbe_pools();
    let total_u = state.total_unprotected();
    let rates = decomposition_rates(state, temperature, theta, params);

    let mut deriv = SoilCarbon::zero(n);
    let mut co2 = 0.0;
    let mut dead_microbe_c = 0.0;

    for m in 0..n {
        // Relaxation toward the minimum viable biomass; never a growth
        // term, and inactive while the pool is empty.
        let turnover = if state.biomass[m] > 0.0 {
            ((state.biomass[m] - params.min_microbe_c[m] * total_u) / params.tmic[m]).max(0.0)
        } else {
            0.0
        };
        dead_microbe_c += turnover * params.et[m];
        co2 += turnover * (1.0 - params.et[m]);

        let mut growth = 0.0;
        for t in ChemClass::ALL {
            growth += rates[m][t] * params.eup[m][t];
            co2 += rates[m][t] * (1.0 - params.eup[m][t]);
        }
        deriv.biomass[m] = growth - turnover;
    }

    for t in ChemClass::ALL {
        let protected_turnover = state.protected[t] / params.t_protected;
        let protected_formation =
            state.unprotected[t] * params.protection_rate[t] * clay_modifier;
        let decomp: f64 = rates.iter().map(|r| r[t]).sum();
        deriv.unprotected[t] = -decomp + protected_turnover - protected_formation;
        deriv.protected[t] = protected_formation - protected_turnover;
    }
    deriv.unprotected[ChemClass::Necro] += dead_microbe_c;
    deriv.co2 = co2;
    deriv
}

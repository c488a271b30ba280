//! Kinetic parameters for the decomposition model.
//!
//! One [`Parameters`] value drives any number of microbial pools: the
//! per-consumer entries are vectors indexed by pool, the per-substrate
//! entries are [`ByClass`] records. Defaults reproduce the unburned
//! sandy-soil incubation configuration with a single microbial pool.
//!
//! The texture helpers at the bottom scale protected-carbon formation for
//! soil mineralogy, based on the sorption isotherms of Mayes et al. (2012).

use crate::constants::REFERENCE_CLAY_PERCENT;
use crate::errors::{CorpseError, CorpseResult};
use crate::pools::ByClass;
use serde::{Deserialize, Serialize};

/// Parameters controlling decomposition kinetics.
///
/// Vector-valued fields hold one entry per microbial pool and must all
/// share the same length; [`Parameters::validate`] checks this before a
/// simulation starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Maximum reference enzymatic decomposition rate per (consumer,
    /// substrate) pair, at the reference temperature and optimal moisture
    /// unit: 1 / yr
    pub vmaxref: Vec<ByClass<f64>>,

    /// Activation energy per substrate class; controls temperature
    /// dependence of the maximum rate
    /// unit: J / mol
    pub ea: ByClass<f64>,

    /// Michaelis-Menten half-saturation constant per (consumer, substrate)
    /// pair
    /// unit: g biomass C / g substrate C
    pub kc: Vec<ByClass<f64>>,

    /// Suppression of decomposition at high soil moisture (oxygen
    /// limitation)
    /// unit: dimensionless exponent
    pub gas_diffusion_exp: f64,

    /// Suppression of decomposition at low soil moisture (substrate
    /// diffusion limitation)
    /// unit: dimensionless exponent
    pub substrate_diffusion_exp: f64,

    /// Minimum viable microbial biomass per consumer, as a fraction of
    /// total unprotected substrate. Keeps decomposition from shutting off
    /// entirely under adverse conditions.
    /// unit: dimensionless
    pub min_microbe_c: Vec<f64>,

    /// Mean microbial biomass lifetime per consumer
    /// unit: yr
    pub tmic: Vec<f64>,

    /// Fraction of microbial turnover converted to necromass rather than
    /// respired immediately, per consumer
    /// unit: dimensionless
    pub et: Vec<f64>,

    /// Carbon use efficiency per (consumer, substrate) pair: the fraction
    /// of decomposed carbon incorporated into biomass, the remainder being
    /// respired
    /// unit: dimensionless
    pub eup: Vec<ByClass<f64>>,

    /// Protected carbon turnover time: the time scale on which protected
    /// carbon is released back to the unprotected state
    /// unit: yr
    pub t_protected: f64,

    /// Protected carbon formation rate per substrate class, at the
    /// reference soil texture
    /// unit: 1 / yr
    pub protection_rate: ByClass<f64>,

    /// When set, the moisture response is normalised so that its maximum
    /// over saturation is exactly one and `vmaxref` reads directly as a
    /// per-year rate. When unset the caller must pre-scale `vmaxref`.
    pub new_resp_units: bool,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            vmaxref: vec![ByClass::new(6.9, 0.11, 7.0, 0.1)],
            ea: ByClass::new(30e3, 30e3, 30e3, 35e3),
            kc: vec![ByClass::new(0.0085, 0.02, 0.01, 0.02)],
            gas_diffusion_exp: 0.6,
            substrate_diffusion_exp: 1.5,
            min_microbe_c: vec![1e-3],
            tmic: vec![0.5],
            et: vec![0.8],
            eup: vec![ByClass::new(0.4, 0.3, 0.55, 0.15)],
            t_protected: 75.0,
            protection_rate: ByClass::new(0.0, 0.001, 0.0, 0.0),
            new_resp_units: true,
        }
    }
}

impl Parameters {
    /// Number of microbial pools these parameters describe.
    pub fn n_microbe_pools(&self) -> usize {
        self.vmaxref.len()
    }

    /// Check internal consistency: every per-consumer vector has one entry
    /// per microbial pool and the time scales are usable divisors.
    pub fn validate(&self) -> CorpseResult<()> {
        let n = self.n_microbe_pools();
        if n == 0 {
            return Err(CorpseError::ParameterShape {
                name: "vmaxref".to_string(),
                reason: "at least one microbial pool is required".to_string(),
            });
        }
        let lengths = [
            ("kC", self.kc.len()),
            ("minMicrobeC", self.min_microbe_c.len()),
            ("Tmic", self.tmic.len()),
            ("et", self.et.len()),
            ("eup", self.eup.len()),
        ];
        for (name, len) in lengths {
            if len != n {
                return Err(CorpseError::ParameterShape {
                    name: name.to_string(),
                    reason: format!("{} entries for {} microbial pools", len, n),
                });
            }
        }
        for (m, tmic) in self.tmic.iter().enumerate() {
            if *tmic <= 0.0 {
                return Err(CorpseError::ParameterShape {
                    name: "Tmic".to_string(),
                    reason: format!("pool {} lifetime must be positive, got {}", m + 1, tmic),
                });
            }
        }
        if self.t_protected <= 0.0 {
            return Err(CorpseError::ParameterShape {
                name: "tProtected".to_string(),
                reason: format!("must be positive, got {}", self.t_protected),
            });
        }
        if self.gas_diffusion_exp <= 0.0 || self.substrate_diffusion_exp <= 0.0 {
            return Err(CorpseError::ParameterShape {
                name: "gas_diffusion_exp".to_string(),
                reason: "moisture response exponents must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Upper bound on a numerically safe explicit step: the fastest
    /// microbial lifetime in use. The explicit iterator risks oscillation
    /// and negative masses once the step approaches this value; steps an
    /// order of magnitude smaller are recommended.
    /// unit: yr
    pub fn max_stable_step(&self) -> f64 {
        self.tmic.iter().copied().fold(f64::INFINITY, f64::min)
    }
}

/// A log-linear sorption isotherm relating clay content to the maximum
/// sorption capacity, after Mayes et al. (2012), Table 3.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SorptionIsotherm {
    pub slope: f64,
    pub intercept: f64,
}

impl SorptionIsotherm {
    /// Fit across all soil orders.
    pub const ALL_SOILS: SorptionIsotherm = SorptionIsotherm {
        slope: 0.4833,
        intercept: 2.3282,
    };

    /// Fit for Alfisols only.
    pub const ALFISOLS: SorptionIsotherm = SorptionIsotherm {
        slope: 0.5945,
        intercept: 2.2788,
    };
}

/// Protected-carbon formation potential as a function of clay content.
///
/// Evaluates the isotherm's Qmax (mg C / kg soil) and converts to a volume
/// basis using the bulk density (g / cm3). Typically used as a relative
/// value through [`clay_modifier`] rather than directly.
pub fn protection_from_clay(
    clay_percent: f64,
    isotherm: SorptionIsotherm,
    bulk_density: f64,
) -> f64 {
    10f64.powf(isotherm.slope * clay_percent.log10() + isotherm.intercept) * bulk_density * 1e-6
}

/// Texture modifier for the protected-carbon formation rate, normalised so
/// that a soil at the reference clay content is unmodified.
pub fn clay_modifier(clay_percent: f64) -> f64 {
    let bulk_density = 1.15;
    protection_from_clay(clay_percent, SorptionIsotherm::ALL_SOILS, bulk_density)
        / protection_from_clay(
            REFERENCE_CLAY_PERCENT,
            SorptionIsotherm::ALL_SOILS,
            bulk_density,
        )
}

//! Carbon pool state containers.
//!
//! The model tracks four categories of pools:
//!
//! - unprotected substrate, one per chemical class, available to microbial
//!   decomposition
//! - protected substrate, one per chemical class, physically shielded and
//!   exchanging mass with its unprotected counterpart
//! - one or more microbial biomass pools, each an independent consumer
//! - a cumulative CO2 pool collecting all respired carbon

use crate::errors::{CorpseError, CorpseResult};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Chemical substrate classes.
///
/// `Fast` has the highest maximum decomposition rate and microbial carbon
/// use efficiency; `Slow` is structural material; `Necro` is microbial
/// necromass; `Py` is pyrogenic carbon from fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChemClass {
    Fast,
    Slow,
    Necro,
    Py,
}

impl ChemClass {
    /// All classes in canonical order.
    pub const ALL: [ChemClass; 4] = [
        ChemClass::Fast,
        ChemClass::Slow,
        ChemClass::Necro,
        ChemClass::Py,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ChemClass::Fast => "Fast",
            ChemClass::Slow => "Slow",
            ChemClass::Necro => "Necro",
            ChemClass::Py => "Py",
        }
    }

    /// State key of the unprotected pool for this class, e.g. `uFastC`.
    pub fn unprotected_key(&self) -> String {
        format!("u{}C", self.name())
    }

    /// State key of the protected pool for this class, e.g. `pFastC`.
    pub fn protected_key(&self) -> String {
        format!("p{}C", self.name())
    }
}

/// A value per chemical class.
///
/// Used both for pool masses and for per-class parameters. Serialises with
/// the class names as keys (`Fast = 6.9` in TOML).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ByClass<T> {
    pub fast: T,
    pub slow: T,
    pub necro: T,
    pub py: T,
}

impl<T> ByClass<T> {
    pub fn new(fast: T, slow: T, necro: T, py: T) -> Self {
        Self {
            fast,
            slow,
            necro,
            py,
        }
    }

    /// Apply `f` to every class.
    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> ByClass<U> {
        ByClass {
            fast: f(&self.fast),
            slow: f(&self.slow),
            necro: f(&self.necro),
            py: f(&self.py),
        }
    }
}

impl<T: Copy> ByClass<T> {
    /// The same value for every class.
    pub fn splat(value: T) -> Self {
        Self {
            fast: value,
            slow: value,
            necro: value,
            py: value,
        }
    }
}

impl ByClass<f64> {
    /// Sum over all classes.
    pub fn total(&self) -> f64 {
        ChemClass::ALL.iter().map(|t| self[*t]).sum()
    }
}

impl<T> Index<ChemClass> for ByClass<T> {
    type Output = T;

    fn index(&self, class: ChemClass) -> &T {
        match class {
            ChemClass::Fast => &self.fast,
            ChemClass::Slow => &self.slow,
            ChemClass::Necro => &self.necro,
            ChemClass::Py => &self.py,
        }
    }
}

impl<T> IndexMut<ChemClass> for ByClass<T> {
    fn index_mut(&mut self, class: ChemClass) -> &mut T {
        match class {
            ChemClass::Fast => &mut self.fast,
            ChemClass::Slow => &mut self.slow,
            ChemClass::Necro => &mut self.necro,
            ChemClass::Py => &mut self.py,
        }
    }
}

/// The full pool state of one simulated soil.
///
/// All masses are carbon stocks in the caller's mass unit (the reference
/// experiments use kg C / m2); `co2` is the cumulative respired mass, not
/// a flux. The rate engine treats a `SoilCarbon` as read-only and returns
/// a new value of the same shape holding derivatives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilCarbon {
    /// Unprotected substrate mass per chemical class
    pub unprotected: ByClass<f64>,
    /// Protected substrate mass per chemical class
    pub protected: ByClass<f64>,
    /// Living microbial biomass, one entry per microbial pool
    pub biomass: Vec<f64>,
    /// Cumulative respired carbon
    pub co2: f64,
}

/// Number of non-biomass slots in the flattened state vector
/// (4 unprotected + 4 protected + CO2).
const FIXED_SLOTS: usize = 9;

impl SoilCarbon {
    /// An all-zero state with `n_pools` microbial pools. Useful as the
    /// neutral external-input map and as a derivative accumulator.
    pub fn zero(n_pools: usize) -> Self {
        Self {
            unprotected: ByClass::default(),
            protected: ByClass::default(),
            biomass: vec![0.0; n_pools],
            co2: 0.0,
        }
    }

    /// Number of microbial biomass pools in this state.
    pub fn n_microbe_pools(&self) -> usize {
        self.biomass.len()
    }

    /// Total unprotected substrate over all chemical classes. Living
    /// biomass and CO2 are not included.
    pub fn total_unprotected(&self) -> f64 {
        self.unprotected.total()
    }

    /// Total protected substrate over all chemical classes.
    pub fn total_protected(&self) -> f64 {
        self.protected.total()
    }

    /// Total living microbial biomass over all pools.
    pub fn total_biomass(&self) -> f64 {
        self.biomass.iter().sum()
    }

    /// Total carbon stock excluding respired CO2: the reporting aggregate
    /// for substrate plus biomass.
    pub fn total_carbon(&self) -> f64 {
        self.total_unprotected() + self.total_protected() + self.total_biomass()
    }

    /// Check that the state has the shape the chosen variant requires.
    pub fn check_shape(&self, n_pools: usize) -> CorpseResult<()> {
        if self.biomass.len() != n_pools {
            // Name the first missing biomass pool, or reject the surplus.
            return if self.biomass.len() < n_pools {
                Err(CorpseError::MissingPool(format!(
                    "MBC_{}",
                    self.biomass.len() + 1
                )))
            } else {
                Err(CorpseError::ParameterShape {
                    name: "biomass".to_string(),
                    reason: format!(
                        "state carries {} microbial pools, variant expects {}",
                        self.biomass.len(),
                        n_pools
                    ),
                })
            };
        }
        Ok(())
    }

    /// Check that every mass is non-negative, naming the offending pool.
    pub fn check_non_negative(&self) -> CorpseResult<()> {
        for t in ChemClass::ALL {
            if self.unprotected[t] < 0.0 {
                return Err(CorpseError::NegativeMass {
                    pool: t.unprotected_key(),
                    value: self.unprotected[t],
                });
            }
            if self.protected[t] < 0.0 {
                return Err(CorpseError::NegativeMass {
                    pool: t.protected_key(),
                    value: self.protected[t],
                });
            }
        }
        for (m, mass) in self.biomass.iter().enumerate() {
            if *mass < 0.0 {
                return Err(CorpseError::NegativeMass {
                    pool: format!("MBC_{}", m + 1),
                    value: *mass,
                });
            }
        }
        if self.co2 < 0.0 {
            return Err(CorpseError::NegativeMass {
                pool: "CO2".to_string(),
                value: self.co2,
            });
        }
        Ok(())
    }

    /// Iterate over `(pool key, mass)` pairs in state-vector order.
    ///
    /// Microbial pools are keyed positionally (`MBC_1`, `MBC_2`, ...).
    pub fn iter_pools(&self) -> impl Iterator<Item = (String, f64)> + '_ {
        let unprotected = ChemClass::ALL
            .iter()
            .map(|t| (t.unprotected_key(), self.unprotected[*t]));
        let protected = ChemClass::ALL
            .iter()
            .map(|t| (t.protected_key(), self.protected[*t]));
        let biomass = self
            .biomass
            .iter()
            .enumerate()
            .map(|(m, mass)| (format!("MBC_{}", m + 1), *mass));
        unprotected
            .chain(protected)
            .chain(biomass)
            .chain(std::iter::once(("CO2".to_string(), self.co2)))
    }

    /// Look up a single pool mass by key.
    pub fn get(&self, key: &str) -> Option<f64> {
        self.iter_pools().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Flatten into the integrator's state vector. Layout:
    /// `[u x 4, p x 4, biomass x n, CO2]`.
    pub fn to_vector(&self) -> DVector<f64> {
        let mut out = Vec::with_capacity(FIXED_SLOTS + self.biomass.len());
        for t in ChemClass::ALL {
            out.push(self.unprotected[t]);
        }
        for t in ChemClass::ALL {
            out.push(self.protected[t]);
        }
        out.extend_from_slice(&self.biomass);
        out.push(self.co2);
        DVector::from_vec(out)
    }

    /// Rebuild a state from the integrator's vector layout.
    ///
    /// The number of microbial pools is recovered from the vector length.
    pub fn from_vector(v: &DVector<f64>) -> Self {
        debug_assert!(v.len() >= FIXED_SLOTS);
        let n_pools = v.len() - FIXED_SLOTS;
        let mut state = SoilCarbon::zero(n_pools);
        for (i, t) in ChemClass::ALL.iter().enumerate() {
            state.unprotected[*t] = v[i];
            state.protected[*t] = v[4 + i];
        }
        for m in 0..n_pools {
            state.biomass[m] = v[8 + m];
        }
        state.co2 = v[8 + n_pools];
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> SoilCarbon {
        SoilCarbon {
            unprotected: ByClass::new(3.0, 88.0, 3.0, 4.0),
            protected: ByClass::new(0.0, 1.5, 0.0, 0.0),
            biomass: vec![4.5, 0.045],
            co2: 0.25,
        }
    }

    #[test]
    fn totals() {
        let state = sample_state();
        assert_eq!(state.total_unprotected(), 98.0);
        assert_eq!(state.total_protected(), 1.5);
        assert!(is_close::is_close!(state.total_biomass(), 4.545));
        assert!(is_close::is_close!(state.total_carbon(), 104.045));
    }

    #[test]
    fn vector_round_trip() {
        let state = sample_state();
        let v = state.to_vector();
        assert_eq!(v.len(), 11);
        assert_eq!(SoilCarbon::from_vector(&v), state);
    }

    #[test]
    fn pool_keys_in_order() {
        let keys: Vec<String> = sample_state().iter_pools().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                "uFastC", "uSlowC", "uNecroC", "uPyC", "pFastC", "pSlowC", "pNecroC", "pPyC",
                "MBC_1", "MBC_2", "CO2",
            ]
        );
        assert_eq!(sample_state().get("uSlowC"), Some(88.0));
        assert_eq!(sample_state().get("CO2"), Some(0.25));
        assert_eq!(sample_state().get("MBC_3"), None);
    }

    #[test]
    fn shape_check_names_missing_pool() {
        let state = sample_state();
        assert!(state.check_shape(2).is_ok());
        let err = state.check_shape(3).unwrap_err();
        assert_eq!(err, CorpseError::MissingPool("MBC_3".to_string()));
        assert!(state.check_shape(1).is_err());
    }

    #[test]
    fn negative_mass_is_named() {
        let mut state = sample_state();
        state.unprotected[ChemClass::Necro] = -0.01;
        let err = state.check_non_negative().unwrap_err();
        assert_eq!(
            err,
            CorpseError::NegativeMass {
                pool: "uNecroC".to_string(),
                value: -0.01,
            }
        );

        let mut state = sample_state();
        state.biomass[1] = -1e-9;
        let err = state.check_non_negative().unwrap_err();
        assert!(matches!(err, CorpseError::NegativeMass { pool, .. } if pool == "MBC_2"));
    }

    #[test]
    fn by_class_serde_uses_class_names() {
        let values = ByClass::new(6.9, 0.11, 7.0, 0.1);
        let toml = toml::to_string(&values).unwrap();
        assert!(toml.contains("Fast"));
        assert!(toml.contains("Py"));
        let back: ByClass<f64> = toml::from_str(&toml).unwrap();
        assert_eq!(back, values);
    }
}

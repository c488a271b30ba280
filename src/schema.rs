//! Parameter schema declaration and validation.
//!
//! A [`ModelVariant`] fixes the number and naming of microbial pools and
//! the key layout of parameter files. [`validate_parameters`] checks a raw
//! parameter table against the variant's schema before anything is
//! deserialized: rate computation against an incomplete parameter set
//! produces physically meaningless output rather than a clean failure, so
//! the key check runs up front and reports every offending key at once.

use crate::errors::{CorpseError, CorpseResult};
use crate::parameters::Parameters;
use crate::pools::{ByClass, ChemClass};
use std::collections::HashMap;
use toml::{Table, Value};

/// Top-level parameter keys, identical for both layouts.
const EXPECTED_KEYS: [&str; 12] = [
    "vmaxref",
    "Ea",
    "kC",
    "gas_diffusion_exp",
    "substrate_diffusion_exp",
    "minMicrobeC",
    "Tmic",
    "et",
    "eup",
    "tProtected",
    "protection_rate",
    "new_resp_units",
];

/// Keys whose value is given per microbial pool in the [`PerPool`]
/// layout.
///
/// [`PerPool`]: ParameterLayout::PerPool
const PER_POOL_KEYS: [&str; 6] = ["vmaxref", "kC", "minMicrobeC", "Tmic", "et", "eup"];

/// How per-consumer parameters are keyed in a parameter file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterLayout {
    /// One microbial pool; per-consumer entries are plain scalars or
    /// per-class records.
    Flat,
    /// One sub-table per microbial pool, keyed by pool name.
    PerPool,
}

/// The number and naming of microbial pools, plus the parameter key
/// layout.
///
/// One generic engine serves every variant; the variant only decides which
/// keys a parameter file must carry and what the biomass pools are called.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelVariant {
    pool_names: Vec<String>,
    layout: ParameterLayout,
}

impl ModelVariant {
    /// The single-consumer model with flat parameter keys and the biomass
    /// pool named `livingMicrobeC`.
    pub fn single() -> Self {
        Self {
            pool_names: vec!["livingMicrobeC".to_string()],
            layout: ParameterLayout::Flat,
        }
    }

    /// A multi-consumer model with `n` pools named `MBC_1` .. `MBC_n` and
    /// per-pool parameter sub-tables.
    pub fn multi(n: usize) -> Self {
        Self {
            pool_names: (1..=n).map(|m| format!("MBC_{}", m)).collect(),
            layout: ParameterLayout::PerPool,
        }
    }

    /// A multi-consumer model with explicitly named pools.
    pub fn with_pool_names(names: Vec<String>) -> Self {
        Self {
            pool_names: names,
            layout: ParameterLayout::PerPool,
        }
    }

    pub fn n_microbe_pools(&self) -> usize {
        self.pool_names.len()
    }

    pub fn pool_names(&self) -> &[String] {
        &self.pool_names
    }

    pub fn layout(&self) -> ParameterLayout {
        self.layout
    }

    /// Short identifier used in error messages.
    pub fn name(&self) -> String {
        match self.layout {
            ParameterLayout::Flat => "single-pool".to_string(),
            ParameterLayout::PerPool => format!("{}-pool", self.pool_names.len()),
        }
    }

    /// The full ordered list of state keys this variant expects:
    /// unprotected and protected pools per chemical class, the microbial
    /// pools, and cumulative CO2.
    pub fn state_keys(&self) -> Vec<String> {
        ChemClass::ALL
            .iter()
            .map(|t| t.unprotected_key())
            .chain(ChemClass::ALL.iter().map(|t| t.protected_key()))
            .chain(self.pool_names.iter().cloned())
            .chain(std::iter::once("CO2".to_string()))
            .collect()
    }

    /// Check that `table` carries exactly the keys this variant requires.
    ///
    /// Pure and idempotent. On failure the error lists every missing and
    /// every unexpected key, including per-pool sub-table entries in the
    /// [`PerPool`](ParameterLayout::PerPool) layout (reported as
    /// `vmaxref.MBC_2`).
    pub fn validate_parameters(&self, table: &Table) -> CorpseResult<()> {
        let mut missing: Vec<String> = EXPECTED_KEYS
            .iter()
            .filter(|k| !table.contains_key(**k))
            .map(|k| k.to_string())
            .collect();
        let mut unexpected: Vec<String> = table
            .keys()
            .filter(|k| !EXPECTED_KEYS.contains(&k.as_str()))
            .cloned()
            .collect();

        if self.layout == ParameterLayout::PerPool {
            for key in PER_POOL_KEYS {
                let Some(Value::Table(sub)) = table.get(key) else {
                    continue;
                };
                for name in &self.pool_names {
                    if !sub.contains_key(name) {
                        missing.push(format!("{}.{}", key, name));
                    }
                }
                for name in sub.keys() {
                    if !self.pool_names.iter().any(|p| p == name) {
                        unexpected.push(format!("{}.{}", key, name));
                    }
                }
            }
        }

        if missing.is_empty() && unexpected.is_empty() {
            Ok(())
        } else {
            unexpected.sort();
            Err(CorpseError::ParameterSchema {
                variant: self.name(),
                missing,
                unexpected,
            })
        }
    }

    /// Validate `table` against this variant's schema, then deserialize it
    /// into typed [`Parameters`] with per-consumer vectors ordered by this
    /// variant's pool names.
    pub fn load_parameters(&self, table: &Table) -> CorpseResult<Parameters> {
        self.validate_parameters(table)?;
        let params = match self.layout {
            ParameterLayout::Flat => {
                let raw: FlatParams = deserialize_table(table)?;
                Parameters {
                    vmaxref: vec![raw.vmaxref],
                    ea: raw.ea,
                    kc: vec![raw.kc],
                    gas_diffusion_exp: raw.gas_diffusion_exp,
                    substrate_diffusion_exp: raw.substrate_diffusion_exp,
                    min_microbe_c: vec![raw.min_microbe_c],
                    tmic: vec![raw.tmic],
                    et: vec![raw.et],
                    eup: vec![raw.eup],
                    t_protected: raw.t_protected,
                    protection_rate: raw.protection_rate,
                    new_resp_units: raw.new_resp_units,
                }
            }
            ParameterLayout::PerPool => {
                let raw: PerPoolParams = deserialize_table(table)?;
                Parameters {
                    vmaxref: self.ordered(&raw.vmaxref, "vmaxref")?,
                    ea: raw.ea,
                    kc: self.ordered(&raw.kc, "kC")?,
                    gas_diffusion_exp: raw.gas_diffusion_exp,
                    substrate_diffusion_exp: raw.substrate_diffusion_exp,
                    min_microbe_c: self.ordered(&raw.min_microbe_c, "minMicrobeC")?,
                    tmic: self.ordered(&raw.tmic, "Tmic")?,
                    et: self.ordered(&raw.et, "et")?,
                    eup: self.ordered(&raw.eup, "eup")?,
                    t_protected: raw.t_protected,
                    protection_rate: raw.protection_rate,
                    new_resp_units: raw.new_resp_units,
                }
            }
        };
        params.validate()?;
        Ok(params)
    }

    /// Load parameters from TOML source text.
    pub fn load_parameters_str(&self, source: &str) -> CorpseResult<Parameters> {
        let table: Table = toml::from_str(source).map_err(|e| CorpseError::ParameterShape {
            name: "parameters".to_string(),
            reason: e.to_string(),
        })?;
        self.load_parameters(&table)
    }

    /// Collect a per-pool map into a vector ordered by this variant's pool
    /// names.
    fn ordered<T: Clone>(&self, map: &HashMap<String, T>, key: &str) -> CorpseResult<Vec<T>> {
        self.pool_names
            .iter()
            .map(|name| {
                map.get(name).cloned().ok_or_else(|| CorpseError::ParameterSchema {
                    variant: self.name(),
                    missing: vec![format!("{}.{}", key, name)],
                    unexpected: vec![],
                })
            })
            .collect()
    }
}

/// Check a candidate parameter table against a model variant's schema.
///
/// Free-function form of [`ModelVariant::validate_parameters`].
pub fn validate_parameters(variant: &ModelVariant, table: &Table) -> CorpseResult<()> {
    variant.validate_parameters(table)
}

fn deserialize_table<T: serde::de::DeserializeOwned>(table: &Table) -> CorpseResult<T> {
    Value::Table(table.clone())
        .try_into()
        .map_err(|e: toml::de::Error| CorpseError::ParameterShape {
            name: "parameters".to_string(),
            reason: e.to_string(),
        })
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct FlatParams {
    vmaxref: ByClass<f64>,
    #[serde(rename = "Ea")]
    ea: ByClass<f64>,
    #[serde(rename = "kC")]
    kc: ByClass<f64>,
    gas_diffusion_exp: f64,
    substrate_diffusion_exp: f64,
    #[serde(rename = "minMicrobeC")]
    min_microbe_c: f64,
    #[serde(rename = "Tmic")]
    tmic: f64,
    et: f64,
    eup: ByClass<f64>,
    #[serde(rename = "tProtected")]
    t_protected: f64,
    protection_rate: ByClass<f64>,
    new_resp_units: bool,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct PerPoolParams {
    vmaxref: HashMap<String, ByClass<f64>>,
    #[serde(rename = "Ea")]
    ea: ByClass<f64>,
    #[serde(rename = "kC")]
    kc: HashMap<String, ByClass<f64>>,
    gas_diffusion_exp: f64,
    substrate_diffusion_exp: f64,
    #[serde(rename = "minMicrobeC")]
    min_microbe_c: HashMap<String, f64>,
    #[serde(rename = "Tmic")]
    tmic: HashMap<String, f64>,
    et: HashMap<String, f64>,
    eup: HashMap<String, ByClass<f64>>,
    #[serde(rename = "tProtected")]
    t_protected: f64,
    protection_rate: ByClass<f64>,
    new_resp_units: bool,
}

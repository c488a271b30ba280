//! Microbially-explicit soil organic carbon decomposition (CORPSE).
//!
//! This crate simulates decomposition of soil organic carbon by one or
//! more microbial functional pools under time-varying temperature and
//! moisture, in the CORPSE model family (Carbon, Organisms, Rhizosphere
//! and Protection in the Soil Environment; Sulman et al. 2014), including
//! the pyrogenic-carbon pools used for fire-severity incubation
//! experiments.
//!
//! # Module organisation
//!
//! - `pools`: chemical classes and the carbon pool state container
//! - `parameters`: kinetic parameters and soil-texture scaling
//! - `schema`: model variants and parameter-file validation
//! - `kinetics`: the rate laws (Arrhenius, moisture response,
//!   Michaelis-Menten decomposition, microbial turnover, protected-carbon
//!   exchange)
//! - `environment`: temperature and moisture driver interpolation
//! - `simulate`: explicit and adaptive time integration
//! - `trajectory`: the simulation output container
//!
//! # Example
//!
//! ```
//! use corpse::{
//!     run_simulation, IntegrationStrategy, MoistureBounds, Parameters, SoilCarbon,
//!     TemperatureBounds,
//! };
//! use ndarray::Array1;
//!
//! let params = Parameters::default();
//! let mut initial = SoilCarbon::zero(1);
//! initial.unprotected.fast = 3.0;
//! initial.unprotected.slow = 88.0;
//! initial.unprotected.necro = 3.0;
//! initial.unprotected.py = 4.0;
//! initial.biomass[0] = 4.5;
//!
//! // A 70 day incubation with daily output.
//! let times = Array1::from_iter((0..=70).map(|d| d as f64 / 365.0));
//! let trajectory = run_simulation(
//!     IntegrationStrategy::Adaptive,
//!     &TemperatureBounds::new(291.15, 297.15),
//!     &MoistureBounds::new(0.5, 0.7),
//!     &times,
//!     &SoilCarbon::zero(1),
//!     1.0,
//!     &initial,
//!     &params,
//! )
//! .unwrap();
//! assert!(trajectory.last().co2 > 0.0);
//! ```

pub mod constants;
pub mod environment;
pub mod errors;
pub mod kinetics;
pub mod parameters;
pub mod pools;
pub mod schema;
pub mod simulate;
pub mod trajectory;

pub use environment::{Driver, MoistureBounds, TemperatureBounds};
pub use errors::{CorpseError, CorpseResult, ErrorKind, NumericalWarning};
pub use kinetics::compute_derivative;
pub use parameters::{clay_modifier, Parameters};
pub use pools::{ByClass, ChemClass, SoilCarbon};
pub use schema::{validate_parameters, ModelVariant, ParameterLayout};
pub use simulate::{run_simulation, run_simulation_with_options, IntegrationStrategy, SolverOptions};
pub use trajectory::Trajectory;

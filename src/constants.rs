//! Physical constants shared by the rate laws.

/// Reference temperature for the Arrhenius normalisation
/// unit: K
pub const TREF: f64 = 293.15;

/// Universal gas constant
/// unit: J / mol / K
pub const RUGAS: f64 = 8.314472;

/// Offset between the Celsius and Kelvin scales.
///
/// Laboratory incubation settings are usually reported in Celsius; driver
/// bounds in this crate are absolute.
/// unit: K
pub const KELVIN_OFFSET: f64 = 273.15;

/// Length of the model year used to convert simulation time (years) into
/// days for the diurnal temperature cycle.
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Clay content at which the texture modifier equals one.
///
/// Protection rates in parameter sets are calibrated at this clay
/// percentage; [`clay_modifier`](crate::parameters::clay_modifier) scales
/// them for other textures.
/// unit: percent
pub const REFERENCE_CLAY_PERCENT: f64 = 20.0;

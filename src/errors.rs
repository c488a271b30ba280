use std::fmt;
use thiserror::Error;

/// Broad classification of failures, matching the propagation policy:
/// configuration and state errors are fatal and raised before or during a
/// run, solver errors come from the adaptive integrator itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    State,
    Solver,
}

/// Error type for invalid operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CorpseError {
    /// The provided parameter key set does not exactly match the schema for
    /// the chosen model variant. Every offending key is reported, not just
    /// the first.
    #[error(
        "parameter set does not match the {variant} schema; missing keys: {missing:?}, unexpected keys: {unexpected:?}"
    )]
    ParameterSchema {
        variant: String,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    /// A typed parameter has the wrong shape for the number of microbial
    /// pools in use.
    #[error("parameter {name} has wrong shape: {reason}")]
    ParameterShape { name: String, reason: String },

    /// An environmental driver is inconsistent (min above max, or a
    /// per-step series shorter than the requested time grid).
    #[error("invalid {driver} driver: {reason}")]
    InvalidDriver { driver: String, reason: String },

    /// Requested output times must increase strictly.
    #[error("requested output times are not strictly increasing at index {index}")]
    InvalidTimeGrid { index: usize },

    /// The pool state is missing an entry the chosen variant requires.
    #[error("state is missing pool {0}")]
    MissingPool(String),

    /// A pool mass is negative where the rate engine assumes
    /// non-negativity.
    #[error("pool {pool} has negative mass {value}")]
    NegativeMass { pool: String, value: f64 },

    /// The adaptive integrator failed to advance.
    #[error("ODE solver failed: {0}")]
    Solver(String),
}

impl CorpseError {
    /// Which of the fatal error families this value belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CorpseError::ParameterSchema { .. }
            | CorpseError::ParameterShape { .. }
            | CorpseError::InvalidDriver { .. }
            | CorpseError::InvalidTimeGrid { .. } => ErrorKind::Configuration,
            CorpseError::MissingPool(_) | CorpseError::NegativeMass { .. } => ErrorKind::State,
            CorpseError::Solver(_) => ErrorKind::Solver,
        }
    }
}

/// Convenience type for `Result<T, CorpseError>`.
pub type CorpseResult<T> = Result<T, CorpseError>;

/// Non-fatal report of a pool mass driven negative by an explicit step.
///
/// The explicit iterator does not correct these; they are logged and
/// collected on the [`Trajectory`](crate::trajectory::Trajectory) so that
/// callers can decide whether the chosen step size was adequate.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericalWarning {
    /// Simulation time at which the mass went negative
    /// unit: yr
    pub time: f64,
    /// Pool key, e.g. `uFastC` or `MBC_1`
    pub pool: String,
    /// The offending mass
    pub value: f64,
}

impl fmt::Display for NumericalWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pool {} went negative ({:.6e}) at t = {:.6} yr; explicit step too large",
            self.pool, self.value, self.time
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_reports_every_key() {
        let err = CorpseError::ParameterSchema {
            variant: "single".to_string(),
            missing: vec!["Tmic".to_string(), "et".to_string()],
            unexpected: vec!["spurious".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("Tmic"));
        assert!(msg.contains("et"));
        assert!(msg.contains("spurious"));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn error_kinds_partition() {
        assert_eq!(
            CorpseError::MissingPool("uFastC".to_string()).kind(),
            ErrorKind::State
        );
        assert_eq!(
            CorpseError::NegativeMass {
                pool: "MBC_1".to_string(),
                value: -0.1,
            }
            .kind(),
            ErrorKind::State
        );
        assert_eq!(
            CorpseError::Solver("step size underflow".to_string()).kind(),
            ErrorKind::Solver
        );
        assert_eq!(
            CorpseError::InvalidTimeGrid { index: 3 }.kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn warning_display_names_the_pool() {
        let warning = NumericalWarning {
            time: 0.05,
            pool: "uNecroC".to_string(),
            value: -1.2e-4,
        };
        let msg = warning.to_string();
        assert!(msg.contains("uNecroC"));
        assert!(msg.contains("explicit step"));
    }
}

//! Unified error types for the gkpi workspace
//!
//! [`KpiError`] is the boundary error of the core crate. Orchestration code in
//! the other crates works with `anyhow::Result` and converts at the edges.
//!
//! # Example
//!
//! ```ignore
//! use gkpi_core::{KpiError, KpiResult};
//!
//! fn busbars(meta: &EpisodeMetadata) -> KpiResult<usize> {
//!     if meta.n_busbar_per_sub == 0 {
//!         return Err(KpiError::Validation("n_busbar_per_sub must be >= 1".into()));
//!     }
//!     Ok(meta.n_busbar_per_sub)
//! }
//! ```

use thiserror::Error;

/// Unified error type for all gkpi operations.
///
/// Only conditions the core cannot repair locally end up here. Solver
/// divergence is not an error: it is reported through
/// [`ComputationStatus`](crate::engine::ComputationStatus).
#[derive(Error, Debug)]
pub enum KpiError {
    /// I/O errors (file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors (action payloads, metadata, grid file)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Power-flow engine failures that abort a computation
    #[error("Solver error: {0}")]
    Solver(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network model errors (unknown bus, unknown element)
    #[error("Network error: {0}")]
    Network(String),

    /// A table or column required by a KPI is absent
    #[error("Missing data: {0}")]
    MissingData(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using KpiError.
pub type KpiResult<T> = Result<T, KpiError>;

impl From<anyhow::Error> for KpiError {
    fn from(err: anyhow::Error) -> Self {
        KpiError::Other(err.to_string())
    }
}

impl From<String> for KpiError {
    fn from(s: String) -> Self {
        KpiError::Other(s)
    }
}

impl From<&str> for KpiError {
    fn from(s: &str) -> Self {
        KpiError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for KpiError {
    fn from(err: serde_json::Error) -> Self {
        KpiError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for KpiError {
    fn from(err: toml::de::Error) -> Self {
        KpiError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KpiError::MissingData("table 'gen_p'".into());
        assert!(err.to_string().contains("Missing data"));
        assert!(err.to_string().contains("gen_p"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: KpiError = io_err.into();
        assert!(matches!(err, KpiError::Io(_)));
    }

    #[test]
    fn test_json_error_is_parse() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: KpiError = json_err.into();
        assert!(matches!(err, KpiError::Parse(_)));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> KpiResult<()> {
            Err(KpiError::Validation("test".into()))
        }

        fn outer() -> KpiResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}

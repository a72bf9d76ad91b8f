//! Error types for rust_scperturb

use thiserror::Error;

/// Main error type for perturbation operations
///
/// The first four variants are request-validation failures. They are always
/// raised before the target matrix is touched.
#[derive(Error, Debug)]
pub enum PerturbError {
    #[error("Length mismatch: {n_targets} target gene(s) but {n_factors} factor(s)")]
    LengthMismatch { n_targets: usize, n_factors: usize },

    #[error("Target gene(s) not found in matrix: {missing:?} (valid genes include: {sample:?})")]
    UnknownTarget {
        missing: Vec<String>,
        sample: Vec<String>,
    },

    #[error("Invalid factor(s) for gene(s) {genes:?}: factors must be non-negative finite numbers, got {factors:?}")]
    NegativeFactor { genes: Vec<String>, factors: Vec<f64> },

    #[error("Duplicate target gene(s) in request: {duplicates:?}")]
    DuplicateTarget { duplicates: Vec<String> },

    #[error("Invalid expression matrix: {reason}")]
    InvalidExpressionMatrix { reason: String },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl PerturbError {
    /// Whether this error came from validating a perturbation request
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PerturbError::LengthMismatch { .. }
                | PerturbError::UnknownTarget { .. }
                | PerturbError::NegativeFactor { .. }
                | PerturbError::DuplicateTarget { .. }
        )
    }
}

/// Result type alias for perturbation operations
pub type Result<T> = std::result::Result<T, PerturbError>;

//! rust_scperturb: in-silico gene perturbation of single-cell RNA-seq counts
//!
//! Rescales the counts of selected genes in a cells x genes expression matrix,
//! simulating knock-down (factor < 1), knock-out (factor 0) or up-regulation
//! (factor > 1). Scaled counts are rounded to integers with round-half-to-even
//! unless another [`RoundingMode`](perturb::RoundingMode) is requested.
//! Requests are fully validated before the matrix is touched.
//!
//! # Example
//!
//! ```
//! use ndarray::array;
//! use rust_scperturb::prelude::*;
//!
//! let mut counts = ExpressionMatrix::new(
//!     array![[1.0, 0.0], [13.0, 26.0]],
//!     vec!["cell_1".to_string(), "cell_2".to_string()],
//!     vec!["G1".to_string(), "G2".to_string()],
//! )?;
//!
//! perturb_genes(&mut counts, ["G1", "G2"], [2.0, 0.5], PerturbMode::InPlace)?;
//! assert_eq!(counts.get(1, 0), Some(26.0));
//! assert_eq!(counts.get(1, 1), Some(13.0));
//! # Ok::<(), rust_scperturb::error::PerturbError>(())
//! ```

pub mod cli;
pub mod data;
pub mod error;
pub mod io;
pub mod perturb;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::data::{ExpressionMatrix, MatrixStorage, StorageKind};
    pub use crate::error::{PerturbError, Result};
    pub use crate::io::{read_expression_matrix, read_request, write_expression_matrix, write_summary};
    pub use crate::perturb::{
        perturb_genes, perturb_in_place, perturb_in_place_with, perturb_to_copy,
        perturb_to_copy_with, summarize_perturbation, Factors, GeneEffect, GenePerturbation,
        PerturbMode, PerturbOptions, PerturbationRequest, PerturbationSummary, RoundingMode,
        Targets,
    };
}

use prelude::*;

/// Perturb a copy of `counts` and summarize the effect on each targeted gene
pub fn perturb_and_summarize(
    counts: &ExpressionMatrix,
    request: &PerturbationRequest,
    options: &PerturbOptions,
) -> Result<(ExpressionMatrix, PerturbationSummary)> {
    let perturbed = perturb_to_copy_with(counts, request, options)?;
    let summary = summarize_perturbation(counts, &perturbed, request)?;
    Ok((perturbed, summary))
}

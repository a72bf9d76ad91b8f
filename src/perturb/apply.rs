//! Gene-wise rescaling of expression counts
//!
//! Every operation here validates its request completely before it touches
//! the matrix, so a failed call leaves the input exactly as it was.

use ndarray::Array2;
use sprs::{CsMat, TriMat};

use super::request::{Factors, PerturbationRequest, ResolvedPerturbation, Targets};
use crate::data::{ExpressionMatrix, MatrixStorage};
use crate::error::Result;

/// How scaled counts are rounded back to integers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RoundingMode {
    /// Ties go to the even neighbour (2.5 -> 2, 6.5 -> 6), as numpy's `round` does
    #[default]
    HalfEven,
    /// Ties go away from zero (2.5 -> 3, 6.5 -> 7)
    HalfAwayFromZero,
}

impl RoundingMode {
    pub fn round(self, value: f64) -> f64 {
        match self {
            RoundingMode::HalfEven => value.round_ties_even(),
            RoundingMode::HalfAwayFromZero => value.round(),
        }
    }
}

/// Options for applying a perturbation
#[derive(Debug, Clone, Copy, Default)]
pub struct PerturbOptions {
    pub rounding: RoundingMode,
}

/// Whether a perturbation mutates its input or works on a copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerturbMode {
    InPlace,
    Copy,
}

/// Scale the requested genes of `matrix` in place
pub fn perturb_in_place(matrix: &mut ExpressionMatrix, request: &PerturbationRequest) -> Result<()> {
    perturb_in_place_with(matrix, request, &PerturbOptions::default())
}

/// Scale the requested genes of `matrix` in place with explicit options
pub fn perturb_in_place_with(
    matrix: &mut ExpressionMatrix,
    request: &PerturbationRequest,
    options: &PerturbOptions,
) -> Result<()> {
    let resolved = request.resolve(matrix)?;
    apply_resolved(matrix, &resolved, options.rounding);
    Ok(())
}

/// Return a perturbed copy of `matrix`, leaving it untouched
pub fn perturb_to_copy(
    matrix: &ExpressionMatrix,
    request: &PerturbationRequest,
) -> Result<ExpressionMatrix> {
    perturb_to_copy_with(matrix, request, &PerturbOptions::default())
}

/// Return a perturbed copy of `matrix` with explicit options
pub fn perturb_to_copy_with(
    matrix: &ExpressionMatrix,
    request: &PerturbationRequest,
    options: &PerturbOptions,
) -> Result<ExpressionMatrix> {
    // Validate before paying for the clone
    let resolved = request.resolve(matrix)?;
    let mut copy = matrix.clone();
    apply_resolved(&mut copy, &resolved, options.rounding);
    Ok(copy)
}

/// Write already validated perturbations into `matrix`
fn apply_resolved(
    matrix: &mut ExpressionMatrix,
    resolved: &[ResolvedPerturbation],
    rounding: RoundingMode,
) {
    log::info!(
        "Perturbing {} gene(s) across {} cells",
        resolved.len(),
        matrix.n_cells()
    );
    for target in resolved {
        log::debug!(
            "  {} (column {}) x {}",
            matrix.gene_ids()[target.column],
            target.column,
            target.factor
        );
    }

    match matrix.storage_mut() {
        MatrixStorage::Dense(counts) => scale_dense(counts, resolved, rounding),
        MatrixStorage::Sparse(counts) => {
            let scaled = scale_sparse(counts, resolved, rounding);
            *counts = scaled;
        }
    }
}

/// Scale `targets` by the positionally aligned `factors`
///
/// In [`PerturbMode::InPlace`] the matrix is mutated and `None` is returned.
/// In [`PerturbMode::Copy`] the matrix is left unchanged and the perturbed
/// copy is returned.
///
/// Both modes take `&mut` so one call site can switch between them. Callers
/// that only ever want a copy and hold a shared reference should use
/// [`perturb_to_copy`] instead.
pub fn perturb_genes(
    matrix: &mut ExpressionMatrix,
    targets: impl Into<Targets>,
    factors: impl Into<Factors>,
    mode: PerturbMode,
) -> Result<Option<ExpressionMatrix>> {
    let request = PerturbationRequest::new(targets, factors)?;
    match mode {
        PerturbMode::InPlace => {
            perturb_in_place(matrix, &request)?;
            Ok(None)
        }
        PerturbMode::Copy => perturb_to_copy(matrix, &request).map(Some),
    }
}

fn scale_dense(counts: &mut Array2<f64>, targets: &[ResolvedPerturbation], rounding: RoundingMode) {
    for target in targets {
        let factor = target.factor;
        counts
            .column_mut(target.column)
            .mapv_inplace(|x| rounding.round(x * factor));
    }
}

/// Rebuild a sparse matrix with the target columns scaled
///
/// The result keeps the input's CSR/CSC layout. Entries of a target column
/// that round to zero are dropped; other columns keep their stored entries,
/// explicit zeros included.
fn scale_sparse(
    counts: &CsMat<f64>,
    targets: &[ResolvedPerturbation],
    rounding: RoundingMode,
) -> CsMat<f64> {
    let mut factors: Vec<Option<f64>> = vec![None; counts.cols()];
    for target in targets {
        factors[target.column] = Some(target.factor);
    }

    let mut triplets = TriMat::with_capacity(counts.shape(), counts.nnz());
    for (&value, (row, col)) in counts.iter() {
        match factors[col] {
            Some(factor) => {
                let scaled = rounding.round(value * factor);
                if scaled != 0.0 {
                    triplets.add_triplet(row, col, scaled);
                }
            }
            None => triplets.add_triplet(row, col, value),
        }
    }

    if counts.is_csr() {
        triplets.to_csr()
    } else {
        triplets.to_csc()
    }
}

//! Before/after comparison of a perturbation

use serde::{Deserialize, Serialize};

use super::request::PerturbationRequest;
use crate::data::ExpressionMatrix;
use crate::error::{PerturbError, Result};

/// Effect of a perturbation on a single gene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneEffect {
    pub gene: String,
    pub factor: f64,
    /// Total counts across all cells before perturbation
    pub total_before: f64,
    /// Total counts across all cells after perturbation
    pub total_after: f64,
    /// Cells with a nonzero count before perturbation
    pub nonzero_before: usize,
    /// Cells with a nonzero count after perturbation
    pub nonzero_after: usize,
}

impl GeneEffect {
    /// Realized fold change of the total count (NaN when the gene was absent)
    pub fn realized_fold_change(&self) -> f64 {
        if self.total_before > 0.0 {
            self.total_after / self.total_before
        } else {
            f64::NAN
        }
    }
}

/// Per-gene effects of one perturbation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerturbationSummary {
    pub n_cells: usize,
    pub n_genes: usize,
    pub effects: Vec<GeneEffect>,
}

/// Compare a matrix with its perturbed counterpart
///
/// Both matrices must share shape and gene labels. `request` must already be
/// valid for `before`.
pub fn summarize_perturbation(
    before: &ExpressionMatrix,
    after: &ExpressionMatrix,
    request: &PerturbationRequest,
) -> Result<PerturbationSummary> {
    if before.shape() != after.shape() {
        return Err(PerturbError::DimensionMismatch {
            expected: format!("{:?} matrix", before.shape()),
            got: format!("{:?} matrix", after.shape()),
        });
    }
    if before.gene_ids() != after.gene_ids() {
        return Err(PerturbError::DimensionMismatch {
            expected: "identical gene IDs".to_string(),
            got: "different gene IDs".to_string(),
        });
    }

    let resolved = request.resolve(before)?;

    let totals_before = before.gene_totals();
    let totals_after = after.gene_totals();
    let nonzero_before = before.gene_nonzero_cells();
    let nonzero_after = after.gene_nonzero_cells();

    let effects = request
        .perturbations()
        .iter()
        .zip(&resolved)
        .map(|(perturbation, target)| GeneEffect {
            gene: perturbation.gene.clone(),
            factor: target.factor,
            total_before: totals_before[target.column],
            total_after: totals_after[target.column],
            nonzero_before: nonzero_before[target.column],
            nonzero_after: nonzero_after[target.column],
        })
        .collect();

    Ok(PerturbationSummary {
        n_cells: before.n_cells(),
        n_genes: before.n_genes(),
        effects,
    })
}

impl std::fmt::Display for PerturbationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Perturbation Summary")?;
        writeln!(f, "====================")?;
        writeln!(f, "Cells: {}", self.n_cells)?;
        writeln!(f, "Genes: {}", self.n_genes)?;
        writeln!(f, "Perturbed genes: {}", self.effects.len())?;
        for effect in &self.effects {
            writeln!(
                f,
                "  {} x{}: total {:.0} -> {:.0}, nonzero cells {} -> {}",
                effect.gene,
                effect.factor,
                effect.total_before,
                effect.total_after,
                effect.nonzero_before,
                effect.nonzero_after
            )?;
        }
        Ok(())
    }
}

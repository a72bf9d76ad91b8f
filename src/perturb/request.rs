//! Perturbation requests: which genes to scale and by how much

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::data::ExpressionMatrix;
use crate::error::{PerturbError, Result};

/// Number of valid gene IDs echoed back when a target is not found
const GENE_SAMPLE_SIZE: usize = 5;

/// One gene identifier or an ordered list of them
#[derive(Debug, Clone, PartialEq)]
pub enum Targets {
    Single(String),
    Many(Vec<String>),
}

impl Targets {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Targets::Single(gene) => vec![gene],
            Targets::Many(genes) => genes,
        }
    }
}

impl From<&str> for Targets {
    fn from(gene: &str) -> Self {
        Targets::Single(gene.to_string())
    }
}

impl From<String> for Targets {
    fn from(gene: String) -> Self {
        Targets::Single(gene)
    }
}

impl From<Vec<String>> for Targets {
    fn from(genes: Vec<String>) -> Self {
        Targets::Many(genes)
    }
}

impl From<Vec<&str>> for Targets {
    fn from(genes: Vec<&str>) -> Self {
        Targets::Many(genes.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for Targets {
    fn from(genes: &[&str]) -> Self {
        Targets::Many(genes.iter().map(|g| g.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Targets {
    fn from(genes: [&str; N]) -> Self {
        Targets::Many(genes.iter().map(|g| g.to_string()).collect())
    }
}

/// One scaling factor or an ordered list of them
#[derive(Debug, Clone, PartialEq)]
pub enum Factors {
    Single(f64),
    Many(Vec<f64>),
}

impl Factors {
    pub fn into_vec(self) -> Vec<f64> {
        match self {
            Factors::Single(factor) => vec![factor],
            Factors::Many(factors) => factors,
        }
    }
}

impl From<f64> for Factors {
    fn from(factor: f64) -> Self {
        Factors::Single(factor)
    }
}

impl From<Vec<f64>> for Factors {
    fn from(factors: Vec<f64>) -> Self {
        Factors::Many(factors)
    }
}

impl From<&[f64]> for Factors {
    fn from(factors: &[f64]) -> Self {
        Factors::Many(factors.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for Factors {
    fn from(factors: [f64; N]) -> Self {
        Factors::Many(factors.to_vec())
    }
}

/// A single gene scaled by a factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenePerturbation {
    pub gene: String,
    pub factor: f64,
}

/// An ordered list of gene perturbations
///
/// Construction only normalizes scalar inputs and checks that targets and
/// factors line up. Everything that depends on a matrix is checked by
/// [`PerturbationRequest::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerturbationRequest {
    perturbations: Vec<GenePerturbation>,
}

impl PerturbationRequest {
    /// Pair targets with factors positionally
    pub fn new(targets: impl Into<Targets>, factors: impl Into<Factors>) -> Result<Self> {
        let targets = targets.into().into_vec();
        let factors = factors.into().into_vec();

        if targets.len() != factors.len() {
            return Err(PerturbError::LengthMismatch {
                n_targets: targets.len(),
                n_factors: factors.len(),
            });
        }

        let perturbations = targets
            .into_iter()
            .zip(factors)
            .map(|(gene, factor)| GenePerturbation { gene, factor })
            .collect();

        Ok(Self { perturbations })
    }

    /// Set every listed gene to zero
    pub fn knock_down(genes: impl Into<Targets>) -> Self {
        let perturbations = genes
            .into()
            .into_vec()
            .into_iter()
            .map(|gene| GenePerturbation { gene, factor: 0.0 })
            .collect();
        Self { perturbations }
    }

    /// Build a request from `GENE=FACTOR` specifications
    pub fn parse_specs<S: AsRef<str>>(specs: &[S]) -> Result<Self> {
        let mut perturbations = Vec::with_capacity(specs.len());
        for spec in specs {
            let spec = spec.as_ref();
            let (gene, factor) = spec.rsplit_once('=').ok_or_else(|| PerturbError::InvalidInput {
                reason: format!("Invalid perturbation '{}'. Use: GENE=FACTOR", spec),
            })?;
            let gene = gene.trim();
            if gene.is_empty() {
                return Err(PerturbError::InvalidInput {
                    reason: format!("Missing gene name in perturbation '{}'", spec),
                });
            }
            let factor = factor.trim().parse::<f64>().map_err(|_| PerturbError::InvalidInput {
                reason: format!("Invalid factor '{}' in perturbation '{}'", factor.trim(), spec),
            })?;
            perturbations.push(GenePerturbation {
                gene: gene.to_string(),
                factor,
            });
        }
        Ok(Self { perturbations })
    }

    /// Append a gene perturbation
    pub fn push(&mut self, gene: impl Into<String>, factor: f64) {
        self.perturbations.push(GenePerturbation {
            gene: gene.into(),
            factor,
        });
    }

    pub fn perturbations(&self) -> &[GenePerturbation] {
        &self.perturbations
    }

    pub fn len(&self) -> usize {
        self.perturbations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.perturbations.is_empty()
    }

    pub fn genes(&self) -> impl Iterator<Item = &str> {
        self.perturbations.iter().map(|p| p.gene.as_str())
    }

    /// Validate against a matrix and map each gene to its column index
    ///
    /// Checks run in a fixed order: unknown targets, then invalid factors
    /// (negative, non-finite, or overflowing the gene's largest count), then
    /// duplicate targets. Nothing is mutated.
    pub fn resolve(&self, matrix: &ExpressionMatrix) -> Result<Vec<ResolvedPerturbation>> {
        let missing: Vec<String> = self
            .genes()
            .filter(|gene| !matrix.has_gene(gene))
            .map(String::from)
            .collect();
        if !missing.is_empty() {
            return Err(PerturbError::UnknownTarget {
                missing,
                sample: matrix
                    .gene_ids()
                    .iter()
                    .take(GENE_SAMPLE_SIZE)
                    .cloned()
                    .collect(),
            });
        }

        // NaN, infinity and factors that would overflow a count are
        // rejected alongside negative values
        let (genes, factors): (Vec<String>, Vec<f64>) = self
            .perturbations
            .iter()
            .filter(|p| !factor_fits(matrix, p))
            .map(|p| (p.gene.clone(), p.factor))
            .unzip();
        if !genes.is_empty() {
            return Err(PerturbError::NegativeFactor { genes, factors });
        }

        let mut seen = HashSet::with_capacity(self.len());
        let mut duplicates: Vec<String> = Vec::new();
        for gene in self.genes() {
            if !seen.insert(gene) && !duplicates.iter().any(|d| d == gene) {
                duplicates.push(gene.to_string());
            }
        }
        if !duplicates.is_empty() {
            return Err(PerturbError::DuplicateTarget { duplicates });
        }

        Ok(self
            .perturbations
            .iter()
            .filter_map(|p| {
                matrix.gene_index(&p.gene).map(|column| ResolvedPerturbation {
                    column,
                    factor: p.factor,
                })
            })
            .collect())
    }
}

/// A factor is usable when it is non-negative, finite, and keeps every
/// scaled count of its gene finite
fn factor_fits(matrix: &ExpressionMatrix, perturbation: &GenePerturbation) -> bool {
    let factor = perturbation.factor;
    if !(factor >= 0.0 && factor.is_finite()) {
        return false;
    }
    matrix
        .gene_index(&perturbation.gene)
        .map_or(true, |column| (matrix.gene_max(column) * factor).is_finite())
}

/// A validated perturbation bound to a matrix column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPerturbation {
    pub column: usize,
    pub factor: f64,
}

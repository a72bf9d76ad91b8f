//! Annotated expression matrix for single-cell RNA-seq counts

use std::collections::{HashMap, HashSet};
use std::fmt;

use ndarray::{Array1, Array2, Axis};
use sprs::{CsMat, TriMat};

use crate::error::{PerturbError, Result};

/// Deduplicate names by appending _1, _2, etc. to duplicates
fn deduplicate_names(names: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(names.len());
    if names.iter().all(|name| seen.insert(name.clone())) {
        return names;
    }

    let mut taken: HashSet<String> = names.iter().cloned().collect();
    let mut first_seen: HashSet<String> = HashSet::with_capacity(names.len());
    let mut result = Vec::with_capacity(names.len());
    for name in names {
        if first_seen.insert(name.clone()) {
            result.push(name);
            continue;
        }
        let mut suffix = 1;
        let mut new_name = format!("{}_{}", name, suffix);
        while taken.contains(&new_name) {
            suffix += 1;
            new_name = format!("{}_{}", name, suffix);
        }
        log::warn!("Duplicate gene name '{}' renamed to '{}'", name, new_name);
        taken.insert(new_name.clone());
        result.push(new_name);
    }
    result
}

/// Backing storage of an expression matrix (cells x genes)
#[derive(Debug, Clone)]
pub enum MatrixStorage {
    /// Dense row-major counts
    Dense(Array2<f64>),
    /// Compressed sparse counts, either CSR or CSC
    Sparse(CsMat<f64>),
}

impl MatrixStorage {
    /// (n_rows, n_cols)
    pub fn shape(&self) -> (usize, usize) {
        match self {
            MatrixStorage::Dense(counts) => counts.dim(),
            MatrixStorage::Sparse(counts) => counts.shape(),
        }
    }

    pub fn kind(&self) -> StorageKind {
        match self {
            MatrixStorage::Dense(_) => StorageKind::Dense,
            MatrixStorage::Sparse(counts) if counts.is_csr() => StorageKind::Csr,
            MatrixStorage::Sparse(_) => StorageKind::Csc,
        }
    }
}

/// Storage layout of a matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Dense,
    Csr,
    Csc,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::Dense => write!(f, "dense"),
            StorageKind::Csr => write!(f, "sparse (CSR)"),
            StorageKind::Csc => write!(f, "sparse (CSC)"),
        }
    }
}

/// A cells x genes matrix of raw counts with labelled rows and columns
///
/// Rows are cells, columns are genes, following the AnnData `X` layout.
/// Gene identifiers are unique; duplicates are renamed on construction.
#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    /// Count data (cells x genes)
    data: MatrixStorage,
    /// Cell identifiers (row labels)
    cell_ids: Vec<String>,
    /// Gene identifiers (column labels)
    gene_ids: Vec<String>,
    /// Gene identifier -> column index
    gene_index: HashMap<String, usize>,
}

impl ExpressionMatrix {
    /// Create a matrix backed by dense storage
    pub fn new(counts: Array2<f64>, cell_ids: Vec<String>, gene_ids: Vec<String>) -> Result<Self> {
        check_counts(counts.iter())?;
        Self::from_storage(MatrixStorage::Dense(counts), cell_ids, gene_ids)
    }

    /// Create a matrix backed by sparse (CSR or CSC) storage
    pub fn from_sparse(
        counts: CsMat<f64>,
        cell_ids: Vec<String>,
        gene_ids: Vec<String>,
    ) -> Result<Self> {
        check_counts(counts.data().iter())?;
        Self::from_storage(MatrixStorage::Sparse(counts), cell_ids, gene_ids)
    }

    /// Create from integer counts
    pub fn from_integers(
        counts: Array2<u32>,
        cell_ids: Vec<String>,
        gene_ids: Vec<String>,
    ) -> Result<Self> {
        Self::new(counts.mapv(f64::from), cell_ids, gene_ids)
    }

    fn from_storage(
        data: MatrixStorage,
        cell_ids: Vec<String>,
        gene_ids: Vec<String>,
    ) -> Result<Self> {
        let (n_cells, n_genes) = data.shape();

        if cell_ids.len() != n_cells {
            return Err(PerturbError::DimensionMismatch {
                expected: format!("{} cell IDs", n_cells),
                got: format!("{} cell IDs", cell_ids.len()),
            });
        }

        if gene_ids.len() != n_genes {
            return Err(PerturbError::DimensionMismatch {
                expected: format!("{} gene IDs", n_genes),
                got: format!("{} gene IDs", gene_ids.len()),
            });
        }

        {
            let mut seen = HashSet::new();
            for id in &cell_ids {
                if !seen.insert(id) {
                    log::warn!("Duplicate cell ID detected: '{}'. Cell IDs should be unique.", id);
                }
            }
        }

        let gene_ids = deduplicate_names(gene_ids);
        let gene_index = gene_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        Ok(Self {
            data,
            cell_ids,
            gene_ids,
            gene_index,
        })
    }

    /// Get the number of cells
    pub fn n_cells(&self) -> usize {
        self.data.shape().0
    }

    /// Get the number of genes
    pub fn n_genes(&self) -> usize {
        self.data.shape().1
    }

    /// (n_cells, n_genes)
    pub fn shape(&self) -> (usize, usize) {
        self.data.shape()
    }

    /// Get cell IDs
    pub fn cell_ids(&self) -> &[String] {
        &self.cell_ids
    }

    /// Get gene IDs
    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    /// Get gene index by ID
    pub fn gene_index(&self, gene_id: &str) -> Option<usize> {
        self.gene_index.get(gene_id).copied()
    }

    /// Check whether a gene ID is present
    pub fn has_gene(&self, gene_id: &str) -> bool {
        self.gene_index.contains_key(gene_id)
    }

    /// Get the underlying storage
    pub fn storage(&self) -> &MatrixStorage {
        &self.data
    }

    pub(crate) fn storage_mut(&mut self) -> &mut MatrixStorage {
        &mut self.data
    }

    pub fn storage_kind(&self) -> StorageKind {
        self.data.kind()
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self.data, MatrixStorage::Sparse(_))
    }

    /// Get a single count. Unstored sparse entries read as zero.
    pub fn get(&self, cell_idx: usize, gene_idx: usize) -> Option<f64> {
        let (n_cells, n_genes) = self.shape();
        if cell_idx >= n_cells || gene_idx >= n_genes {
            return None;
        }
        match &self.data {
            MatrixStorage::Dense(counts) => Some(counts[[cell_idx, gene_idx]]),
            MatrixStorage::Sparse(counts) => {
                Some(counts.get(cell_idx, gene_idx).copied().unwrap_or(0.0))
            }
        }
    }

    /// Get counts for a specific gene across all cells
    pub fn gene_counts(&self, gene_idx: usize) -> Array1<f64> {
        match &self.data {
            MatrixStorage::Dense(counts) => counts.column(gene_idx).to_owned(),
            MatrixStorage::Sparse(counts) => {
                let mut column = Array1::zeros(counts.rows());
                for (&value, (row, col)) in counts.iter() {
                    if col == gene_idx {
                        column[row] = value;
                    }
                }
                column
            }
        }
    }

    /// Largest count of a gene across all cells
    pub fn gene_max(&self, gene_idx: usize) -> f64 {
        match &self.data {
            MatrixStorage::Dense(counts) => counts
                .column(gene_idx)
                .iter()
                .fold(0.0, |acc: f64, &x| acc.max(x)),
            MatrixStorage::Sparse(counts) => counts
                .iter()
                .filter(|&(_, (_, col))| col == gene_idx)
                .fold(0.0, |acc: f64, (&x, _)| acc.max(x)),
        }
    }

    /// Total counts per gene
    pub fn gene_totals(&self) -> Vec<f64> {
        match &self.data {
            MatrixStorage::Dense(counts) => counts
                .axis_iter(Axis(1))
                .map(|col| col.sum())
                .collect(),
            MatrixStorage::Sparse(counts) => {
                let mut totals = vec![0.0; counts.cols()];
                for (&value, (_, col)) in counts.iter() {
                    totals[col] += value;
                }
                totals
            }
        }
    }

    /// Number of cells with a nonzero count, per gene
    pub fn gene_nonzero_cells(&self) -> Vec<usize> {
        match &self.data {
            MatrixStorage::Dense(counts) => counts
                .axis_iter(Axis(1))
                .map(|col| col.iter().filter(|&&x| x != 0.0).count())
                .collect(),
            MatrixStorage::Sparse(counts) => {
                let mut nonzero = vec![0usize; counts.cols()];
                for (&value, (_, col)) in counts.iter() {
                    if value != 0.0 {
                        nonzero[col] += 1;
                    }
                }
                nonzero
            }
        }
    }

    /// Total counts per cell (library size)
    pub fn library_sizes(&self) -> Vec<f64> {
        match &self.data {
            MatrixStorage::Dense(counts) => counts
                .axis_iter(Axis(0))
                .map(|row| row.sum())
                .collect(),
            MatrixStorage::Sparse(counts) => {
                let mut totals = vec![0.0; counts.rows()];
                for (&value, (row, _)) in counts.iter() {
                    totals[row] += value;
                }
                totals
            }
        }
    }

    /// Number of nonzero counts in the whole matrix
    pub fn nnz(&self) -> usize {
        match &self.data {
            MatrixStorage::Dense(counts) => counts.iter().filter(|&&x| x != 0.0).count(),
            MatrixStorage::Sparse(counts) => counts.data().iter().filter(|&&x| x != 0.0).count(),
        }
    }

    /// Materialize the counts as a dense array
    pub fn to_dense(&self) -> Array2<f64> {
        match &self.data {
            MatrixStorage::Dense(counts) => counts.clone(),
            MatrixStorage::Sparse(counts) => {
                let mut dense = Array2::zeros(counts.shape());
                for (&value, (row, col)) in counts.iter() {
                    dense[[row, col]] = value;
                }
                dense
            }
        }
    }

    /// Convert to CSR storage, keeping only nonzero counts
    pub fn into_sparse(self) -> Self {
        let data = match self.data {
            MatrixStorage::Dense(counts) => {
                let mut triplets = TriMat::new(counts.dim());
                for ((row, col), &value) in counts.indexed_iter() {
                    if value != 0.0 {
                        triplets.add_triplet(row, col, value);
                    }
                }
                MatrixStorage::Sparse(triplets.to_csr())
            }
            sparse => sparse,
        };
        Self { data, ..self }
    }
}

/// Counts must be non-negative finite values
fn check_counts<'a>(mut values: impl Iterator<Item = &'a f64>) -> Result<()> {
    if values.any(|&x| x < 0.0 || !x.is_finite()) {
        return Err(PerturbError::InvalidExpressionMatrix {
            reason: "Counts must be non-negative finite values".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    #[test]
    fn test_expression_matrix_creation() {
        let counts = array![[1.0, 0.0, 3.0], [13.0, 26.0, 0.0]];
        let matrix = ExpressionMatrix::new(counts, ids("cell", 2), ids("G", 3)).unwrap();
        assert_eq!(matrix.n_cells(), 2);
        assert_eq!(matrix.n_genes(), 3);
        assert_eq!(matrix.gene_index("G3"), Some(2));
        assert_eq!(matrix.gene_index("G4"), None);
        assert_eq!(matrix.storage_kind(), StorageKind::Dense);
    }

    #[test]
    fn test_negative_counts_rejected() {
        let counts = array![[10.0, -5.0], [5.0, 15.0]];
        let result = ExpressionMatrix::new(counts, ids("cell", 2), ids("G", 2));
        assert!(matches!(
            result,
            Err(PerturbError::InvalidExpressionMatrix { .. })
        ));
    }

    #[test]
    fn test_label_length_mismatch() {
        let counts = array![[1.0, 2.0], [3.0, 4.0]];
        let result = ExpressionMatrix::new(counts, ids("cell", 2), ids("G", 3));
        assert!(matches!(result, Err(PerturbError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_duplicate_genes_renamed() {
        let counts = Array2::zeros((1, 4));
        let genes = vec!["A".into(), "A".into(), "A_1".into(), "B".into()];
        let matrix = ExpressionMatrix::new(counts, ids("cell", 1), genes).unwrap();
        assert_eq!(matrix.gene_ids(), &["A", "A_2", "A_1", "B"]);
        assert_eq!(matrix.gene_index("A_2"), Some(1));
    }

    #[test]
    fn test_sparse_accessors() {
        let mut triplets = TriMat::new((3, 2));
        triplets.add_triplet(0, 0, 1.0);
        triplets.add_triplet(1, 1, 26.0);
        triplets.add_triplet(2, 0, 13.0);
        let matrix =
            ExpressionMatrix::from_sparse(triplets.to_csc(), ids("cell", 3), ids("G", 2)).unwrap();

        assert_eq!(matrix.storage_kind(), StorageKind::Csc);
        assert_eq!(matrix.get(1, 0), Some(0.0));
        assert_eq!(matrix.get(2, 0), Some(13.0));
        assert_eq!(matrix.get(3, 0), None);
        assert_eq!(matrix.gene_counts(0), array![1.0, 0.0, 13.0]);
        assert_eq!(matrix.gene_totals(), vec![14.0, 26.0]);
        assert_eq!(matrix.gene_nonzero_cells(), vec![2, 1]);
        assert_eq!(matrix.gene_max(0), 13.0);
        assert_eq!(matrix.gene_max(1), 26.0);
        assert_eq!(matrix.library_sizes(), vec![1.0, 26.0, 13.0]);
        assert_eq!(matrix.nnz(), 3);
    }

    #[test]
    fn test_into_sparse_matches_dense() {
        let counts = array![[1.0, 0.0], [0.0, 7.0], [2.0, 3.0]];
        let dense = ExpressionMatrix::new(counts.clone(), ids("cell", 3), ids("G", 2)).unwrap();
        let sparse = dense.into_sparse();
        assert_eq!(sparse.storage_kind(), StorageKind::Csr);
        assert_eq!(sparse.nnz(), 4);
        assert_eq!(sparse.to_dense(), counts);
    }
}

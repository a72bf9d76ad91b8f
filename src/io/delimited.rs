//! Delimited-text reading and writing for expression matrices

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use ndarray::Array2;
use sprs::TriMat;

use crate::data::ExpressionMatrix;
use crate::error::{PerturbError, Result};
use crate::perturb::{PerturbationRequest, PerturbationSummary};

/// Tab if the header contains one, otherwise comma
fn detect_delimiter(header_line: &str) -> u8 {
    if header_line.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

/// Read a cells x genes count table
///
/// Expected format: first row is a corner label followed by gene IDs; every
/// other row is a cell ID followed by one count per gene. With `sparse`, only
/// nonzero counts are stored and the matrix is backed by CSR storage.
pub fn read_expression_matrix<P: AsRef<Path>>(path: P, sparse: bool) -> Result<ExpressionMatrix> {
    let path = path.as_ref();

    let header_line = {
        let mut first = String::new();
        BufReader::new(File::open(path)?).read_line(&mut first)?;
        first
    };
    if header_line.trim().is_empty() {
        return Err(PerturbError::EmptyData {
            reason: "Empty count table".to_string(),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(&header_line))
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let header = reader.headers()?.clone();
    if header.len() < 2 {
        return Err(PerturbError::InvalidExpressionMatrix {
            reason: "Not enough columns in header".to_string(),
        });
    }
    let gene_ids: Vec<String> = header.iter().skip(1).map(String::from).collect();
    let n_genes = gene_ids.len();

    let mut cell_ids: Vec<String> = Vec::new();
    let mut values: Vec<(usize, usize, f64)> = Vec::new();

    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        if record.len() != n_genes + 1 {
            return Err(PerturbError::InvalidExpressionMatrix {
                reason: format!(
                    "Row has {} columns, expected {}",
                    record.len(),
                    n_genes + 1
                ),
            });
        }

        let row = cell_ids.len();
        cell_ids.push(record[0].to_string());

        for (col, field) in record.iter().skip(1).enumerate() {
            let value = field.parse::<f64>().map_err(|_| PerturbError::InvalidExpressionMatrix {
                reason: format!("Invalid count value: {}", field),
            })?;
            if value != 0.0 || !sparse {
                values.push((row, col, value));
            }
        }
    }

    if cell_ids.is_empty() {
        return Err(PerturbError::EmptyData {
            reason: "No cells found in count table".to_string(),
        });
    }

    let n_cells = cell_ids.len();
    log::debug!(
        "Read {} cells x {} genes ({} stored values)",
        n_cells,
        n_genes,
        values.len()
    );

    if sparse {
        let mut triplets = TriMat::with_capacity((n_cells, n_genes), values.len());
        for (row, col, value) in values {
            triplets.add_triplet(row, col, value);
        }
        ExpressionMatrix::from_sparse(triplets.to_csr(), cell_ids, gene_ids)
    } else {
        let mut counts = Array2::zeros((n_cells, n_genes));
        for (row, col, value) in values {
            counts[[row, col]] = value;
        }
        ExpressionMatrix::new(counts, cell_ids, gene_ids)
    }
}

/// Write a cells x genes count table, tab-separated
pub fn write_expression_matrix<P: AsRef<Path>>(path: P, matrix: &ExpressionMatrix) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;

    let mut header = Vec::with_capacity(matrix.n_genes() + 1);
    header.push("cell_id".to_string());
    header.extend(matrix.gene_ids().iter().cloned());
    writer.write_record(&header)?;

    let counts = matrix.to_dense();
    for (cell_id, row) in matrix.cell_ids().iter().zip(counts.outer_iter()) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(cell_id.clone());
        record.extend(row.iter().map(|value| value.to_string()));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Read a perturbation request from a JSON plan
pub fn read_request<P: AsRef<Path>>(path: P) -> Result<PerturbationRequest> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Write a perturbation summary as pretty-printed JSON
pub fn write_summary<P: AsRef<Path>>(path: P, summary: &PerturbationSummary) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, summary)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::StorageKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_table(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_read_expression_matrix_tsv() {
        let file = write_table(&["cell\tG1\tG2", "c1\t1\t0", "c2\t13\t26"]);
        let matrix = read_expression_matrix(file.path(), false).unwrap();
        assert_eq!(matrix.shape(), (2, 2));
        assert_eq!(matrix.gene_ids(), &["G1", "G2"]);
        assert_eq!(matrix.get(1, 0), Some(13.0));
        assert_eq!(matrix.storage_kind(), StorageKind::Dense);
    }

    #[test]
    fn test_read_expression_matrix_csv_sparse() {
        let file = write_table(&["cell,G1,G2,G3", "c1,1,0,0", "c2,0,26,4"]);
        let matrix = read_expression_matrix(file.path(), true).unwrap();
        assert_eq!(matrix.storage_kind(), StorageKind::Csr);
        assert_eq!(matrix.nnz(), 3);
        assert_eq!(matrix.gene_totals(), vec![1.0, 26.0, 4.0]);
    }

    #[test]
    fn test_read_rejects_bad_values() {
        let file = write_table(&["cell\tG1", "c1\tabc"]);
        assert!(matches!(
            read_expression_matrix(file.path(), false),
            Err(PerturbError::InvalidExpressionMatrix { .. })
        ));

        let file = write_table(&["cell\tG1", "c1\t-4"]);
        assert!(read_expression_matrix(file.path(), false).is_err());
    }

    #[test]
    fn test_read_rejects_ragged_rows() {
        let file = write_table(&["cell\tG1\tG2", "c1\t1"]);
        assert!(read_expression_matrix(file.path(), false).is_err());
    }

    #[test]
    fn test_write_then_read() {
        let file = write_table(&["cell\tG1\tG2", "c1\t1\t0", "c2\t13\t26"]);
        let matrix = read_expression_matrix(file.path(), true).unwrap();

        let out = NamedTempFile::new().unwrap();
        write_expression_matrix(out.path(), &matrix).unwrap();
        let contents = std::fs::read_to_string(out.path()).unwrap();
        assert_eq!(contents, "cell_id\tG1\tG2\nc1\t1\t0\nc2\t13\t26\n");
    }

    #[test]
    fn test_read_request_json() {
        let file = write_table(&[r#"{"perturbations": [{"gene": "G1", "factor": 2.0}]}"#]);
        let request = read_request(file.path()).unwrap();
        assert_eq!(request.len(), 1);
        assert_eq!(request.perturbations()[0].gene, "G1");
    }
}

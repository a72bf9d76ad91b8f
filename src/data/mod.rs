//! Data structures for single-cell expression counts

mod expression_matrix;

pub use expression_matrix::{ExpressionMatrix, MatrixStorage, StorageKind};

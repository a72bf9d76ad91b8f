//! Input/Output helpers for the command-line driver

mod delimited;

pub use delimited::{read_expression_matrix, read_request, write_expression_matrix, write_summary};

//! In-silico gene perturbation of expression matrices

mod apply;
mod request;
mod summary;

pub use apply::{
    perturb_genes, perturb_in_place, perturb_in_place_with, perturb_to_copy, perturb_to_copy_with,
    PerturbMode, PerturbOptions, RoundingMode,
};
pub use request::{Factors, GenePerturbation, PerturbationRequest, ResolvedPerturbation, Targets};
pub use summary::{summarize_perturbation, GeneEffect, PerturbationSummary};

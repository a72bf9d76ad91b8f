//! rust_scperturb command-line interface

use clap::Parser;
use log::{info, LevelFilter};

use rust_scperturb::cli::{Cli, Commands, RoundingArg};
use rust_scperturb::perturb_and_summarize;
use rust_scperturb::prelude::*;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Some(Commands::Perturb {
            input,
            output,
            target,
            factor,
            set,
            plan,
            sparse,
            rounding,
            summary,
        }) => run_perturb(
            &input,
            &output,
            target,
            factor,
            &set,
            plan.as_deref(),
            sparse,
            rounding,
            summary.as_deref(),
        ),
        Some(Commands::Inspect {
            input,
            sparse,
            genes,
        }) => run_inspect(&input, sparse, genes),
        None => {
            print_no_args();
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn print_no_args() {
    println!("rust_scperturb v{}", VERSION);
    println!("Run `rust_scperturb -h` for usage or `rust_scperturb --help` for detailed information.");
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

/// Merge --plan, --target/--factor and --set into one request, in that order
fn build_request(
    targets: Vec<String>,
    factors: Vec<f64>,
    specs: &[String],
    plan_path: Option<&str>,
) -> Result<PerturbationRequest> {
    let mut request = match plan_path {
        Some(path) => {
            info!("Loading perturbation plan from: {}", path);
            read_request(path)?
        }
        None => PerturbationRequest::default(),
    };

    let paired = PerturbationRequest::new(targets, factors)?;
    let parsed = PerturbationRequest::parse_specs(specs)?;
    for perturbation in paired.perturbations().iter().chain(parsed.perturbations()) {
        request.push(perturbation.gene.clone(), perturbation.factor);
    }

    if request.is_empty() {
        return Err(PerturbError::InvalidInput {
            reason: "No perturbation given. Use --target/--factor, --set GENE=FACTOR or --plan"
                .to_string(),
        });
    }

    Ok(request)
}

#[allow(clippy::too_many_arguments)]
fn run_perturb(
    input_path: &str,
    output_path: &str,
    targets: Vec<String>,
    factors: Vec<f64>,
    specs: &[String],
    plan_path: Option<&str>,
    sparse: bool,
    rounding: RoundingArg,
    summary_path: Option<&str>,
) -> Result<()> {
    let request = build_request(targets, factors, specs, plan_path)?;

    info!("Loading count matrix from: {}", input_path);
    let counts = read_expression_matrix(input_path, sparse)?;
    info!(
        "  {} cells, {} genes ({})",
        counts.n_cells(),
        counts.n_genes(),
        counts.storage_kind()
    );

    let options = PerturbOptions {
        rounding: rounding.into(),
    };
    let (perturbed, summary) = perturb_and_summarize(&counts, &request, &options)?;
    print!("{}", summary);

    if let Some(path) = summary_path {
        info!("Writing summary to: {}", path);
        write_summary(path, &summary)?;
    }

    info!("Writing perturbed counts to: {}", output_path);
    write_expression_matrix(output_path, &perturbed)?;

    info!("Done!");
    Ok(())
}

fn run_inspect(input_path: &str, sparse: bool, n_genes_shown: usize) -> Result<()> {
    info!("Loading count matrix from: {}", input_path);
    let counts = read_expression_matrix(input_path, sparse)?;

    let library_sizes = counts.library_sizes();
    let total: f64 = library_sizes.iter().sum();

    println!("Cells: {}", counts.n_cells());
    println!("Genes: {}", counts.n_genes());
    println!("Storage: {}", counts.storage_kind());
    println!("Nonzero counts: {}", counts.nnz());
    println!(
        "Mean counts per cell: {:.2}",
        total / counts.n_cells().max(1) as f64
    );
    let shown: Vec<&str> = counts
        .gene_ids()
        .iter()
        .take(n_genes_shown)
        .map(|s| s.as_str())
        .collect();
    println!("Gene IDs: {}", shown.join(", "));
    Ok(())
}

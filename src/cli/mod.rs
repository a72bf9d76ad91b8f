//! Command-line interface for rust_scperturb

use clap::{Parser, Subcommand, ValueEnum};

use crate::perturb::RoundingMode;

#[derive(Parser)]
#[command(name = "rust_scperturb")]
#[command(author = "SunJu Kim")]
#[command(version)]
#[command(about = "In-silico gene perturbation of single-cell count matrices")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Rounding applied to scaled counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoundingArg {
    /// Ties to even (6.5 -> 6)
    HalfEven,
    /// Ties away from zero (6.5 -> 7)
    HalfAway,
}

impl From<RoundingArg> for RoundingMode {
    fn from(arg: RoundingArg) -> Self {
        match arg {
            RoundingArg::HalfEven => RoundingMode::HalfEven,
            RoundingArg::HalfAway => RoundingMode::HalfAwayFromZero,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scale gene counts and write the perturbed matrix
    #[command(
        long_about = "Scale the counts of selected genes by per-gene factors.\n\n\
            Factors above 1 model up-regulation, factors in [0, 1) model\n\
            down-regulation, and 0 knocks the gene out. Scaled counts are rounded\n\
            back to integers. All targets are validated before anything is written.",
        after_long_help = "\
Examples:
  # Double G1 and halve G2
  rust_scperturb perturb -i counts.tsv -o perturbed.tsv \\
    --target G1 --factor 2.0 --target G2 --factor 0.5

  # Knock out a gene, keep sparse storage, save a JSON summary
  rust_scperturb perturb -i counts.tsv -o ko.tsv --sparse \\
    --set TP53=0 --summary ko_summary.json

  # Read the perturbation plan from JSON
  rust_scperturb perturb -i counts.tsv -o out.tsv --plan plan.json"
    )]
    Perturb {
        /// Path to the cells x genes count table (CSV or TSV)
        #[arg(short, long,
            long_help = "Path to the count table.\n\
                Format: first row = corner label then gene IDs,\n\
                remaining rows = cell ID then one raw count per gene.\n\
                Supports both CSV (comma) and TSV (tab) delimiters (auto-detected).")]
        input: String,

        /// Output file path [default: perturbed_counts.tsv]
        #[arg(short, long, default_value = "perturbed_counts.tsv")]
        output: String,

        /// Target gene (repeat, paired with --factor)
        #[arg(long, value_name = "GENE")]
        target: Vec<String>,

        /// Scaling factor (repeat, paired with --target)
        #[arg(long, value_name = "FACTOR", allow_negative_numbers = true)]
        factor: Vec<f64>,

        /// Perturbation as GENE=FACTOR (repeatable)
        #[arg(long, value_name = "GENE=FACTOR")]
        set: Vec<String>,

        /// JSON perturbation plan
        #[arg(long, value_name = "FILE",
            long_help = "JSON perturbation plan.\n\
                Format: {\"perturbations\": [{\"gene\": \"G1\", \"factor\": 2.0}, ...]}")]
        plan: Option<String>,

        /// Keep counts in sparse (CSR) storage
        #[arg(long)]
        sparse: bool,

        /// Rounding of scaled counts [default: half-even]
        #[arg(long, value_enum, default_value = "half-even")]
        rounding: RoundingArg,

        /// Write a per-gene before/after summary as JSON
        #[arg(long, value_name = "FILE")]
        summary: Option<String>,
    },

    /// Print shape, storage and gene labels of a count table
    Inspect {
        /// Path to the cells x genes count table (CSV or TSV)
        #[arg(short, long)]
        input: String,

        /// Load into sparse (CSR) storage
        #[arg(long)]
        sparse: bool,

        /// Number of gene IDs to list [default: 10]
        #[arg(long, default_value = "10")]
        genes: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_perturb_args() {
        let cli = Cli::try_parse_from([
            "rust_scperturb",
            "perturb",
            "-i",
            "in.tsv",
            "--target",
            "G1",
            "--factor",
            "2",
            "--target",
            "G2",
            "--factor",
            "0.5",
            "--rounding",
            "half-away",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Some(Commands::Perturb {
                input,
                output,
                target,
                factor,
                rounding,
                ..
            }) => {
                assert_eq!(input, "in.tsv");
                assert_eq!(output, "perturbed_counts.tsv");
                assert_eq!(target, vec!["G1", "G2"]);
                assert_eq!(factor, vec![2.0, 0.5]);
                assert_eq!(RoundingMode::from(rounding), RoundingMode::HalfAwayFromZero);
            }
            _ => panic!("expected perturb subcommand"),
        }
    }

    #[test]
    fn test_parse_inspect_defaults() {
        let cli = Cli::try_parse_from(["rust_scperturb", "inspect", "-i", "in.csv"]).unwrap();
        match cli.command {
            Some(Commands::Inspect { genes, sparse, .. }) => {
                assert_eq!(genes, 10);
                assert!(!sparse);
            }
            _ => panic!("expected inspect subcommand"),
        }
    }
}

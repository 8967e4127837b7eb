mod pipeline;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pipeline::{InspectModelArgs, ValidateQuantilesArgs};

/// tau-ml: support tools for training the tau identification network.
#[derive(Parser)]
#[command(name = "tau-ml", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compare scaling clamping ranges with measured quantiles and plot suspicious ones.
    ValidateQuantiles {
        /// Path to yaml configuration file used for training.
        #[arg(long = "train_cfg")]
        train_cfg: PathBuf,
        /// Path to json file with scaling parameters.
        #[arg(long = "scaling_file")]
        scaling_file: PathBuf,
        /// Path to json file with quantile parameters.
        #[arg(long = "quantile_file")]
        quantile_file: PathBuf,
        /// Folder to store range plots.
        #[arg(long = "output_folder", default_value = "quantile_plots")]
        output_folder: PathBuf,
        /// File ID to be picked from quantile parameters file.
        #[arg(long = "file_id", default_value_t = 0)]
        file_id: u32,
        /// Output the report as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },
    /// Show the network, loss, metrics and scale factors of a saved model.
    InspectModel {
        /// Checkpoint directory containing model.mpk and meta.json.
        #[arg(long)]
        model_dir: PathBuf,
        /// Do not resolve loss and metric names.
        #[arg(long)]
        no_compile: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::ValidateQuantiles {
            train_cfg,
            scaling_file,
            quantile_file,
            output_folder,
            file_id,
            json,
        } => pipeline::run_validate_quantiles(ValidateQuantilesArgs {
            train_cfg,
            scaling_file,
            quantile_file,
            output_folder,
            file_id,
            json,
        }),
        Command::InspectModel {
            model_dir,
            no_compile,
        } => pipeline::run_inspect_model(InspectModelArgs {
            model_dir,
            no_compile,
        }),
    }
}

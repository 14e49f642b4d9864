use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod chat;
mod client;
mod config;
mod dataset;
mod error;
mod evaluation;
mod metrics;
mod models;
mod output;
mod prompt;
mod report;
mod runner;
mod similarity;
mod stem;

use crate::client::{CompletionClient, GenerationParams};
use crate::config::Config;
use crate::output::OutputFormat;
use crate::runner::Runner;

/// LoRA fine-tuning companion CLI - prepare datasets, evaluate and chat with the adapted model
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output - log progress for each model request
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render raw examples into the prompt template and write a train/test split
    Prepare {
        /// Path to the TOML configuration file
        run_file: PathBuf,
    },

    /// Evaluate the adapted model on the test split and save a report
    Evaluate {
        /// Path to the TOML configuration file
        run_file: PathBuf,

        /// Evaluate only the first N samples (overrides the run file)
        #[arg(long, conflicts_with = "all")]
        num_samples: Option<usize>,

        /// Evaluate every sample (overrides the run file)
        #[arg(long)]
        all: bool,

        /// Output format for the metrics summary: plain or json
        #[arg(short, long, default_value = "plain")]
        output: OutputFormat,
    },

    /// Chat with the adapted model interactively
    Chat {
        /// Path to the TOML configuration file
        run_file: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Prepare { run_file } => {
            let config = Config::from_file(&run_file)?;
            let settings = &config.prepare;
            dataset::prepare_dataset(
                &settings.raw_data_path,
                &settings.output_path,
                settings.test_size,
                settings.seed,
            )?;
        }
        Command::Evaluate {
            run_file,
            num_samples,
            all,
            output,
        } => {
            let mut config = Config::from_file(&run_file)?;
            config.evaluation.override_sample_limit(num_samples, all);

            let outcome = Runner::new(config, output).run().await?;
            tracing::info!(
                samples = outcome.records.len(),
                avg_perplexity = outcome.metrics.avg_perplexity,
                "Evaluation finished"
            );
        }
        Command::Chat { run_file } => {
            let config = Config::from_file(&run_file)?;
            let client = CompletionClient::new(&config.model)?;
            let params = GenerationParams::from(&config.model);
            chat::run_chat(&client, &params, std::io::stdin().lock(), std::io::stdout()).await?;
        }
    }

    Ok(())
}

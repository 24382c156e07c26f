//! Quality measure command-line interface

use clap::{Parser, Subcommand};
use octofhir_qme::cli::{catalog, check, evaluate, logging, output};
use octofhir_qme::eval::EngineConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Quality measure tool
#[derive(Parser)]
#[command(name = "qme")]
#[command(author, version, about = "Quality measure evaluation tools", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (json, table, pretty)
    #[arg(short = 'f', long, global = true)]
    format: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    color: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a measure against patient records
    Evaluate {
        /// Measure id
        measure_id: String,

        /// Measure file, directory or bundle
        #[arg(short, long)]
        measures: PathBuf,

        /// Patient records (JSON array or JSON lines)
        #[arg(short, long)]
        records: PathBuf,

        /// Measure variant
        #[arg(short, long)]
        sub_id: Option<String>,

        /// Parameters (name=value)
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Records per shard
        #[arg(long)]
        shard_size: Option<usize>,

        /// Maximum concurrent shards
        #[arg(long)]
        workers: Option<usize>,

        /// Abort the evaluation after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// List loaded measures grouped by id
    Catalog {
        /// Measure file, directory or bundle
        #[arg(short, long)]
        measures: PathBuf,
    },

    /// Compile a measure without evaluating it
    Check {
        /// Measure id
        measure_id: String,

        /// Measure file, directory or bundle
        #[arg(short, long)]
        measures: PathBuf,

        /// Measure variant
        #[arg(short, long)]
        sub_id: Option<String>,

        /// Parameters (name=value)
        #[arg(short, long = "param")]
        params: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    output::setup_colors(&cli.color);
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Evaluate {
            measure_id,
            measures,
            records,
            sub_id,
            params,
            shard_size,
            workers,
            timeout_secs,
        } => {
            let mut engine = EngineConfig::default();
            if let Some(shard_size) = shard_size {
                engine = engine.with_shard_size(shard_size);
            }
            if let Some(workers) = workers {
                engine = engine.with_max_workers(workers);
            }
            if let Some(secs) = timeout_secs {
                engine = engine.with_timeout(Duration::from_secs(secs));
            }

            let config = evaluate::EvaluateConfig {
                measures,
                records,
                measure_id,
                sub_id,
                params,
                engine,
                verbose: cli.verbose,
                output_format: cli.format.clone(),
                output_file: cli.output.clone(),
            };
            evaluate::evaluate(config).await
        }

        Commands::Catalog { measures } => {
            let config = catalog::CatalogConfig {
                measures,
                verbose: cli.verbose,
                output_format: cli.format.clone(),
                output_file: cli.output.clone(),
            };
            catalog::catalog(config).await
        }

        Commands::Check {
            measure_id,
            measures,
            sub_id,
            params,
        } => {
            let config = check::CheckConfig {
                measures,
                measure_id,
                sub_id,
                params,
                verbose: cli.verbose,
            };
            check::check(config).await
        }
    };

    if let Err(e) = result {
        eprintln!("{}", output::format_error(&e));
        std::process::exit(1);
    }
}

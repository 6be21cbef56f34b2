use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use fwdtrack::{data::convert_root_to_parquet, run_pipeline, AnalysisConfig};
use log::info;

#[derive(Parser)]
#[command(version, about = "Forward-track matching efficiency and purity", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full analysis on a ROOT file or a directory of Parquet tables
    Run {
        input: PathBuf,
        /// Where to write the results file (default: <output_dir>/results.json)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        /// YAML analysis configuration
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Skip PNG rendering
        #[arg(long, default_value_t = false)]
        no_plots: bool,
    },
    /// Rewrite the trees of a ROOT file as a directory of Parquet tables
    Convert {
        input: PathBuf,
        output: PathBuf,
        /// YAML analysis configuration providing the tree names
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display())),
        None => Ok(AnalysisConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            input,
            output,
            config,
            no_plots,
        } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(output) = output {
                config.results_file = Some(output.to_string_lossy().into_owned());
            }
            if no_plots {
                config.render_plots = false;
            }
            let output = run_pipeline(&input, &config)
                .with_context(|| format!("analysis of {} failed", input.display()))?;
            info!(
                "Done: {} data files and {} images written",
                output.data_files.len(),
                output.images.len()
            );
        }
        Commands::Convert {
            input,
            output,
            config,
        } => {
            let config = load_config(config.as_ref())?;
            convert_root_to_parquet(
                &input.to_string_lossy(),
                &output.to_string_lossy(),
                &config.input,
            )
            .with_context(|| format!("conversion of {} failed", input.display()))?;
        }
    }
    Ok(())
}

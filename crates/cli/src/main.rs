// voteflow CLI - ecological inference of vote transfers between two elections

mod backend;
mod columns;
mod exit_codes;
mod logging;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use voteflow_pipeline::{PipelineError, Preset};

use exit_codes::{pipeline_exit_code, EXIT_SUCCESS};

#[derive(Parser)]
#[command(name = "voteflow")]
#[command(about = "Estimate vote transfers between two elections (ecological inference)")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an inference from a TOML config file
    #[command(after_help = "\
Examples:
  voteflow run paso-to-general.toml
  voteflow run paso-to-general.toml --json
  voteflow run paso-to-general.toml --preset accurate -o report.json
  voteflow run paso-to-general.toml --coefficients beta.txt")]
    Run {
        /// Path to the run config
        config: PathBuf,

        /// Print the JSON report to stdout instead of the flow table
        #[arg(long)]
        json: bool,

        /// Write the JSON report to a file
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Precision preset: fast, medium or accurate (overrides the config)
        #[arg(long, env = "VOTEFLOW_PRESET")]
        preset: Option<Preset>,

        /// Read the coefficient vector from a file instead of running R
        #[arg(long, value_name = "FILE")]
        coefficients: Option<PathBuf>,

        /// No progress output on stderr
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Check a config against its input tables without running the solver
    #[command(after_help = "\
Examples:
  voteflow validate paso-to-general.toml")]
    Validate {
        /// Path to the run config
        config: PathBuf,
    },

    /// List the shared columns and the suggested selection for two tables
    #[command(after_help = "\
Examples:
  voteflow columns paso.csv general.csv
  voteflow columns paso.csv general.csv --json")]
    Columns {
        origin: PathBuf,
        destination: PathBuf,

        /// Machine-readable output
        #[arg(long)]
        json: bool,
    },

    /// Write a starter run config from the suggested selection
    #[command(after_help = "\
Examples:
  voteflow init paso.csv general.csv
  voteflow init paso.csv general.csv -o runs/paso-to-general.toml --force")]
    Init {
        origin: PathBuf,
        destination: PathBuf,

        /// Config file to write
        #[arg(long, short = 'o', default_value = "voteflow.toml")]
        output: PathBuf,

        /// Run name (defaults to "<origin> to <destination>")
        #[arg(long)]
        name: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\npipeline: voteflow-pipeline ", env!("CARGO_PKG_VERSION"),
        "\ntarget:   ", env!("TARGET"),
    )
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Run { config, json, output, preset, coefficients, quiet } => {
            run::cmd_run(run::RunArgs { config, json, output, preset, coefficients, quiet })
        }
        Commands::Validate { config } => run::cmd_validate(config),
        Commands::Columns { origin, destination, json } => {
            columns::cmd_columns(origin, destination, json)
        }
        Commands::Init { origin, destination, output, name, force } => {
            columns::cmd_init(origin, destination, output, name, force)
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    /// Create error from a pipeline error with the matching exit code and hint.
    pub fn pipeline(err: PipelineError) -> Self {
        let code = pipeline_exit_code(&err);
        let hint = match &err {
            PipelineError::MissingColumn { .. } => {
                Some("run `voteflow columns <origin> <destination>` to list the available columns".to_string())
            }
            PipelineError::NoValidUnits { .. } => {
                Some("the key must identify the same unit in both tables and the weight must be a population count".to_string())
            }
            PipelineError::Solver { backend, .. } if backend == "rscript" => {
                Some("R with the eiPack package must be installed; see `solver.rscript` in the config".to_string())
            }
            PipelineError::MatrixShape { .. } => {
                Some("the solver ran with a different category count than the config lists".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

//! `voteflow run` and `voteflow validate`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use voteflow_pipeline::config::SourceConfig;
use voteflow_pipeline::{Dataset, InferenceSession, Preset, RunConfig, RunOutcome, RunRequest};

use crate::backend::Backend;
use crate::exit_codes::{EXIT_ERROR, EXIT_INPUT_IO, EXIT_OUTPUT_WRITE, EXIT_SOLVER};
use crate::CliError;

pub struct RunArgs {
    pub config: PathBuf,
    pub json: bool,
    pub output: Option<PathBuf>,
    pub preset: Option<Preset>,
    pub coefficients: Option<PathBuf>,
    pub quiet: bool,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct InputFile {
    file: String,
    blake3: String,
    rows: usize,
}

#[derive(Serialize)]
struct RunMeta {
    config_name: String,
    engine_version: &'static str,
    run_at: String,
    origin: InputFile,
    destination: InputFile,
}

#[derive(Serialize)]
struct RunReport<'a> {
    meta: RunMeta,
    #[serde(flatten)]
    outcome: &'a RunOutcome,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

struct LoadedTable {
    path: PathBuf,
    dataset: Dataset,
}

pub(crate) fn load_config(config_path: &Path) -> Result<(RunConfig, PathBuf), CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        CliError::new(EXIT_INPUT_IO, format!("cannot read config {}: {e}", config_path.display()))
    })?;
    let config = RunConfig::from_toml(&config_str).map_err(CliError::pipeline)?;

    // Input and output paths resolve relative to the config's directory
    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    Ok((config, base_dir))
}

fn load_table(base_dir: &Path, source: &SourceConfig) -> Result<LoadedTable, CliError> {
    let path = base_dir.join(&source.file);
    let dataset = match source.delimiter {
        Some(d) => voteflow_io::csv::import_with_delimiter(&path, d as u8),
        None => voteflow_io::csv::import(&path),
    }
    .map_err(|e| CliError::new(EXIT_INPUT_IO, format!("{}: {e}", path.display())))?;

    log::info!(
        "loaded {}: {} rows, {} columns",
        path.display(),
        dataset.len(),
        dataset.headers.len()
    );
    Ok(LoadedTable { path, dataset })
}

fn describe_input(table: &LoadedTable) -> Result<InputFile, CliError> {
    let blake3 = voteflow_io::fingerprint::fingerprint_file(&table.path)
        .map_err(|e| CliError::new(EXIT_INPUT_IO, e))?;
    Ok(InputFile {
        file: table.path.display().to_string(),
        blake3,
        rows: table.dataset.len(),
    })
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// `m:ss`
pub(crate) fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn write_output(path: &Path, result: Result<(), String>) -> Result<(), CliError> {
    result.map_err(|e| CliError::new(EXIT_OUTPUT_WRITE, e))?;
    eprintln!("wrote {}", path.display());
    Ok(())
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let (config, base_dir) = load_config(&args.config)?;
    let origin = load_table(&base_dir, &config.origin)?;
    let destination = load_table(&base_dir, &config.destination)?;

    let preset = args.preset.unwrap_or(config.solver.preset);
    let backend = Backend::from_config(&config.solver, &base_dir, args.coefficients.as_deref())
        .map_err(|e| {
            CliError::new(EXIT_SOLVER, format!("cannot start solver: {e}")).with_hint(
                "install R with eiPack, set `solver.rscript`, or pass --coefficients <FILE>",
            )
        })?;
    log::info!("solver backend: {}, preset {preset}", backend.describe());

    let session = InferenceSession::new(backend);

    let ticked = AtomicBool::new(false);
    let quiet = args.quiet;
    let observer = |elapsed: Duration| {
        if !quiet {
            ticked.store(true, Ordering::Relaxed);
            eprint!("\rrunning inference... ({})", format_elapsed(elapsed));
        }
    };

    let result = session.run(
        RunRequest {
            origin: &origin.dataset,
            destination: &destination.dataset,
            selection: &config.columns,
            preset,
        },
        &observer,
    );
    if ticked.load(Ordering::Relaxed) {
        eprintln!();
    }
    let outcome = result.map_err(CliError::pipeline)?;

    let report = RunReport {
        meta: RunMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION"),
            run_at: chrono::Utc::now().to_rfc3339(),
            origin: describe_input(&origin)?,
            destination: describe_input(&destination)?,
        },
        outcome: &outcome,
    };

    let json_str = serde_json::to_string_pretty(&report)
        .map_err(|e| CliError::new(EXIT_ERROR, format!("JSON serialization error: {e}")))?;

    // Outputs
    let json_targets = args
        .output
        .iter()
        .cloned()
        .chain(config.output.json.as_ref().map(|p| base_dir.join(p)));
    for path in json_targets {
        let written = std::fs::write(&path, &json_str)
            .map_err(|e| format!("cannot write {}: {e}", path.display()));
        write_output(&path, written)?;
    }
    if let Some(ref file) = config.output.flows_csv {
        let path = base_dir.join(file);
        write_output(&path, voteflow_io::export::write_flows_csv(&path, &outcome.flows))?;
    }
    if let Some(ref file) = config.output.edges_csv {
        let path = base_dir.join(file);
        write_output(&path, voteflow_io::export::write_edges_csv(&path, &outcome.graph))?;
    }
    if let Some(ref file) = config.output.matrix_csv {
        let path = base_dir.join(file);
        let written = voteflow_io::export::write_matrix_csv(
            &path,
            &outcome.matrix,
            &outcome.origin_categories,
            &outcome.destination_categories,
        );
        write_output(&path, written)?;
    }

    if args.json {
        println!("{json_str}");
    } else {
        print_flow_table(&outcome);
    }

    // Human summary to stderr
    let j = &outcome.join;
    eprintln!(
        "'{}': {} of {} units merged ({} unmatched, {} non-positive weight, {} unstable); {} flows, preset {}",
        config.name,
        j.merged,
        j.origin_rows,
        j.missing_key,
        j.nonpositive_weight,
        j.unstable,
        outcome.flows.len(),
        outcome.preset,
    );

    Ok(())
}

fn print_flow_table(outcome: &RunOutcome) {
    let width = |names: &[String], header: &str| {
        names.iter().map(|n| n.chars().count()).chain([header.len()]).max().unwrap_or(0)
    };
    let ow = width(&outcome.origin_categories, "Origin");
    let dw = width(&outcome.destination_categories, "Destination");

    println!("{:<ow$}  {:<dw$}  {:>11}  {:>15}", "Origin", "Destination", "Probability", "Estimated_Units");
    for flow in &outcome.flows {
        println!(
            "{:<ow$}  {:<dw$}  {:>11.4}  {:>15}",
            flow.origin_category, flow.destination_category, flow.probability, flow.estimated_units,
        );
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let (config, base_dir) = load_config(&config_path)?;
    let origin = load_table(&base_dir, &config.origin)?;
    let destination = load_table(&base_dir, &config.destination)?;

    config
        .columns
        .validate_against(&origin.dataset.headers, &destination.dataset.headers)
        .map_err(CliError::pipeline)?;

    eprintln!(
        "valid: '{}' with {} origin × {} destination categories ({} / {} rows), backend {}, preset {}",
        config.name,
        config.columns.origin_count(),
        config.columns.destination_count(),
        origin.dataset.len(),
        destination.dataset.len(),
        config.solver.backend,
        config.solver.preset,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_renders_minutes_and_seconds() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "0:00");
        assert_eq!(format_elapsed(Duration::from_millis(9_900)), "0:09");
        assert_eq!(format_elapsed(Duration::from_secs(75)), "1:15");
        assert_eq!(format_elapsed(Duration::from_secs(3_600)), "60:00");
    }
}

//! `voteflow columns` and `voteflow init`: column discovery for a table pair.

use std::path::{Path, PathBuf};

use serde::Serialize;
use voteflow_pipeline::config::{OutputConfig, SolverConfig, SourceConfig};
use voteflow_pipeline::selection::{suggest_selection, SuggestedColumns};
use voteflow_pipeline::{Dataset, RunConfig};

use crate::exit_codes::{EXIT_CONFIG_INVALID, EXIT_INPUT_IO, EXIT_OUTPUT_WRITE, EXIT_USAGE};
use crate::CliError;

#[derive(Serialize)]
struct ColumnsReport<'a> {
    origin_headers: &'a [String],
    destination_headers: &'a [String],
    #[serde(flatten)]
    suggested: &'a SuggestedColumns,
}

fn load(path: &Path) -> Result<Dataset, CliError> {
    voteflow_io::csv::import(path)
        .map_err(|e| CliError::new(EXIT_INPUT_IO, format!("{}: {e}", path.display())))
}

pub fn cmd_columns(origin: PathBuf, destination: PathBuf, json: bool) -> Result<(), CliError> {
    let origin_ds = load(&origin)?;
    let destination_ds = load(&destination)?;
    let suggested = suggest_selection(&origin_ds.headers, &destination_ds.headers);

    if json {
        let report = ColumnsReport {
            origin_headers: &origin_ds.headers,
            destination_headers: &destination_ds.headers,
            suggested: &suggested,
        };
        let out = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::new(EXIT_OUTPUT_WRITE, format!("JSON serialization error: {e}")))?;
        println!("{out}");
        return Ok(());
    }

    let or_none = |v: &Option<String>| v.clone().unwrap_or_else(|| "(none)".to_string());
    println!("common:      {}", suggested.common.join(", "));
    println!("key:         {}", or_none(&suggested.key));
    println!("weight:      {}", or_none(&suggested.weight));
    println!("origin:      {}", suggested.origin.join(", "));
    println!("destination: {}", suggested.destination.join(", "));
    Ok(())
}

/// Path as it should appear in a config written to `config_dir`.
fn relative_to(path: &Path, config_dir: &Path) -> String {
    let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let base = std::fs::canonicalize(config_dir).unwrap_or_else(|_| config_dir.to_path_buf());
    match absolute.strip_prefix(&base) {
        Ok(relative) => relative.display().to_string(),
        Err(_) => absolute.display().to_string(),
    }
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn cmd_init(
    origin: PathBuf,
    destination: PathBuf,
    output: PathBuf,
    name: Option<String>,
    force: bool,
) -> Result<(), CliError> {
    if output.exists() && !force {
        return Err(CliError::new(EXIT_USAGE, format!("{} already exists", output.display()))
            .with_hint("pass --force to overwrite"));
    }

    let origin_ds = load(&origin)?;
    let destination_ds = load(&destination)?;
    let suggested = suggest_selection(&origin_ds.headers, &destination_ds.headers);

    let columns = suggested.to_selection().ok_or_else(|| {
        CliError::new(EXIT_CONFIG_INVALID, "the two tables share no column to use as key and weight")
    })?;

    let config_dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let config = RunConfig {
        name: name.unwrap_or_else(|| format!("{} to {}", stem(&origin), stem(&destination))),
        origin: SourceConfig { file: relative_to(&origin, &config_dir), delimiter: None },
        destination: SourceConfig { file: relative_to(&destination, &config_dir), delimiter: None },
        columns,
        solver: SolverConfig::default(),
        output: OutputConfig::default(),
    };

    // Suggestions can still be unusable, e.g. key and weight on the same column
    config.validate().map_err(|e| {
        CliError::pipeline(e).with_hint("edit the generated selection by hand or pick other tables")
    })?;

    let toml_str = config.to_toml().map_err(CliError::pipeline)?;
    std::fs::write(&output, toml_str)
        .map_err(|e| CliError::new(EXIT_OUTPUT_WRITE, format!("cannot write {}: {e}", output.display())))?;

    eprintln!(
        "wrote {} (key '{}', weight '{}', {} origin × {} destination categories)",
        output.display(),
        config.columns.key,
        config.columns.weight,
        config.columns.origin_count(),
        config.columns.destination_count(),
    );
    Ok(())
}

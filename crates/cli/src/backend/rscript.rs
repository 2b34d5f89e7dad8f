//! eiPack through a local `Rscript` process.

use std::path::{Path, PathBuf};
use std::process::Command;

use voteflow_pipeline::solver::SolverRequest;

/// Line printed right before the coefficient vector. Anything R writes to
/// stdout before it (package banners, chain progress) is ignored.
pub const OUTPUT_MARKER: &str = "__VOTEFLOW_BETA__";

const DATA_FILE: &str = "ei_data.csv";
const SCRIPT_FILE: &str = "ei_run.R";

pub struct RscriptSolver {
    program: PathBuf,
}

impl RscriptSolver {
    /// Resolve `explicit` (a path or a name on PATH), or `Rscript` on PATH.
    pub fn locate(explicit: Option<&str>) -> Result<Self, String> {
        let name = explicit.unwrap_or("Rscript");
        let program = which::which(name).map_err(|_| format!("'{name}' not found"))?;
        log::debug!("using R at {}", program.display());
        Ok(Self { program })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn estimate(&self, request: &SolverRequest) -> Result<Vec<f64>, String> {
        let scratch = tempfile::tempdir().map_err(|e| format!("cannot create temp dir: {e}"))?;
        let data_path = scratch.path().join(DATA_FILE);
        let script_path = scratch.path().join(SCRIPT_FILE);

        voteflow_io::export::write_data_table_csv(&data_path, &request.table)?;
        std::fs::write(&script_path, render_script(request, &data_path))
            .map_err(|e| format!("cannot write {}: {e}", script_path.display()))?;

        let output = Command::new(&self.program)
            .arg("--vanilla")
            .arg(&script_path)
            .output()
            .map_err(|e| format!("failed to run {}: {e}", self.program.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "Rscript exited with status {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim(),
            ));
        }

        parse_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// R string literal for a path (forward slashes, quotes escaped).
fn r_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace('"', "\\\"")
}

pub fn render_script(request: &SolverRequest, data_path: &Path) -> String {
    let s = request.settings;
    format!(
        r#"suppressPackageStartupMessages(library(eiPack))
df <- read.csv("{data}", check.names = FALSE)
f <- as.formula("{formula}")
res <- ei.MD.bayes(f, data = df, total = "{total}",
                   burnin = {burnin}, sample = {sample}, thin = {thin})
beta_means <- apply(res$draws$Beta, 2, mean)
cat("{marker}\n")
cat(format(beta_means, digits = 17, scientific = FALSE, trim = TRUE), sep = "\n")
cat("\n")
"#,
        data = r_path(data_path),
        formula = request.formula,
        total = request.total_column,
        burnin = s.burnin,
        sample = s.sample,
        thin = s.thin,
        marker = OUTPUT_MARKER,
    )
}

/// Coefficients printed after [`OUTPUT_MARKER`], one per line.
pub fn parse_output(stdout: &str) -> Result<Vec<f64>, String> {
    let mut lines = stdout.lines();
    if !lines.by_ref().any(|line| line.trim() == OUTPUT_MARKER) {
        return Err("R produced no coefficient output".to_string());
    }

    let mut values = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: f64 = line
            .parse()
            .map_err(|_| format!("unexpected R output line '{line}'"))?;
        if !value.is_finite() {
            return Err(format!("R returned a non-finite coefficient ({line})"));
        }
        values.push(value);
    }
    Ok(values)
}

//! Pre-computed coefficient vectors.
//!
//! Accepts one number per line, whitespace- or comma-separated numbers, or a
//! JSON array. Lines starting with `#` are comments.

use std::path::{Path, PathBuf};

use voteflow_pipeline::solver::SolverRequest;

pub struct CoefficientFile {
    path: PathBuf,
}

impl CoefficientFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn estimate(&self, request: &SolverRequest) -> Result<Vec<f64>, String> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| format!("cannot read {}: {e}", self.path.display()))?;
        let values = parse_coefficients(&text)?;
        log::info!(
            "loaded {} coefficients from {} for a {}×{} run",
            values.len(),
            self.path.display(),
            request.origin_count,
            request.destination_count,
        );
        Ok(values)
    }
}

pub fn parse_coefficients(text: &str) -> Result<Vec<f64>, String> {
    let trimmed = text.trim();
    if trimmed.starts_with('[') {
        return serde_json::from_str::<Vec<f64>>(trimmed)
            .map_err(|e| format!("invalid JSON coefficient array: {e}"));
    }

    let mut values = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        for token in line.split(|c: char| c == ',' || c.is_whitespace()) {
            if token.is_empty() {
                continue;
            }
            let value: f64 = token
                .parse()
                .map_err(|_| format!("line {}: '{token}' is not a number", line_no + 1))?;
            if !value.is_finite() {
                return Err(format!("line {}: non-finite coefficient '{token}'", line_no + 1));
            }
            values.push(value);
        }
    }

    if values.is_empty() {
        return Err("coefficient file contains no values".to_string());
    }
    Ok(values)
}

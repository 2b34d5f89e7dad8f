use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::model::MergedRecord;

/// Name of the weight column in the solver's data table.
pub const TOTAL_COLUMN: &str = "n";

// ---------------------------------------------------------------------------
// Precision presets
// ---------------------------------------------------------------------------

/// MCMC chain settings handed to the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct McmcSettings {
    pub burnin: u32,
    pub sample: u32,
    pub thin: u32,
}

/// Closed set of precision/runtime trade-offs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    #[default]
    Fast,
    Medium,
    Accurate,
}

impl Preset {
    pub fn settings(self) -> McmcSettings {
        match self {
            Self::Fast => McmcSettings { burnin: 10, sample: 50, thin: 1 },
            Self::Medium => McmcSettings { burnin: 1000, sample: 100, thin: 10 },
            Self::Accurate => McmcSettings { burnin: 5000, sample: 150, thin: 50 },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Accurate => "accurate",
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "medium" => Ok(Self::Medium),
            "accurate" => Ok(Self::Accurate),
            other => Err(format!("unknown preset '{other}' (expected fast, medium or accurate)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Solver contract
// ---------------------------------------------------------------------------

/// Column-oriented table: `n`, then `x1..xP`, then `t1..tQ`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    columns: Vec<(String, Vec<f64>)>,
}

impl DataTable {
    pub fn columns(&self) -> &[(String, Vec<f64>)] {
        &self.columns
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|(_, v)| v.len()).unwrap_or(0)
    }
}

/// Everything the solver needs for one run.
#[derive(Debug, Clone)]
pub struct SolverRequest {
    pub table: DataTable,
    /// `cbind(t1,...,tQ) ~ cbind(x1,...,xP)`
    pub formula: String,
    pub total_column: String,
    pub settings: McmcSettings,
    pub origin_count: usize,
    pub destination_count: usize,
}

/// External ecological-inference capability.
///
/// Implementations receive the design table and return the flat coefficient
/// vector exactly as the solver produced it: either one column-major P×Q
/// matrix, or one per unit stacked back to back. An `Err` carries the
/// solver's own message and ends the run.
pub trait EiSolver {
    fn name(&self) -> &str;

    fn estimate(&self, request: &SolverRequest) -> Result<Vec<f64>, String>;
}

impl<F> EiSolver for F
where
    F: Fn(&SolverRequest) -> Result<Vec<f64>, String>,
{
    fn name(&self) -> &str {
        "closure"
    }

    fn estimate(&self, request: &SolverRequest) -> Result<Vec<f64>, String> {
        self(request)
    }
}

/// Flat solver output together with the matrix shape it must fold into.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutput {
    pub values: Vec<f64>,
    pub rows: usize,
    pub cols: usize,
}

pub fn origin_column(i: usize) -> String {
    format!("x{}", i + 1)
}

pub fn destination_column(j: usize) -> String {
    format!("t{}", j + 1)
}

/// Solver formula for P origin and Q destination categories.
pub fn formula(origin_count: usize, destination_count: usize) -> String {
    let t: Vec<String> = (0..destination_count).map(destination_column).collect();
    let x: Vec<String> = (0..origin_count).map(origin_column).collect();
    format!("cbind({}) ~ cbind({})", t.join(","), x.join(","))
}

pub fn build_data_table(
    records: &[MergedRecord],
    origin_count: usize,
    destination_count: usize,
) -> DataTable {
    let mut columns = Vec::with_capacity(1 + origin_count + destination_count);
    columns.push((TOTAL_COLUMN.to_string(), records.iter().map(|r| r.n).collect()));
    for i in 0..origin_count {
        columns.push((origin_column(i), records.iter().map(|r| r.x[i]).collect()));
    }
    for j in 0..destination_count {
        columns.push((destination_column(j), records.iter().map(|r| r.t[j]).collect()));
    }
    DataTable { columns }
}

pub fn build_request(
    records: &[MergedRecord],
    origin_count: usize,
    destination_count: usize,
    preset: Preset,
) -> SolverRequest {
    SolverRequest {
        table: build_data_table(records, origin_count, destination_count),
        formula: formula(origin_count, destination_count),
        total_column: TOTAL_COLUMN.to_string(),
        settings: preset.settings(),
        origin_count,
        destination_count,
    }
}

/// Call the solver once. Failures are surfaced with the solver's message,
/// never retried.
pub fn invoke<S: EiSolver + ?Sized>(
    solver: &S,
    request: &SolverRequest,
) -> Result<SolverOutput, PipelineError> {
    log::info!(
        "invoking solver '{}' on {} units ({}, burnin={}, sample={}, thin={})",
        solver.name(),
        request.table.row_count(),
        request.formula,
        request.settings.burnin,
        request.settings.sample,
        request.settings.thin,
    );

    let values = solver.estimate(request).map_err(|message| PipelineError::Solver {
        backend: solver.name().to_string(),
        message,
    })?;

    log::debug!("solver returned {} values", values.len());

    Ok(SolverOutput {
        values,
        rows: request.origin_count,
        cols: request.destination_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<MergedRecord> {
        vec![
            MergedRecord { n: 100.0, x: vec![0.6, 0.4], t: vec![0.3, 0.5, 0.2] },
            MergedRecord { n: 250.0, x: vec![0.1, 0.9], t: vec![0.2, 0.2, 0.6] },
        ]
    }

    #[test]
    fn preset_values() {
        assert_eq!(Preset::Fast.settings(), McmcSettings { burnin: 10, sample: 50, thin: 1 });
        assert_eq!(Preset::Medium.settings(), McmcSettings { burnin: 1000, sample: 100, thin: 10 });
        assert_eq!(Preset::Accurate.settings(), McmcSettings { burnin: 5000, sample: 150, thin: 50 });
        assert_eq!(Preset::default(), Preset::Fast);
    }

    #[test]
    fn preset_parses_case_insensitively() {
        assert_eq!("Accurate".parse::<Preset>().unwrap(), Preset::Accurate);
        assert!("slow".parse::<Preset>().is_err());
    }

    #[test]
    fn formula_lists_response_then_explanatory() {
        assert_eq!(formula(2, 3), "cbind(t1,t2,t3) ~ cbind(x1,x2)");
        assert_eq!(formula(1, 1), "cbind(t1) ~ cbind(x1)");
    }

    #[test]
    fn data_table_is_column_oriented() {
        let table = build_data_table(&records(), 2, 3);
        assert_eq!(table.names(), vec!["n", "x1", "x2", "t1", "t2", "t3"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column("n"), Some(&[100.0, 250.0][..]));
        assert_eq!(table.column("x2"), Some(&[0.4, 0.9][..]));
        assert_eq!(table.column("t3"), Some(&[0.2, 0.6][..]));
        assert_eq!(table.column("t4"), None);
    }

    #[test]
    fn request_carries_settings_and_shape() {
        let request = build_request(&records(), 2, 3, Preset::Medium);
        assert_eq!(request.total_column, "n");
        assert_eq!(request.settings.thin, 10);
        assert_eq!(request.origin_count, 2);
        assert_eq!(request.destination_count, 3);
    }

    #[test]
    fn solver_error_is_surfaced_verbatim() {
        let failing = |_: &SolverRequest| -> Result<Vec<f64>, String> {
            Err("chain did not start".to_string())
        };
        let request = build_request(&records(), 2, 3, Preset::Fast);
        match invoke(&failing, &request) {
            Err(PipelineError::Solver { backend, message }) => {
                assert_eq!(backend, "closure");
                assert_eq!(message, "chain did not start");
            }
            other => panic!("expected solver error, got {other:?}"),
        }
    }

    #[test]
    fn output_carries_shape() {
        let echo = |req: &SolverRequest| -> Result<Vec<f64>, String> {
            Ok(vec![0.5; req.origin_count * req.destination_count])
        };
        let request = build_request(&records(), 2, 3, Preset::Fast);
        let out = invoke(&echo, &request).unwrap();
        assert_eq!(out.values.len(), 6);
        assert_eq!((out.rows, out.cols), (2, 3));
    }
}

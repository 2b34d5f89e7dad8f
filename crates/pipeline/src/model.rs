use std::collections::HashMap;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Input tables
// ---------------------------------------------------------------------------

/// A single cell of an imported table, after numeric auto-detection.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Empty,
    Number(f64),
    Text(String),
}

impl Value {
    /// Numeric reading used for weights and category counts.
    /// Empty, text and non-finite cells count as 0.
    pub fn as_count(&self) -> f64 {
        match self {
            Value::Number(n) if n.is_finite() => *n,
            _ => 0.0,
        }
    }

    /// String form used to match units across tables. `None` for empty cells.
    ///
    /// Integral numbers render without a fractional part, so a key typed as
    /// `1` in one file and `1.0` in the other still meet.
    pub fn key_string(&self) -> Option<String> {
        match self {
            Value::Empty => None,
            Value::Number(n) => Some(format_number(*n)),
            Value::Text(s) if s.is_empty() => None,
            Value::Text(s) => Some(s.clone()),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

pub type Record = HashMap<String, Value>;

/// One uploaded table: ordered header plus rows keyed by column name.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Numeric cell lookup; missing columns count as 0.
pub fn count_of(record: &Record, column: &str) -> f64 {
    record.get(column).map(Value::as_count).unwrap_or(0.0)
}

/// Key cell lookup; missing or empty cells yield `None`.
pub fn key_of(record: &Record, column: &str) -> Option<String> {
    record.get(column).and_then(Value::key_string)
}

// ---------------------------------------------------------------------------
// Solver input
// ---------------------------------------------------------------------------

/// One joined unit, ready for the solver: origin weight `n`, origin
/// proportions `x` (P entries) and destination proportions `t` (Q entries).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRecord {
    pub n: f64,
    pub x: Vec<f64>,
    pub t: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Transfer matrix
// ---------------------------------------------------------------------------

/// P×Q coefficients: row = origin category, column = destination category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferMatrix {
    rows: usize,
    cols: usize,
    values: Vec<Vec<f64>>,
}

impl TransferMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            values: vec![vec![0.0; cols]; rows],
        }
    }

    /// Build from row vectors. Returns `None` when rows are ragged.
    pub fn from_rows(values: Vec<Vec<f64>>) -> Option<Self> {
        let rows = values.len();
        let cols = values.first().map(Vec::len).unwrap_or(0);
        if values.iter().any(|r| r.len() != cols) {
            return None;
        }
        Some(Self { rows, cols, values })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row][col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.values[row]
    }

    pub(crate) fn set(&mut self, row: usize, col: usize, value: f64) {
        self.values[row][col] = value;
    }

    pub(crate) fn add(&mut self, row: usize, col: usize, value: f64) {
        self.values[row][col] += value;
    }

    /// Flatten column by column (R's storage order).
    pub fn to_column_major(&self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(self.rows * self.cols);
        for col in 0..self.cols {
            for row in 0..self.rows {
                flat.push(self.values[row][col]);
            }
        }
        flat
    }
}

// ---------------------------------------------------------------------------
// Flows
// ---------------------------------------------------------------------------

/// Estimated transfer between one origin and one destination category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowEdge {
    pub origin_category: String,
    pub destination_category: String,
    pub probability: f64,
    pub estimated_units: u64,
}

/// Graph edge between side-labelled nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub value: u64,
}

/// Bipartite flow graph handed to renderers and exporters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlowGraph {
    pub nodes: Vec<String>,
    pub edges: Vec<GraphEdge>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_string_formats_integral_numbers_without_fraction() {
        assert_eq!(Value::Number(1.0).key_string().as_deref(), Some("1"));
        assert_eq!(Value::Number(1042.0).key_string().as_deref(), Some("1042"));
        assert_eq!(Value::Number(2.5).key_string().as_deref(), Some("2.5"));
        assert_eq!(Value::Text("A-01".into()).key_string().as_deref(), Some("A-01"));
        assert_eq!(Value::Empty.key_string(), None);
        assert_eq!(Value::Text(String::new()).key_string(), None);
    }

    #[test]
    fn as_count_treats_non_numbers_as_zero() {
        assert_eq!(Value::Number(12.0).as_count(), 12.0);
        assert_eq!(Value::Text("n/a".into()).as_count(), 0.0);
        assert_eq!(Value::Empty.as_count(), 0.0);
        assert_eq!(Value::Number(f64::NAN).as_count(), 0.0);
    }

    #[test]
    fn column_major_flattening() {
        let m = TransferMatrix::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(m.to_column_major(), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn from_rows_rejects_ragged_input() {
        assert!(TransferMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).is_none());
    }
}

use std::fmt;

use crate::join::JoinStats;

/// Which input table a column reference belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Origin,
    Destination,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Origin => "origin",
            Side::Destination => "destination",
        }
    }
}

#[derive(Debug)]
pub enum PipelineError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config or column selection failed validation.
    ConfigValidation(String),
    /// A selected column is not in the table's header.
    MissingColumn { side: Side, column: String },
    /// No unit survived the join. Usually a bad key or weight column choice.
    NoValidUnits {
        key: String,
        weight: String,
        stats: JoinStats,
    },
    /// The external solver failed. Never retried.
    Solver { backend: String, message: String },
    /// The solver returned a vector that is not P·Q or a multiple of it.
    MatrixShape { len: usize, rows: usize, cols: usize },
    /// Another run is still in flight on this session.
    SessionBusy,
}

impl PipelineError {
    /// Stable snake_case label for machine-readable output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigParse(_) | Self::ConfigValidation(_) | Self::MissingColumn { .. } => {
                "config"
            }
            Self::NoValidUnits { .. } => "input_selection",
            Self::Solver { .. } => "solver_invocation",
            Self::MatrixShape { .. } => "matrix_shape",
            Self::SessionBusy => "session_busy",
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingColumn { side, column } => {
                write!(f, "{} table: missing column '{column}'", side.as_str())
            }
            Self::NoValidUnits { key, weight, stats } => write!(
                f,
                "no valid units after merging on key '{key}' with weight '{weight}' \
                 ({} origin rows, {} destination rows; {} without a destination match, \
                 {} with non-positive weight, {} outside the ±15% weight band); \
                 check the key and weight column selection",
                stats.origin_rows,
                stats.destination_rows,
                stats.missing_key,
                stats.nonpositive_weight,
                stats.unstable,
            ),
            Self::Solver { backend, message } => write!(f, "solver '{backend}' failed: {message}"),
            Self::MatrixShape { len, rows, cols } => write!(
                f,
                "solver returned {len} coefficients, expected {rows}×{cols}={} or a multiple of it \
                 (category count mismatch)",
                rows * cols,
            ),
            Self::SessionBusy => write!(f, "an inference run is already in progress on this session"),
        }
    }
}

impl std::error::Error for PipelineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_shape_message_names_lengths() {
        let err = PipelineError::MatrixShape { len: 5, rows: 2, cols: 2 };
        let msg = err.to_string();
        assert!(msg.contains("5 coefficients"), "{msg}");
        assert!(msg.contains("2×2=4"), "{msg}");
        assert_eq!(err.kind(), "matrix_shape");
    }

    #[test]
    fn no_valid_units_message_names_columns_and_counts() {
        let err = PipelineError::NoValidUnits {
            key: "id".into(),
            weight: "pop".into(),
            stats: JoinStats {
                origin_rows: 3,
                destination_rows: 2,
                missing_key: 1,
                unstable: 2,
                ..JoinStats::default()
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("'id'"));
        assert!(msg.contains("'pop'"));
        assert!(msg.contains("3 origin rows"));
        assert!(msg.contains("2 outside"));
        assert_eq!(err.kind(), "input_selection");
    }

    #[test]
    fn solver_message_kept_verbatim() {
        let err = PipelineError::Solver {
            backend: "rscript".into(),
            message: "Error in ei.MD.bayes: non-finite value".into(),
        };
        assert!(err.to_string().ends_with("Error in ei.MD.bayes: non-finite value"));
        assert_eq!(err.kind(), "solver_invocation");
    }
}

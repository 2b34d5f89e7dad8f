use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Side};
use crate::solver::Preset;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// A run described by a `.toml` file: two tables, a column selection,
/// solver settings and optional export targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub name: String,
    pub origin: SourceConfig,
    pub destination: SourceConfig,
    pub columns: ColumnSelection,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub file: String,
    /// Field delimiter. Sniffed from the file when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
}

// ---------------------------------------------------------------------------
// Column selection
// ---------------------------------------------------------------------------

/// Which columns play which role. Validated before the join runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSelection {
    /// Unit identifier present in both tables.
    pub key: String,
    /// Population / electorate column present in both tables.
    pub weight: String,
    /// Ordered origin categories (explanatory side, P of them).
    pub origin: Vec<String>,
    /// Ordered destination categories (response side, Q of them).
    pub destination: Vec<String>,
}

impl ColumnSelection {
    pub fn origin_count(&self) -> usize {
        self.origin.len()
    }

    pub fn destination_count(&self) -> usize {
        self.destination.len()
    }

    /// Shape checks that need no data.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.key.trim().is_empty() {
            return Err(PipelineError::ConfigValidation("key column is empty".into()));
        }
        if self.weight.trim().is_empty() {
            return Err(PipelineError::ConfigValidation("weight column is empty".into()));
        }
        if self.key == self.weight {
            return Err(PipelineError::ConfigValidation(format!(
                "key and weight must be different columns, both are '{}'",
                self.key
            )));
        }

        for (side, categories) in [(Side::Origin, &self.origin), (Side::Destination, &self.destination)] {
            if categories.is_empty() {
                return Err(PipelineError::ConfigValidation(format!(
                    "at least one {} category is required",
                    side.as_str()
                )));
            }
            let mut seen = HashSet::new();
            for category in categories {
                if !seen.insert(category.as_str()) {
                    return Err(PipelineError::ConfigValidation(format!(
                        "{} category '{category}' listed more than once",
                        side.as_str()
                    )));
                }
                if *category == self.key || *category == self.weight {
                    return Err(PipelineError::ConfigValidation(format!(
                        "{} category '{category}' is also the key or weight column",
                        side.as_str()
                    )));
                }
            }
        }

        Ok(())
    }

    /// Check every selected column exists in the table it is read from.
    pub fn validate_against(
        &self,
        origin_headers: &[String],
        destination_headers: &[String],
    ) -> Result<(), PipelineError> {
        self.validate()?;

        let require = |side: Side, headers: &[String], column: &str| {
            if headers.iter().any(|h| h == column) {
                Ok(())
            } else {
                Err(PipelineError::MissingColumn {
                    side,
                    column: column.to_string(),
                })
            }
        };

        for shared in [&self.key, &self.weight] {
            require(Side::Origin, origin_headers, shared)?;
            require(Side::Destination, destination_headers, shared)?;
        }
        for category in &self.origin {
            require(Side::Origin, origin_headers, category)?;
        }
        for category in &self.destination {
            require(Side::Destination, destination_headers, category)?;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Solver + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Run eiPack through an `Rscript` process.
    #[default]
    Rscript,
    /// Read a previously computed coefficient vector from a file.
    Coefficients,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rscript => write!(f, "rscript"),
            Self::Coefficients => write!(f, "coefficients"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default)]
    pub preset: Preset,
    #[serde(default)]
    pub backend: BackendKind,
    /// Explicit `Rscript` executable. Looked up on PATH when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rscript: Option<String>,
    /// Coefficient file for the `coefficients` backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coefficients: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flows_csv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges_csv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix_csv: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl RunConfig {
    pub fn from_toml(input: &str) -> Result<Self, PipelineError> {
        let config: RunConfig =
            toml::from_str(input).map_err(|e| PipelineError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, PipelineError> {
        toml::to_string_pretty(self).map_err(|e| PipelineError::ConfigParse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::ConfigValidation("name must not be empty".into()));
        }

        for (side, source) in [(Side::Origin, &self.origin), (Side::Destination, &self.destination)] {
            if source.file.trim().is_empty() {
                return Err(PipelineError::ConfigValidation(format!(
                    "{}.file must not be empty",
                    side.as_str()
                )));
            }
            if let Some(d) = source.delimiter {
                if !d.is_ascii() {
                    return Err(PipelineError::ConfigValidation(format!(
                        "{}.delimiter must be a single ASCII character, got {d:?}",
                        side.as_str()
                    )));
                }
            }
        }

        self.columns.validate()?;

        if self.solver.backend == BackendKind::Coefficients && self.solver.coefficients.is_none() {
            return Err(PipelineError::ConfigValidation(
                "solver.backend = \"coefficients\" requires solver.coefficients".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Solver backends selectable from a run config.

mod coefficients;
mod rscript;

use std::path::Path;

use voteflow_pipeline::config::{BackendKind, SolverConfig};
use voteflow_pipeline::solver::SolverRequest;
use voteflow_pipeline::EiSolver;

pub use coefficients::CoefficientFile;
pub use rscript::RscriptSolver;

pub enum Backend {
    Rscript(RscriptSolver),
    Coefficients(CoefficientFile),
}

impl Backend {
    /// Build the backend a config asks for. Relative paths resolve against
    /// `base_dir`; `override_file` forces the coefficient backend.
    pub fn from_config(
        solver: &SolverConfig,
        base_dir: &Path,
        override_file: Option<&Path>,
    ) -> Result<Self, String> {
        if let Some(path) = override_file {
            return Ok(Self::Coefficients(CoefficientFile::new(path)));
        }

        match solver.backend {
            BackendKind::Rscript => RscriptSolver::locate(solver.rscript.as_deref()).map(Self::Rscript),
            BackendKind::Coefficients => {
                let file = solver
                    .coefficients
                    .as_deref()
                    .ok_or_else(|| "solver.coefficients is not set".to_string())?;
                Ok(Self::Coefficients(CoefficientFile::new(base_dir.join(file))))
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Rscript(r) => format!("rscript ({})", r.program().display()),
            Self::Coefficients(c) => format!("coefficients ({})", c.path().display()),
        }
    }
}

impl EiSolver for Backend {
    fn name(&self) -> &str {
        match self {
            Self::Rscript(_) => "rscript",
            Self::Coefficients(_) => "coefficients",
        }
    }

    fn estimate(&self, request: &SolverRequest) -> Result<Vec<f64>, String> {
        match self {
            Self::Rscript(r) => r.estimate(request),
            Self::Coefficients(c) => c.estimate(request),
        }
    }
}

//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | General error (unspecified)                          |
//! | 2    | CLI usage error (bad args, refusing to overwrite)    |
//! | 3    | Config invalid (parse, validation, missing column)   |
//! | 4    | Input I/O (cannot read config or a table)            |
//! | 5    | No valid units after the join                        |
//! | 6    | Solver invocation failed                             |
//! | 7    | Solver output has the wrong length                   |
//! | 8    | Inference session busy                               |
//! | 9    | Cannot write an output file                          |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use voteflow_pipeline::PipelineError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, refusing to overwrite without `--force`.
pub const EXIT_USAGE: u8 = 2;

/// Config file failed to parse or validate, or names a column the tables lack.
pub const EXIT_CONFIG_INVALID: u8 = 3;

/// Config or input table could not be read or parsed as CSV.
pub const EXIT_INPUT_IO: u8 = 4;

/// Every unit was dropped by the join (no key match, weight, stability band).
pub const EXIT_NO_VALID_UNITS: u8 = 5;

/// The solver failed or could not be started. Not retried.
pub const EXIT_SOLVER: u8 = 6;

/// The solver returned a vector that is not P·Q or a multiple of it.
pub const EXIT_MATRIX_SHAPE: u8 = 7;

/// Another run holds the session.
pub const EXIT_SESSION_BUSY: u8 = 8;

/// A report or export could not be written.
pub const EXIT_OUTPUT_WRITE: u8 = 9;

/// Map a pipeline error to its exit code.
pub fn pipeline_exit_code(err: &PipelineError) -> u8 {
    match err {
        PipelineError::ConfigParse(_)
        | PipelineError::ConfigValidation(_)
        | PipelineError::MissingColumn { .. } => EXIT_CONFIG_INVALID,
        PipelineError::NoValidUnits { .. } => EXIT_NO_VALID_UNITS,
        PipelineError::Solver { .. } => EXIT_SOLVER,
        PipelineError::MatrixShape { .. } => EXIT_MATRIX_SHAPE,
        PipelineError::SessionBusy => EXIT_SESSION_BUSY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_errors_map_to_distinct_codes() {
        let shape = PipelineError::MatrixShape { len: 5, rows: 2, cols: 2 };
        let solver = PipelineError::Solver { backend: "rscript".into(), message: "x".into() };
        assert_eq!(pipeline_exit_code(&shape), EXIT_MATRIX_SHAPE);
        assert_eq!(pipeline_exit_code(&solver), EXIT_SOLVER);
        assert_eq!(pipeline_exit_code(&PipelineError::SessionBusy), EXIT_SESSION_BUSY);
        assert_eq!(
            pipeline_exit_code(&PipelineError::ConfigValidation("x".into())),
            EXIT_CONFIG_INVALID
        );
    }
}

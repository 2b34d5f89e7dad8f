//! `voteflow-pipeline`: ecological inference pipeline for vote transfers.
//!
//! Pure engine crate: receives two pre-loaded tables and a column selection,
//! hands a design table to an external solver, and turns the solver's flat
//! coefficient vector into a transfer matrix and a flow graph.
//! No file, process or CLI dependencies.
//!
//! Stages run strictly in order:
//!
//! 1. [`join`]: merge origin and destination rows on a shared key under the
//!    population-stability filter.
//! 2. [`normalize`]: turn raw counts into simplex-closed proportions.
//! 3. [`solver`]: build the solver contract and invoke an [`EiSolver`].
//! 4. [`reconstruct`]: reshape the column-major output into a P×Q matrix.
//! 5. [`flows`]: scale coefficients into absolute flows and a graph.
//!
//! [`InferenceSession`] drives the whole sequence behind a busy/idle latch.

pub mod config;
pub mod error;
pub mod flows;
pub mod join;
pub mod model;
pub mod normalize;
pub mod reconstruct;
pub mod selection;
pub mod session;
pub mod solver;

pub use config::{ColumnSelection, RunConfig};
pub use error::PipelineError;
pub use model::{Dataset, FlowEdge, FlowGraph, GraphEdge, MergedRecord, TransferMatrix, Value};
pub use session::{InferenceSession, RunOutcome, RunRequest};
pub use solver::{EiSolver, McmcSettings, Preset};

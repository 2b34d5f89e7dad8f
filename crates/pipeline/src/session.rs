use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::ColumnSelection;
use crate::error::PipelineError;
use crate::flows::synthesize;
use crate::join::{join_units, JoinStats};
use crate::model::{Dataset, FlowEdge, FlowGraph, TransferMatrix};
use crate::normalize::normalize_units;
use crate::reconstruct::{reconstruct_output, OutputShape};
use crate::solver::{self, build_request, EiSolver, McmcSettings, Preset};

/// Default spacing of elapsed-time callbacks while the solver runs.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Inputs for one run. Tables are borrowed; nothing is copied until the join.
#[derive(Debug, Clone, Copy)]
pub struct RunRequest<'a> {
    pub origin: &'a Dataset,
    pub destination: &'a Dataset,
    pub selection: &'a ColumnSelection,
    pub preset: Preset,
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub preset: Preset,
    pub settings: McmcSettings,
    pub solver: String,
    pub join: JoinStats,
    pub origin_categories: Vec<String>,
    pub destination_categories: Vec<String>,
    /// Raw origin count per category over the merged units.
    pub origin_totals: Vec<f64>,
    pub shape: OutputShape,
    pub matrix: TransferMatrix,
    pub flows: Vec<FlowEdge>,
    pub graph: FlowGraph,
    /// Wall time spent inside the solver.
    pub solver_ms: u64,
}

/// Owns the solver handle and guarantees at most one run in flight.
pub struct InferenceSession<S: EiSolver> {
    solver: S,
    busy: AtomicBool,
    tick: Duration,
}

/// Releases the latch when the run ends, whichever way it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, PipelineError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PipelineError::SessionBusy)?;
        Ok(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S: EiSolver> InferenceSession<S> {
    pub fn new(solver: S) -> Self {
        Self {
            solver,
            busy: AtomicBool::new(false),
            tick: DEFAULT_TICK,
        }
    }

    pub fn with_tick_interval(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Run join, normalize, solve, reconstruct and synthesize in order.
    ///
    /// `observer` is called from a helper thread roughly every tick with the
    /// time spent in the solver so far. A second call while one is in flight
    /// fails with `SessionBusy` and leaves the first run untouched.
    pub fn run(
        &self,
        request: RunRequest<'_>,
        observer: &(dyn Fn(Duration) + Sync),
    ) -> Result<RunOutcome, PipelineError> {
        let _guard = BusyGuard::acquire(&self.busy)?;

        let selection = request.selection;
        selection.validate_against(&request.origin.headers, &request.destination.headers)?;

        let joined = join_units(request.origin, request.destination, selection)?;
        let records = normalize_units(&joined.pairs);

        let p = selection.origin_count();
        let q = selection.destination_count();
        let solver_request = build_request(&records, p, q, request.preset);

        let started = Instant::now();
        let output = self.solve_with_ticker(&solver_request, observer);
        let solver_elapsed = started.elapsed();
        let output = output?;
        log::info!(
            "solver '{}' finished in {:.1}s",
            self.solver.name(),
            solver_elapsed.as_secs_f64()
        );

        let reconstruction = reconstruct_output(&output)?;
        let synthesis = synthesize(
            &reconstruction.matrix,
            &selection.origin,
            &selection.destination,
            &joined.origin_totals,
        );

        Ok(RunOutcome {
            preset: request.preset,
            settings: request.preset.settings(),
            solver: self.solver.name().to_string(),
            join: joined.stats,
            origin_categories: selection.origin.clone(),
            destination_categories: selection.destination.clone(),
            origin_totals: joined.origin_totals,
            shape: reconstruction.shape,
            matrix: reconstruction.matrix,
            flows: synthesis.flows,
            graph: synthesis.graph,
            solver_ms: solver_elapsed.as_millis() as u64,
        })
    }

    /// Solver on the calling thread, elapsed ticks from a scoped helper.
    fn solve_with_ticker(
        &self,
        request: &solver::SolverRequest,
        observer: &(dyn Fn(Duration) + Sync),
    ) -> Result<solver::SolverOutput, PipelineError> {
        let tick = self.tick;
        let start = Instant::now();

        std::thread::scope(|scope| {
            let (done, stop) = mpsc::channel::<()>();
            scope.spawn(move || loop {
                match stop.recv_timeout(tick) {
                    Err(RecvTimeoutError::Timeout) => observer(start.elapsed()),
                    _ => break,
                }
            });

            let result = solver::invoke(&self.solver, request);
            drop(done);
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;

    use super::*;
    use crate::model::Value;
    use crate::solver::SolverRequest;

    fn dataset(headers: &[&str], rows: &[&[f64]]) -> Dataset {
        let mut ds = Dataset::new(headers.iter().map(|h| h.to_string()).collect());
        for row in rows {
            ds.push(
                headers
                    .iter()
                    .zip(row.iter())
                    .map(|(h, v)| (h.to_string(), Value::Number(*v)))
                    .collect(),
            );
        }
        ds
    }

    fn selection() -> ColumnSelection {
        ColumnSelection {
            key: "id".into(),
            weight: "pop".into(),
            origin: vec!["a".into(), "b".into()],
            destination: vec!["c".into(), "d".into()],
        }
    }

    fn tables() -> (Dataset, Dataset) {
        let origin = dataset(&["id", "pop", "a", "b"], &[&[1.0, 100.0, 60.0, 40.0]]);
        let destination = dataset(&["id", "pop", "c", "d"], &[&[1.0, 100.0, 50.0, 50.0]]);
        (origin, destination)
    }

    fn silent(_: Duration) {}

    #[test]
    fn latch_resets_after_failure() {
        let failing = |_: &SolverRequest| -> Result<Vec<f64>, String> { Err("boom".into()) };
        let session = InferenceSession::new(failing);
        let (origin, destination) = tables();
        let sel = selection();
        let request = RunRequest {
            origin: &origin,
            destination: &destination,
            selection: &sel,
            preset: Preset::Fast,
        };

        assert!(matches!(session.run(request, &silent), Err(PipelineError::Solver { .. })));
        assert!(!session.is_busy());
        assert!(matches!(session.run(request, &silent), Err(PipelineError::Solver { .. })));
    }

    #[test]
    fn missing_column_fails_before_solver() {
        let calls = AtomicUsize::new(0);
        let counting = |_: &SolverRequest| -> Result<Vec<f64>, String> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.5; 4])
        };
        let session = InferenceSession::new(counting);
        let (origin, destination) = tables();
        let mut sel = selection();
        sel.destination[1] = "missing".into();

        let err = session
            .run(
                RunRequest {
                    origin: &origin,
                    destination: &destination,
                    selection: &sel,
                    preset: Preset::Fast,
                },
                &silent,
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn second_run_is_rejected_while_busy() {
        let entered = Barrier::new(2);
        let release = Barrier::new(2);
        let blocking = |req: &SolverRequest| -> Result<Vec<f64>, String> {
            entered.wait();
            release.wait();
            Ok(vec![0.5; req.origin_count * req.destination_count])
        };
        let session = InferenceSession::new(blocking);
        let (origin, destination) = tables();
        let sel = selection();
        let request = RunRequest {
            origin: &origin,
            destination: &destination,
            selection: &sel,
            preset: Preset::Fast,
        };

        std::thread::scope(|scope| {
            let first = scope.spawn(|| session.run(request, &silent));

            entered.wait();
            assert!(session.is_busy());
            assert!(matches!(session.run(request, &silent), Err(PipelineError::SessionBusy)));
            release.wait();

            let outcome = first.join().unwrap().unwrap();
            assert_eq!(outcome.flows.len(), 4);
        });

        assert!(!session.is_busy());
    }

    #[test]
    fn observer_ticks_while_solver_runs() {
        let slow = |req: &SolverRequest| -> Result<Vec<f64>, String> {
            std::thread::sleep(Duration::from_millis(120));
            Ok(vec![0.5; req.origin_count * req.destination_count])
        };
        let session = InferenceSession::new(slow).with_tick_interval(Duration::from_millis(10));
        let (origin, destination) = tables();
        let sel = selection();
        let ticks = AtomicUsize::new(0);
        let observer = |_: Duration| {
            ticks.fetch_add(1, Ordering::SeqCst);
        };

        let outcome = session
            .run(
                RunRequest {
                    origin: &origin,
                    destination: &destination,
                    selection: &sel,
                    preset: Preset::Fast,
                },
                &observer,
            )
            .unwrap();

        assert!(ticks.load(Ordering::SeqCst) >= 1);
        assert!(outcome.solver_ms >= 100);
        assert_eq!(outcome.solver, "closure");
    }
}

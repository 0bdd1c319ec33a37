use super::coordinator::CoordinatorHandle;
use super::error::EngineError;
use super::executor::{StageContext, StageExecutor, run_stage};
use super::progress::{Progress, ProgressReporter};
use crate::core::io::metrics::MetricsRecord;
use crate::core::models::candidate::Candidate;
use crate::core::models::report::{Estimate, Stage, StageReport};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What happened to one candidate in the gated funnel.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateOutcome {
    pub candidate: Candidate,
    /// Scores forwarded to the coordinator, in stage order.
    pub report: StageReport,
    /// Stages actually executed, in order.
    pub stages_run: Vec<Stage>,
    /// The stage the policy refused, if any.
    pub stopped_before: Option<Stage>,
    /// Result of the terminal sampling stage.
    pub sample: Option<Estimate>,
    /// Stage failures recorded along the way.
    pub failures: Vec<(Stage, String)>,
}

impl CandidateOutcome {
    fn new(candidate: Candidate) -> Self {
        let report = StageReport::new(candidate.smiles.clone());
        Self {
            candidate,
            report,
            stages_run: Vec::new(),
            stopped_before: None,
            sample: None,
            failures: Vec::new(),
        }
    }

    pub fn completed(&self) -> bool {
        self.stages_run.last() == Some(&Stage::Sample)
    }
}

/// Everything one worker produced before it finished or gave up on its shard.
#[derive(Debug)]
pub struct WorkerReport {
    pub worker: usize,
    pub outcomes: Vec<CandidateOutcome>,
    /// Set when the worker could not finish its shard.
    pub error: Option<EngineError>,
}

/// Drives a shard of candidates through the funnel, one candidate and one stage at a time.
pub struct Worker<E: ?Sized> {
    shard: Vec<Candidate>,
    executor: Arc<E>,
    coordinator: CoordinatorHandle,
    receptor: PathBuf,
    output_dir: PathBuf,
    sampling_iterations: usize,
    reporter: ProgressReporter<'static>,
}

impl<E> Worker<E>
where
    E: StageExecutor + ?Sized,
{
    pub fn new(
        shard: Vec<Candidate>,
        executor: Arc<E>,
        coordinator: CoordinatorHandle,
        receptor: PathBuf,
        output_dir: PathBuf,
        sampling_iterations: usize,
    ) -> Self {
        Self {
            shard,
            executor,
            coordinator,
            receptor,
            output_dir,
            sampling_iterations,
            reporter: ProgressReporter::new(),
        }
    }

    pub fn with_reporter(mut self, reporter: ProgressReporter<'static>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn id(&self) -> usize {
        self.coordinator.worker()
    }

    /// Scans the shard in order. Blocks the calling thread; run it off the async runtime.
    #[instrument(skip_all, fields(worker = self.id()))]
    pub fn run(self) -> WorkerReport {
        let worker = self.id();
        info!(candidates = self.shard.len(), "Worker starting on its shard.");

        let mut outcomes = Vec::with_capacity(self.shard.len());
        let mut error = None;
        for candidate in &self.shard {
            match self.process(candidate) {
                Ok(outcome) => {
                    self.reporter.report(Progress::TaskIncrement);
                    outcomes.push(outcome);
                }
                Err(e) => {
                    warn!("Worker abandoning the rest of its shard: {}", e);
                    error = Some(e);
                    break;
                }
            }
        }

        info!(processed = outcomes.len(), "Worker finished.");
        WorkerReport {
            worker,
            outcomes,
            error,
        }
    }

    fn process(&self, candidate: &Candidate) -> Result<CandidateOutcome, EngineError> {
        let work_dir = candidate.work_dir(&self.output_dir);
        let mut outcome = CandidateOutcome::new(candidate.clone());

        for stage in Stage::ALL {
            let decision = self.coordinator.request_blocking(stage, &outcome.report)?;
            self.reporter.report(Progress::Gate { stage, decision });
            if !decision.is_continue() {
                debug!(%candidate, %stage, "Policy stopped candidate.");
                outcome.stopped_before = Some(stage);
                break;
            }

            if stage == Stage::Dock {
                std::fs::create_dir_all(&work_dir).map_err(|source| EngineError::Workspace {
                    worker: self.id(),
                    path: work_dir.clone(),
                    source,
                })?;
            }

            let ctx = StageContext {
                smiles: &candidate.smiles,
                receptor: &self.receptor,
                work_dir: &work_dir,
                sampling_iterations: self.sampling_iterations,
            };
            debug!(%candidate, %stage, "Running stage.");
            let estimate = match run_stage(self.executor.as_ref(), stage, ctx) {
                Ok(estimate) => estimate,
                Err(e) => {
                    warn!(%candidate, "{}", e);
                    outcome.failures.push((e.stage(), e.to_string()));
                    Estimate::failed()
                }
            };

            if let Err(e) = MetricsRecord::record_stage_in_dir(&work_dir, stage, estimate) {
                warn!(%candidate, %stage, "Could not update metrics record: {}", e);
            }

            outcome.stages_run.push(stage);
            match stage {
                Stage::Sample => outcome.sample = Some(estimate),
                _ => outcome.report.record(estimate.value),
            }
        }

        Ok(outcome)
    }
}

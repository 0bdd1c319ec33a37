use crate::core::io::metrics::MetricsRecord;
use crate::core::io::table::{self, ScoreRow};
use crate::core::models::candidate::Candidate;
use crate::core::models::report::{Estimate, Stage};
use crate::core::partition;
use crate::engine::config::BatchConfig;
use crate::engine::error::{EngineError, StageError};
use crate::engine::executor::{StageContext, StageExecutor, run_stage};
use crate::engine::progress::{Progress, ProgressReporter};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct BatchResult {
    /// One row per candidate, in input order.
    pub rows: Vec<ScoreRow>,
    pub failures: usize,
    pub table_path: PathBuf,
}

struct Shared<'a, E: ?Sized> {
    executor: &'a E,
    stage: Stage,
    receptor: &'a Path,
    output_dir: &'a Path,
    sampling_iterations: usize,
    reporter: &'a ProgressReporter<'a>,
}

/// Runs one stage over every candidate without any gating.
///
/// Candidates are split into `workers` contiguous shards that run independently; the results are
/// concatenated in shard order, so the table follows the input order. A failure on one candidate
/// is recorded as a missing score and never affects another.
#[instrument(skip_all, name = "batch_workflow", fields(stage = %config.stage, candidates = candidates.len()))]
pub fn run<E>(
    candidates: &[Candidate],
    executor: &E,
    config: &BatchConfig,
    reporter: &ProgressReporter,
) -> Result<BatchResult, EngineError>
where
    E: StageExecutor + ?Sized,
{
    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    if !config.receptor_path.is_file() {
        return Err(EngineError::Initialization(format!(
            "Receptor file '{}' does not exist",
            config.receptor_path.display()
        )));
    }
    std::fs::create_dir_all(&config.output_dir).map_err(|e| {
        EngineError::Initialization(format!(
            "Cannot create output directory '{}': {}",
            config.output_dir.display(),
            e
        ))
    })?;
    let receptor = absolute(&config.receptor_path)?;
    let output_dir = absolute(&config.output_dir)?;
    reporter.report(Progress::PhaseFinish);

    let shared = Shared {
        executor,
        stage: config.stage,
        receptor: &receptor,
        output_dir: &output_dir,
        sampling_iterations: config.sampling_iterations,
        reporter,
    };

    reporter.report(Progress::PhaseStart {
        name: "Batch Execution",
    });
    reporter.report(Progress::TaskStart {
        total_steps: candidates.len() as u64,
    });

    let shards = partition::split(candidates, config.workers);
    info!(
        workers = config.workers,
        shards = shards.len(),
        "Dispatching shards."
    );
    let per_shard = run_shards(&shards, &shared, config.workers)?;

    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    let rows: Vec<ScoreRow> = per_shard.into_iter().flatten().collect();
    let failures = rows.iter().filter(|r| r.score.is_nan()).count();
    let table_path = output_dir.join(format!("{}_metrics.csv", config.stage.table_column()));
    table::write_score_table_to_path(&table_path, config.stage.table_column(), &rows)?;

    info!(
        rows = rows.len(),
        failures,
        table = %table_path.display(),
        "Batch complete."
    );
    Ok(BatchResult {
        rows,
        failures,
        table_path,
    })
}

fn absolute(path: &Path) -> Result<PathBuf, EngineError> {
    path.canonicalize().map_err(|e| {
        EngineError::Initialization(format!("Cannot resolve '{}': {}", path.display(), e))
    })
}

#[cfg(feature = "parallel")]
fn run_shards<E>(
    shards: &[&[Candidate]],
    shared: &Shared<'_, E>,
    workers: usize,
) -> Result<Vec<Vec<ScoreRow>>, EngineError>
where
    E: StageExecutor + ?Sized,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("batch-worker-{}", i + 1))
        .build()
        .map_err(|e| EngineError::Initialization(format!("Cannot start worker pool: {}", e)))?;

    Ok(pool.install(|| {
        shards
            .par_iter()
            .enumerate()
            .map(|(rank, shard)| run_shard(rank + 1, shard, shared))
            .collect()
    }))
}

#[cfg(not(feature = "parallel"))]
fn run_shards<E>(
    shards: &[&[Candidate]],
    shared: &Shared<'_, E>,
    _workers: usize,
) -> Result<Vec<Vec<ScoreRow>>, EngineError>
where
    E: StageExecutor + ?Sized,
{
    Ok(shards
        .iter()
        .enumerate()
        .map(|(rank, shard)| run_shard(rank + 1, shard, shared))
        .collect())
}

fn run_shard<E>(worker: usize, shard: &[Candidate], shared: &Shared<'_, E>) -> Vec<ScoreRow>
where
    E: StageExecutor + ?Sized,
{
    debug!(worker, candidates = shard.len(), "Shard started.");
    shard
        .iter()
        .map(|candidate| {
            let score = match run_candidate(candidate, shared) {
                Ok(estimate) => estimate.value,
                Err(message) => {
                    warn!(worker, %candidate, "{}", message);
                    f64::NAN
                }
            };
            shared.reporter.report(Progress::TaskIncrement);
            ScoreRow {
                smiles: candidate.smiles.clone(),
                name: candidate.name.clone(),
                score,
            }
        })
        .collect()
}

fn run_candidate<E>(candidate: &Candidate, shared: &Shared<'_, E>) -> Result<Estimate, String>
where
    E: StageExecutor + ?Sized,
{
    let work_dir = candidate.work_dir(shared.output_dir);
    match shared.stage {
        Stage::Dock => std::fs::create_dir_all(&work_dir).map_err(|e| {
            format!("Cannot create work directory '{}': {}", work_dir.display(), e)
        })?,
        _ if !work_dir.is_dir() => {
            return Err(format!(
                "No prepared work directory '{}' for stage '{}'",
                work_dir.display(),
                shared.stage
            ));
        }
        _ => {}
    }

    let ctx = StageContext {
        smiles: &candidate.smiles,
        receptor: shared.receptor,
        work_dir: &work_dir,
        sampling_iterations: shared.sampling_iterations,
    };
    let result = run_stage(shared.executor, shared.stage, ctx);
    let estimate = match &result {
        Ok(estimate) => *estimate,
        Err(_) => Estimate::failed(),
    };
    if let Err(e) = MetricsRecord::record_stage_in_dir(&work_dir, shared.stage, estimate) {
        warn!(%candidate, "Could not update metrics record: {}", e);
    }
    result.map_err(|e: StageError| e.to_string())
}

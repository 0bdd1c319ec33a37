use crate::core::io::summary::{self, SUMMARY_FILE_NAME, SummaryRow, score_cell};
use crate::core::models::candidate::Candidate;
use crate::core::models::report::Stage;
use crate::core::partition;
use crate::engine::config::ScreeningConfig;
use crate::engine::coordinator::{Coordinator, CoordinatorStats};
use crate::engine::error::EngineError;
use crate::engine::executor::StageExecutor;
use crate::engine::policy::PolicyOracle;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::worker::{CandidateOutcome, Worker, WorkerReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

#[derive(Debug)]
pub struct ScreeningResult {
    /// Outcomes of every processed candidate, in input order.
    pub outcomes: Vec<CandidateOutcome>,
    /// Candidates left unprocessed because their worker gave up on its shard.
    pub abandoned: Vec<Candidate>,
    /// `(worker, error)` for every worker that could not finish its shard.
    pub worker_errors: Vec<(usize, EngineError)>,
    pub coordinator_stats: CoordinatorStats,
    pub summary_path: PathBuf,
}

impl ScreeningResult {
    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.completed()).count()
    }
}

/// Runs the gated funnel over `candidates`.
///
/// Workers are numbered from 1 and each owns one contiguous shard. The call returns once every
/// worker has finished and the coordinator has drained its queue. A worker that fails to set up
/// a candidate's workspace abandons the rest of its shard without affecting the others.
#[instrument(skip_all, name = "screening_workflow", fields(candidates = candidates.len()))]
pub async fn run<E, P>(
    candidates: Vec<Candidate>,
    executor: Arc<E>,
    oracle: P,
    config: &ScreeningConfig,
    reporter: &ProgressReporter<'static>,
) -> Result<ScreeningResult, EngineError>
where
    E: StageExecutor + ?Sized + 'static,
    P: PolicyOracle + 'static,
{
    // === Phase 0: Preparation ===
    reporter.report(Progress::PhaseStart {
        name: "Preparation",
    });
    let (receptor, output_dir) = prepare_paths(&config.receptor_path, &config.output_dir)?;
    info!(
        receptor = %receptor.display(),
        output = %output_dir.display(),
        workers = config.pipeline.workers,
        "Screening setup complete."
    );
    reporter.report(Progress::PhaseFinish);

    // === Phase 1: Gated screening ===
    reporter.report(Progress::PhaseStart { name: "Screening" });
    reporter.report(Progress::TaskStart {
        total_steps: candidates.len() as u64,
    });

    let (coordinator, handle) = Coordinator::new(oracle, config.pipeline.channel_capacity);
    let server = tokio::spawn(coordinator.run());

    let shards: Vec<Vec<Candidate>> = partition::split(&candidates, config.pipeline.workers)
        .into_iter()
        .map(<[Candidate]>::to_vec)
        .collect();

    let mut tasks = Vec::with_capacity(shards.len());
    for (rank, shard) in shards.iter().enumerate() {
        let worker = Worker::new(
            shard.clone(),
            executor.clone(),
            handle.for_worker(rank + 1),
            receptor.clone(),
            output_dir.clone(),
            config.pipeline.sampling_iterations,
        )
        .with_reporter(reporter.clone());
        tasks.push(tokio::task::spawn_blocking(move || worker.run()));
    }
    drop(handle);

    let mut reports = Vec::with_capacity(tasks.len());
    for (rank, task) in tasks.into_iter().enumerate() {
        let worker = rank + 1;
        let report = match task.await {
            Ok(report) => report,
            Err(e) => {
                error!(worker, "Worker thread failed: {}", e);
                WorkerReport {
                    worker,
                    outcomes: Vec::new(),
                    error: Some(EngineError::WorkerAborted {
                        worker,
                        message: e.to_string(),
                    }),
                }
            }
        };
        reports.push(report);
    }

    let coordinator_stats = server
        .await
        .map_err(|e| EngineError::Internal(format!("Coordinator task failed: {}", e)))?;
    reporter.report(Progress::TaskFinish);
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Collect and record ===
    let result = collect(shards, reports, coordinator_stats, &output_dir)?;
    info!(
        processed = result.outcomes.len(),
        completed = result.completed(),
        abandoned = result.abandoned.len(),
        "Screening complete."
    );
    Ok(result)
}

fn prepare_paths(receptor: &Path, output_dir: &Path) -> Result<(PathBuf, PathBuf), EngineError> {
    if !receptor.is_file() {
        return Err(EngineError::Initialization(format!(
            "Receptor file '{}' does not exist",
            receptor.display()
        )));
    }
    std::fs::create_dir_all(output_dir).map_err(|e| {
        EngineError::Initialization(format!(
            "Cannot create output directory '{}': {}",
            output_dir.display(),
            e
        ))
    })?;

    // Stage programs run inside each candidate's directory, so both paths must be absolute.
    let absolute = |path: &Path| {
        path.canonicalize().map_err(|e| {
            EngineError::Initialization(format!("Cannot resolve '{}': {}", path.display(), e))
        })
    };
    Ok((absolute(receptor)?, absolute(output_dir)?))
}

fn collect(
    shards: Vec<Vec<Candidate>>,
    reports: Vec<WorkerReport>,
    coordinator_stats: CoordinatorStats,
    output_dir: &Path,
) -> Result<ScreeningResult, EngineError> {
    let mut outcomes = Vec::new();
    let mut abandoned = Vec::new();
    let mut worker_errors = Vec::new();
    let mut rows = Vec::new();

    for (shard, report) in shards.into_iter().zip(reports) {
        let processed = report.outcomes.len();
        rows.extend(report.outcomes.iter().map(summary_row));

        if let Some(err) = report.error {
            warn!(
                worker = report.worker,
                abandoned = shard.len() - processed,
                "Worker did not finish its shard: {}",
                err
            );
            for candidate in &shard[processed..] {
                rows.push(SummaryRow {
                    name: candidate.name.clone(),
                    smiles: candidate.smiles.clone(),
                    error: format!("abandoned: {}", err),
                    ..Default::default()
                });
            }
            abandoned.extend_from_slice(&shard[processed..]);
            worker_errors.push((report.worker, err));
        }
        outcomes.extend(report.outcomes);
    }

    let summary_path = output_dir.join(SUMMARY_FILE_NAME);
    summary::write_summary(&summary_path, &rows)?;

    Ok(ScreeningResult {
        outcomes,
        abandoned,
        worker_errors,
        coordinator_stats,
        summary_path,
    })
}

fn summary_row(outcome: &CandidateOutcome) -> SummaryRow {
    let stages_run = outcome
        .stages_run
        .iter()
        .map(|s| s.name())
        .collect::<Vec<_>>()
        .join("+");
    let errors = outcome
        .failures
        .iter()
        .map(|(_, message)| message.as_str())
        .collect::<Vec<_>>()
        .join("; ");

    SummaryRow {
        name: outcome.candidate.name.clone(),
        smiles: outcome.candidate.smiles.clone(),
        stages_run,
        stopped_before: outcome
            .stopped_before
            .map(|s| s.name().to_string())
            .unwrap_or_default(),
        dock: score_cell(outcome.report.score(Stage::Dock)),
        minimize: score_cell(outcome.report.score(Stage::Minimize)),
        mmgbsa: score_cell(outcome.sample.map(|e| e.value)),
        mmgbsa_uncertainty: score_cell(outcome.sample.map(|e| e.uncertainty)),
        error: errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::metrics::MetricsRecord;
    use crate::core::models::report::{Estimate, StageReport};
    use crate::engine::config::ScreeningConfigBuilder;
    use crate::engine::error::StageError;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::{TempDir, tempdir};

    /// Counts calls per stage and SMILES. Docking fails for SMILES listed in `fail_dock`.
    #[derive(Default)]
    struct StubExecutor {
        calls: Mutex<HashMap<(String, Stage), usize>>,
        fail_dock: Vec<&'static str>,
        events: Option<Arc<Mutex<Vec<String>>>>,
    }

    impl StubExecutor {
        fn count(&self, smiles: &str, stage: Stage) {
            *self
                .calls
                .lock()
                .unwrap()
                .entry((smiles.to_string(), stage))
                .or_default() += 1;
            if let Some(events) = &self.events {
                events
                    .lock()
                    .unwrap()
                    .push(format!("{} run {}", smiles, stage));
            }
        }

        fn calls_for(&self, smiles: &str, stage: Stage) -> usize {
            self.calls
                .lock()
                .unwrap()
                .get(&(smiles.to_string(), stage))
                .copied()
                .unwrap_or(0)
        }

        fn smiles_in(work_dir: &Path) -> String {
            std::fs::read_to_string(work_dir.join("smiles.txt")).unwrap()
        }
    }

    impl StageExecutor for StubExecutor {
        fn dock(&self, smiles: &str, receptor: &Path, work_dir: &Path) -> Result<f64, StageError> {
            assert!(receptor.is_absolute());
            self.count(smiles, Stage::Dock);
            std::fs::write(work_dir.join("smiles.txt"), smiles).unwrap();
            if self.fail_dock.contains(&smiles) {
                return Err(StageError::Failed {
                    stage: Stage::Dock,
                    message: "no pose found".into(),
                });
            }
            Ok(-(smiles.len() as f64))
        }
        fn minimize(&self, work_dir: &Path) -> Result<f64, StageError> {
            self.count(&Self::smiles_in(work_dir), Stage::Minimize);
            Ok(-50.0)
        }
        fn sample(&self, work_dir: &Path, _: usize) -> Result<Estimate, StageError> {
            self.count(&Self::smiles_in(work_dir), Stage::Sample);
            Ok(Estimate::new(-20.0, 1.5))
        }
    }

    struct Fixture {
        dir: TempDir,
        config: ScreeningConfig,
    }

    fn fixture(workers: usize) -> Fixture {
        let dir = tempdir().unwrap();
        let receptor = dir.path().join("receptor.pdb");
        std::fs::write(&receptor, "ATOM\n").unwrap();
        let config = ScreeningConfigBuilder::new()
            .receptor_path(receptor)
            .output_dir(dir.path().join("out"))
            .workers(workers)
            .channel_capacity(2)
            .build()
            .unwrap();
        Fixture { dir, config }
    }

    fn candidates(entries: &[(&str, &str)]) -> Vec<Candidate> {
        entries
            .iter()
            .enumerate()
            .map(|(i, (name, smiles))| Candidate::new(i, *name, *smiles))
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn three_candidate_scenario() {
        let fx = fixture(2);
        let executor = Arc::new(StubExecutor::default());
        let oracle = |stage: Stage, report: &StageReport| match report.smiles() {
            "CCA" => stage == Stage::Dock,
            "CCB" => false,
            _ => true,
        };
        let input = candidates(&[("A", "CCA"), ("B", "CCB"), ("C", "CCC")]);

        let result = run(input, executor.clone(), oracle, &fx.config, &ProgressReporter::new())
            .await
            .unwrap();

        assert_eq!(executor.calls_for("CCA", Stage::Dock), 1);
        assert_eq!(executor.calls_for("CCA", Stage::Minimize), 0);
        assert_eq!(executor.calls_for("CCB", Stage::Dock), 0);
        for stage in Stage::ALL {
            assert_eq!(executor.calls_for("CCC", stage), 1);
        }

        let names: Vec<_> = result.outcomes.iter().map(|o| o.candidate.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(result.outcomes[0].stages_run, vec![Stage::Dock]);
        assert_eq!(result.outcomes[1].stopped_before, Some(Stage::Dock));
        assert!(result.outcomes[2].completed());

        let out = fx.dir.path().join("out");
        let a = MetricsRecord::read_from_dir(&out.join("000000_A")).unwrap();
        assert_eq!(a.headers(), ["Dock", "Dock_U"]);
        assert_eq!(a.get_f64("Dock"), Some(-3.0));
        assert!(!out.join("000001_B").exists());
        let c = MetricsRecord::read_from_dir(&out.join("000002_C")).unwrap();
        assert_eq!(
            c.headers(),
            ["Dock", "Dock_U", "Minimize", "Minimize_U", "mmgbsa", "mmgbsa_U"]
        );
        assert_eq!(c.get_f64("mmgbsa_U"), Some(1.5));

        let stats = &result.coordinator_stats;
        assert_eq!(stats.requests, 6);
        assert_eq!(stats.stopped(Stage::Dock), 1);
        assert_eq!(stats.stopped(Stage::Minimize), 1);
        assert_eq!(stats.continued(Stage::Sample), 1);
        assert_eq!(stats.protocol_violations, 0);

        let table = std::fs::read_to_string(&result.summary_path).unwrap();
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "A,CCA,dock,minimize,-3,,,,");
        assert_eq!(lines[2], "B,CCB,,dock,,,,,");
        assert_eq!(lines[3], "C,CCC,dock+minimize+sample,,-3,-50,-20,1.5,");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn rescreening_into_the_same_output_starts_fresh_metrics() {
        let fx = fixture(1);
        let executor = Arc::new(StubExecutor::default());
        let input = candidates(&[("a", "CCO")]);

        for _ in 0..2 {
            let result = run(
                input.clone(),
                executor.clone(),
                |_: Stage, _: &StageReport| true,
                &fx.config,
                &ProgressReporter::new(),
            )
            .await
            .unwrap();
            assert_eq!(result.completed(), 1);
        }

        let record = MetricsRecord::read_from_dir(&fx.dir.path().join("out").join("000000_a")).unwrap();
        assert_eq!(
            record.headers(),
            ["Dock", "Dock_U", "Minimize", "Minimize_U", "mmgbsa", "mmgbsa_U"]
        );
        assert_eq!(record.values(), ["-3", "0", "-50", "0", "-20", "1.5"]);
        assert_eq!(executor.calls_for("CCO", Stage::Dock), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn requests_per_candidate_grow_by_one() {
        let fx = fixture(3);
        let executor = Arc::new(StubExecutor::default());
        let seen: Arc<Mutex<HashMap<String, Vec<usize>>>> = Arc::default();
        let log = seen.clone();
        let oracle = move |_: Stage, report: &StageReport| {
            log.lock()
                .unwrap()
                .entry(report.smiles().to_string())
                .or_default()
                .push(report.wire_len());
            report.smiles().len() % 2 == 0 || report.wire_len() < 2
        };
        let input = candidates(&[
            ("a", "CC"),
            ("b", "CCC"),
            ("c", "CCCC"),
            ("d", "CCCCC"),
            ("e", "CCCCCC"),
        ]);

        let result = run(input, executor, oracle, &fx.config, &ProgressReporter::new())
            .await
            .unwrap();
        assert!(result.worker_errors.is_empty());

        for (smiles, lengths) in seen.lock().unwrap().iter() {
            let expected: Vec<usize> = if smiles.len() % 2 == 0 {
                vec![1, 2, 3]
            } else {
                vec![1, 2]
            };
            assert_eq!(lengths, &expected, "lengths for {}", smiles);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn gates_and_stage_runs_strictly_alternate_per_candidate() {
        let fx = fixture(2);
        let events = Arc::new(Mutex::new(Vec::new()));
        let executor = Arc::new(StubExecutor {
            events: Some(events.clone()),
            ..Default::default()
        });
        let log = events.clone();
        let oracle = move |stage: Stage, report: &StageReport| {
            log.lock()
                .unwrap()
                .push(format!("{} gate {}", report.smiles(), stage));
            true
        };
        let input = candidates(&[("a", "C"), ("b", "CC"), ("c", "CCC"), ("d", "CCCC")]);

        let result = run(input, executor, oracle, &fx.config, &ProgressReporter::new())
            .await
            .unwrap();
        assert_eq!(result.coordinator_stats.requests, 12);
        assert_eq!(result.completed(), 4);

        let events = events.lock().unwrap();
        for smiles in ["C", "CC", "CCC", "CCCC"] {
            let prefix = format!("{} ", smiles);
            let own: Vec<_> = events
                .iter()
                .filter(|e| e.starts_with(&prefix))
                .map(|e| &e[prefix.len()..])
                .collect();
            assert_eq!(
                own,
                vec![
                    "gate dock",
                    "run dock",
                    "gate minimize",
                    "run minimize",
                    "gate sample",
                    "run sample"
                ]
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failed_stages_are_forwarded_to_the_oracle() {
        let fx = fixture(1);
        let executor = Arc::new(StubExecutor {
            fail_dock: vec!["CCO"],
            ..Default::default()
        });
        let forwarded = Arc::new(Mutex::new(Vec::new()));
        let log = forwarded.clone();
        let oracle = move |stage: Stage, report: &StageReport| {
            if stage == Stage::Minimize {
                log.lock().unwrap().push(report.scores()[0]);
                return false;
            }
            true
        };
        let input = candidates(&[("x", "CCO"), ("y", "CN")]);
        let result = run(input, executor, oracle, &fx.config, &ProgressReporter::new())
            .await
            .unwrap();

        let scores = forwarded.lock().unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores[0].is_nan());
        assert_eq!(scores[1], -2.0);
        assert_eq!(result.outcomes[0].failures.len(), 1);
        assert!(result.outcomes[1].failures.is_empty());

        let record = MetricsRecord::read_from_dir(&fx.dir.path().join("out/000000_x")).unwrap();
        assert_eq!(record.values(), ["NA", "NA"]);
        let table = std::fs::read_to_string(&result.summary_path).unwrap();
        assert!(table.contains("x,CCO,dock,minimize,NA,,,,Stage 'dock' failed: no pose found"));
    }

    #[tokio::test]
    async fn missing_receptor_is_fatal_before_any_work() {
        let fx = fixture(2);
        let mut config = fx.config.clone();
        config.receptor_path = fx.dir.path().join("absent.pdb");
        let executor = Arc::new(StubExecutor::default());

        let err = run(
            candidates(&[("a", "C")]),
            executor.clone(),
            |_: Stage, _: &StageReport| true,
            &config,
            &ProgressReporter::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, EngineError::Initialization(_)));
        assert_eq!(executor.calls_for("C", Stage::Dock), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn workspace_failure_only_stops_its_own_worker() {
        let fx = fixture(2);
        let out = fx.dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        // A plain file where the first candidate's directory should go.
        std::fs::write(out.join("000000_a"), "").unwrap();

        let input = candidates(&[("a", "C"), ("b", "CC"), ("c", "CCC"), ("d", "CCCC")]);
        let result = run(
            input,
            Arc::new(StubExecutor::default()),
            |_: Stage, _: &StageReport| true,
            &fx.config,
            &ProgressReporter::new(),
        )
        .await
        .unwrap();

        assert_eq!(result.worker_errors.len(), 1);
        assert_eq!(result.worker_errors[0].0, 1);
        let abandoned: Vec<_> = result.abandoned.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(abandoned, vec!["a", "b"]);
        let done: Vec<_> = result.outcomes.iter().map(|o| o.candidate.name.as_str()).collect();
        assert_eq!(done, vec!["c", "d"]);
        assert_eq!(result.completed(), 2);

        let table = std::fs::read_to_string(&result.summary_path).unwrap();
        assert!(table.lines().any(|l| l.starts_with("a,C,,,,,,,abandoned:")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn progress_events_track_candidates_and_gates() {
        let fx = fixture(2);
        let increments = Arc::new(AtomicUsize::new(0));
        let gates = Arc::new(AtomicUsize::new(0));
        let (inc, gate) = (increments.clone(), gates.clone());
        let reporter = ProgressReporter::with_callback(Arc::new(move |event: Progress| match event {
            Progress::TaskIncrement => {
                inc.fetch_add(1, Ordering::SeqCst);
            }
            Progress::Gate { .. } => {
                gate.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }));

        run(
            candidates(&[("a", "C"), ("b", "CC"), ("c", "CCC")]),
            Arc::new(StubExecutor::default()),
            |stage: Stage, _: &StageReport| stage != Stage::Sample,
            &fx.config,
            &reporter,
        )
        .await
        .unwrap();

        assert_eq!(increments.load(Ordering::SeqCst), 3);
        assert_eq!(gates.load(Ordering::SeqCst), 9);
    }
}

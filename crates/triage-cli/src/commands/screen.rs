use super::load_candidates;
use crate::cli::ScreenArgs;
use crate::config::PartialAppConfig;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use ligand_triage::core::models::report::Stage;
use ligand_triage::engine::progress::ProgressReporter;
use ligand_triage::workflows;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn run(args: ScreenArgs, threads: Option<usize>) -> Result<()> {
    let partial_config = PartialAppConfig::load(args.input.config.as_deref())?;
    info!("Merging configuration from file and CLI arguments...");
    let plan = partial_config.merge_screen(&args, threads)?;

    let candidates = load_candidates(&args.input)?;
    println!(
        "Screening {} candidate(s) with {} worker(s)...",
        candidates.len(),
        plan.screening.pipeline.workers
    );

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    info!("Invoking the gated screening workflow...");
    let result = workflows::screen::run(
        candidates,
        Arc::new(plan.executor),
        plan.policy,
        &plan.screening,
        &reporter,
    )
    .await?;

    let stats = &result.coordinator_stats;
    println!(
        "Screening complete: {} of {} processed candidate(s) reached sampling.",
        result.completed(),
        result.outcomes.len()
    );
    for stage in Stage::ALL {
        println!(
            "  before {:<8}: {} admitted, {} stopped",
            stage.name(),
            stats.continued(stage),
            stats.stopped(stage)
        );
    }
    if stats.protocol_violations > 0 {
        warn!(
            violations = stats.protocol_violations,
            "Coordinator rejected malformed requests."
        );
    }

    for (worker, err) in &result.worker_errors {
        warn!(worker, "Worker aborted: {}", err);
        println!("Warning: worker {} stopped early: {}", worker, err);
    }
    if !result.abandoned.is_empty() {
        println!(
            "Warning: {} candidate(s) were not processed; see the summary table.",
            result.abandoned.len()
        );
    }

    println!("Summary written to: {}", result.summary_path.display());
    Ok(())
}

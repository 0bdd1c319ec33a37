use super::load_candidates;
use crate::cli::BatchArgs;
use crate::config::PartialAppConfig;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use ligand_triage::engine::progress::ProgressReporter;
use ligand_triage::workflows;
use tracing::{info, warn};

pub async fn run(args: BatchArgs, threads: Option<usize>) -> Result<()> {
    let partial_config = PartialAppConfig::load(args.input.config.as_deref())?;
    let plan = partial_config.merge_batch(&args, threads)?;

    let candidates = load_candidates(&args.input)?;
    println!(
        "Running '{}' on {} candidate(s) with {} worker(s)...",
        plan.batch.stage,
        candidates.len(),
        plan.batch.workers
    );

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    info!("Invoking the bulk batch workflow...");
    let result = tokio::task::block_in_place(|| {
        workflows::batch::run(&candidates, &plan.executor, &plan.batch, &reporter)
    })?;

    if result.failures > 0 {
        warn!(
            failures = result.failures,
            "Some candidates have no score for this stage."
        );
        println!(
            "Warning: {} of {} candidate(s) failed and are recorded as NA.",
            result.failures,
            result.rows.len()
        );
    }
    println!("Score table written to: {}", result.table_path.display());
    Ok(())
}

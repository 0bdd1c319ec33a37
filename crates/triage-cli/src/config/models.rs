use ligand_triage::engine::config::{BatchConfig, ScreeningConfig};
use ligand_triage::engine::executor::CommandExecutor;
use ligand_triage::engine::policy::ThresholdPolicy;

/// Everything the `screen` command needs once file, CLI and `--set` values are merged.
pub struct ScreenPlan {
    pub screening: ScreeningConfig,
    pub executor: CommandExecutor,
    pub policy: ThresholdPolicy,
}

pub struct BatchPlan {
    pub batch: BatchConfig,
    pub executor: CommandExecutor,
}

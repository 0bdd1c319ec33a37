use ligand_triage::engine::config::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_SAMPLING_ITERATIONS};
use std::num::NonZeroUsize;

pub struct DefaultsConfig {
    pub workers: usize,
    pub sampling_iterations: usize,
    pub channel_capacity: usize,
    pub accept_failed_scores: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            sampling_iterations: DEFAULT_SAMPLING_ITERATIONS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            accept_failed_scores: false,
        }
    }
}

use crate::core::models::report::Stage;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;
pub const DEFAULT_SAMPLING_ITERATIONS: usize = 1000;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Number of parallel workers, each owning one shard.
    pub workers: usize,
    /// Capacity of the coordinator's request queue.
    pub channel_capacity: usize,
    /// Iterations handed to the sampling stage.
    pub sampling_iterations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningConfig {
    pub receptor_path: PathBuf,
    pub output_dir: PathBuf,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    pub receptor_path: PathBuf,
    pub output_dir: PathBuf,
    pub stage: Stage,
    pub workers: usize,
    pub sampling_iterations: usize,
}

fn require_positive(parameter: &'static str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            parameter,
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(value)
}

#[derive(Default)]
pub struct ScreeningConfigBuilder {
    receptor_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    workers: Option<usize>,
    channel_capacity: Option<usize>,
    sampling_iterations: Option<usize>,
}

impl ScreeningConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receptor_path(mut self, path: PathBuf) -> Self {
        self.receptor_path = Some(path);
        self
    }
    pub fn output_dir(mut self, path: PathBuf) -> Self {
        self.output_dir = Some(path);
        self
    }
    pub fn workers(mut self, n: usize) -> Self {
        self.workers = Some(n);
        self
    }
    pub fn channel_capacity(mut self, n: usize) -> Self {
        self.channel_capacity = Some(n);
        self
    }
    pub fn sampling_iterations(mut self, n: usize) -> Self {
        self.sampling_iterations = Some(n);
        self
    }

    pub fn build(self) -> Result<ScreeningConfig, ConfigError> {
        let pipeline = PipelineConfig {
            workers: require_positive(
                "workers",
                self.workers.ok_or(ConfigError::MissingParameter("workers"))?,
            )?,
            channel_capacity: require_positive(
                "channel_capacity",
                self.channel_capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY),
            )?,
            sampling_iterations: require_positive(
                "sampling_iterations",
                self.sampling_iterations
                    .unwrap_or(DEFAULT_SAMPLING_ITERATIONS),
            )?,
        };
        Ok(ScreeningConfig {
            receptor_path: self
                .receptor_path
                .ok_or(ConfigError::MissingParameter("receptor_path"))?,
            output_dir: self
                .output_dir
                .ok_or(ConfigError::MissingParameter("output_dir"))?,
            pipeline,
        })
    }
}

#[derive(Default)]
pub struct BatchConfigBuilder {
    receptor_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    stage: Option<Stage>,
    workers: Option<usize>,
    sampling_iterations: Option<usize>,
}

impl BatchConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receptor_path(mut self, path: PathBuf) -> Self {
        self.receptor_path = Some(path);
        self
    }
    pub fn output_dir(mut self, path: PathBuf) -> Self {
        self.output_dir = Some(path);
        self
    }
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }
    pub fn workers(mut self, n: usize) -> Self {
        self.workers = Some(n);
        self
    }
    pub fn sampling_iterations(mut self, n: usize) -> Self {
        self.sampling_iterations = Some(n);
        self
    }

    pub fn build(self) -> Result<BatchConfig, ConfigError> {
        Ok(BatchConfig {
            receptor_path: self
                .receptor_path
                .ok_or(ConfigError::MissingParameter("receptor_path"))?,
            output_dir: self
                .output_dir
                .ok_or(ConfigError::MissingParameter("output_dir"))?,
            stage: self.stage.unwrap_or(Stage::Dock),
            workers: require_positive(
                "workers",
                self.workers.ok_or(ConfigError::MissingParameter("workers"))?,
            )?,
            sampling_iterations: require_positive(
                "sampling_iterations",
                self.sampling_iterations
                    .unwrap_or(DEFAULT_SAMPLING_ITERATIONS),
            )?,
        })
    }
}

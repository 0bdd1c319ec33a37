mod defaults;
mod models;

pub use models::{BatchPlan, ScreenPlan};

use crate::cli::{BatchArgs, InputArgs, ScreenArgs};
use crate::error::{CliError, Result};
use defaults::DefaultsConfig;
use ligand_triage::core::models::report::Stage;
use ligand_triage::engine::config as core_config;
use ligand_triage::engine::executor::{CommandExecutor, CommandSpec};
use ligand_triage::engine::policy::ThresholdPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct PartialCommandConfig {
    program: Option<PathBuf>,
    args: Option<Vec<String>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialEnginesConfig {
    dock: Option<PartialCommandConfig>,
    minimize: Option<PartialCommandConfig>,
    sample: Option<PartialCommandConfig>,
}

impl PartialEnginesConfig {
    fn slot(&mut self, stage: Stage) -> &mut Option<PartialCommandConfig> {
        match stage {
            Stage::Dock => &mut self.dock,
            Stage::Minimize => &mut self.minimize,
            Stage::Sample => &mut self.sample,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialPolicyConfig {
    #[serde(rename = "max-smiles-length")]
    max_smiles_length: Option<usize>,
    #[serde(rename = "max-dock-score")]
    max_dock_score: Option<f64>,
    #[serde(rename = "max-minimize-score")]
    max_minimize_score: Option<f64>,
    #[serde(rename = "accept-failed-scores")]
    accept_failed_scores: Option<bool>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialPipelineConfig {
    workers: Option<usize>,
    #[serde(rename = "sampling-iterations")]
    sampling_iterations: Option<usize>,
    #[serde(rename = "channel-capacity")]
    channel_capacity: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialAppConfig {
    engines: Option<PartialEnginesConfig>,
    policy: Option<PartialPolicyConfig>,
    pipeline: Option<PartialPipelineConfig>,
}

impl PartialAppConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Loads `path` if given, otherwise starts from an empty configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn merge_screen(mut self, args: &ScreenArgs, threads: Option<usize>) -> Result<ScreenPlan> {
        self.apply_set_values(&args.input.set_values)?;
        let defaults = DefaultsConfig::default();

        let mut engines = self.engines.take().unwrap_or_default();
        let mut executor = CommandExecutor::default();
        for stage in Stage::ALL {
            let spec = Self::command_spec(stage, engines.slot(stage).take())?.ok_or_else(|| {
                CliError::Config(format!(
                    "`engines.{}.program` is required for screening.",
                    stage.name()
                ))
            })?;
            executor = executor.with_program(stage, spec);
        }

        let policy_file = self.policy.take().unwrap_or_default();
        let policy = ThresholdPolicy {
            max_smiles_length: policy_file.max_smiles_length,
            max_dock_score: policy_file.max_dock_score,
            max_minimize_score: policy_file.max_minimize_score,
            accept_failed_scores: args.accept_failed_scores
                || policy_file
                    .accept_failed_scores
                    .unwrap_or(defaults.accept_failed_scores),
        };

        let pipeline = self.pipeline.take().unwrap_or_default();
        let screening = core_config::ScreeningConfigBuilder::new()
            .receptor_path(args.input.receptor.clone())
            .output_dir(args.input.output.clone())
            .workers(threads.or(pipeline.workers).unwrap_or(defaults.workers))
            .channel_capacity(
                pipeline
                    .channel_capacity
                    .unwrap_or(defaults.channel_capacity),
            )
            .sampling_iterations(
                args.sampling_iterations
                    .or(pipeline.sampling_iterations)
                    .unwrap_or(defaults.sampling_iterations),
            )
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        Ok(ScreenPlan {
            screening,
            executor,
            policy,
        })
    }

    pub fn merge_batch(mut self, args: &BatchArgs, threads: Option<usize>) -> Result<BatchPlan> {
        self.apply_set_values(&args.input.set_values)?;
        let defaults = DefaultsConfig::default();

        let mut engines = self.engines.take().unwrap_or_default();
        let spec = Self::command_spec(args.stage, engines.slot(args.stage).take())?.ok_or_else(
            || {
                CliError::Config(format!(
                    "`engines.{}.program` is required to run the '{}' stage.",
                    args.stage.name(),
                    args.stage
                ))
            },
        )?;
        let executor = CommandExecutor::default().with_program(args.stage, spec);

        let pipeline = self.pipeline.take().unwrap_or_default();
        let batch = core_config::BatchConfigBuilder::new()
            .receptor_path(args.input.receptor.clone())
            .output_dir(args.input.output.clone())
            .stage(args.stage)
            .workers(threads.or(pipeline.workers).unwrap_or(defaults.workers))
            .sampling_iterations(
                args.sampling_iterations
                    .or(pipeline.sampling_iterations)
                    .unwrap_or(defaults.sampling_iterations),
            )
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        Ok(BatchPlan { batch, executor })
    }

    fn command_spec(
        stage: Stage,
        partial: Option<PartialCommandConfig>,
    ) -> Result<Option<CommandSpec>> {
        let Some(partial) = partial else {
            return Ok(None);
        };
        let program = partial.program.ok_or_else(|| {
            CliError::Config(format!(
                "`engines.{}` requires `program`.",
                stage.name()
            ))
        })?;
        // Programs run inside each candidate's directory, so relative paths are pinned here.
        let program = if program.is_relative() && program.components().count() > 1 {
            std::path::absolute(&program)?
        } else {
            program
        };
        Ok(Some(CommandSpec::new(
            program,
            partial.args.unwrap_or_default(),
        )))
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value_str)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };

            match key {
                "policy.max-smiles-length" => {
                    self.policy
                        .get_or_insert_with(Default::default)
                        .max_smiles_length = Some(parse_value(key, value_str)?);
                }
                "policy.max-dock-score" => {
                    self.policy
                        .get_or_insert_with(Default::default)
                        .max_dock_score = Some(parse_value(key, value_str)?);
                }
                "policy.max-minimize-score" => {
                    self.policy
                        .get_or_insert_with(Default::default)
                        .max_minimize_score = Some(parse_value(key, value_str)?);
                }
                "policy.accept-failed-scores" => {
                    self.policy
                        .get_or_insert_with(Default::default)
                        .accept_failed_scores = Some(parse_value(key, value_str)?);
                }
                "pipeline.workers" => {
                    self.pipeline.get_or_insert_with(Default::default).workers =
                        Some(parse_value(key, value_str)?);
                }
                "pipeline.sampling-iterations" => {
                    self.pipeline
                        .get_or_insert_with(Default::default)
                        .sampling_iterations = Some(parse_value(key, value_str)?);
                }
                "pipeline.channel-capacity" => {
                    self.pipeline
                        .get_or_insert_with(Default::default)
                        .channel_capacity = Some(parse_value(key, value_str)?);
                }
                _ => {
                    let program_of = key
                        .strip_prefix("engines.")
                        .and_then(|rest| rest.strip_suffix(".program"))
                        .and_then(|stage| stage.parse::<Stage>().ok());
                    let Some(stage) = program_of else {
                        return Err(CliError::Config(format!(
                            "Unsupported configuration key for --set: '{}'",
                            key
                        )));
                    };
                    self.engines
                        .get_or_insert_with(Default::default)
                        .slot(stage)
                        .get_or_insert_with(Default::default)
                        .program = Some(PathBuf::from(value_str));
                }
            }
        }
        Ok(())
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        CliError::Config(format!(
            "Invalid {} value for {}: {}",
            std::any::type_name::<T>(),
            key,
            value
        ))
    })
}

/// Converts the ligand-list options of `args` into reader options.
pub fn ligand_list_options(
    args: &InputArgs,
) -> Result<ligand_triage::core::io::ligands::LigandListOptions> {
    if !args.delimiter.is_ascii() {
        return Err(CliError::Argument(format!(
            "Delimiter must be a single ASCII character, got '{}'",
            args.delimiter
        )));
    }
    Ok(ligand_triage::core::io::ligands::LigandListOptions {
        has_header: args.header,
        delimiter: args.delimiter as u8,
        limit: args.limit,
    })
}

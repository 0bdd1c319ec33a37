use super::error::StageError;
use crate::core::models::report::{Estimate, Stage};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, trace};

/// The chemistry engines behind each funnel stage.
///
/// Implementations may block for hours and may fail. Each call is treated as atomic: it runs to
/// completion or returns an error, there is no mid-stage cancellation.
pub trait StageExecutor: Send + Sync {
    /// Docks `smiles` into the receptor, writing poses under `work_dir`. Returns the best dock score.
    fn dock(&self, smiles: &str, receptor: &Path, work_dir: &Path) -> Result<f64, StageError>;

    /// Parameterizes the docked complex in `work_dir` and minimizes it. Returns the minimized
    /// interaction energy.
    fn minimize(&self, work_dir: &Path) -> Result<f64, StageError>;

    /// Runs free-energy sampling (MMGBSA) on the minimized complex in `work_dir`.
    fn sample(&self, work_dir: &Path, iterations: usize) -> Result<Estimate, StageError>;

    /// Runs `stage` with the candidate's full context.
    ///
    /// The default dispatches to the per-stage methods. Executors that need context the
    /// per-stage signatures do not carry override this instead.
    fn execute(&self, stage: Stage, ctx: StageContext<'_>) -> Result<Estimate, StageError> {
        match stage {
            Stage::Dock => self
                .dock(ctx.smiles, ctx.receptor, ctx.work_dir)
                .map(|score| Estimate::new(score, 0.0)),
            Stage::Minimize => self
                .minimize(ctx.work_dir)
                .map(|score| Estimate::new(score, 0.0)),
            Stage::Sample => self.sample(ctx.work_dir, ctx.sampling_iterations),
        }
    }
}

/// Everything a stage needs to know about the candidate it is running on.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub smiles: &'a str,
    pub receptor: &'a Path,
    pub work_dir: &'a Path,
    pub sampling_iterations: usize,
}

/// Runs one stage through `executor`, converting panics into [`StageError::Panicked`].
///
/// Docking and minimization produce a bare score; it is reported with zero uncertainty.
pub fn run_stage<E>(executor: &E, stage: Stage, ctx: StageContext<'_>) -> Result<Estimate, StageError>
where
    E: StageExecutor + ?Sized,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| executor.execute(stage, ctx)));

    match outcome {
        Ok(result) => result,
        Err(payload) => Err(StageError::Panicked {
            stage,
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// An external program invocation. Arguments may reference `{smiles}`, `{receptor}`,
/// `{workdir}` and `{iterations}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn expand_args(&self, ctx: &StageContext<'_>) -> Vec<String> {
        let iterations = ctx.sampling_iterations.to_string();
        let receptor = ctx.receptor.to_string_lossy();
        let work_dir = ctx.work_dir.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{smiles}", ctx.smiles)
                    .replace("{receptor}", &receptor)
                    .replace("{workdir}", &work_dir)
                    .replace("{iterations}", &iterations)
            })
            .collect()
    }
}

/// A [`StageExecutor`] that delegates every stage to an external program.
///
/// Each program runs with the candidate's work directory as its current directory. The last
/// non-empty line of its standard output is the result: one number for docking and
/// minimization, value and uncertainty for sampling. A stage without a configured program fails
/// for every candidate.
#[derive(Debug, Clone, Default)]
pub struct CommandExecutor {
    programs: [Option<CommandSpec>; 3],
}

impl CommandExecutor {
    pub fn new(dock: CommandSpec, minimize: CommandSpec, sample: CommandSpec) -> Self {
        Self {
            programs: [Some(dock), Some(minimize), Some(sample)],
        }
    }

    pub fn with_program(mut self, stage: Stage, spec: CommandSpec) -> Self {
        self.programs[stage.index()] = Some(spec);
        self
    }

    pub fn program(&self, stage: Stage) -> Option<&CommandSpec> {
        self.programs[stage.index()].as_ref()
    }

    fn invoke(&self, stage: Stage, ctx: StageContext<'_>) -> Result<Vec<f64>, StageError> {
        let spec = self.program(stage).ok_or_else(|| StageError::Failed {
            stage,
            message: "no program configured".to_string(),
        })?;
        let args = spec.expand_args(&ctx);
        debug!(%stage, program = ?spec.program, ?args, "Launching stage program.");

        let output = Command::new(&spec.program)
            .args(&args)
            .current_dir(ctx.work_dir)
            .output()
            .map_err(|source| StageError::Io { stage, source })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StageError::Failed {
                stage,
                message: format!("{} ({})", output.status, stderr.trim()),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        trace!(%stage, %stdout, "Stage program finished.");
        parse_numbers(stage, &stdout)
    }
}

fn parse_numbers(stage: Stage, stdout: &str) -> Result<Vec<f64>, StageError> {
    let invalid = || StageError::InvalidOutput {
        stage,
        output: stdout.trim().to_string(),
    };
    let line = stdout
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .ok_or_else(invalid)?;

    line.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<f64>().map_err(|_| invalid()))
        .collect()
}

/// Called directly, the per-stage methods only know what their signatures carry; placeholders
/// for anything else expand to an empty string (or `0` for `{iterations}`). [`run_stage`] goes
/// through [`StageExecutor::execute`] and always expands the full context.
impl StageExecutor for CommandExecutor {
    fn dock(&self, smiles: &str, receptor: &Path, work_dir: &Path) -> Result<f64, StageError> {
        let ctx = StageContext {
            smiles,
            receptor,
            work_dir,
            sampling_iterations: 0,
        };
        self.execute(Stage::Dock, ctx).map(|estimate| estimate.value)
    }

    fn minimize(&self, work_dir: &Path) -> Result<f64, StageError> {
        let ctx = StageContext {
            smiles: "",
            receptor: Path::new(""),
            work_dir,
            sampling_iterations: 0,
        };
        self.execute(Stage::Minimize, ctx)
            .map(|estimate| estimate.value)
    }

    fn sample(&self, work_dir: &Path, iterations: usize) -> Result<Estimate, StageError> {
        let ctx = StageContext {
            smiles: "",
            receptor: Path::new(""),
            work_dir,
            sampling_iterations: iterations,
        };
        self.execute(Stage::Sample, ctx)
    }

    fn execute(&self, stage: Stage, ctx: StageContext<'_>) -> Result<Estimate, StageError> {
        let values = self.invoke(stage, ctx)?;
        match stage {
            Stage::Dock | Stage::Minimize => {
                first_value(stage, &values).map(|score| Estimate::new(score, 0.0))
            }
            Stage::Sample => match values.as_slice() {
                [value, uncertainty, ..] => Ok(Estimate::new(*value, *uncertainty)),
                _ => Err(StageError::InvalidOutput {
                    stage,
                    output: format!("expected 'energy uncertainty', got {:?}", values),
                }),
            },
        }
    }
}

fn first_value(stage: Stage, values: &[f64]) -> Result<f64, StageError> {
    values.first().copied().ok_or_else(|| StageError::InvalidOutput {
        stage,
        output: String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct PanickingExecutor;

    impl StageExecutor for PanickingExecutor {
        fn dock(&self, _: &str, _: &Path, _: &Path) -> Result<f64, StageError> {
            panic!("engine crashed");
        }
        fn minimize(&self, _: &Path) -> Result<f64, StageError> {
            Ok(-1.0)
        }
        fn sample(&self, _: &Path, _: usize) -> Result<Estimate, StageError> {
            Ok(Estimate::new(-2.0, 0.5))
        }
    }

    fn ctx<'a>(work_dir: &'a Path) -> StageContext<'a> {
        StageContext {
            smiles: "CCO",
            receptor: Path::new("receptor.pdb"),
            work_dir,
            sampling_iterations: 250,
        }
    }

    #[test]
    fn run_stage_converts_panics_into_stage_errors() {
        let dir = tempdir().unwrap();
        let result = run_stage(&PanickingExecutor, Stage::Dock, ctx(dir.path()));
        match result {
            Err(StageError::Panicked { stage, message }) => {
                assert_eq!(stage, Stage::Dock);
                assert_eq!(message, "engine crashed");
            }
            other => panic!("expected panic conversion, got {:?}", other),
        }
    }

    #[test]
    fn run_stage_wraps_scalar_scores_with_zero_uncertainty() {
        let dir = tempdir().unwrap();
        let estimate = run_stage(&PanickingExecutor, Stage::Minimize, ctx(dir.path())).unwrap();
        assert_eq!(estimate, Estimate::new(-1.0, 0.0));
        let estimate = run_stage(&PanickingExecutor, Stage::Sample, ctx(dir.path())).unwrap();
        assert_eq!(estimate, Estimate::new(-2.0, 0.5));
    }

    #[test]
    fn placeholders_are_expanded() {
        let spec = CommandSpec::new(
            "dock.sh",
            vec![
                "--smiles={smiles}".into(),
                "{receptor}".into(),
                "-o".into(),
                "{workdir}/pose.sdf".into(),
                "-n{iterations}".into(),
            ],
        );
        let args = spec.expand_args(&ctx(Path::new("/scratch/000001_x")));
        assert_eq!(
            args,
            vec![
                "--smiles=CCO",
                "receptor.pdb",
                "-o",
                "/scratch/000001_x/pose.sdf",
                "-n250"
            ]
        );
    }

    #[test]
    fn last_non_empty_line_is_parsed() {
        let values = parse_numbers(Stage::Sample, "loading...\n-31.2 0.8\n\n").unwrap();
        assert_eq!(values, vec![-31.2, 0.8]);
        let values = parse_numbers(Stage::Dock, "-9.5,extra").unwrap_err();
        assert!(matches!(values, StageError::InvalidOutput { .. }));
        assert!(parse_numbers(Stage::Dock, "\n \n").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn command_executor_reads_program_output() {
        let dir = tempdir().unwrap();
        let executor = CommandExecutor::new(
            CommandSpec::new("sh", vec!["-c".into(), "echo docking; echo -7.25".into()]),
            CommandSpec::new("sh", vec!["-c".into(), "exit 3".into()]),
            CommandSpec::new("sh", vec!["-c".into(), "echo -40.5 {iterations}".into()]),
        );

        let score = executor
            .dock("CCO", Path::new("r.pdb"), dir.path())
            .unwrap();
        assert_eq!(score, -7.25);

        let err = executor.minimize(dir.path()).unwrap_err();
        assert!(matches!(err, StageError::Failed { stage: Stage::Minimize, .. }));

        let estimate = executor.sample(dir.path(), 12).unwrap();
        assert_eq!(estimate, Estimate::new(-40.5, 12.0));
    }

    #[cfg(unix)]
    #[test]
    fn every_stage_program_sees_the_full_candidate_context() {
        let dir = tempdir().unwrap();
        let script = |out: &str| {
            CommandSpec::new(
                "sh",
                vec![
                    "-c".into(),
                    format!(
                        "echo '{{smiles}} {{receptor}} {{workdir}} {{iterations}}' > {}; echo -1 0.5",
                        out
                    ),
                ],
            )
        };
        let executor = CommandExecutor::new(
            script("dock.args"),
            script("minimize.args"),
            script("sample.args"),
        );

        for stage in Stage::ALL {
            run_stage(&executor, stage, ctx(dir.path())).unwrap();
            let seen = std::fs::read_to_string(dir.path().join(format!("{}.args", stage))).unwrap();
            assert_eq!(
                seen.trim(),
                format!("CCO receptor.pdb {} 250", dir.path().display()),
                "placeholders for {}",
                stage
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn missing_program_is_an_io_failure() {
        let dir = tempdir().unwrap();
        let spec = CommandSpec::new("/definitely/not/a/program", vec![]);
        let executor = CommandExecutor::new(spec.clone(), spec.clone(), spec);
        let err = executor.minimize(dir.path()).unwrap_err();
        assert!(matches!(err, StageError::Io { .. }));
    }

    #[test]
    fn unconfigured_stage_fails_without_running_anything() {
        let dir = tempdir().unwrap();
        let executor = CommandExecutor::default()
            .with_program(Stage::Dock, CommandSpec::new("true", vec![]));
        assert!(executor.program(Stage::Dock).is_some());
        assert!(executor.program(Stage::Sample).is_none());

        let err = executor.sample(dir.path(), 10).unwrap_err();
        assert!(matches!(err, StageError::Failed { stage: Stage::Sample, .. }));
    }
}

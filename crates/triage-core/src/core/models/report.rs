use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One phase of the screening funnel, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Dock,
    Minimize,
    Sample,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Dock, Stage::Minimize, Stage::Sample];

    pub fn index(self) -> usize {
        match self {
            Stage::Dock => 0,
            Stage::Minimize => 1,
            Stage::Sample => 2,
        }
    }

    /// The stage gated by a report of the given wire length.
    ///
    /// A report carries the SMILES plus one score per completed stage, so a length-1
    /// report asks about docking, length 2 about minimization and length 3 about sampling.
    pub fn from_report_len(len: usize) -> Option<Stage> {
        match len {
            1 => Some(Stage::Dock),
            2 => Some(Stage::Minimize),
            3 => Some(Stage::Sample),
            _ => None,
        }
    }

    pub fn report_len(self) -> usize {
        self.index() + 1
    }

    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Dock => Some(Stage::Minimize),
            Stage::Minimize => Some(Stage::Sample),
            Stage::Sample => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Dock => "dock",
            Stage::Minimize => "minimize",
            Stage::Sample => "sample",
        }
    }

    /// Header cells this stage appends to a candidate's metrics record.
    pub fn metrics_columns(self) -> [&'static str; 2] {
        match self {
            Stage::Dock => ["Dock", "Dock_U"],
            Stage::Minimize => ["Minimize", "Minimize_U"],
            Stage::Sample => ["mmgbsa", "mmgbsa_U"],
        }
    }

    /// Score column name used in bulk result tables.
    pub fn table_column(self) -> &'static str {
        match self {
            Stage::Dock => "dock",
            Stage::Minimize => "minimize",
            Stage::Sample => "mmgbsa",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown stage '{0}'. Expected one of: dock, minimize, sample.")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dock" | "docking" => Ok(Stage::Dock),
            "minimize" | "minimization" => Ok(Stage::Minimize),
            "sample" | "mmgbsa" => Ok(Stage::Sample),
            other => Err(UnknownStage(other.to_string())),
        }
    }
}

/// The verdict of the policy service for a single gating request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Continue,
    Stop,
}

impl Decision {
    pub fn is_continue(self) -> bool {
        matches!(self, Decision::Continue)
    }

    /// Integer form used on the wire: `1` for continue, `0` for stop.
    pub fn as_int(self) -> u8 {
        match self {
            Decision::Continue => 1,
            Decision::Stop => 0,
        }
    }
}

impl From<bool> for Decision {
    fn from(proceed: bool) -> Self {
        if proceed {
            Decision::Continue
        } else {
            Decision::Stop
        }
    }
}

/// Accumulated metrics for one candidate: its SMILES followed by one score per completed stage.
///
/// Reports only ever grow, one stage at a time. A failed stage contributes `NaN` rather than
/// being skipped, so the length always identifies the stage being gated.
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    smiles: String,
    scores: Vec<f64>,
}

impl StageReport {
    pub fn new(smiles: impl Into<String>) -> Self {
        Self {
            smiles: smiles.into(),
            scores: Vec::with_capacity(Stage::ALL.len() - 1),
        }
    }

    /// Builds a report from raw parts without any shape checks. Intended for adapters that
    /// receive reports from outside the worker state machine.
    pub fn from_parts(smiles: impl Into<String>, scores: Vec<f64>) -> Self {
        Self {
            smiles: smiles.into(),
            scores,
        }
    }

    pub fn smiles(&self) -> &str {
        &self.smiles
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    /// Wire length: the SMILES plus every recorded score.
    pub fn wire_len(&self) -> usize {
        1 + self.scores.len()
    }

    /// The stage this report asks permission for, if its shape is a recognised one.
    pub fn gate(&self) -> Option<Stage> {
        Stage::from_report_len(self.wire_len())
    }

    pub fn record(&mut self, score: f64) {
        self.scores.push(score);
    }

    pub fn score(&self, stage: Stage) -> Option<f64> {
        self.scores.get(stage.index()).copied()
    }

    pub fn has_failed_score(&self) -> bool {
        self.scores.iter().any(|s| s.is_nan())
    }
}

/// A value with its statistical uncertainty, as produced by free-energy sampling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub value: f64,
    pub uncertainty: f64,
}

impl Estimate {
    pub fn new(value: f64, uncertainty: f64) -> Self {
        Self { value, uncertainty }
    }

    pub fn failed() -> Self {
        Self {
            value: f64::NAN,
            uncertainty: f64::NAN,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.value.is_nan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_length_identifies_gated_stage() {
        let mut report = StageReport::new("CCO");
        assert_eq!(report.gate(), Some(Stage::Dock));

        report.record(-7.5);
        assert_eq!(report.gate(), Some(Stage::Minimize));

        report.record(-120.0);
        assert_eq!(report.gate(), Some(Stage::Sample));
        assert_eq!(report.wire_len(), 3);
    }

    #[test]
    fn oversized_report_has_no_gate() {
        let report = StageReport::from_parts("CCO", vec![1.0, 2.0, 3.0]);
        assert_eq!(report.wire_len(), 4);
        assert_eq!(report.gate(), None);
    }

    #[test]
    fn failed_scores_are_kept_in_position() {
        let mut report = StageReport::new("CCO");
        report.record(f64::NAN);
        assert!(report.has_failed_score());
        assert_eq!(report.gate(), Some(Stage::Minimize));
        assert!(report.score(Stage::Dock).unwrap().is_nan());
        assert_eq!(report.score(Stage::Minimize), None);
    }

    #[test]
    fn stage_ordering_follows_pipeline() {
        assert!(Stage::Dock < Stage::Minimize);
        assert!(Stage::Minimize < Stage::Sample);
        assert_eq!(Stage::Dock.next(), Some(Stage::Minimize));
        assert_eq!(Stage::Sample.next(), None);
        for stage in Stage::ALL {
            assert_eq!(Stage::from_report_len(stage.report_len()), Some(stage));
        }
    }

    #[test]
    fn stage_parses_from_common_aliases() {
        assert_eq!("dock".parse::<Stage>(), Ok(Stage::Dock));
        assert_eq!(" MMGBSA ".parse::<Stage>(), Ok(Stage::Sample));
        assert_eq!("minimization".parse::<Stage>(), Ok(Stage::Minimize));
        assert!("alchemy".parse::<Stage>().is_err());
    }

    #[test]
    fn decision_encodes_as_integer() {
        assert_eq!(Decision::from(true).as_int(), 1);
        assert_eq!(Decision::from(false).as_int(), 0);
        assert!(Decision::Continue.is_continue());
        assert!(!Decision::Stop.is_continue());
    }
}

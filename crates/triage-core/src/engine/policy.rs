use crate::core::models::report::{Stage, StageReport};

/// Decides whether a candidate advances to the next, more expensive stage.
///
/// The oracle is owned by the coordinator and only ever called from its single receive loop,
/// so implementations may keep internal state without synchronization. It must always
/// terminate and should be fast relative to the chemistry it gates.
pub trait PolicyOracle: Send {
    fn decide(&mut self, stage: Stage, report: &StageReport) -> bool;
}

impl<F> PolicyOracle for F
where
    F: FnMut(Stage, &StageReport) -> bool + Send,
{
    fn decide(&mut self, stage: Stage, report: &StageReport) -> bool {
        self(stage, report)
    }
}

/// A rule-based oracle with one sub-model per gate.
///
/// - Before docking: the SMILES must not exceed `max_smiles_length` characters.
/// - Before minimization: the dock score must not exceed `max_dock_score`.
/// - Before sampling: the minimized energy must not exceed `max_minimize_score`.
///
/// A missing threshold admits everything at that gate. Reports carrying a failed (`NaN`)
/// score are admitted only when `accept_failed_scores` is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdPolicy {
    pub max_smiles_length: Option<usize>,
    pub max_dock_score: Option<f64>,
    pub max_minimize_score: Option<f64>,
    pub accept_failed_scores: bool,
}

impl ThresholdPolicy {
    fn dock_gate(&self, report: &StageReport) -> bool {
        self.max_smiles_length
            .is_none_or(|max| report.smiles().chars().count() <= max)
    }

    fn score_gate(&self, score: Option<f64>, threshold: Option<f64>) -> bool {
        match score {
            Some(s) if s.is_nan() => self.accept_failed_scores,
            Some(s) => threshold.is_none_or(|t| s <= t),
            None => false,
        }
    }
}

impl PolicyOracle for ThresholdPolicy {
    fn decide(&mut self, stage: Stage, report: &StageReport) -> bool {
        if report.has_failed_score() && !self.accept_failed_scores {
            return false;
        }
        match stage {
            Stage::Dock => self.dock_gate(report),
            Stage::Minimize => {
                self.score_gate(report.score(Stage::Dock), self.max_dock_score)
            }
            Stage::Sample => {
                self.score_gate(report.score(Stage::Minimize), self.max_minimize_score)
            }
        }
    }
}

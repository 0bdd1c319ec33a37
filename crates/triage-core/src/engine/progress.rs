use crate::core::models::report::{Decision, Stage};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    TaskStart { total_steps: u64 },
    TaskIncrement,
    TaskFinish,

    /// A gating decision was delivered for `stage`.
    Gate { stage: Stage, decision: Decision },

    Message(String),
}

pub type ProgressCallback<'a> = Arc<dyn Fn(Progress) + Send + Sync + 'a>;

/// Fan-in point for progress events.
///
/// Cloning is cheap, so every worker thread carries its own reporter that forwards to the
/// same callback.
#[derive(Default, Clone)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

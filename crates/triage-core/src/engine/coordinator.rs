use super::error::CoordinatorError;
use super::policy::PolicyOracle;
use crate::core::models::report::{Decision, Stage, StageReport};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

type Reply = Result<Decision, CoordinatorError>;

/// A gating request: "worker `worker` wants to run `stage`, here is everything measured so far".
#[derive(Debug)]
pub struct PolicyRequest {
    pub worker: usize,
    pub stage: Stage,
    pub report: StageReport,
    reply: oneshot::Sender<Reply>,
}

/// A worker's end of the request channel.
///
/// Every exchange is a blocking round trip, so a worker holding one handle can never have more
/// than one request in flight.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    worker: usize,
    sender: mpsc::Sender<PolicyRequest>,
}

impl CoordinatorHandle {
    /// A handle that identifies its requests as coming from `worker`.
    pub fn for_worker(&self, worker: usize) -> Self {
        Self {
            worker,
            sender: self.sender.clone(),
        }
    }

    pub fn worker(&self) -> usize {
        self.worker
    }

    fn package(&self, stage: Stage, report: &StageReport) -> (PolicyRequest, oneshot::Receiver<Reply>) {
        let (reply, receiver) = oneshot::channel();
        let request = PolicyRequest {
            worker: self.worker,
            stage,
            report: report.clone(),
            reply,
        };
        (request, receiver)
    }

    /// Asks for permission to run `stage`, blocking the calling thread until the decision arrives.
    ///
    /// Must not be called from within an async context; workers call it from blocking threads.
    pub fn request_blocking(&self, stage: Stage, report: &StageReport) -> Reply {
        let (request, receiver) = self.package(stage, report);
        self.sender
            .blocking_send(request)
            .map_err(|_| CoordinatorError::Closed)?;
        receiver
            .blocking_recv()
            .map_err(|_| CoordinatorError::NoReply {
                worker: self.worker,
            })?
    }

    pub async fn request(&self, stage: Stage, report: &StageReport) -> Reply {
        let (request, receiver) = self.package(stage, report);
        self.sender
            .send(request)
            .await
            .map_err(|_| CoordinatorError::Closed)?;
        receiver.await.map_err(|_| CoordinatorError::NoReply {
            worker: self.worker,
        })?
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub requests: u64,
    /// Indexed by [`Stage::index`]: `(continued, stopped)`.
    pub decisions: [(u64, u64); 3],
    pub protocol_violations: u64,
}

impl CoordinatorStats {
    pub fn continued(&self, stage: Stage) -> u64 {
        self.decisions[stage.index()].0
    }

    pub fn stopped(&self, stage: Stage) -> u64 {
        self.decisions[stage.index()].1
    }
}

/// The single serialized decision service.
///
/// Requests are evaluated strictly one at a time in arrival order, which gives every policy
/// decision of a run a single global order. The coordinator keeps no per-candidate memory: each
/// report carries the candidate's full history. It runs until every handle has been dropped.
pub struct Coordinator<P> {
    oracle: P,
    receiver: mpsc::Receiver<PolicyRequest>,
    stats: CoordinatorStats,
}

impl<P: PolicyOracle> Coordinator<P> {
    /// Creates the coordinator and the first handle to it (identified as worker 0).
    pub fn new(oracle: P, capacity: usize) -> (Self, CoordinatorHandle) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let coordinator = Self {
            oracle,
            receiver,
            stats: CoordinatorStats::default(),
        };
        (coordinator, CoordinatorHandle { worker: 0, sender })
    }

    pub async fn run(mut self) -> CoordinatorStats {
        info!("Coordinator accepting policy requests.");
        while let Some(request) = self.receiver.recv().await {
            let PolicyRequest {
                worker,
                stage,
                report,
                reply,
            } = request;

            let outcome = self.evaluate(worker, stage, &report);
            if reply.send(outcome).is_err() {
                warn!(worker, %stage, "Requester went away before the decision was delivered.");
            }
        }
        info!(
            requests = self.stats.requests,
            violations = self.stats.protocol_violations,
            "All workers disconnected; coordinator shutting down."
        );
        self.stats
    }

    /// Validates one request and consults the oracle for it.
    pub fn evaluate(&mut self, worker: usize, stage: Stage, report: &StageReport) -> Reply {
        self.stats.requests += 1;
        let sequence = self.stats.requests;

        if report.gate() != Some(stage) {
            self.stats.protocol_violations += 1;
            let violation = CoordinatorError::ProtocolViolation {
                worker,
                stage,
                report_len: report.wire_len(),
            };
            warn!(sequence, "{}", violation);
            return Err(violation);
        }

        let decision = Decision::from(self.oracle.decide(stage, report));
        let counters = &mut self.stats.decisions[stage.index()];
        if decision.is_continue() {
            counters.0 += 1;
        } else {
            counters.1 += 1;
        }

        debug!(
            sequence,
            worker,
            %stage,
            smiles = report.smiles(),
            scores = ?report.scores(),
            decision = decision.as_int(),
            "Policy decision."
        );
        Ok(decision)
    }
}

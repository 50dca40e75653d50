//! Probe scheduler module.
//!
//! Probes run on a small pool of worker tasks that drain one FIFO queue while
//! the main flow handles earlier candidates. Every submission gets its own
//! [`ProbeHandle`]; awaiting the handles in submission order yields the verdicts
//! in submission order no matter which worker finishes first.
//!
//! A queued probe can be cancelled. The transition from queued to running and
//! from queued to cancelled is a single compare-exchange on the task state, so
//! exactly one of the worker and the canceller wins.

use crate::candidate::{Candidate, ProbeVerdict};
use crate::decision::{decide, precheck, CodecTable, Decision, DecisionInput, SkipReason};
use crate::probe::{MediaProbe, ProbeError, ProbeOutcome};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

const QUEUED: u8 = 0;
const RUNNING: u8 = 1;
const CANCELLED: u8 = 2;

/// Error type for scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The worker dropped the task without producing a verdict.
    #[error("probe worker exited before replying")]
    WorkerGone,
}

/// Result of [`ProbeHandle::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The probe never started and never will.
    Cancelled,
    /// The probe was already running; its result is discarded.
    AlreadyStarted,
}

/// Inputs to the skip decision that are the same for every candidate.
#[derive(Debug, Clone)]
pub struct DecisionContext {
    pub table: CodecTable,
    pub preset: String,
    pub force: bool,
    pub tracks_selected: bool,
}

/// Probe a source (or reuse a cached probe) and decide what to do with it.
///
/// The destination is stat'ed again here since it may have appeared after the
/// scan. Probe failures become skip verdicts.
pub fn evaluate(
    probe: &dyn MediaProbe,
    ctx: &DecisionContext,
    source: &Path,
    dest: &Path,
    cached: Option<ProbeOutcome>,
) -> ProbeVerdict {
    let outcome = match cached {
        Some(outcome) => outcome,
        None => probe.probe(source),
    };
    // Stat after probing; a long probe leaves room for another run to finish
    let dest_exists = dest.exists();

    match outcome {
        Ok(info) => {
            let media = info.primary_video().cloned();
            let decision = decide(
                &DecisionInput {
                    dest_exists,
                    force: ctx.force,
                    preset: &ctx.preset,
                    video: media.as_ref(),
                    tracks_selected: ctx.tracks_selected,
                },
                &ctx.table,
            );
            ProbeVerdict { media, decision }
        }
        Err(err) => {
            debug!("Probe of '{}' failed: {}", source.display(), err);
            let reason = match (precheck(dest_exists, ctx.force), err) {
                (Some(SkipReason::AlreadyExists), _) => SkipReason::AlreadyExists,
                (_, ProbeError::NotFound(_)) => SkipReason::NotFound,
                (_, other) => SkipReason::ProbeFailed(other.to_string()),
            };
            ProbeVerdict {
                media: None,
                decision: Decision::Skip(reason),
            }
        }
    }
}

struct ProbeTask {
    source: PathBuf,
    dest: PathBuf,
    cached: Option<ProbeOutcome>,
    state: Arc<AtomicU8>,
    reply: oneshot::Sender<ProbeVerdict>,
}

/// Pending verdict for one submitted candidate.
#[derive(Debug)]
pub struct ProbeHandle {
    state: Arc<AtomicU8>,
    reply: oneshot::Receiver<ProbeVerdict>,
}

impl ProbeHandle {
    /// Cancel the probe if it has not started yet.
    pub fn cancel(self) -> CancelOutcome {
        match self
            .state
            .compare_exchange(QUEUED, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => CancelOutcome::Cancelled,
            Err(_) => CancelOutcome::AlreadyStarted,
        }
    }

    /// Wait for the verdict.
    pub async fn wait(self) -> Result<ProbeVerdict, SchedulerError> {
        self.reply.await.map_err(|_| SchedulerError::WorkerGone)
    }
}

/// Pool of probe workers fed from one FIFO queue.
pub struct ProbeScheduler {
    sender: mpsc::UnboundedSender<ProbeTask>,
    workers: Vec<JoinHandle<()>>,
}

impl ProbeScheduler {
    /// Start `workers` probe workers. Must be called inside a tokio runtime.
    pub fn new(probe: Arc<dyn MediaProbe>, ctx: DecisionContext, workers: usize) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel::<ProbeTask>();
        let receiver = Arc::new(Mutex::new(receiver));
        let ctx = Arc::new(ctx);

        let workers = (0..workers.max(1))
            .map(|id| {
                let receiver = receiver.clone();
                let probe = probe.clone();
                let ctx = ctx.clone();
                tokio::spawn(async move { run_worker(id, receiver, probe, ctx).await })
            })
            .collect();

        Self { sender, workers }
    }

    /// Queue a candidate for probing, handing over any cached probe result.
    pub fn submit(&self, candidate: &mut Candidate) -> ProbeHandle {
        let state = Arc::new(AtomicU8::new(QUEUED));
        let (reply, receiver) = oneshot::channel();

        let task = ProbeTask {
            source: candidate.source_path.clone(),
            dest: candidate.dest_path().to_path_buf(),
            cached: candidate.take_cached_probe(),
            state: state.clone(),
            reply,
        };

        // A send error means every worker is gone; the handle then reports WorkerGone
        if self.sender.send(task).is_err() {
            debug!("Probe queue closed, dropping '{}'", candidate.name());
        }

        ProbeHandle {
            state,
            reply: receiver,
        }
    }

    /// Close the queue and wait for the workers to drain it.
    pub async fn shutdown(self) {
        drop(self.sender);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn run_worker(
    id: usize,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<ProbeTask>>>,
    probe: Arc<dyn MediaProbe>,
    ctx: Arc<DecisionContext>,
) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(task) = next else {
            break;
        };

        let ProbeTask {
            source,
            dest,
            cached,
            state,
            reply,
        } = task;

        if state
            .compare_exchange(QUEUED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Probe worker {}: '{}' cancelled", id, source.display());
            continue;
        }

        let probe = probe.clone();
        let ctx = ctx.clone();
        let blocking_source = source.clone();
        let verdict = tokio::task::spawn_blocking(move || {
            evaluate(probe.as_ref(), &ctx, &blocking_source, &dest, cached)
        })
        .await
        .unwrap_or_else(|e| ProbeVerdict {
            media: None,
            decision: Decision::Skip(SkipReason::ProbeFailed(format!("probe task panicked: {}", e))),
        });

        debug!("Probe worker {}: '{}' -> {:?}", id, source.display(), verdict.decision);
        // The receiver is gone when the handle was cancelled after the task started
        let _ = reply.send(verdict);
    }
}

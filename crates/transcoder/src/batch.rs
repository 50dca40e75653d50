//! Batch runner: one pass over the input tree.
//!
//! Scans and orders candidates, submits their probes up front, then walks the
//! candidates in order. Each one is checked against its lock marker and its
//! destination, decided on from its probe verdict, and handed to the executor
//! under a lock. A stop-larger outcome ends the pass.

use crate::candidate::Candidate;
use crate::config::RunConfig;
use crate::decision::{CodecTable, SkipReason};
use crate::eta::{format_eta, EtaEstimator};
use crate::job_executor::{ExecutorConfig, JobExecutor, JobOutcome};
use crate::lock::{LockCoordinator, LockError, LockGuard};
use crate::probe::{MediaInfoProbe, MediaProbe};
use crate::scan::{order_candidates, scan_candidates, ScanError};
use crate::scheduler::{DecisionContext, ProbeHandle, ProbeScheduler};
use crate::startup::Tools;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Error type for batch operations
///
/// Per-file problems never surface here; they end up in the item's report.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Scanning the input root failed
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),

    /// A codec table rule has an invalid preset pattern
    #[error("Invalid codec table: {0}")]
    CodecTable(#[from] globset::Error),

    /// The scan/order task panicked
    #[error("Scan task panicked: {0}")]
    Panicked(String),
}

/// What happened to one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Skipped(SkipReason),
    /// Would have been transcoded; the run was a dry run.
    DryRun { overwrite: bool },
    Transcoded {
        elapsed: Duration,
        ratio: f64,
        original_deleted: bool,
    },
    /// Output was larger than the source; this ended the batch.
    StoppedLarger { ratio: f64 },
    Failed(String),
}

/// Outcome for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemReport {
    pub source: PathBuf,
    pub dest: PathBuf,
    pub outcome: ItemOutcome,
}

/// Everything a batch did, in processing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub items: Vec<ItemReport>,
    /// Set when a stop-larger outcome ended the batch early.
    pub stopped_larger: bool,
}

impl BatchSummary {
    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|item| pred(&item.outcome)).count()
    }

    pub fn transcoded(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Transcoded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Failed(_)))
    }

    pub fn dry_run(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::DryRun { .. }))
    }

    pub fn outcome_for(&self, source: &std::path::Path) -> Option<&ItemOutcome> {
        self.items
            .iter()
            .find(|item| item.source == source)
            .map(|item| &item.outcome)
    }

    fn log(&self) {
        info!(
            "Done: {} file(s), {} transcoded, {} would transcode, {} skipped, {} failed{}",
            self.items.len(),
            self.transcoded(),
            self.dry_run(),
            self.skipped(),
            self.failed(),
            if self.stopped_larger {
                " (stopped: output larger than source)"
            } else {
                ""
            }
        );
    }
}

/// One configured pass over the input tree.
pub struct Batch {
    config: RunConfig,
    probe: Arc<dyn MediaProbe>,
    executor: JobExecutor,
    locks: LockCoordinator,
}

impl Batch {
    /// Create a batch that probes with mediainfo and encodes with HandBrakeCLI.
    pub fn new(config: RunConfig, tools: Tools) -> Self {
        let probe = Arc::new(MediaInfoProbe::new(tools.mediainfo));
        Self::with_probe(config, tools.encoder, probe)
    }

    /// Create a batch with a custom probe implementation.
    pub fn with_probe(config: RunConfig, encoder: PathBuf, probe: Arc<dyn MediaProbe>) -> Self {
        let executor = JobExecutor::new(ExecutorConfig::from_run_config(&config, encoder));
        let grace = config.locks.stale_grace_secs;
        let locks = LockCoordinator::new((grace > 0).then(|| Duration::from_secs(grace)));
        Self {
            config,
            probe,
            executor,
            locks,
        }
    }

    /// Run the batch to completion (or until stop-larger triggers).
    pub async fn run(&self) -> Result<BatchSummary, BatchError> {
        let table = CodecTable::from_config(&self.config.codec_targets)?;
        let mut candidates = self.scan_and_order().await?;
        let total = candidates.len();

        info!(
            "Found {} file(s) in '{}'{}",
            total,
            self.config.paths.input.display(),
            if self.config.encode.execute {
                ""
            } else {
                " (dry run, pass -r to transcode)"
            }
        );

        let scheduler = ProbeScheduler::new(
            self.probe.clone(),
            DecisionContext {
                table,
                preset: self.config.encode.preset.clone(),
                force: self.config.encode.force,
                tracks_selected: self.config.tracks_selected(),
            },
            self.config.probe.workers,
        );

        // Files already known to be skipped are never probed
        let mut handles: Vec<Option<ProbeHandle>> = candidates
            .iter_mut()
            .map(|c| {
                if c.blocking_skip_reason().is_some() {
                    None
                } else {
                    Some(scheduler.submit(c))
                }
            })
            .collect();

        let mut eta = EtaEstimator::new(self.config.eta.recent_window);
        let mut summary = BatchSummary::default();

        for (index, (candidate, handle)) in candidates.iter_mut().zip(handles.iter_mut()).enumerate() {
            let handle = handle.take();

            let outcome = if summary.stopped_larger {
                if let Some(handle) = handle {
                    handle.cancel();
                }
                candidate.set_skip_reason(SkipReason::BatchStopped);
                ItemOutcome::Skipped(
                    candidate
                        .skip_reason()
                        .cloned()
                        .unwrap_or(SkipReason::BatchStopped),
                )
            } else {
                self.process(index, total, candidate, handle, &mut eta).await
            };

            if let ItemOutcome::StoppedLarger { .. } = outcome {
                summary.stopped_larger = true;
            }

            summary.items.push(ItemReport {
                source: candidate.source_path.clone(),
                dest: candidate.dest_path().to_path_buf(),
                outcome,
            });
        }

        scheduler.shutdown().await;
        summary.log();
        Ok(summary)
    }

    async fn scan_and_order(&self) -> Result<Vec<Candidate>, BatchError> {
        let config = self.config.clone();
        let probe = self.probe.clone();

        // Ordering by duration probes every file, so keep it off the async workers
        let scanned = tokio::task::spawn_blocking(move || -> Result<Vec<Candidate>, ScanError> {
            let mut candidates = scan_candidates(&config)?;
            order_candidates(
                &mut candidates,
                config.scan.sort,
                config.scan.descending,
                probe.as_ref(),
            );
            Ok(candidates)
        })
        .await
        .map_err(|e| BatchError::Panicked(e.to_string()))?;

        Ok(scanned?)
    }

    async fn process(
        &self,
        index: usize,
        total: usize,
        candidate: &mut Candidate,
        handle: Option<ProbeHandle>,
        eta: &mut EtaEstimator,
    ) -> ItemOutcome {
        let name = candidate.name();
        let progress = format!("[{}/{} ({}%)]", index + 1, total, (index + 1) * 100 / total);
        match eta.queue_eta(total - index) {
            Some(queue) => info!("Checking {} '{}' [Queue ETA: ~{}]", progress, name, format_eta(queue)),
            None => info!("Checking {} '{}'", progress, name),
        }

        let Some(handle) = handle else {
            let reason = candidate
                .blocking_skip_reason()
                .cloned()
                .unwrap_or(SkipReason::AlreadyExists);
            return skip(candidate, reason);
        };

        if self.locks.exists(&candidate.source_path) && !self.reclaim_stale_lock(candidate) {
            handle.cancel();
            return skip(candidate, SkipReason::Locked);
        }

        if !self.config.encode.force && candidate.dest_path().exists() {
            handle.cancel();
            return skip(candidate, SkipReason::AlreadyExists);
        }

        let verdict = match handle.wait().await {
            Ok(verdict) => verdict,
            Err(e) => {
                error!("No probe result for '{}': {}", name, e);
                return ItemOutcome::Failed(e.to_string());
            }
        };
        candidate.apply_verdict(&verdict);

        if !candidate.will_run {
            let reason = candidate
                .blocking_skip_reason()
                .cloned()
                .unwrap_or(SkipReason::MissingInfo);
            return skip(candidate, reason);
        }

        let overwrite = candidate.skip_reason() == Some(&SkipReason::WillOverwrite);
        if overwrite {
            info!("Overwriting '{}'", candidate.dest_name());
        }

        match eta.item_eta(candidate.duration_bucket_minutes) {
            Some(item) => info!(
                "Transcoding: '{}' to '{}' [ETA: ~{}]",
                name,
                candidate.dest_name(),
                format_eta(item)
            ),
            None => info!("Transcoding: '{}' to '{}'", name, candidate.dest_name()),
        }

        if !self.config.encode.execute {
            return ItemOutcome::DryRun { overwrite };
        }

        let guard = match self.lock_for_transcode(candidate) {
            Ok(guard) => guard,
            Err(outcome) => return outcome,
        };

        let result = self.executor.execute(candidate, eta).await;
        drop(guard);

        match result {
            Ok(JobOutcome::Completed {
                elapsed,
                ratio,
                original_deleted,
            }) => ItemOutcome::Transcoded {
                elapsed,
                ratio,
                original_deleted,
            },
            Ok(JobOutcome::StopLarger { ratio, .. }) => {
                warn!(
                    "'{}' came out larger than its source ({:.0}%), stopping batch",
                    candidate.dest_name(),
                    ratio * 100.0
                );
                ItemOutcome::StoppedLarger { ratio }
            }
            Err(e) => {
                error!("Failed to transcode '{}': {}", name, e);
                if let Some(stderr) = e.diagnostics() {
                    error!("{}", stderr.trim_end());
                }
                ItemOutcome::Failed(e.to_string())
            }
        }
    }

    /// Take the candidate's lock, then confirm the destination is still free.
    ///
    /// Another run may have finished the same source between the earlier checks
    /// and the lock, so the destination is stat'ed again while the lock is held.
    fn lock_for_transcode(&self, candidate: &mut Candidate) -> Result<LockGuard, ItemOutcome> {
        let guard = match self.locks.acquire(&candidate.source_path) {
            Ok(guard) => guard,
            Err(LockError::Held(_)) => return Err(skip(candidate, SkipReason::Locked)),
            Err(e) => {
                error!("Failed to lock '{}': {}", candidate.name(), e);
                return Err(ItemOutcome::Failed(e.to_string()));
            }
        };

        if !self.config.encode.force && candidate.dest_path().exists() {
            drop(guard);
            return Err(skip(candidate, SkipReason::AlreadyExists));
        }
        Ok(guard)
    }

    /// Remove a stale marker for the candidate. Dry runs never touch markers.
    fn reclaim_stale_lock(&self, candidate: &Candidate) -> bool {
        if !self.config.encode.execute {
            return false;
        }
        match self.locks.try_reclaim(&candidate.source_path) {
            Ok(reclaimed) => reclaimed,
            Err(e) => {
                warn!("Could not reclaim lock for '{}': {}", candidate.name(), e);
                false
            }
        }
    }
}

fn skip(candidate: &mut Candidate, reason: SkipReason) -> ItemOutcome {
    match &reason {
        SkipReason::NotFound | SkipReason::ProbeFailed(_) | SkipReason::Locked => {
            warn!("Skipping '{}': {}", candidate.name(), reason)
        }
        _ => info!("Skipping '{}': {}", candidate.name(), reason),
    }
    candidate.set_skip_reason(reason.clone());
    ItemOutcome::Skipped(reason)
}

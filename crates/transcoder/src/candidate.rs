//! A discovered source file and everything decided about it during a run.

use crate::decision::{Decision, SkipReason};
use crate::probe::{ProbeOutcome, VideoTrack};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Width of one ETA duration bucket.
pub const BUCKET_MINUTES: u32 = 10;

const BUCKET_MS: u64 = BUCKET_MINUTES as u64 * 60 * 1000;

/// Destination for a source: same stem with the container extension, placed in
/// `output_root` when one is configured, next to the source otherwise.
pub fn destination_for(source: &Path, output_root: Option<&Path>, container: &str) -> PathBuf {
    let renamed = source.with_extension(container);
    match (output_root, renamed.file_name()) {
        (Some(root), Some(name)) => root.join(name),
        _ => renamed,
    }
}

/// Duration rounded up to the next 10 minute boundary, in minutes.
pub fn duration_bucket(duration_ms: u64) -> u32 {
    (duration_ms.div_ceil(BUCKET_MS) * BUCKET_MINUTES as u64) as u32
}

/// Bucket for a duration in seconds.
pub fn duration_bucket_secs(duration_secs: f64) -> u32 {
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return 0;
    }
    duration_bucket((duration_secs * 1000.0).round() as u64)
}

/// What the probe scheduler hands back for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeVerdict {
    /// Primary video track, if the probe found one.
    pub media: Option<VideoTrack>,
    pub decision: Decision,
}

/// One discovered source file under consideration for transcoding.
#[derive(Debug)]
pub struct Candidate {
    /// Absolute path of the source file.
    pub source_path: PathBuf,
    dest_path: PathBuf,
    /// Source size in bytes at discovery time.
    pub size_bytes: u64,
    /// Source modification time at discovery time.
    pub modified: SystemTime,
    skip_reason: Option<SkipReason>,
    /// Set once the probe verdict says the file should be transcoded.
    pub will_run: bool,
    pub probed_format: Option<String>,
    pub probed_profile: Option<String>,
    /// Media duration, 0 until probed.
    pub duration_secs: f64,
    /// `duration_secs` rounded up to the next 10 minute boundary.
    pub duration_bucket_minutes: u32,
    cached_probe: Option<ProbeOutcome>,
}

impl Candidate {
    /// Create a candidate; the destination is derived here and never recomputed.
    pub fn new(
        source_path: PathBuf,
        output_root: Option<&Path>,
        container: &str,
        size_bytes: u64,
        modified: SystemTime,
    ) -> Self {
        let dest_path = destination_for(&source_path, output_root, container);
        Self {
            source_path,
            dest_path,
            size_bytes,
            modified,
            skip_reason: None,
            will_run: false,
            probed_format: None,
            probed_profile: None,
            duration_secs: 0.0,
            duration_bucket_minutes: 0,
            cached_probe: None,
        }
    }

    pub fn dest_path(&self) -> &Path {
        &self.dest_path
    }

    /// File name of the source, for log lines.
    pub fn name(&self) -> String {
        display_name(&self.source_path)
    }

    /// File name of the destination, for log lines.
    pub fn dest_name(&self) -> String {
        display_name(&self.dest_path)
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        self.skip_reason.as_ref()
    }

    /// The skip reason, if it prevents transcoding.
    pub fn blocking_skip_reason(&self) -> Option<&SkipReason> {
        self.skip_reason.as_ref().filter(|r| r.is_blocking())
    }

    /// Record a skip reason.
    ///
    /// A blocking reason is never replaced; only the informational overwrite
    /// note can be superseded.
    pub fn set_skip_reason(&mut self, reason: SkipReason) {
        match &self.skip_reason {
            Some(existing) if existing.is_blocking() => {}
            _ => self.skip_reason = Some(reason),
        }
    }

    /// Store a probe result taken ahead of scheduling (duration ordering).
    pub fn cache_probe(&mut self, outcome: ProbeOutcome) {
        if let Ok(info) = &outcome {
            if let Some(video) = info.primary_video() {
                self.set_duration_ms(video.duration_ms);
            }
        }
        self.cached_probe = Some(outcome);
    }

    /// Hand the cached probe result to the scheduler.
    pub fn take_cached_probe(&mut self) -> Option<ProbeOutcome> {
        self.cached_probe.take()
    }

    /// Apply what the probe scheduler decided.
    pub fn apply_verdict(&mut self, verdict: &ProbeVerdict) {
        if let Some(video) = &verdict.media {
            self.probed_format = Some(video.format.clone());
            self.probed_profile = Some(video.profile.clone());
            self.set_duration_ms(video.duration_ms);
        }

        match &verdict.decision {
            Decision::Run { overwrite } => {
                if *overwrite {
                    self.set_skip_reason(SkipReason::WillOverwrite);
                }
                self.will_run = self.blocking_skip_reason().is_none();
            }
            Decision::Skip(reason) => {
                self.set_skip_reason(reason.clone());
                self.will_run = false;
            }
        }
    }

    fn set_duration_ms(&mut self, duration_ms: u64) {
        self.duration_secs = duration_ms as f64 / 1000.0;
        self.duration_bucket_minutes = duration_bucket(duration_ms);
    }
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

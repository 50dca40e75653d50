//! Skip-decision module.
//!
//! Maps what is known about a file (destination present, force flag, probed codec)
//! to either a run decision or a skip reason. The preset → codec mapping lives in a
//! [`CodecTable`] built from configuration, so new presets need no code changes.

use crate::config::CodecTargetsConfig;
use crate::probe::VideoTrack;
use globset::{GlobBuilder, GlobMatcher};
use std::fmt;

/// Why a file is not (or, for `WillOverwrite`, only conditionally) transcoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Destination exists and force is off.
    AlreadyExists,
    /// Destination exists but force is on; informational only.
    WillOverwrite,
    /// The probe found no usable video track.
    MissingInfo,
    /// Source already has the codec the preset would produce.
    AlreadyRequestedFormat { format: String, profile: String },
    /// Source disappeared before it could be probed.
    NotFound,
    /// The probe itself failed.
    ProbeFailed(String),
    /// Another process holds the lock marker for this source.
    Locked,
    /// An earlier output was larger than its source and the batch stopped.
    BatchStopped,
}

impl SkipReason {
    /// Whether this reason prevents transcoding.
    pub fn is_blocking(&self) -> bool {
        !matches!(self, SkipReason::WillOverwrite)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyExists => write!(f, "already exists"),
            SkipReason::WillOverwrite => write!(f, "will overwrite"),
            SkipReason::MissingInfo => write!(f, "missing info"),
            SkipReason::AlreadyRequestedFormat { format, profile } => {
                write!(f, "already requested format: {} {}", format, profile)
            }
            SkipReason::NotFound => write!(f, "not found"),
            SkipReason::ProbeFailed(msg) => write!(f, "probe failed: {}", msg),
            SkipReason::Locked => write!(f, "lock file exists"),
            SkipReason::BatchStopped => write!(f, "batch stopped"),
        }
    }
}

/// Outcome of the decision engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Transcode; `overwrite` is set when an existing destination will be replaced.
    Run { overwrite: bool },
    Skip(SkipReason),
}

impl Decision {
    pub fn will_run(&self) -> bool {
        matches!(self, Decision::Run { .. })
    }
}

/// Codec a preset produces, plus profiles that still warrant a re-encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetCodec {
    pub format: String,
    pub profile_excludes: Vec<String>,
}

impl TargetCodec {
    /// True when a source with this format/profile gains nothing from conversion.
    pub fn matches(&self, format: &str, profile: &str) -> bool {
        format.eq_ignore_ascii_case(&self.format)
            && !self
                .profile_excludes
                .iter()
                .any(|excluded| profile.contains(excluded.as_str()))
    }
}

/// Ordered preset-glob → target codec rules with a fallback target.
#[derive(Debug, Clone)]
pub struct CodecTable {
    rules: Vec<(GlobMatcher, TargetCodec)>,
    default_target: TargetCodec,
}

impl CodecTable {
    /// Build the table from its configuration section.
    pub fn from_config(cfg: &CodecTargetsConfig) -> Result<Self, globset::Error> {
        let mut rules = Vec::with_capacity(cfg.rules.len());
        for rule in &cfg.rules {
            let matcher = GlobBuilder::new(&rule.preset)
                .case_insensitive(true)
                .build()?
                .compile_matcher();
            rules.push((
                matcher,
                TargetCodec {
                    format: rule.format.clone(),
                    profile_excludes: rule.profile_excludes.clone(),
                },
            ));
        }

        Ok(Self {
            rules,
            default_target: TargetCodec {
                format: cfg.default_format.clone(),
                profile_excludes: cfg.default_profile_excludes.clone(),
            },
        })
    }

    /// Target codec implied by a preset name; first matching rule wins.
    pub fn target_for(&self, preset: &str) -> &TargetCodec {
        self.rules
            .iter()
            .find(|(matcher, _)| matcher.is_match(preset))
            .map(|(_, target)| target)
            .unwrap_or(&self.default_target)
    }
}

/// Everything the decision depends on.
#[derive(Debug, Clone, Copy)]
pub struct DecisionInput<'a> {
    pub dest_exists: bool,
    pub force: bool,
    pub preset: &'a str,
    /// Primary video track, `None` when the probe found none.
    pub video: Option<&'a VideoTrack>,
    /// An explicit audio or subtitle track was requested.
    pub tracks_selected: bool,
}

/// The filesystem-only part of the decision, available before probing.
///
/// Returns `AlreadyExists` (blocking) or `WillOverwrite` (informational) when the
/// destination is present, `None` otherwise.
pub fn precheck(dest_exists: bool, force: bool) -> Option<SkipReason> {
    match (dest_exists, force) {
        (true, false) => Some(SkipReason::AlreadyExists),
        (true, true) => Some(SkipReason::WillOverwrite),
        (false, _) => None,
    }
}

/// Decide whether a file is transcoded.
///
/// Rules, first match wins:
/// 1. destination exists, no force → skip "already exists"
/// 2. destination exists, force → keep going, overwrite
/// 3. no video track → skip "missing info"
/// 4. source already in the preset's target codec → skip, even with force,
///    unless a specific audio/subtitle track was requested
/// 5. run
pub fn decide(input: &DecisionInput<'_>, table: &CodecTable) -> Decision {
    if let Some(SkipReason::AlreadyExists) = precheck(input.dest_exists, input.force) {
        return Decision::Skip(SkipReason::AlreadyExists);
    }

    let Some(video) = input.video else {
        return Decision::Skip(SkipReason::MissingInfo);
    };

    if !input.tracks_selected
        && table
            .target_for(input.preset)
            .matches(&video.format, &video.profile)
    {
        return Decision::Skip(SkipReason::AlreadyRequestedFormat {
            format: video.format.clone(),
            profile: video.profile.clone(),
        });
    }

    Decision::Run {
        overwrite: input.dest_exists,
    }
}

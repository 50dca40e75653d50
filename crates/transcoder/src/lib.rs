//! Plex Transcode
//!
//! Batch engine that walks a media tree, decides which files need converting
//! to a Plex-friendly container and codec, and drives HandBrakeCLI over them one
//! file at a time.

pub mod batch;
pub mod candidate;
pub mod decision;
pub mod encode;
pub mod eta;
pub mod job_executor;
pub mod lock;
pub mod probe;
pub mod scan;
pub mod scheduler;
pub mod size_gate;
pub mod startup;

pub use plex_transcode_config as config;
pub use plex_transcode_config::{ConfigError, RunConfig, SortKey};
pub use batch::{Batch, BatchError, BatchSummary, ItemOutcome, ItemReport};
pub use candidate::{destination_for, duration_bucket, Candidate, ProbeVerdict};
pub use decision::{decide, precheck, CodecTable, Decision, DecisionInput, SkipReason, TargetCodec};
pub use encode::{build_handbrake_command, run_handbrake, EncodeError, HandBrakeParams};
pub use eta::{format_eta, EtaEstimator};
pub use job_executor::{ExecutorConfig, JobError, JobExecutor, JobOutcome};
pub use lock::{lock_marker_path, LockCoordinator, LockError, LockGuard};
pub use probe::{MediaInfo, MediaInfoProbe, MediaProbe, ProbeError, VideoTrack};
pub use scan::{order_candidates, scan_candidates, ScanError};
pub use scheduler::{CancelOutcome, DecisionContext, ProbeHandle, ProbeScheduler, SchedulerError};
pub use size_gate::{check_size_gate, SizeGateResult};
pub use startup::{run_startup_checks, StartupError, Tools};

//! Startup checks module
//!
//! Preflight checks run once before a batch starts:
//! - configuration values are usable
//! - the input root exists
//! - the workspace, if set, is a directory
//! - HandBrakeCLI and mediainfo can be found
//!
//! The resolved tool paths are returned as [`Tools`] and passed down explicitly.

use crate::config::{ConfigError, RunConfig};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Exit code used when the encoder is missing, matching a shell's "command not found".
pub const EXIT_ENCODER_MISSING: i32 = 127;

#[cfg(windows)]
pub const ENCODER_BINARY: &str = "HandBrakeCLI.exe";
#[cfg(not(windows))]
pub const ENCODER_BINARY: &str = "HandBrakeCLI";

#[cfg(windows)]
pub const PROBE_BINARY: &str = "mediainfo.exe";
#[cfg(not(windows))]
pub const PROBE_BINARY: &str = "mediainfo";

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("HandBrakeCLI not available: {0}")]
    EncoderUnavailable(String),

    #[error("mediainfo not available: {0}")]
    ProbeUnavailable(String),

    #[error("Input path does not exist: {}", .0.display())]
    InputMissing(PathBuf),

    #[error("Workspace is not a directory: {}", .0.display())]
    WorkspaceMissing(PathBuf),

    #[error("{0}")]
    Config(#[from] ConfigError),
}

impl StartupError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            StartupError::EncoderUnavailable(_) => EXIT_ENCODER_MISSING,
            _ => 1,
        }
    }
}

/// External programs resolved at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Tools {
    pub encoder: PathBuf,
    pub mediainfo: PathBuf,
}

/// Resolve a binary: an explicitly configured path must exist, otherwise
/// `name` is looked up on `PATH`.
pub fn resolve_binary(explicit: Option<&Path>, name: &str) -> Result<PathBuf, String> {
    match explicit {
        Some(path) if path.is_file() => Ok(path.to_path_buf()),
        Some(path) => Err(format!("configured path '{}' is not a file", path.display())),
        None => which::which(name).map_err(|e| format!("'{}' not found in PATH: {}", name, e)),
    }
}

/// Run all startup checks
///
/// This function runs the following checks in order:
/// 1. Configuration validation
/// 2. Input root existence
/// 3. Workspace directory, when configured
/// 4. Encoder lookup
/// 5. mediainfo lookup
///
/// Returns the resolved tool paths, or the first failure.
pub fn run_startup_checks(cfg: &RunConfig) -> Result<Tools, StartupError> {
    cfg.validate()?;

    if !cfg.paths.input.exists() {
        return Err(StartupError::InputMissing(cfg.paths.input.clone()));
    }

    if let Some(workspace) = &cfg.paths.workspace {
        if !workspace.is_dir() {
            return Err(StartupError::WorkspaceMissing(workspace.clone()));
        }
    }

    let encoder = resolve_binary(cfg.encode.encoder_path.as_deref(), ENCODER_BINARY)
        .map_err(StartupError::EncoderUnavailable)?;
    debug!("Using encoder '{}'", encoder.display());

    let mediainfo = resolve_binary(cfg.probe.mediainfo_path.as_deref(), PROBE_BINARY)
        .map_err(StartupError::ProbeUnavailable)?;
    debug!("Using mediainfo '{}'", mediainfo.display());

    Ok(Tools { encoder, mediainfo })
}

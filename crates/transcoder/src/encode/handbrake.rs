//! HandBrakeCLI encoder module
//!
//! Builds and executes HandBrakeCLI commands for a single transcode.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

/// Error type for encoding operations
#[derive(Debug, Error)]
pub enum EncodeError {
    /// HandBrakeCLI exited with non-zero status
    #[error("HandBrakeCLI failed with exit code: {code}")]
    Failed { code: i32, stderr: String },

    /// HandBrakeCLI was terminated by signal
    #[error("HandBrakeCLI was terminated by signal")]
    Terminated { stderr: String },

    /// IO error launching the encoder
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EncodeError {
    /// Encoder diagnostics captured from stderr, if the process ran.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            EncodeError::Failed { stderr, .. } | EncodeError::Terminated { stderr } => {
                Some(stderr.as_str())
            }
            EncodeError::Io(_) => None,
        }
    }
}

/// Parameters for one HandBrakeCLI run
#[derive(Debug, Clone)]
pub struct HandBrakeParams {
    /// File handed to the encoder (the source, or its workspace copy)
    pub input_path: PathBuf,
    /// Temporary output file the encoder writes
    pub output_path: PathBuf,
    /// HandBrake preset name
    pub preset: String,
    /// Audio track number; all tracks when `None`
    pub audio_track: Option<u32>,
    /// Subtitle track to burn in; foreign-audio scan when `None`
    pub subtitle_track: Option<u32>,
}

/// Build a HandBrakeCLI command for `params`
///
/// Argument order:
/// - `-i <input> -o <output> --preset <preset> --optimize`
/// - `--audio N`, or `--audio-lang-list und --all-audio`
/// - `--subtitle N --subtitle-burned`, or `--subtitle scan`
pub fn build_handbrake_command(encoder: &std::path::Path, params: &HandBrakeParams) -> Command {
    let mut cmd = Command::new(encoder);

    cmd.arg("-i").arg(&params.input_path);
    cmd.arg("-o").arg(&params.output_path);
    cmd.arg("--preset").arg(&params.preset);
    cmd.arg("--optimize");

    match params.audio_track {
        Some(track) => {
            cmd.arg("--audio").arg(track.to_string());
        }
        None => {
            cmd.arg("--audio-lang-list").arg("und").arg("--all-audio");
        }
    }

    match params.subtitle_track {
        Some(track) => {
            cmd.arg("--subtitle").arg(track.to_string()).arg("--subtitle-burned");
        }
        None => {
            cmd.arg("--subtitle").arg("scan");
        }
    }

    cmd
}

/// Execute HandBrakeCLI and wait for it to exit
///
/// Progress output on stdout is discarded; stderr is captured so that failures
/// can be reported with the encoder's own diagnostics.
pub fn run_handbrake(encoder: &std::path::Path, params: &HandBrakeParams) -> Result<(), EncodeError> {
    let mut cmd = build_handbrake_command(encoder, params);
    cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::piped());
    debug!("Running {:?}", cmd);

    let output = cmd.output()?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    match output.status.code() {
        Some(code) => Err(EncodeError::Failed { code, stderr }),
        None => Err(EncodeError::Terminated { stderr }),
    }
}

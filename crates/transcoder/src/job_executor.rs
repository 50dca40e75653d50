//! Job executor module
//!
//! Runs one transcode at a time through the encoder, with the semaphore as the
//! single execution slot. A job stages its input, writes to a `_processing`
//! temp output, checks the result and moves it into place.

use crate::candidate::{display_name, Candidate};
use crate::config::RunConfig;
use crate::encode::{run_handbrake, EncodeError, HandBrakeParams};
use crate::eta::EtaEstimator;
use crate::size_gate::{check_size_gate, SizeGateResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Marker inserted between the stem and the container extension of temp outputs.
pub const PROCESSING_SUFFIX: &str = "_processing";

/// Error type for job execution operations
#[derive(Debug, Error)]
pub enum JobError {
    /// Encoding failed
    #[error("Encode failed: {0}")]
    Encode(#[from] EncodeError),

    /// Copying into or out of the workspace failed
    #[error("Failed to stage '{}': {source}", path.display())]
    Staging { path: PathBuf, source: io::Error },

    /// The encoder reported success but the output is unusable
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Moving the finished output to its destination failed
    #[error("Failed to move output to '{}': {source}", path.display())]
    Finalize { path: PathBuf, source: io::Error },

    /// The blocking encoder task panicked
    #[error("Encoding task panicked: {0}")]
    Panicked(String),

    /// The executor slot was closed
    #[error("executor is shut down")]
    Closed,
}

impl JobError {
    /// Encoder stderr, when the failure came from the encoder process.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            JobError::Encode(e) => e.stderr(),
            _ => None,
        }
    }
}

/// How a job that ran to completion ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// Output is at its destination.
    Completed {
        elapsed: Duration,
        ratio: f64,
        original_deleted: bool,
    },
    /// Output was larger than allowed and has been discarded; the batch stops.
    StopLarger { elapsed: Duration, ratio: f64 },
}

impl JobOutcome {
    pub fn elapsed(&self) -> Duration {
        match self {
            JobOutcome::Completed { elapsed, .. } | JobOutcome::StopLarger { elapsed, .. } => {
                *elapsed
            }
        }
    }
}

/// Configuration for the job executor
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Resolved encoder binary
    pub encoder: PathBuf,
    pub preset: String,
    pub audio_track: Option<u32>,
    pub subtitle_track: Option<u32>,
    /// Container extension of outputs (e.g. "mp4")
    pub container: String,
    /// Directory for staging copies and temp outputs
    pub workspace: Option<PathBuf>,
    pub stop_larger: bool,
    /// Output/original ratio above which stop-larger triggers
    pub max_size_ratio: f64,
    pub delete_original: bool,
}

impl ExecutorConfig {
    pub fn from_run_config(config: &RunConfig, encoder: PathBuf) -> Self {
        Self {
            encoder,
            preset: config.encode.preset.clone(),
            audio_track: config.encode.audio_track,
            subtitle_track: config.encode.subtitle_track,
            container: config.encode.container.clone(),
            workspace: config.paths.workspace.clone(),
            stop_larger: config.encode.stop_larger,
            max_size_ratio: config.encode.max_size_ratio as f64,
            delete_original: config.encode.delete_original,
        }
    }
}

/// Temp output path for `dest`: `<stem>_processing.<container>` in `dir`.
pub fn processing_path(dest: &Path, dir: &Path, container: &str) -> PathBuf {
    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.join(format!("{}{}.{}", stem, PROCESSING_SUFFIX, container))
}

/// Files a job creates before the destination exists.
#[derive(Debug)]
struct StagedPaths {
    /// Workspace copy of the source, when a workspace is used.
    input_copy: Option<PathBuf>,
    temp_output: PathBuf,
}

impl StagedPaths {
    fn encoder_input<'a>(&'a self, source: &'a Path) -> &'a Path {
        self.input_copy.as_deref().unwrap_or(source)
    }

    fn cleanup(&self) {
        for path in self.input_copy.iter().chain(std::iter::once(&self.temp_output)) {
            match fs::remove_file(path) {
                Ok(()) => debug!("Removed '{}'", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove '{}': {}", path.display(), e),
            }
        }
    }
}

/// Job executor with a bounded number of execution slots
///
/// Uses a tokio Semaphore so that the encoder never runs more often in
/// parallel than there are slots; the default is one.
pub struct JobExecutor {
    semaphore: Arc<Semaphore>,
    config: ExecutorConfig,
}

impl JobExecutor {
    /// Create a single-slot executor
    pub fn new(config: ExecutorConfig) -> Self {
        Self::with_slots(config, 1)
    }

    /// Create an executor running up to `slots` jobs at once
    pub fn with_slots(config: ExecutorConfig, slots: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(slots.max(1))),
            config,
        }
    }

    /// Get the number of available permits (free execution slots)
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Transcode one candidate
    ///
    /// 1. Waits for a free slot
    /// 2. Copies the source into the workspace, if one is configured
    /// 3. Runs the encoder into the `_processing` temp output, timing it
    /// 4. Validates the output and records the elapsed time for ETAs
    /// 5. Applies the stop-larger check
    /// 6. Moves the output to the destination and, if asked, deletes the source
    ///
    /// On every error path the temp output and workspace copies are removed.
    pub async fn execute(
        &self,
        candidate: &Candidate,
        eta: &mut EtaEstimator,
    ) -> Result<JobOutcome, JobError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| JobError::Closed)?;

        let staged = self.plan_staging(candidate);
        let result = self.run_staged(candidate, &staged, eta).await;
        staged.cleanup();
        result
    }

    fn plan_staging(&self, candidate: &Candidate) -> StagedPaths {
        let dest = candidate.dest_path();
        match &self.config.workspace {
            Some(workspace) => {
                let copy = workspace.join(display_name(&candidate.source_path));
                StagedPaths {
                    // Never stage a file onto itself
                    input_copy: (copy != candidate.source_path).then_some(copy),
                    temp_output: processing_path(dest, workspace, &self.config.container),
                }
            }
            None => {
                let dir = dest.parent().unwrap_or_else(|| Path::new("."));
                StagedPaths {
                    input_copy: None,
                    temp_output: processing_path(dest, dir, &self.config.container),
                }
            }
        }
    }

    async fn run_staged(
        &self,
        candidate: &Candidate,
        staged: &StagedPaths,
        eta: &mut EtaEstimator,
    ) -> Result<JobOutcome, JobError> {
        let source = candidate.source_path.as_path();
        let dest = candidate.dest_path();

        if let Some(copy) = &staged.input_copy {
            info!("Copying '{}' to workspace", candidate.name());
            copy_file(source, copy).await?;
        }

        let params = HandBrakeParams {
            input_path: staged.encoder_input(source).to_path_buf(),
            output_path: staged.temp_output.clone(),
            preset: self.config.preset.clone(),
            audio_track: self.config.audio_track,
            subtitle_track: self.config.subtitle_track,
        };
        let encoder = self.config.encoder.clone();

        let started = Instant::now();
        let encode_result =
            tokio::task::spawn_blocking(move || run_handbrake(&encoder, &params)).await;
        let elapsed = started.elapsed();

        match encode_result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(JobError::Encode(e)),
            Err(join_err) => return Err(JobError::Panicked(join_err.to_string())),
        }

        let output_bytes = match fs::metadata(&staged.temp_output) {
            Ok(m) if m.len() > 0 => m.len(),
            Ok(_) => return Err(JobError::Validation("output file is empty".to_string())),
            Err(e) => return Err(JobError::Validation(format!("output file not found: {}", e))),
        };

        eta.record(candidate.duration_secs, elapsed);

        let original_bytes = fs::metadata(source)
            .map(|m| m.len())
            .unwrap_or(candidate.size_bytes);
        let gate = check_size_gate(original_bytes, output_bytes, self.config.max_size_ratio);
        let ratio = gate.ratio();

        if let SizeGateResult::Reject { .. } = gate {
            if self.config.stop_larger {
                warn!(
                    "'{}' is larger than its source ({:.0}%), discarding output",
                    candidate.dest_name(),
                    ratio * 100.0
                );
                return Ok(JobOutcome::StopLarger { elapsed, ratio });
            }
        }

        self.finalize(&staged.temp_output, dest).await?;
        info!(
            "Finished '{}' in {:.0}s ({:.0}% of original)",
            candidate.dest_name(),
            elapsed.as_secs_f64(),
            ratio * 100.0
        );

        let original_deleted = self.config.delete_original && delete_original(source, dest);

        Ok(JobOutcome::Completed {
            elapsed,
            ratio,
            original_deleted,
        })
    }

    /// Move the temp output to `dest`: rename when possible, copy otherwise.
    async fn finalize(&self, temp_output: &Path, dest: &Path) -> Result<(), JobError> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| JobError::Finalize {
                path: dest.to_path_buf(),
                source,
            })?;
        }

        if fs::rename(temp_output, dest).is_ok() {
            return Ok(());
        }

        debug!("Rename to '{}' failed, copying instead", dest.display());
        let (from, to) = (temp_output.to_path_buf(), dest.to_path_buf());
        tokio::task::spawn_blocking(move || copy_into_place(&from, &to))
            .await
            .map_err(|e| JobError::Panicked(e.to_string()))?
            .map_err(|source| JobError::Finalize {
                path: dest.to_path_buf(),
                source,
            })?;
        Ok(())
    }
}

/// Suffix of the sibling file a cross-device copy is written to.
const PARTIAL_SUFFIX: &str = ".partial";

/// Copy `from` next to `to` and rename it into place.
///
/// `to` is either left as it was or fully replaced; a failed copy never leaves
/// a truncated destination behind.
fn copy_into_place(from: &Path, to: &Path) -> io::Result<()> {
    let mut partial = to.as_os_str().to_owned();
    partial.push(PARTIAL_SUFFIX);
    let partial = PathBuf::from(partial);

    let result = fs::copy(from, &partial).and_then(|_| fs::rename(&partial, to));
    if result.is_err() {
        if let Err(e) = fs::remove_file(&partial) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove '{}': {}", partial.display(), e);
            }
        }
    }
    result
}

async fn copy_file(from: &Path, to: &Path) -> Result<(), JobError> {
    let (src, dst) = (from.to_path_buf(), to.to_path_buf());
    tokio::task::spawn_blocking(move || fs::copy(&src, &dst))
        .await
        .map_err(|e| JobError::Panicked(e.to_string()))?
        .map_err(|source| JobError::Staging {
            path: to.to_path_buf(),
            source,
        })?;
    Ok(())
}

/// Remove the source once the destination is confirmed present and non-empty.
fn delete_original(source: &Path, dest: &Path) -> bool {
    if is_same_file(source, dest) {
        debug!("Destination is the source, keeping '{}'", source.display());
        return false;
    }

    match fs::metadata(dest) {
        Ok(m) if m.len() > 0 => {}
        _ => {
            warn!("Destination '{}' missing, keeping original", dest.display());
            return false;
        }
    }

    match fs::remove_file(source) {
        Ok(()) => {
            info!("Deleted original '{}'", display_name(source));
            true
        }
        Err(e) => {
            warn!("Failed to delete original '{}': {}", source.display(), e);
            false
        }
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn test_config(encoder: PathBuf) -> ExecutorConfig {
        ExecutorConfig {
            encoder,
            preset: "Fast 1080p30".to_string(),
            audio_track: None,
            subtitle_track: None,
            container: "mp4".to_string(),
            workspace: None,
            stop_larger: false,
            max_size_ratio: 1.0,
            delete_original: false,
        }
    }

    #[test]
    fn test_processing_path() {
        assert_eq!(
            processing_path(Path::new("/media/movie.mp4"), Path::new("/media"), "mp4"),
            PathBuf::from("/media/movie_processing.mp4")
        );
        assert_eq!(
            processing_path(Path::new("/out/show.s01.mp4"), Path::new("/tmp/ws"), "mp4"),
            PathBuf::from("/tmp/ws/show.s01_processing.mp4")
        );
    }

    #[test]
    fn test_config_from_run_config() {
        let mut run = RunConfig::default();
        run.encode.audio_track = Some(2);
        run.encode.max_size_ratio = 0.9;
        run.paths.workspace = Some(PathBuf::from("/scratch"));

        let config = ExecutorConfig::from_run_config(&run, PathBuf::from("/usr/bin/HandBrakeCLI"));
        assert_eq!(config.audio_track, Some(2));
        assert_eq!(config.workspace, Some(PathBuf::from("/scratch")));
        assert!((config.max_size_ratio - 0.9).abs() < 1e-6);
        assert_eq!(config.container, "mp4");
    }

    #[tokio::test]
    async fn test_single_slot_by_default() {
        let executor = JobExecutor::new(test_config(PathBuf::from("HandBrakeCLI")));
        assert_eq!(executor.available_permits(), 1);

        let executor = JobExecutor::with_slots(test_config(PathBuf::from("HandBrakeCLI")), 3);
        assert_eq!(executor.available_permits(), 3);
    }

    #[tokio::test]
    async fn test_missing_encoder_cleans_up() {
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("movie.mkv");
        fs::write(&source, vec![7u8; 1000]).unwrap();
        let candidate = Candidate::new(source.clone(), None, "mp4", 1000, SystemTime::now());

        let executor = JobExecutor::new(test_config(dir.path().join("no-such-encoder")));
        let mut eta = EtaEstimator::default();
        let err = executor.execute(&candidate, &mut eta).await.unwrap_err();

        assert!(matches!(err, JobError::Encode(EncodeError::Io(_))));
        assert!(source.exists());
        assert!(!candidate.dest_path().exists());
        assert_eq!(eta.sample_count(), 0);
        assert_eq!(executor.available_permits(), 1);
    }

    fn partial_of(dest: &Path) -> PathBuf {
        let mut partial = dest.as_os_str().to_owned();
        partial.push(PARTIAL_SUFFIX);
        PathBuf::from(partial)
    }

    #[test]
    fn test_copy_into_place_replaces_destination() {
        let dir = tempfile::TempDir::new().unwrap();
        let from = dir.path().join("movie_processing.mp4");
        let to = dir.path().join("movie.mp4");
        fs::write(&from, b"new output").unwrap();
        fs::write(&to, b"old").unwrap();

        copy_into_place(&from, &to).unwrap();

        assert_eq!(fs::read(&to).unwrap(), b"new output".to_vec());
        assert!(!partial_of(&to).exists());
    }

    #[test]
    fn test_failed_copy_leaves_destination_alone() {
        let dir = tempfile::TempDir::new().unwrap();
        let to = dir.path().join("movie.mp4");
        fs::write(&to, b"old").unwrap();

        assert!(copy_into_place(&dir.path().join("gone.mp4"), &to).is_err());
        assert_eq!(fs::read(&to).unwrap(), b"old".to_vec());
        assert!(!partial_of(&to).exists());
    }

    #[test]
    fn test_failed_move_removes_partial_copy() {
        let dir = tempfile::TempDir::new().unwrap();
        let from = dir.path().join("movie_processing.mp4");
        fs::write(&from, b"new output").unwrap();
        // A non-empty directory cannot be renamed over
        let to = dir.path().join("movie.mp4");
        fs::create_dir(&to).unwrap();
        fs::write(to.join("keep"), b"x").unwrap();

        assert!(copy_into_place(&from, &to).is_err());
        assert!(to.join("keep").exists());
        assert!(!partial_of(&to).exists());
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        const PARSE_ARGS: &str = r#"#!/bin/sh
while [ $# -gt 0 ]; do
  case "$1" in
    -i) in="$2"; shift ;;
    -o) out="$2"; shift ;;
  esac
  shift
done
"#;

        fn fake_encoder(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-handbrake.sh");
            fs::write(&path, format!("{}{}\n", PARSE_ARGS, body)).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn source_candidate(dir: &Path, name: &str, size: usize) -> Candidate {
            let source = dir.join(name);
            fs::write(&source, vec![b'v'; size]).unwrap();
            let mut candidate = Candidate::new(source, None, "mp4", size as u64, SystemTime::now());
            candidate.duration_secs = 1800.0;
            candidate
        }

        #[tokio::test]
        async fn test_copy_encoder_completes() {
            let dir = TempDir::new().unwrap();
            let encoder = fake_encoder(dir.path(), r#"cp "$in" "$out""#);
            let candidate = source_candidate(dir.path(), "movie.mkv", 1000);
            let executor = JobExecutor::new(test_config(encoder));
            let mut eta = EtaEstimator::default();

            let outcome = executor.execute(&candidate, &mut eta).await.unwrap();

            match outcome {
                JobOutcome::Completed { ratio, original_deleted, .. } => {
                    assert_eq!(ratio, 1.0);
                    assert!(!original_deleted);
                }
                other => panic!("unexpected outcome: {:?}", other),
            }
            assert_eq!(fs::read(candidate.dest_path()).unwrap().len(), 1000);
            assert!(candidate.source_path.exists());
            assert!(!dir.path().join("movie_processing.mp4").exists());
            assert_eq!(eta.sample_count(), 1);
        }

        #[tokio::test]
        async fn test_finalize_failure_leaves_no_partial_output() {
            let dir = TempDir::new().unwrap();
            let encoder = fake_encoder(dir.path(), r#"cp "$in" "$out""#);
            let candidate = source_candidate(dir.path(), "movie.mkv", 1000);
            fs::create_dir(candidate.dest_path()).unwrap();
            fs::write(candidate.dest_path().join("keep"), b"x").unwrap();
            let executor = JobExecutor::new(test_config(encoder));

            let err = executor
                .execute(&candidate, &mut EtaEstimator::default())
                .await
                .unwrap_err();

            assert!(matches!(err, JobError::Finalize { .. }));
            assert!(candidate.dest_path().join("keep").exists());
            assert!(!partial_of(candidate.dest_path()).exists());
            assert!(!dir.path().join("movie_processing.mp4").exists());
            assert!(candidate.source_path.exists());
        }

        #[tokio::test]
        async fn test_delete_original_after_success() {
            let dir = TempDir::new().unwrap();
            let encoder = fake_encoder(dir.path(), r#"head -c 500 "$in" > "$out""#);
            let candidate = source_candidate(dir.path(), "movie.avi", 1000);
            let mut config = test_config(encoder);
            config.delete_original = true;
            let executor = JobExecutor::new(config);

            let outcome = executor
                .execute(&candidate, &mut EtaEstimator::default())
                .await
                .unwrap();

            assert!(matches!(
                outcome,
                JobOutcome::Completed { original_deleted: true, .. }
            ));
            assert!(!candidate.source_path.exists());
            assert_eq!(fs::read(candidate.dest_path()).unwrap().len(), 500);
        }

        #[tokio::test]
        async fn test_delete_original_never_removes_destination() {
            let dir = TempDir::new().unwrap();
            let encoder = fake_encoder(dir.path(), r#"head -c 400 "$in" > "$out""#);
            let candidate = source_candidate(dir.path(), "movie.mp4", 1000);
            assert_eq!(candidate.dest_path(), candidate.source_path.as_path());
            let mut config = test_config(encoder);
            config.delete_original = true;
            let executor = JobExecutor::new(config);

            let outcome = executor
                .execute(&candidate, &mut EtaEstimator::default())
                .await
                .unwrap();

            assert!(matches!(
                outcome,
                JobOutcome::Completed { original_deleted: false, .. }
            ));
            assert_eq!(fs::read(candidate.dest_path()).unwrap().len(), 400);
        }

        #[tokio::test]
        async fn test_encoder_failure_removes_partial_output() {
            let dir = TempDir::new().unwrap();
            let encoder = fake_encoder(
                dir.path(),
                "echo partial > \"$out\"\necho 'Encode failed: invalid stream' >&2\nexit 1",
            );
            let candidate = source_candidate(dir.path(), "movie.mkv", 1000);
            let executor = JobExecutor::new(test_config(encoder));
            let mut eta = EtaEstimator::default();

            let err = executor.execute(&candidate, &mut eta).await.unwrap_err();

            assert!(matches!(err, JobError::Encode(EncodeError::Failed { code: 1, .. })));
            assert!(err.diagnostics().unwrap().contains("invalid stream"));
            assert!(!dir.path().join("movie_processing.mp4").exists());
            assert!(!candidate.dest_path().exists());
            assert!(candidate.source_path.exists());
            assert_eq!(eta.sample_count(), 0);
        }

        #[tokio::test]
        async fn test_empty_output_is_rejected() {
            let dir = TempDir::new().unwrap();
            let encoder = fake_encoder(dir.path(), r#": > "$out""#);
            let candidate = source_candidate(dir.path(), "movie.mkv", 1000);
            let executor = JobExecutor::new(test_config(encoder));

            let err = executor
                .execute(&candidate, &mut EtaEstimator::default())
                .await
                .unwrap_err();

            assert!(matches!(err, JobError::Validation(_)));
            assert!(!dir.path().join("movie_processing.mp4").exists());
        }

        #[tokio::test]
        async fn test_stop_larger_discards_output() {
            let dir = TempDir::new().unwrap();
            let encoder = fake_encoder(dir.path(), r#"cat "$in" "$in" > "$out""#);
            let candidate = source_candidate(dir.path(), "movie.mkv", 1000);
            let mut config = test_config(encoder);
            config.stop_larger = true;
            config.delete_original = true;
            let executor = JobExecutor::new(config);
            let mut eta = EtaEstimator::default();

            let outcome = executor.execute(&candidate, &mut eta).await.unwrap();

            match outcome {
                JobOutcome::StopLarger { ratio, .. } => assert_eq!(ratio, 2.0),
                other => panic!("unexpected outcome: {:?}", other),
            }
            assert!(!candidate.dest_path().exists());
            assert!(!dir.path().join("movie_processing.mp4").exists());
            assert!(candidate.source_path.exists());
            assert_eq!(eta.sample_count(), 1);
        }

        #[tokio::test]
        async fn test_larger_output_kept_without_stop_larger() {
            let dir = TempDir::new().unwrap();
            let encoder = fake_encoder(dir.path(), r#"cat "$in" "$in" > "$out""#);
            let candidate = source_candidate(dir.path(), "movie.mkv", 1000);
            let executor = JobExecutor::new(test_config(encoder));

            let outcome = executor
                .execute(&candidate, &mut EtaEstimator::default())
                .await
                .unwrap();

            assert!(matches!(outcome, JobOutcome::Completed { .. }));
            assert_eq!(fs::read(candidate.dest_path()).unwrap().len(), 2000);
        }

        #[tokio::test]
        async fn test_workspace_staging_is_cleaned_up() {
            let dir = TempDir::new().unwrap();
            let media = dir.path().join("media");
            let workspace = dir.path().join("workspace");
            fs::create_dir_all(&media).unwrap();
            fs::create_dir_all(&workspace).unwrap();

            // The encoder must only ever see the workspace copy
            let encoder = fake_encoder(
                dir.path(),
                &format!(
                    "case \"$in\" in {}/*) ;; *) exit 9 ;; esac\ncp \"$in\" \"$out\"",
                    workspace.display()
                ),
            );
            let candidate = source_candidate(&media, "movie.mkv", 1000);
            let mut config = test_config(encoder);
            config.workspace = Some(workspace.clone());
            let executor = JobExecutor::new(config);

            let outcome = executor
                .execute(&candidate, &mut EtaEstimator::default())
                .await
                .unwrap();

            assert!(matches!(outcome, JobOutcome::Completed { .. }));
            assert!(media.join("movie.mp4").exists());
            assert_eq!(fs::read_dir(&workspace).unwrap().count(), 0);
        }
    }
}

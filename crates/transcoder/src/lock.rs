//! Lock marker module for keeping two runs off the same source.
//!
//! A marker `<source>.lock` is created with create-new semantics before a source
//! is transcoded and removed when the [`LockGuard`] is dropped. The marker records
//! which run created it so a run never deletes a marker it does not own.
//!
//! A process that is killed leaves its marker behind. Markers older than the
//! grace period, or written on this host by a process that no longer exists, are
//! treated as stale and may be reclaimed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use sysinfo::{Pid, ProcessRefreshKind, RefreshKind, System};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Suffix appended to the source path to form the marker path.
pub const LOCK_SUFFIX: &str = ".lock";

/// Error type for lock operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another run holds the marker.
    #[error("lock already held: {}", .0.display())]
    Held(PathBuf),

    /// IO error creating or removing the marker.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Constructs the lock marker path for a source file.
///
/// For example: `/media/movie.mkv` -> `/media/movie.mkv.lock`
pub fn lock_marker_path(source: &Path) -> PathBuf {
    let mut marker = source.as_os_str().to_owned();
    marker.push(LOCK_SUFFIX);
    PathBuf::from(marker)
}

/// Contents of a lock marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockMarker {
    /// Id of the run that created the marker.
    pub owner: Uuid,
    pub pid: u32,
    pub host: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn read_marker(path: &Path) -> Option<LockMarker> {
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Creates, checks and reclaims lock markers on behalf of one run.
#[derive(Debug, Clone)]
pub struct LockCoordinator {
    instance_id: Uuid,
    host: Option<String>,
    stale_grace: Option<Duration>,
}

impl LockCoordinator {
    /// `stale_grace` of `None` disables age-based reclamation.
    pub fn new(stale_grace: Option<Duration>) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            host: System::host_name(),
            stale_grace,
        }
    }

    /// Id written into every marker this coordinator creates.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Checks if any run currently holds a marker for `source`.
    pub fn exists(&self, source: &Path) -> bool {
        lock_marker_path(source).exists()
    }

    /// Creates the marker for `source`.
    ///
    /// Exactly one of several concurrent callers (threads or processes) succeeds;
    /// the others get [`LockError::Held`].
    pub fn acquire(&self, source: &Path) -> Result<LockGuard, LockError> {
        let path = lock_marker_path(source);

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(LockError::Held(path));
            }
            Err(e) => return Err(LockError::Io(e)),
        };

        // The file is ours until the marker is written, so an error below
        // removes it without checking the owner
        let mut guard = LockGuard {
            path,
            owner: self.instance_id,
            written: false,
            released: false,
        };

        let marker = LockMarker {
            owner: self.instance_id,
            pid: std::process::id(),
            host: self.host.clone(),
            created_at: Utc::now(),
        };
        write_marker(&mut file, &marker)?;
        file.sync_all()?;
        guard.written = true;

        debug!("Acquired lock '{}'", guard.path.display());
        Ok(guard)
    }

    /// Removes the marker for `source` if it is stale.
    ///
    /// Returns true when a stale marker was removed; the caller may then
    /// [`acquire`](Self::acquire) normally.
    pub fn try_reclaim(&self, source: &Path) -> Result<bool, LockError> {
        let path = lock_marker_path(source);
        let marker = read_marker(&path);

        if !self.is_stale(&path, marker.as_ref()) {
            return Ok(false);
        }

        // Re-read right before removal so a marker replaced in the meantime survives
        if read_marker(&path) != marker {
            return Ok(false);
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                warn!("Reclaimed stale lock '{}'", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(LockError::Io(e)),
        }
    }

    fn is_stale(&self, path: &Path, marker: Option<&LockMarker>) -> bool {
        if let Some(marker) = marker {
            if marker.owner == self.instance_id {
                return false;
            }
            if self.host.is_some() && marker.host == self.host && !process_running(marker.pid) {
                return true;
            }
        }

        let Some(grace) = self.stale_grace else {
            return false;
        };

        let age = match marker {
            Some(marker) => (Utc::now() - marker.created_at).to_std().unwrap_or_default(),
            // Unreadable or legacy empty markers are aged by their mtime
            None => fs::metadata(path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| SystemTime::now().duration_since(modified).ok())
                .unwrap_or_default(),
        };

        age > grace
    }
}

fn process_running(pid: u32) -> bool {
    let system =
        System::new_with_specifics(RefreshKind::new().with_processes(ProcessRefreshKind::new()));
    system.process(Pid::from_u32(pid)).is_some()
}

fn write_marker<W: Write>(out: &mut W, marker: &LockMarker) -> io::Result<()> {
    let json =
        serde_json::to_vec(marker).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    out.write_all(&json)?;
    out.flush()
}

/// Removes the marker at `path` if it was written by `owner`.
fn release_marker(path: &Path, owner: Uuid) -> io::Result<bool> {
    match read_marker(path) {
        Some(marker) if marker.owner == owner => remove_marker(path),
        _ => Ok(false),
    }
}

fn remove_marker(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Held lock marker; released on drop.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    owner: Uuid,
    /// False while the freshly created marker is still empty or partial.
    written: bool,
    released: bool,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release explicitly, reporting IO errors instead of logging them.
    pub fn release(mut self) -> io::Result<bool> {
        self.released = true;
        self.remove()
    }

    fn remove(&self) -> io::Result<bool> {
        if self.written {
            release_marker(&self.path, self.owner)
        } else {
            remove_marker(&self.path)
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.remove() {
            warn!("Failed to remove lock '{}': {}", self.path.display(), e);
        }
    }
}

//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
    /// A value is outside its allowed range
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Highest track number accepted for `audio_track` / `subtitle_track`.
pub const MAX_TRACK: u32 = 5;

/// Key used to order discovered files before processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Full source path, lexicographic
    #[default]
    Name,
    /// Probed media duration (probes every file before the first encode)
    Duration,
    /// Source file size
    Size,
    /// Source modification time
    Modified,
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::Name => write!(f, "name"),
            SortKey::Duration => write!(f, "duration"),
            SortKey::Size => write!(f, "size"),
            SortKey::Modified => write!(f, "modified"),
        }
    }
}

impl FromStr for SortKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "duration" => Ok(SortKey::Duration),
            "size" => Ok(SortKey::Size),
            "modified" | "mtime" => Ok(SortKey::Modified),
            other => Err(ConfigError::Invalid(format!(
                "unknown sort key '{}' (expected name, duration, size or modified)",
                other
            ))),
        }
    }
}

/// Input/output locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathsConfig {
    /// Root directory searched for videos
    #[serde(default = "default_input")]
    pub input: PathBuf,
    /// Directory receiving transcoded files (next to the source if None)
    #[serde(default)]
    pub output: Option<PathBuf>,
    /// Scratch directory used to stage sources and outputs during encoding
    #[serde(default)]
    pub workspace: Option<PathBuf>,
}

fn default_input() -> PathBuf {
    PathBuf::from(".")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
            output: None,
            workspace: None,
        }
    }
}

/// File discovery settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanConfig {
    /// Extensions (without dot, case-insensitive) picked up by the scanner
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Glob patterns matched against file names and root-relative paths
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default)]
    pub descending: bool,
}

fn default_extensions() -> Vec<String> {
    ["avi", "mkv", "iso", "img", "mp4", "m4v", "ts"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_exclude() -> Vec<String> {
    vec!["*_processing.mp4".to_string()]
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            exclude: default_exclude(),
            sort: SortKey::default(),
            descending: false,
        }
    }
}

/// Encoder invocation and post-encode policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncodeConfig {
    /// HandBrake preset name
    #[serde(default = "default_preset")]
    pub preset: String,
    /// Audio track to keep (all tracks if None)
    #[serde(default)]
    pub audio_track: Option<u32>,
    /// Subtitle track to burn in (scan, not burned, if None)
    #[serde(default)]
    pub subtitle_track: Option<u32>,
    /// Container extension of produced files
    #[serde(default = "default_container")]
    pub container: String,
    /// Actually run the encoder (dry run otherwise)
    #[serde(default)]
    pub execute: bool,
    /// Overwrite destinations that already exist
    #[serde(default)]
    pub force: bool,
    /// Remove the source once the destination is confirmed
    #[serde(default)]
    pub delete_original: bool,
    /// Abort the batch when an output ends up larger than its source
    #[serde(default)]
    pub stop_larger: bool,
    /// Output/source size ratio above which `stop_larger` triggers
    #[serde(default = "default_max_size_ratio")]
    pub max_size_ratio: f32,
    /// Explicit encoder binary (looked up on PATH if None)
    #[serde(default)]
    pub encoder_path: Option<PathBuf>,
}

fn default_preset() -> String {
    "Fast 1080p30".to_string()
}

fn default_container() -> String {
    "mp4".to_string()
}

fn default_max_size_ratio() -> f32 {
    1.0
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            audio_track: None,
            subtitle_track: None,
            container: default_container(),
            execute: false,
            force: false,
            delete_original: false,
            stop_larger: false,
            max_size_ratio: default_max_size_ratio(),
            encoder_path: None,
        }
    }
}

/// Metadata probing settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeConfig {
    /// Number of background probe workers
    #[serde(default = "default_probe_workers")]
    pub workers: usize,
    /// Explicit mediainfo binary (looked up on PATH if None)
    #[serde(default)]
    pub mediainfo_path: Option<PathBuf>,
}

fn default_probe_workers() -> usize {
    1
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            workers: default_probe_workers(),
            mediainfo_path: None,
        }
    }
}

/// Lock marker settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockConfig {
    /// Age after which a foreign lock marker may be reclaimed (0 disables)
    #[serde(default = "default_stale_grace_secs")]
    pub stale_grace_secs: u64,
}

fn default_stale_grace_secs() -> u64 {
    24 * 60 * 60
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            stale_grace_secs: default_stale_grace_secs(),
        }
    }
}

/// ETA estimation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EtaConfig {
    /// Number of most recent transcodes used to pick the queue ETA bucket
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,
}

fn default_recent_window() -> usize {
    5
}

impl Default for EtaConfig {
    fn default() -> Self {
        Self {
            recent_window: default_recent_window(),
        }
    }
}

/// One preset → expected source codec mapping
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodecRule {
    /// Glob matched case-insensitively against the preset name
    pub preset: String,
    /// Codec format the preset produces (mediainfo naming, e.g. "HEVC")
    pub format: String,
    /// Profile substrings that disqualify an otherwise matching source
    #[serde(default)]
    pub profile_excludes: Vec<String>,
}

impl CodecRule {
    pub fn new(preset: &str, format: &str) -> Self {
        Self {
            preset: preset.to_string(),
            format: format.to_string(),
            profile_excludes: Vec::new(),
        }
    }
}

/// Table deciding which sources are already in the requested format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodecTargetsConfig {
    /// Rules checked in order; first matching preset glob wins
    #[serde(default = "default_codec_rules")]
    pub rules: Vec<CodecRule>,
    /// Target format when no rule matches the preset
    #[serde(default = "default_target_format")]
    pub default_format: String,
    #[serde(default = "default_profile_excludes")]
    pub default_profile_excludes: Vec<String>,
}

fn default_codec_rules() -> Vec<CodecRule> {
    vec![
        CodecRule::new("*H.265*", "HEVC"),
        CodecRule::new("*HEVC*", "HEVC"),
        CodecRule::new("*x265*", "HEVC"),
        CodecRule::new("*AV1*", "AV1"),
        CodecRule::new("*VP9*", "VP9"),
    ]
}

fn default_target_format() -> String {
    "AVC".to_string()
}

fn default_profile_excludes() -> Vec<String> {
    vec!["@L5".to_string()]
}

impl Default for CodecTargetsConfig {
    fn default() -> Self {
        Self {
            rules: default_codec_rules(),
            default_format: default_target_format(),
            default_profile_excludes: default_profile_excludes(),
        }
    }
}

/// Main run configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RunConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub encode: EncodeConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub locks: LockConfig,
    #[serde(default)]
    pub eta: EtaConfig,
    #[serde(default)]
    pub codec_targets: CodecTargetsConfig,
}

impl RunConfig {
    /// Load configuration from a TOML file
    ///
    /// Missing sections and fields fall back to their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - PLEX_TRANSCODE_PRESET -> encode.preset
    /// - PLEX_TRANSCODE_OUTPUT -> paths.output
    /// - PLEX_TRANSCODE_WORKSPACE -> paths.workspace
    /// - PLEX_TRANSCODE_PROBE_WORKERS -> probe.workers
    /// - PLEX_TRANSCODE_FORCE -> encode.force
    /// - PLEX_TRANSCODE_STOP_LARGER -> encode.stop_larger
    /// - PLEX_TRANSCODE_DELETE_ORIGINAL -> encode.delete_original
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("PLEX_TRANSCODE_PRESET") {
            if !val.trim().is_empty() {
                self.encode.preset = val;
            }
        }

        if let Ok(val) = env::var("PLEX_TRANSCODE_OUTPUT") {
            if !val.trim().is_empty() {
                self.paths.output = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = env::var("PLEX_TRANSCODE_WORKSPACE") {
            if !val.trim().is_empty() {
                self.paths.workspace = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = env::var("PLEX_TRANSCODE_PROBE_WORKERS") {
            if let Ok(workers) = val.parse::<usize>() {
                self.probe.workers = workers;
            }
        }

        if let Some(force) = env_flag("PLEX_TRANSCODE_FORCE") {
            self.encode.force = force;
        }

        if let Some(stop) = env_flag("PLEX_TRANSCODE_STOP_LARGER") {
            self.encode.stop_larger = stop;
        }

        if let Some(delete) = env_flag("PLEX_TRANSCODE_DELETE_ORIGINAL") {
            self.encode.delete_original = delete;
        }
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, track) in [
            ("audio_track", self.encode.audio_track),
            ("subtitle_track", self.encode.subtitle_track),
        ] {
            if let Some(track) = track {
                if track == 0 || track > MAX_TRACK {
                    return Err(ConfigError::Invalid(format!(
                        "{} must be between 1 and {}, got {}",
                        name, MAX_TRACK, track
                    )));
                }
            }
        }

        if self.probe.workers == 0 {
            return Err(ConfigError::Invalid(
                "probe.workers must be at least 1".to_string(),
            ));
        }

        if !(self.encode.max_size_ratio > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "encode.max_size_ratio must be positive, got {}",
                self.encode.max_size_ratio
            )));
        }

        if self.scan.extensions.iter().all(|e| e.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "scan.extensions must list at least one extension".to_string(),
            ));
        }

        if self.encode.container.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "encode.container must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Whether an explicit audio or subtitle track was requested
    pub fn tracks_selected(&self) -> bool {
        self.encode.audio_track.is_some() || self.encode.subtitle_track.is_some()
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }
}

/// Accept "true", "1", "yes" as true; "false", "0", "no" as false
fn env_flag(name: &str) -> Option<bool> {
    let val = env::var(name).ok()?;
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

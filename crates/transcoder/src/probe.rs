//! Probe module for reading codec and duration metadata from video files.
//!
//! Metadata comes from `mediainfo --Output=JSON`. The [`MediaProbe`] trait is the
//! seam the scheduler works against so the external tool can be swapped out.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Error type for probe operations.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The file disappeared between discovery and probing.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// mediainfo exited unsuccessfully.
    #[error("mediainfo failed: {0}")]
    ToolFailed(String),

    /// Failed to parse mediainfo JSON output.
    #[error("Failed to parse mediainfo output: {0}")]
    ParseError(String),

    /// IO error while launching the probe.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of probing one file.
pub type ProbeOutcome = Result<MediaInfo, ProbeError>;

/// Codec identity and duration of one video track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoTrack {
    /// Codec format name as reported by mediainfo (e.g. "AVC", "HEVC").
    pub format: String,
    /// Format profile, with the level appended as `@L<level>` when known.
    pub profile: String,
    /// Track duration in milliseconds.
    pub duration_ms: u64,
}

/// Video tracks found in a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MediaInfo {
    pub video_tracks: Vec<VideoTrack>,
}

impl MediaInfo {
    /// The track the skip decision is based on.
    pub fn primary_video(&self) -> Option<&VideoTrack> {
        self.video_tracks.first()
    }
}

/// Something that can extract video metadata from a file.
pub trait MediaProbe: Send + Sync {
    fn probe(&self, path: &Path) -> ProbeOutcome;
}

/// [`MediaProbe`] backed by the mediainfo command line tool.
#[derive(Debug, Clone)]
pub struct MediaInfoProbe {
    binary: PathBuf,
}

impl MediaInfoProbe {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl MediaProbe for MediaInfoProbe {
    fn probe(&self, path: &Path) -> ProbeOutcome {
        if !path.exists() {
            return Err(ProbeError::NotFound(path.to_path_buf()));
        }

        let output = Command::new(&self.binary)
            .arg("--Output=JSON")
            .arg(path)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::ToolFailed(format!(
                "mediainfo exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        parse_mediainfo_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Raw mediainfo JSON structures for parsing.
mod mediainfo_json {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct MediainfoOutput {
        pub media: Option<Media>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Media {
        #[serde(default)]
        pub track: Vec<Track>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(tag = "@type")]
    pub enum Track {
        Video(Video),
        #[serde(other)]
        Other,
    }

    #[derive(Debug, Deserialize)]
    pub struct Video {
        #[serde(rename = "Format")]
        pub format: Option<String>,
        #[serde(rename = "Format_Profile")]
        pub format_profile: Option<String>,
        #[serde(rename = "Format_Level")]
        pub format_level: Option<String>,
        /// Seconds, as a decimal string.
        #[serde(rename = "Duration")]
        pub duration: Option<String>,
    }
}

/// Parses mediainfo JSON output into a MediaInfo.
///
/// A file mediainfo could not identify yields an empty track list rather than an error.
pub fn parse_mediainfo_output(json_str: &str) -> ProbeOutcome {
    let parsed: mediainfo_json::MediainfoOutput =
        serde_json::from_str(json_str).map_err(|e| ProbeError::ParseError(e.to_string()))?;

    let tracks = parsed.media.map(|m| m.track).unwrap_or_default();

    let video_tracks = tracks
        .into_iter()
        .filter_map(|track| match track {
            mediainfo_json::Track::Video(video) => Some(video),
            mediainfo_json::Track::Other => None,
        })
        .filter_map(|video| {
            // A video track without a format is not decodable for our purposes
            let format = video.format.filter(|f| !f.trim().is_empty())?;

            let mut profile = video.format_profile.unwrap_or_default();
            if let Some(level) = video.format_level.filter(|l| !l.is_empty()) {
                profile = format!("{}@L{}", profile, level);
            }

            let duration_ms = video
                .duration
                .as_deref()
                .and_then(|d| d.trim().parse::<f64>().ok())
                .filter(|secs| secs.is_finite() && *secs > 0.0)
                .map(|secs| (secs * 1000.0).round() as u64)
                .unwrap_or(0);

            Some(VideoTrack {
                format,
                profile,
                duration_ms,
            })
        })
        .collect();

    Ok(MediaInfo { video_tracks })
}

#[cfg(test)]
mod tests {
    use super::*;

    const AVC_SAMPLE: &str = r#"{
        "creatingLibrary": {"name": "MediaInfoLib", "version": "23.10"},
        "media": {
            "@ref": "/media/movie.mkv",
            "track": [
                {"@type": "General", "Format": "Matroska", "Duration": "5423.123"},
                {"@type": "Video", "Format": "AVC", "Format_Profile": "Main",
                 "Format_Level": "4", "Duration": "5423.100", "Width": "1920"},
                {"@type": "Audio", "Format": "AC-3", "Duration": "5423.123"}
            ]
        }
    }"#;

    #[test]
    fn test_parse_video_track() {
        let info = parse_mediainfo_output(AVC_SAMPLE).unwrap();

        assert_eq!(info.video_tracks.len(), 1);
        let video = info.primary_video().unwrap();
        assert_eq!(video.format, "AVC");
        assert_eq!(video.profile, "Main@L4");
        assert_eq!(video.duration_ms, 5_423_100);
    }

    #[test]
    fn test_parse_profile_without_level() {
        let json = r#"{"media": {"track": [
            {"@type": "Video", "Format": "HEVC", "Format_Profile": "Main 10", "Duration": "60"}
        ]}}"#;
        let info = parse_mediainfo_output(json).unwrap();
        let video = info.primary_video().unwrap();

        assert_eq!(video.format, "HEVC");
        assert_eq!(video.profile, "Main 10");
        assert_eq!(video.duration_ms, 60_000);
    }

    #[test]
    fn test_parse_audio_only_has_no_video() {
        let json = r#"{"media": {"track": [
            {"@type": "General", "Format": "MPEG Audio"},
            {"@type": "Audio", "Format": "MPEG Audio", "Duration": "180.5"}
        ]}}"#;
        let info = parse_mediainfo_output(json).unwrap();

        assert!(info.video_tracks.is_empty());
        assert!(info.primary_video().is_none());
    }

    #[test]
    fn test_parse_unrecognised_file() {
        let info = parse_mediainfo_output(r#"{"media": null}"#).unwrap();
        assert!(info.video_tracks.is_empty());
    }

    #[test]
    fn test_parse_missing_duration_defaults_to_zero() {
        let json = r#"{"media": {"track": [{"@type": "Video", "Format": "MPEG-4 Visual"}]}}"#;
        let info = parse_mediainfo_output(json).unwrap();

        assert_eq!(info.primary_video().unwrap().duration_ms, 0);
        assert_eq!(info.primary_video().unwrap().profile, "");
    }

    #[test]
    fn test_parse_invalid_json() {
        let result = parse_mediainfo_output("not json");
        assert!(matches!(result, Err(ProbeError::ParseError(_))));
    }

    #[test]
    fn test_probe_missing_file_is_not_found() {
        let probe = MediaInfoProbe::new(PathBuf::from("mediainfo"));
        let result = probe.probe(Path::new("/definitely/not/here.mkv"));
        assert!(matches!(result, Err(ProbeError::NotFound(_))));
    }
}

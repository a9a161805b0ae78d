//! Extension allowlists for browsing and stream inputs.
//!
//! Only text subtitle formats are accepted, since the stream output
//! converts subtitles to WebVTT. Bitmap formats (`.sup`, `.idx`) show up
//! as plain files.

use std::path::Path;

use reelcast_core::types::EntryKind;
use serde::{Deserialize, Serialize};

pub static VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "m4v", "avi", "mov", "wmv", "flv", "webm", "ts", "m2ts", "mts", "mpg", "mpeg",
    "3gp", "ogv",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    Srt,
    Vtt,
    Ass,
    Ssa,
    Sub, // MicroDVD
}

impl SubtitleFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "srt" => Some(Self::Srt),
            "vtt" => Some(Self::Vtt),
            "ass" => Some(Self::Ass),
            "ssa" => Some(Self::Ssa),
            "sub" => Some(Self::Sub),
            _ => None,
        }
    }
}

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Check if a file has a video extension.
pub fn is_video_file(filename: &str) -> bool {
    extension_of(filename).is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
}

/// Check if a file has a supported subtitle extension.
pub fn is_subtitle_file(filename: &str) -> bool {
    extension_of(filename).is_some_and(|ext| SubtitleFormat::from_extension(&ext).is_some())
}

/// Classify a regular file by name.
pub fn classify_file(filename: &str) -> EntryKind {
    if is_video_file(filename) {
        EntryKind::Video
    } else if is_subtitle_file(filename) {
        EntryKind::Subtitle
    } else {
        EntryKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtitle_format_detection() {
        assert_eq!(SubtitleFormat::from_extension("srt"), Some(SubtitleFormat::Srt));
        assert_eq!(SubtitleFormat::from_extension("SRT"), Some(SubtitleFormat::Srt));
        assert_eq!(SubtitleFormat::from_extension("ass"), Some(SubtitleFormat::Ass));
        assert_eq!(SubtitleFormat::from_extension("vtt"), Some(SubtitleFormat::Vtt));
        assert_eq!(SubtitleFormat::from_extension("sup"), None);
        assert_eq!(SubtitleFormat::from_extension("mp4"), None);
    }

    #[test]
    fn bare_extension_is_not_a_match() {
        assert!(!is_video_file("mkv"));
        assert!(!is_subtitle_file("srt"));
        assert!(!is_video_file(".mkv"));
    }

    #[test]
    fn classification() {
        assert_eq!(classify_file("ep1.MKV"), EntryKind::Video);
        assert_eq!(classify_file("ep1.en.srt"), EntryKind::Subtitle);
        assert_eq!(classify_file("poster.jpg"), EntryKind::Other);
        assert_eq!(classify_file("README"), EntryKind::Other);
    }
}

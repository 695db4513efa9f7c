/// YouTube video identifier extraction
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PipelineError;

/// A validated 11-character YouTube video identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Validate a bare identifier or extract one from any supported URL shape
    pub fn parse(input: &str) -> Result<Self, PipelineError> {
        extract_video_id(input)
            .map(VideoId)
            .ok_or_else(|| PipelineError::InvalidVideoId(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the 11-character identifier from a YouTube URL or bare id.
///
/// Accepts `watch?v=`, `&v=`, `youtu.be/`, `embed/`, `shorts/`, `live/` and `v/` forms.
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();

    let bare = Regex::new(r"^[A-Za-z0-9_-]{11}$").ok()?;
    if bare.is_match(input) {
        return Some(input.to_string());
    }

    let url_pattern = Regex::new(
        r"(?:youtube(?:-nocookie)?\.com/(?:[^/\s]+/\S+/|(?:v|e(?:mbed)?|shorts|live)/|\S*?[?&]v=)|youtu\.be/)([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
    )
    .ok()?;

    url_pattern
        .captures(input)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_common_url_shapes() {
        let urls = [
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10",
            "https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ?autoplay=1",
            "https://youtube.com/shorts/dQw4w9WgXcQ",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ#comments",
            "dQw4w9WgXcQ",
        ];

        for url in urls {
            assert_eq!(
                extract_video_id(url).as_deref(),
                Some("dQw4w9WgXcQ"),
                "failed for {}",
                url
            );
        }
    }

    #[test]
    fn test_rejects_invalid_input() {
        assert_eq!(extract_video_id("https://example.com/watch?v=dQw4w9WgXcQ"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v=short"), None);
        assert_eq!(extract_video_id(""), None);
        assert!(matches!(
            VideoId::parse("not a video"),
            Err(PipelineError::InvalidVideoId(_))
        ));
    }

    #[test]
    fn test_video_id_display() {
        let id = VideoId::parse("https://youtu.be/dQw4w9WgXcQ").unwrap();
        assert_eq!(id.to_string(), "dQw4w9WgXcQ");
        assert_eq!(id.as_str(), "dQw4w9WgXcQ");
    }
}

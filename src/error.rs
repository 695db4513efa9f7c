//! Error types for each pipeline layer

use std::time::Duration;

/// Failure of a single relay attempt
#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed relay response: {0}")]
    Malformed(String),

    #[error("response rejected: {0}")]
    Rejected(String),

    #[error("invalid relay URL: {0}")]
    Url(#[from] url::ParseError),
}

impl RelayError {
    /// The relay answered successfully but the body carried no captions
    pub fn is_answered_without_captions(&self) -> bool {
        matches!(self, RelayError::Rejected(_))
    }
}

/// Caption transport failure, raised only once every relay has been tried
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("no caption relays configured")]
    NoRelays,

    #[error("caption fetch cancelled")]
    Cancelled,

    #[error("all {attempts} caption relays failed, last error: {last_cause}")]
    Exhausted { attempts: usize, last_cause: String },

    /// Every relay got through but none returned a caption track
    #[error("video has no captions ({attempts} relays answered without a caption track, last: {last_cause})")]
    NoCaptions { attempts: usize, last_cause: String },
}

impl TransportError {
    /// Underlying cause of the last failed relay, if any
    pub fn last_cause(&self) -> Option<&str> {
        match self {
            TransportError::Exhausted { last_cause, .. } | TransportError::NoCaptions { last_cause, .. } => {
                Some(last_cause)
            }
            _ => None,
        }
    }
}

/// Caption payload was received but could not be turned into a timeline
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("caption payload contains no text segments")]
    NoSegments,

    #[error("caption payload is malformed: {0}")]
    Malformed(String),

    #[error("no caption tracks found in page data")]
    NoCaptionTracks,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

/// LLM-backed enrichment failure; always recovered by the heuristic path
#[derive(thiserror::Error, Debug)]
pub enum EnrichmentError {
    #[error("LLM enrichment not configured: {0}")]
    NotConfigured(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM request timed out after {0:?}")]
    Timeout(Duration),

    #[error("LLM API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("could not parse LLM response: {0}")]
    Parse(String),
}

/// Failure surfaced by the pipeline's fetch and parse stages
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("invalid YouTube video identifier: {0}")]
    InvalidVideoId(String),
    #[error("video {0} is already being processed")]
    InProgress(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl PipelineError {
    /// Human-readable next step for the user
    pub fn suggestion(&self) -> &'static str {
        match self {
            PipelineError::InvalidVideoId(_) => {
                "Check the video URL. It should look like https://www.youtube.com/watch?v=VIDEO_ID."
            }
            PipelineError::InProgress(_) => "Another request for this video is running. Try again shortly.",
            PipelineError::Transport(TransportError::Cancelled) => {
                "The request was cancelled before captions were retrieved."
            }
            PipelineError::Transport(TransportError::NoCaptions { .. }) | PipelineError::Parse(_) => {
                "This video has no usable captions. Try a video with subtitles or auto-generated captions enabled."
            }
            PipelineError::Transport(_) => {
                "Caption relays could not be reached. Check your network connection or try again in a few minutes."
            }
        }
    }
}

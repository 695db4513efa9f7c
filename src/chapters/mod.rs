/// Chapter segmentation: break-point detection and chapter assembly
///
/// The detector scores candidate boundaries from silence gaps and discourse
/// markers; the assembler turns the best of them into a contiguous chapter list,
/// substituting evenly spaced cuts when the transcript gives too little signal.

pub mod assembler;
pub mod detector;
pub mod markers;

// Re-export main types
pub use assembler::{generate_time_based_breaks, AssemblyConfig, ChapterAssembler};
pub use detector::{BreakDetector, DetectionConfig};
pub use markers::MarkerSet;

use serde::{Deserialize, Serialize};

/// Why a boundary was proposed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum BreakReason {
    SilenceGap,
    DiscourseMarker,
    TimeInterval,
}

/// A proposed chapter boundary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BreakCandidate {
    /// Boundary time in seconds, strictly inside the timeline span
    pub time: f64,
    pub reason: BreakReason,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

impl BreakCandidate {
    pub fn new(time: f64, reason: BreakReason, confidence: f64) -> Self {
        Self {
            time,
            reason,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// A single chapter of the final output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    /// 1-based position
    pub index: usize,
    pub title: String,
    pub start_time: f64,
    pub end_time: f64,
    pub formatted_start_time: String,
    pub formatted_end_time: String,
    pub description: String,
}

impl Chapter {
    pub fn new(index: usize, title: String, start_time: f64, end_time: f64, description: String) -> Self {
        Self {
            index,
            title,
            start_time,
            end_time,
            formatted_start_time: format_timestamp(start_time),
            formatted_end_time: format_timestamp(end_time),
            description,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Copy of this chapter with a different title
    pub fn retitled(&self, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..self.clone()
        }
    }
}

/// Format seconds as `H:MM:SS` from one hour up, `M:SS` below
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() { seconds.max(0.0).floor() as u64 } else { 0 };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

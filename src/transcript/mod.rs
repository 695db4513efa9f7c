/// Word-level transcript types and the caller-facing result envelope
pub mod parser;

pub use parser::{parse, TranscriptParser};

use serde::{Deserialize, Serialize};

/// Confidence assigned to caption words, which carry no per-word score
pub const DEFAULT_CAPTION_CONFIDENCE: f64 = 1.0;

/// A single timed token of the transcript
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    /// Token text, never empty
    #[serde(rename = "word")]
    pub text: String,
    /// Start offset in seconds
    pub start_time: f64,
    /// End offset in seconds, `>= start_time`
    pub end_time: f64,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

impl Word {
    pub fn new(text: impl Into<String>, start_time: f64, end_time: f64, confidence: f64) -> Self {
        let start_time = start_time.max(0.0);
        Self {
            text: text.into(),
            start_time,
            end_time: end_time.max(start_time),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Immutable, start-ordered word sequence for one (video, language) pair
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    words: Vec<Word>,
    full_text: String,
    duration: f64,
}

impl Timeline {
    /// Build a timeline, restoring start-time order if the source was out of order
    pub fn new(mut words: Vec<Word>, full_text: String) -> Self {
        words.retain(|w| !w.text.is_empty());
        words.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        let duration = words.iter().map(|w| w.end_time).fold(0.0, f64::max);

        Self {
            words,
            full_text,
            duration,
        }
    }

    /// Build a timeline and derive the full text from its words
    pub fn from_words(words: Vec<Word>) -> Self {
        let full_text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Self::new(words, full_text)
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    /// Maximum word end time
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Words overlapping the half-open range `[start, end)`
    pub fn words_in_range(&self, start: f64, end: f64) -> impl Iterator<Item = &Word> {
        self.words
            .iter()
            .filter(move |w| w.start_time >= start && w.start_time < end)
    }
}

/// Where a transcript came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptSource {
    Captions,
    Demo,
    Whisper,
}

/// Successful transcript payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptData {
    pub video_id: String,
    pub language: String,
    pub transcript: Vec<Word>,
    pub full_text: String,
    pub duration: f64,
    pub source: TranscriptSource,
    pub is_demo_data: bool,
}

impl TranscriptData {
    pub fn from_timeline(
        video_id: &str,
        language: &str,
        timeline: &Timeline,
        source: TranscriptSource,
    ) -> Self {
        Self {
            video_id: video_id.to_string(),
            language: language.to_string(),
            transcript: timeline.words().to_vec(),
            full_text: timeline.full_text().to_string(),
            duration: timeline.duration(),
            source,
            is_demo_data: source == TranscriptSource::Demo,
        }
    }

    /// Rebuild the immutable timeline from the serialized words
    pub fn timeline(&self) -> Timeline {
        Timeline::new(self.transcript.clone(), self.full_text.clone())
    }
}

/// Caller-facing transcript envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<TranscriptData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl TranscriptResult {
    pub fn success(data: TranscriptData) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            suggestion: None,
        }
    }

    pub fn failure(error: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            suggestion: Some(suggestion.into()),
        }
    }

    pub fn is_demo(&self) -> bool {
        self.data.as_ref().map_or(false, |d| d.is_demo_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeline_sorts_and_measures() {
        let timeline = Timeline::from_words(vec![
            Word::new("world", 1.0, 2.5, 1.0),
            Word::new("hello", 0.0, 1.0, 1.0),
        ]);

        assert_eq!(timeline.words()[0].text, "hello");
        assert_eq!(timeline.duration(), 2.5);
        assert_eq!(timeline.len(), 2);
    }

    #[test]
    fn test_word_clamps_invalid_values() {
        let word = Word::new("x", -1.0, -2.0, 1.7);
        assert_eq!(word.start_time, 0.0);
        assert_eq!(word.end_time, 0.0);
        assert_eq!(word.confidence, 1.0);
    }

    #[test]
    fn test_result_envelope_shape() {
        let timeline = Timeline::from_words(vec![Word::new("hi", 0.0, 1.0, 1.0)]);
        let data = TranscriptData::from_timeline("dQw4w9WgXcQ", "en", &timeline, TranscriptSource::Captions);
        let json = serde_json::to_value(TranscriptResult::success(data)).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["videoId"], "dQw4w9WgXcQ");
        assert_eq!(json["data"]["transcript"][0]["word"], "hi");
        assert_eq!(json["data"]["transcript"][0]["startTime"], 0.0);
        assert_eq!(json["data"]["source"], "captions");
        assert!(json.get("error").is_none());

        let failure = serde_json::to_value(TranscriptResult::failure("boom", "try later")).unwrap();
        assert_eq!(failure["success"], false);
        assert_eq!(failure["suggestion"], "try later");
        assert!(failure.get("data").is_none());
    }
}

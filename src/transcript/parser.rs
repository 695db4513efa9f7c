/// Timed-text caption parser producing a word-level timeline
use super::{Timeline, Word, DEFAULT_CAPTION_CONFIDENCE};
use crate::error::ParseError;
use regex::Regex;
use scraper::Html;
use serde::Deserialize;
use tracing::debug;

/// One caption cue before tokenization
#[derive(Debug, Clone, PartialEq)]
struct RawSegment {
    start: f64,
    duration: f64,
    text: String,
}

#[derive(Debug, Deserialize)]
struct Json3Payload {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Json3Event {
    t_start_ms: Option<f64>,
    d_duration_ms: Option<f64>,
    segs: Option<Vec<Json3Seg>>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

/// Parses the timed-text formats YouTube serves (classic XML, srv3 and json3)
pub struct TranscriptParser {
    classic: Regex,
    srv3: Regex,
    attribute: Regex,
    entity: Regex,
    markup: Regex,
}

impl TranscriptParser {
    pub fn new() -> Result<Self, ParseError> {
        Ok(Self {
            classic: Regex::new(r"(?s)<text\b([^>]*?)(?:/>|>(.*?)</text>)")?,
            srv3: Regex::new(r"(?s)<p\b([^>]*?)(?:/>|>(.*?)</p>)")?,
            attribute: Regex::new(r#"([A-Za-z_:][\w:.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)?,
            entity: Regex::new(r"&(?:#\d+|#[xX][0-9a-fA-F]+|[A-Za-z]{2,8});")?,
            markup: Regex::new(r"</?[A-Za-z][^<>]*>")?,
        })
    }

    /// Parse a raw caption payload into a timeline.
    ///
    /// A payload without any usable text segment is an error, so callers can
    /// tell "no captions" apart from a valid but quiet transcript.
    pub fn parse(&self, raw: &str) -> Result<Timeline, ParseError> {
        let segments = self.extract_segments(raw)?;

        let mut words = Vec::new();
        let mut texts = Vec::with_capacity(segments.len());
        for segment in &segments {
            let tokens: Vec<&str> = segment.text.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }
            words.extend(distribute_tokens(&tokens, segment.start, segment.duration));
            texts.push(tokens.join(" "));
        }

        if words.is_empty() {
            return Err(ParseError::NoSegments);
        }

        debug!("Parsed {} segments into {} words", texts.len(), words.len());
        Ok(Timeline::new(words, texts.join(" ")))
    }

    fn extract_segments(&self, raw: &str) -> Result<Vec<RawSegment>, ParseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ParseError::NoSegments);
        }

        if trimmed.starts_with('{') {
            return extract_json3_segments(trimmed);
        }

        if self.classic.is_match(trimmed) {
            self.extract_xml_segments(trimmed, &self.classic, ("start", "dur"), 1.0)
        } else if self.srv3.is_match(trimmed) {
            self.extract_xml_segments(trimmed, &self.srv3, ("t", "d"), 0.001)
        } else if is_empty_container(trimmed) {
            Err(ParseError::NoSegments)
        } else {
            Err(ParseError::Malformed("no timed text elements found".to_string()))
        }
    }

    fn extract_xml_segments(
        &self,
        raw: &str,
        element: &Regex,
        (start_attr, duration_attr): (&str, &str),
        scale: f64,
    ) -> Result<Vec<RawSegment>, ParseError> {
        let mut segments = Vec::new();
        let mut timed = 0usize;

        for captures in element.captures_iter(raw) {
            let attributes = captures.get(1).map(|m| m.as_str()).unwrap_or("");
            let Some(start) = self.numeric_attribute(attributes, start_attr) else {
                continue;
            };
            timed += 1;

            let duration = self
                .numeric_attribute(attributes, duration_attr)
                .unwrap_or(0.0);
            let text = captures
                .get(2)
                .map(|m| self.decode_text(m.as_str()))
                .unwrap_or_default();

            segments.push(RawSegment {
                start: start * scale,
                duration: duration * scale,
                text,
            });
        }

        if timed == 0 {
            return Err(ParseError::Malformed(format!(
                "no '{}' timing attributes found",
                start_attr
            )));
        }

        Ok(segments)
    }

    fn numeric_attribute(&self, attributes: &str, name: &str) -> Option<f64> {
        self.attribute
            .captures_iter(attributes)
            .find(|c| c.get(1).map_or(false, |m| m.as_str() == name))
            .and_then(|c| c.get(2).or_else(|| c.get(3)))
            .and_then(|m| m.as_str().trim().parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
    }

    /// Decode entities and strip inline markup from a caption text blob.
    ///
    /// Caption payloads are frequently escaped twice (`&amp;#39;`), so decoding
    /// repeats while entities or tags remain, up to three passes.
    pub fn decode_text(&self, blob: &str) -> String {
        let mut text = blob.to_string();
        for _ in 0..3 {
            if !self.entity.is_match(&text) && !self.markup.is_match(&text) {
                break;
            }
            let fragment = Html::parse_fragment(&text);
            text = fragment.root_element().text().collect::<String>();
        }

        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Parse a raw caption payload with a freshly built parser
pub fn parse(raw: &str) -> Result<Timeline, ParseError> {
    TranscriptParser::new()?.parse(raw)
}

/// Spread a segment's duration evenly across its tokens in reading order
fn distribute_tokens(tokens: &[&str], start: f64, duration: f64) -> Vec<Word> {
    let per_token = duration / tokens.len() as f64;
    tokens
        .iter()
        .enumerate()
        .map(|(k, token)| {
            Word::new(
                *token,
                start + k as f64 * per_token,
                start + (k + 1) as f64 * per_token,
                DEFAULT_CAPTION_CONFIDENCE,
            )
        })
        .collect()
}

fn extract_json3_segments(raw: &str) -> Result<Vec<RawSegment>, ParseError> {
    let payload: Json3Payload = serde_json::from_str(raw)?;

    let mut timed = 0usize;
    let segments: Vec<RawSegment> = payload
        .events
        .into_iter()
        .filter_map(|event| {
            let start = event.t_start_ms?;
            timed += 1;
            let text = event
                .segs?
                .into_iter()
                .map(|s| s.utf8)
                .collect::<String>();
            Some(RawSegment {
                start: start / 1000.0,
                duration: event.d_duration_ms.unwrap_or(0.0) / 1000.0,
                text,
            })
        })
        .collect();

    if timed == 0 {
        return Err(ParseError::NoSegments);
    }

    Ok(segments)
}

fn is_empty_container(raw: &str) -> bool {
    ["<transcript", "<timedtext", "<body"]
        .iter()
        .any(|marker| raw.contains(marker))
}

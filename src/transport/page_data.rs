/// Lenient extraction of caption-track listings from watch-page HTML.
///
/// The page embeds player configuration as script literals whose exact shape
/// changes without notice, sometimes with bare keys, single quotes or trailing
/// commas. Everything here is deliberately forgiving and covered by fixtures.
use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// One caption track advertised by the player
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,
    pub name: String,
    pub kind: Option<String>,
}

impl CaptionTrack {
    /// Speech-recognition tracks are marked `kind: "asr"`
    pub fn is_auto_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTrack {
    base_url: String,
    #[serde(default)]
    language_code: String,
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    kind: Option<String>,
}

/// Return the JSON value following `key` (`key": value` or `key = value`).
///
/// Brackets are matched while respecting string literals and escapes.
pub fn extract_json_value<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let mut search_from = 0;
    while let Some(found) = text[search_from..].find(key) {
        let after_key = search_from + found + key.len();
        search_from = after_key;

        let rest = &text[after_key..];
        let rest_trimmed = rest.trim_start_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace());
        let Some(after_sep) = rest_trimmed
            .strip_prefix(':')
            .or_else(|| rest_trimmed.strip_prefix('='))
        else {
            continue;
        };

        let value = after_sep.trim_start();
        let offset = text.len() - value.len();
        if let Some(len) = balanced_len(value) {
            return Some(&text[offset..offset + len]);
        }
    }
    None
}

/// Byte length of the bracketed value at the start of `s`
fn balanced_len(s: &str) -> Option<usize> {
    let mut chars = s.char_indices();
    let (_, open) = chars.next()?;
    if open != '{' && open != '[' {
        return None;
    }

    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in chars {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => quote = Some(c),
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// Repair JavaScript object literal syntax into strict JSON.
///
/// Quotes bare keys, converts single-quoted strings and drops trailing commas.
pub fn repair_quasi_json(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                let end = string_end(&chars, i, '"');
                out.extend(&chars[i..end]);
                i = end;
            }
            '\'' => {
                let end = string_end(&chars, i, '\'');
                out.push('"');
                let mut j = i + 1;
                while j < end.saturating_sub(1) {
                    match chars[j] {
                        '\\' if chars.get(j + 1) == Some(&'\'') => {
                            out.push('\'');
                            j += 2;
                            continue;
                        }
                        '\\' => {
                            out.push('\\');
                            if let Some(next) = chars.get(j + 1) {
                                out.push(*next);
                            }
                            j += 2;
                            continue;
                        }
                        '"' => out.push_str("\\\""),
                        other => out.push(other),
                    }
                    j += 1;
                }
                out.push('"');
                i = end;
            }
            '}' | ']' => {
                let trimmed_len = out.trim_end().len();
                if out[..trimmed_len].ends_with(',') {
                    out.truncate(trimmed_len - 1);
                }
                out.push(c);
                i += 1;
            }
            c if is_ident_start(c) && expects_key(&out) => {
                let start = i;
                while i < chars.len() && is_ident_part(chars[i]) {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                let mut k = i;
                while k < chars.len() && chars[k].is_whitespace() {
                    k += 1;
                }
                if chars.get(k) == Some(&':') {
                    out.push('"');
                    out.push_str(&ident);
                    out.push('"');
                } else {
                    out.push_str(&ident);
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

/// Index one past the closing quote of the string starting at `start`
fn string_end(chars: &[char], start: usize, quote: char) -> usize {
    let mut j = start + 1;
    while j < chars.len() {
        match chars[j] {
            '\\' => j += 2,
            c if c == quote => return j + 1,
            _ => j += 1,
        }
    }
    chars.len()
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn expects_key(out: &str) -> bool {
    matches!(out.trim_end().chars().last(), Some('{') | Some(','))
}

/// Caption tracks advertised in a watch page
pub fn extract_caption_tracks(html: &str) -> Result<Vec<CaptionTrack>, ParseError> {
    let raw = extract_json_value(html, "captionTracks").ok_or(ParseError::NoCaptionTracks)?;
    let repaired = repair_quasi_json(raw);
    let raw_tracks: Vec<RawTrack> = serde_json::from_str(&repaired)?;

    let tracks: Vec<CaptionTrack> = raw_tracks
        .into_iter()
        .filter(|t| !t.base_url.is_empty())
        .map(|t| CaptionTrack {
            base_url: t.base_url.replace("&amp;", "&"),
            name: t.name.as_ref().map(track_name).unwrap_or_else(|| t.language_code.clone()),
            language_code: t.language_code,
            kind: t.kind,
        })
        .collect();

    if tracks.is_empty() {
        return Err(ParseError::NoCaptionTracks);
    }

    debug!("Found {} caption tracks in page data", tracks.len());
    Ok(tracks)
}

/// `{"simpleText": ..}` or `{"runs": [{"text": ..}]}`
fn track_name(name: &Value) -> String {
    if let Some(simple) = name.get("simpleText").and_then(Value::as_str) {
        return simple.to_string();
    }
    name.get("runs")
        .and_then(Value::as_array)
        .map(|runs| {
            runs.iter()
                .filter_map(|r| r.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// Pick the best track for `language`.
///
/// Exact language first, then same base language (`en` vs `en-US`), then any
/// manual track, then whatever is first. Manual tracks beat auto-generated ones
/// at every step.
pub fn select_track<'a>(tracks: &'a [CaptionTrack], language: &str) -> Option<&'a CaptionTrack> {
    let language = language.to_lowercase();
    let base = language.split('-').next().unwrap_or(&language).to_string();

    let exact = |t: &&CaptionTrack| t.language_code.to_lowercase() == language;
    let same_base = |t: &&CaptionTrack| {
        t.language_code
            .to_lowercase()
            .split('-')
            .next()
            .map_or(false, |b| b == base)
    };

    let best_of = |matches: Vec<&'a CaptionTrack>| -> Option<&'a CaptionTrack> {
        matches
            .iter()
            .find(|t| !t.is_auto_generated())
            .or_else(|| matches.first())
            .copied()
    };

    best_of(tracks.iter().filter(exact).collect())
        .or_else(|| best_of(tracks.iter().filter(same_base).collect()))
        .or_else(|| best_of(tracks.iter().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WATCH_PAGE: &str = include_str!("../../tests/fixtures/watch_page.html");
    const LOOSE_PAGE: &str = include_str!("../../tests/fixtures/watch_page_loose.html");
    const NO_CAPTIONS_PAGE: &str = include_str!("../../tests/fixtures/watch_page_no_captions.html");

    #[test]
    fn test_extracts_tracks_from_player_response() {
        let tracks = extract_caption_tracks(WATCH_PAGE).unwrap();

        assert_eq!(tracks.len(), 3);
        assert_eq!(tracks[0].language_code, "en");
        assert_eq!(tracks[0].name, "English");
        assert!(tracks[0].base_url.contains("&lang=en"));
        assert!(!tracks[0].base_url.contains("\\u0026"));
        assert_eq!(tracks[1].name, "English (auto-generated)");
        assert!(tracks[1].is_auto_generated());
        assert_eq!(tracks[2].language_code, "es-419");
    }

    #[test]
    fn test_extracts_tracks_from_loose_literal() {
        let tracks = extract_caption_tracks(LOOSE_PAGE).unwrap();

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].language_code, "pt-BR");
        assert_eq!(tracks[0].base_url, "https://www.youtube.com/api/timedtext?v=abc&lang=pt-BR");
        assert_eq!(tracks[1].kind.as_deref(), Some("asr"));
    }

    #[test]
    fn test_page_without_captions() {
        assert!(matches!(
            extract_caption_tracks(NO_CAPTIONS_PAGE),
            Err(ParseError::NoCaptionTracks)
        ));
    }

    #[test]
    fn test_repair_quasi_json() {
        let repaired = repair_quasi_json("{a: 1, 'b': 'it\\'s \"x\"', c: [1, 2,], d: {e: true,},}");
        let value: Value = serde_json::from_str(&repaired).unwrap();

        assert_eq!(value["a"], 1);
        assert_eq!(value["b"], "it's \"x\"");
        assert_eq!(value["c"].as_array().unwrap().len(), 2);
        assert_eq!(value["d"]["e"], true);
    }

    #[test]
    fn test_repair_leaves_strict_json_alone() {
        let strict = r#"{"url":"https://x.test/?a=1,b=2","list":[{"k":"}"}]}"#;
        assert_eq!(repair_quasi_json(strict), strict);
    }

    #[test]
    fn test_extract_json_value_respects_strings() {
        let text = r#"var x = {"captionTracks": [{"baseUrl": "a]b}c"}], "other": 1};"#;
        assert_eq!(
            extract_json_value(text, "captionTracks"),
            Some(r#"[{"baseUrl": "a]b}c"}]"#)
        );
        assert_eq!(extract_json_value(text, "missing"), None);
    }

    #[test]
    fn test_select_track_preference() {
        let track = |code: &str, kind: Option<&str>| CaptionTrack {
            base_url: format!("https://x.test/{}", code),
            language_code: code.to_string(),
            name: code.to_string(),
            kind: kind.map(str::to_string),
        };
        let tracks = vec![
            track("en", Some("asr")),
            track("en-GB", None),
            track("de", None),
            track("en", None),
        ];

        assert_eq!(select_track(&tracks, "en").unwrap().base_url, "https://x.test/en");
        assert!(!select_track(&tracks, "en").unwrap().is_auto_generated());
        assert_eq!(select_track(&tracks, "en-US").unwrap().language_code, "en-GB");
        assert_eq!(select_track(&tracks, "DE").unwrap().language_code, "de");
        assert_eq!(select_track(&tracks, "ja").unwrap().language_code, "en-GB");
        assert!(select_track(&[], "en").is_none());
    }
}

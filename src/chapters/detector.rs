/// Break-point detection over a word timeline
use super::markers::{normalize_token, MarkerSet};
use super::{BreakCandidate, BreakReason};
use crate::language::Language;
use crate::transcript::{Timeline, Word};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Sentence-final punctuation that may precede a topic transition
const SENTENCE_ENDINGS: [char; 6] = ['.', '!', '?', '。', '！', '？'];

/// Tunable detection parameters.
///
/// The defaults are empirical starting points rather than derived values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum pause between words to count as a silence gap (seconds)
    pub silence_threshold: f64,
    /// Gap length that maps to full confidence (seconds)
    pub silence_full_confidence: f64,
    /// Confidence given to discourse-marker candidates
    pub marker_confidence: f64,
    /// Tokens inspected after a sentence end
    pub marker_lookahead: usize,
    /// Minimum spacing between accepted candidates within one pass (seconds)
    pub min_chapter_length: f64,
    /// Candidates kept after confidence ranking
    pub max_candidates: usize,
    /// Candidates closer than this are merged, keeping the stronger one (seconds)
    pub merge_window: f64,
    /// Additional marker phrases for the active language
    pub extra_markers: Vec<String>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            silence_threshold: 2.0,
            silence_full_confidence: 5.0,
            marker_confidence: 0.7,
            marker_lookahead: 3,
            min_chapter_length: 60.0,
            max_candidates: 6,
            merge_window: 0.5,
            extra_markers: Vec::new(),
        }
    }
}

/// Per-pass spacing gate: the n-th candidate a pass accepts must not come
/// before `(n + 1) × min_chapter_length`
struct SpacingGate {
    min_chapter_length: f64,
    accepted: usize,
}

impl SpacingGate {
    fn new(min_chapter_length: f64) -> Self {
        Self {
            min_chapter_length,
            accepted: 0,
        }
    }

    fn admit(&mut self, time: f64) -> bool {
        let earliest = self.accepted as f64 * self.min_chapter_length + self.min_chapter_length;
        if time < earliest {
            return false;
        }
        self.accepted += 1;
        true
    }
}

/// Scores candidate chapter boundaries from silence gaps and discourse markers
#[derive(Debug, Clone)]
pub struct BreakDetector {
    config: DetectionConfig,
    markers: MarkerSet,
}

impl BreakDetector {
    pub fn new(config: DetectionConfig, language: Language) -> Self {
        let markers = MarkerSet::with_extra(language, &config.extra_markers);
        Self { config, markers }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Detect candidate boundaries.
    ///
    /// Pure over the timeline: repeated calls return identical candidates, in
    /// ascending time order, at most `max_candidates` of them.
    pub fn detect_breaks(&self, timeline: &Timeline) -> Vec<BreakCandidate> {
        let words = timeline.words();
        if words.len() < 2 {
            return Vec::new();
        }

        let duration = timeline.duration();
        let mut candidates = self.silence_pass(words);
        candidates.extend(self.discourse_pass(words));
        candidates.retain(|c| c.time > 0.0 && c.time < duration);

        let merged = merge_nearby(candidates, self.config.merge_window);
        let spaced = enforce_spacing(merged, self.config.min_chapter_length);
        let selected = select_candidates(spaced, self.config.max_candidates);

        debug!(
            "Detected {} break candidates ({} silence, {} marker)",
            selected.len(),
            selected.iter().filter(|c| c.reason == BreakReason::SilenceGap).count(),
            selected.iter().filter(|c| c.reason == BreakReason::DiscourseMarker).count()
        );

        selected
    }

    /// Pauses of at least `silence_threshold` between adjacent words
    fn silence_pass(&self, words: &[Word]) -> Vec<BreakCandidate> {
        let mut gate = SpacingGate::new(self.config.min_chapter_length);
        let mut candidates = Vec::new();

        for pair in words.windows(2) {
            let gap = pair[1].start_time - pair[0].end_time;
            if gap < self.config.silence_threshold {
                continue;
            }

            let time = pair[1].start_time;
            if !gate.admit(time) {
                continue;
            }

            let confidence = (gap / self.config.silence_full_confidence).min(1.0);
            candidates.push(BreakCandidate::new(time, BreakReason::SilenceGap, confidence));
        }

        candidates
    }

    /// Topic-transition markers directly after sentence-final punctuation
    fn discourse_pass(&self, words: &[Word]) -> Vec<BreakCandidate> {
        let mut gate = SpacingGate::new(self.config.min_chapter_length);
        let mut candidates = Vec::new();
        let lookahead = self.config.marker_lookahead.max(1);

        for i in 1..words.len() {
            if !words[i - 1].text.ends_with(SENTENCE_ENDINGS) {
                continue;
            }

            let end = (i + lookahead).min(words.len());
            let tokens: Vec<String> = words[i..end].iter().map(|w| normalize_token(&w.text)).collect();
            if !self.markers.matches(&tokens) {
                continue;
            }

            let time = words[i].start_time;
            if !gate.admit(time) {
                continue;
            }

            candidates.push(BreakCandidate::new(
                time,
                BreakReason::DiscourseMarker,
                self.config.marker_confidence,
            ));
        }

        candidates
    }
}

/// Higher confidence first, earlier time on ties
fn by_confidence_then_time(a: &BreakCandidate, b: &BreakCandidate) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a.time.total_cmp(&b.time))
}

/// Collapse candidates closer than `window`, keeping the strongest of each cluster
fn merge_nearby(mut candidates: Vec<BreakCandidate>, window: f64) -> Vec<BreakCandidate> {
    candidates.sort_by(|a, b| a.time.total_cmp(&b.time).then_with(|| by_confidence_then_time(a, b)));

    let mut merged: Vec<BreakCandidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match merged.last_mut() {
            Some(last) if candidate.time - last.time < window => {
                if by_confidence_then_time(&candidate, last) == Ordering::Less {
                    *last = candidate;
                }
            }
            _ => merged.push(candidate),
        }
    }
    merged
}

/// Across both passes, keep only the stronger of two candidates closer than
/// `min_length`. Input must be in time order.
fn enforce_spacing(candidates: Vec<BreakCandidate>, min_length: f64) -> Vec<BreakCandidate> {
    let mut kept: Vec<BreakCandidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match kept.last_mut() {
            Some(last) if candidate.time - last.time < min_length => {
                if by_confidence_then_time(&candidate, last) == Ordering::Less {
                    *last = candidate;
                }
            }
            _ => kept.push(candidate),
        }
    }
    kept
}

/// Keep the `max` most confident candidates, returned in time order
pub fn select_candidates(mut candidates: Vec<BreakCandidate>, max: usize) -> Vec<BreakCandidate> {
    candidates.sort_by(by_confidence_then_time);
    candidates.truncate(max);
    candidates.sort_by(|a, b| a.time.total_cmp(&b.time));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapters::{AssemblyConfig, ChapterAssembler};

    /// Evenly paced words from `start` to `end`, one every `step` seconds
    fn speech(start: f64, end: f64, step: f64, text: &str) -> Vec<Word> {
        let mut words = Vec::new();
        let mut t = start;
        while t + step <= end + 1e-9 {
            words.push(Word::new(text, t, t + step, 1.0));
            t += step;
        }
        words
    }

    fn detector() -> BreakDetector {
        BreakDetector::new(DetectionConfig::default(), Language::English)
    }

    #[test]
    fn test_single_silence_gap() {
        let mut words = speech(0.0, 117.0, 0.5, "word");
        words.extend(speech(120.0, 600.0, 0.5, "word"));
        let timeline = Timeline::from_words(words);

        let candidates = detector().detect_breaks(&timeline);

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].reason, BreakReason::SilenceGap);
        assert!((candidates[0].time - 120.0).abs() < 1e-6);
        assert!((candidates[0].confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_long_gap_confidence_is_capped() {
        let mut words = speech(0.0, 100.0, 0.5, "word");
        words.extend(speech(110.0, 200.0, 0.5, "word"));
        let candidates = detector().detect_breaks(&Timeline::from_words(words));

        assert_eq!(candidates[0].confidence, 1.0);
    }

    #[test]
    fn test_minimum_spacing_skips_early_and_clustered_gaps() {
        let mut words = speech(0.0, 30.0, 0.5, "word");
        // 30 -> 33: too early (before 60s)
        words.extend(speech(33.0, 70.0, 0.5, "word"));
        // 70 -> 73: first accepted (>= 60)
        words.extend(speech(73.0, 90.0, 0.5, "word"));
        // 90 -> 93: second would need >= 120, skipped
        words.extend(speech(93.0, 130.0, 0.5, "word"));
        // 130 -> 133: accepted as second
        words.extend(speech(133.0, 300.0, 0.5, "word"));

        let candidates = detector().detect_breaks(&Timeline::from_words(words));
        let times: Vec<f64> = candidates.iter().map(|c| c.time).collect();

        assert_eq!(times, vec![73.0, 133.0]);
    }

    #[test]
    fn test_discourse_marker_after_sentence_end() {
        let mut words = speech(0.0, 90.0, 0.5, "intro");
        words.push(Word::new("done.", 90.0, 90.5, 1.0));
        words.push(Word::new("Next,", 90.5, 91.0, 1.0));
        words.extend(speech(91.0, 200.0, 0.5, "body"));
        words.push(Word::new("again", 200.0, 200.5, 1.0));
        words.push(Word::new("next", 200.5, 201.0, 1.0));
        words.extend(speech(201.0, 300.0, 0.5, "tail"));

        let candidates = detector().detect_breaks(&Timeline::from_words(words));

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].reason, BreakReason::DiscourseMarker);
        assert_eq!(candidates[0].time, 90.5);
        assert_eq!(candidates[0].confidence, 0.7);
    }

    #[test]
    fn test_multi_word_marker_within_lookahead() {
        let mut words = speech(0.0, 100.0, 0.5, "intro");
        words.push(Word::new("questions?", 100.0, 100.5, 1.0));
        words.push(Word::new("Moving", 100.5, 101.0, 1.0));
        words.push(Word::new("on", 101.0, 101.5, 1.0));
        words.extend(speech(101.5, 200.0, 0.5, "body"));

        let candidates = detector().detect_breaks(&Timeline::from_words(words));
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].time, 100.5);
    }

    #[test]
    fn test_selection_keeps_most_confident_in_time_order() {
        let candidates = vec![
            BreakCandidate::new(400.0, BreakReason::DiscourseMarker, 0.7),
            BreakCandidate::new(100.0, BreakReason::SilenceGap, 0.4),
            BreakCandidate::new(200.0, BreakReason::SilenceGap, 1.0),
            BreakCandidate::new(300.0, BreakReason::DiscourseMarker, 0.7),
        ];

        let selected = select_candidates(candidates, 2);
        let times: Vec<f64> = selected.iter().map(|c| c.time).collect();
        assert_eq!(times, vec![200.0, 300.0]);
    }

    #[test]
    fn test_at_most_six_candidates() {
        let mut words = Vec::new();
        for block in 0..12 {
            let start = block as f64 * 100.0;
            words.extend(speech(start, start + 96.0, 0.5, "word"));
        }
        let candidates = detector().detect_breaks(&Timeline::from_words(words));

        assert_eq!(candidates.len(), 6);
        assert!(candidates.windows(2).all(|w| w[0].time <= w[1].time));
    }

    #[test]
    fn test_coincident_candidates_are_merged() {
        let mut words = speech(0.0, 100.0, 0.5, "intro");
        words.push(Word::new("end.", 100.0, 100.5, 1.0));
        words.push(Word::new("Now", 104.5, 105.0, 1.0));
        words.extend(speech(105.0, 200.0, 0.5, "body"));

        let candidates = detector().detect_breaks(&Timeline::from_words(words));

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].reason, BreakReason::SilenceGap);
        assert!((candidates[0].confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_marker_and_gap_from_different_passes_respect_spacing() {
        let mut words = speech(0.0, 60.5, 0.5, "intro");
        words.push(Word::new("done.", 60.5, 61.0, 1.0));
        words.push(Word::new("Next,", 61.0, 61.5, 1.0));
        words.extend(speech(61.5, 67.0, 0.5, "body"));
        // 67 -> 70: 3s pause, 9s after the marker
        words.extend(speech(70.0, 600.0, 0.5, "body"));

        let candidates = detector().detect_breaks(&Timeline::from_words(words));

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].reason, BreakReason::DiscourseMarker);
        assert_eq!(candidates[0].time, 61.0);

        let chapters = ChapterAssembler::new(AssemblyConfig::default(), Language::English)
            .assemble(&Timeline::from_words(speech(0.0, 600.0, 1.0, "x")), &candidates);
        assert!(chapters.iter().all(|c| c.duration() >= 60.0));
    }

    #[test]
    fn test_detection_is_idempotent() {
        let mut words = speech(0.0, 150.0, 0.5, "a");
        words.push(Word::new("so.", 150.0, 150.5, 1.0));
        words.push(Word::new("Finally", 150.5, 151.0, 1.0));
        words.extend(speech(154.0, 400.0, 0.5, "b"));
        let timeline = Timeline::from_words(words);
        let detector = detector();

        assert_eq!(detector.detect_breaks(&timeline), detector.detect_breaks(&timeline));
    }

    #[test]
    fn test_tiny_timelines() {
        let detector = detector();
        assert!(detector.detect_breaks(&Timeline::from_words(Vec::new())).is_empty());
        assert!(detector
            .detect_breaks(&Timeline::from_words(vec![Word::new("hi", 0.0, 1.0, 1.0)]))
            .is_empty());
    }
}

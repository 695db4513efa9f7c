/// Chapter assembly from break candidates
use super::markers::title_for;
use super::{BreakCandidate, BreakReason, Chapter};
use crate::language::Language;
use crate::transcript::Timeline;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Tunable assembly parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Hard cap on emitted chapters
    pub max_chapters: usize,
    /// Below this many candidates, evenly spaced cuts are added
    pub min_candidates: usize,
    /// Number of evenly spaced cuts to add
    pub time_based_breaks: usize,
    /// Confidence given to evenly spaced cuts
    pub time_based_confidence: f64,
    /// Evenly spaced cuts this close to an existing candidate are dropped (seconds)
    pub dedupe_window: f64,
    /// Evenly spaced cuts closer than this to a detected candidate are dropped,
    /// capped at the cut spacing itself (seconds)
    pub min_chapter_length: f64,
    /// Maximum characters of transcript text in a chapter description
    pub description_chars: usize,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            max_chapters: 8,
            min_candidates: 3,
            time_based_breaks: 4,
            time_based_confidence: 0.5,
            dedupe_window: 1.0,
            min_chapter_length: 60.0,
            description_chars: 100,
        }
    }
}

/// `count` candidates splitting `duration` into `count + 1` equal parts
pub fn generate_time_based_breaks(duration: f64, count: usize, confidence: f64) -> Vec<BreakCandidate> {
    let parts = (count + 1) as f64;
    (1..=count)
        .map(|k| BreakCandidate::new(duration * k as f64 / parts, BreakReason::TimeInterval, confidence))
        .collect()
}

/// Builds the final, contiguous chapter list
#[derive(Debug, Clone)]
pub struct ChapterAssembler {
    config: AssemblyConfig,
    language: Language,
}

impl ChapterAssembler {
    pub fn new(config: AssemblyConfig, language: Language) -> Self {
        Self { config, language }
    }

    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    /// Assemble chapters covering `[0, timeline.duration())`.
    ///
    /// Never fails: a non-empty timeline with positive duration always yields
    /// between one and `max_chapters` contiguous chapters. An empty timeline
    /// yields an empty list so the caller can decide on demo data.
    pub fn assemble(&self, timeline: &Timeline, candidates: &[BreakCandidate]) -> Vec<Chapter> {
        let duration = timeline.duration();
        if timeline.is_empty() || duration <= 0.0 {
            return Vec::new();
        }

        let boundaries = self.boundaries(duration, candidates);

        let mut chapters = Vec::with_capacity(boundaries.len() + 1);
        let mut previous = 0.0;
        for boundary in boundaries.iter().chain(std::iter::once(&duration)) {
            if *boundary <= previous {
                continue;
            }
            let index = chapters.len() + 1;
            chapters.push(Chapter::new(
                index,
                title_for(self.language, index),
                previous,
                *boundary,
                self.describe(timeline, previous, *boundary),
            ));
            previous = *boundary;
        }

        info!("📑 Assembled {} chapters over {:.1}s", chapters.len(), duration);
        chapters
    }

    /// Internal boundary times, ascending, strictly inside `(0, duration)`
    fn boundaries(&self, duration: f64, candidates: &[BreakCandidate]) -> Vec<f64> {
        let mut usable: Vec<BreakCandidate> = candidates
            .iter()
            .filter(|c| c.time > 0.0 && c.time < duration)
            .cloned()
            .collect();

        if usable.len() < self.config.min_candidates {
            debug!(
                "Only {} break candidates, adding {} time-based breaks",
                usable.len(),
                self.config.time_based_breaks
            );
            let detected = usable.len();
            let spacing = duration / (self.config.time_based_breaks + 1) as f64;
            let window = self
                .config
                .dedupe_window
                .max(spacing.min(self.config.min_chapter_length));
            for extra in generate_time_based_breaks(
                duration,
                self.config.time_based_breaks,
                self.config.time_based_confidence,
            ) {
                let near_existing = usable[..detected]
                    .iter()
                    .any(|c| (c.time - extra.time).abs() < window);
                if !near_existing {
                    usable.push(extra);
                }
            }
        }

        usable.sort_by(|a, b| a.time.total_cmp(&b.time));

        let max_chapters = self.config.max_chapters.max(1).min(usable.len() + 1);
        usable
            .into_iter()
            .take(max_chapters - 1)
            .map(|c| c.time)
            .collect()
    }

    /// Leading transcript text of a chapter, cut at a word boundary
    fn describe(&self, timeline: &Timeline, start: f64, end: f64) -> String {
        let limit = self.config.description_chars;
        let mut description = String::new();

        for word in timeline.words_in_range(start, end) {
            let extra = word.text.chars().count() + usize::from(!description.is_empty());
            if description.chars().count() + extra > limit {
                description.push_str("...");
                break;
            }
            if !description.is_empty() {
                description.push(' ');
            }
            description.push_str(&word.text);
        }

        description
    }
}

/// Rendering of chapters and timelines into upload-ready text formats
use crate::chapters::Chapter;
use crate::transcript::{Timeline, Word};
use anyhow::Result;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// YouTube description block, one `M:SS Title` line per chapter
pub fn description_block(chapters: &[Chapter]) -> String {
    chapters
        .iter()
        .map(|c| format!("{} {}", c.formatted_start_time, c.title))
        .collect::<Vec<_>>()
        .join("\n")
}

/// SRT (SubRip Subtitle) cue
#[derive(Debug, Clone, PartialEq)]
pub struct SrtCue {
    pub index: usize,
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

impl fmt::Display for SrtCue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{} --> {}\n{}\n",
            self.index,
            format_srt_timestamp(self.start),
            format_srt_timestamp(self.end),
            self.text
        )
    }
}

/// Groups timeline words into subtitle cues
#[derive(Debug, Clone)]
pub struct SrtWriter {
    cues: Vec<SrtCue>,
}

impl SrtWriter {
    pub const MAX_CUE_SECONDS: f64 = 7.0;
    pub const MAX_CUE_WORDS: usize = 12;

    pub fn from_timeline(timeline: &Timeline) -> Self {
        Self::with_limits(timeline, Self::MAX_CUE_SECONDS, Self::MAX_CUE_WORDS)
    }

    /// A cue closes once it holds `max_words` words or the next word would end
    /// more than `max_seconds` after the cue started
    pub fn with_limits(timeline: &Timeline, max_seconds: f64, max_words: usize) -> Self {
        let max_words = max_words.max(1);
        let mut cues = Vec::new();
        let mut pending: Vec<&Word> = Vec::new();

        for word in timeline.words() {
            let too_long = pending
                .first()
                .is_some_and(|first| word.end_time - first.start_time > max_seconds);
            if pending.len() >= max_words || too_long {
                cues.push(Self::cue(cues.len() + 1, &pending));
                pending.clear();
            }
            pending.push(word);
        }
        if !pending.is_empty() {
            cues.push(Self::cue(cues.len() + 1, &pending));
        }

        Self { cues }
    }

    fn cue(index: usize, words: &[&Word]) -> SrtCue {
        let start = words.first().map_or(0.0, |w| w.start_time);
        let end = words.iter().map(|w| w.end_time).fold(start, f64::max);
        SrtCue {
            index,
            start: seconds(start),
            end: seconds(end),
            text: words.iter().map(|w| w.text.as_str()).collect::<Vec<_>>().join(" "),
        }
    }

    pub fn cues(&self) -> &[SrtCue] {
        &self.cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Generate SRT content as string
    pub fn render(&self) -> String {
        let mut content = String::new();
        for cue in &self.cues {
            content.push_str(&cue.to_string());
            content.push('\n');
        }
        content
    }

    /// Save SRT to file
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        tokio::fs::write(path.as_ref(), self.render()).await?;
        info!("💾 Wrote {} subtitle cues to {}", self.cues.len(), path.as_ref().display());
        Ok(())
    }
}

fn seconds(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

/// Format duration as SRT timestamp (HH:MM:SS,mmm)
pub fn format_srt_timestamp(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, duration.subsec_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(count: usize, spacing: f64) -> Timeline {
        Timeline::from_words(
            (0..count)
                .map(|i| {
                    let start = i as f64 * spacing;
                    Word::new(format!("w{}", i), start, start + spacing, 1.0)
                })
                .collect(),
        )
    }

    #[test]
    fn test_description_block() {
        let chapters = vec![
            Chapter::new(1, "Opening and Greetings".to_string(), 0.0, 95.0, String::new()),
            Chapter::new(2, "Main Discussion".to_string(), 95.0, 3700.0, String::new()),
            Chapter::new(3, "Closing Remarks".to_string(), 3700.0, 3900.0, String::new()),
        ];

        assert_eq!(
            description_block(&chapters),
            "0:00 Opening and Greetings\n1:35 Main Discussion\n1:01:40 Closing Remarks"
        );
        assert_eq!(description_block(&[]), "");
    }

    #[test]
    fn test_cues_split_on_word_count() {
        let writer = SrtWriter::from_timeline(&words(30, 0.25));
        let counts: Vec<usize> = writer
            .cues()
            .iter()
            .map(|c| c.text.split_whitespace().count())
            .collect();

        assert_eq!(counts, vec![12, 12, 6]);
        assert_eq!(writer.cues()[1].index, 2);
        assert_eq!(writer.cues()[1].start, Duration::from_secs(3));
    }

    #[test]
    fn test_cues_split_on_duration() {
        // 2s words: the fourth word would end 8s after the cue started
        let writer = SrtWriter::from_timeline(&words(6, 2.0));
        assert_eq!(writer.len(), 2);
        assert_eq!(writer.cues()[0].text, "w0 w1 w2");
        assert_eq!(writer.cues()[0].end, Duration::from_secs(6));
    }

    #[test]
    fn test_render_format() {
        let timeline = Timeline::from_words(vec![
            Word::new("hello", 3661.0, 3661.5, 1.0),
            Word::new("world", 3661.5, 3662.25, 1.0),
        ]);
        let rendered = SrtWriter::from_timeline(&timeline).render();

        assert_eq!(rendered, "1\n01:01:01,000 --> 01:01:02,250\nhello world\n\n");
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("captions.srt");
        let writer = SrtWriter::from_timeline(&words(3, 1.0));

        tokio_test::block_on(async {
            writer.save_to_file(&path).await.unwrap();
            let written = tokio::fs::read_to_string(&path).await.unwrap();
            assert!(written.starts_with("1\n00:00:00,000 --> 00:00:03,000\nw0 w1 w2"));
        });
    }

    #[test]
    fn test_empty_timeline_has_no_cues() {
        assert!(SrtWriter::from_timeline(&Timeline::from_words(Vec::new())).is_empty());
    }
}

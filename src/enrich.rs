/// Analysis and upload metadata for a chaptered transcript
///
/// A keyword heuristic always produces a usable [`Analysis`]. When an LLM is
/// configured its answer replaces the heuristic fields it fills in, and its
/// chapter titles replace the positional ones if the counts line up. Any LLM
/// failure is logged and the heuristic result is kept.
use crate::chapters::Chapter;
use crate::error::EnrichmentError;
use crate::export::description_block;
use crate::llm::{create_llm, ChatMessage, LLMConfig, LLM};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_TAGS: usize = 10;
const MAX_HASHTAGS: usize = 5;
const MAX_KEY_SENTENCES: usize = 10;
const MIN_KEYWORD_CHARS: usize = 4;
const MIN_SENTENCE_CHARS: usize = 10;
const SUMMARY_CHARS: usize = 200;
const TOPIC_FALLBACK_CHARS: usize = 60;
const TITLE_CHARS: usize = 100;
/// Transcript characters sent to the LLM
const PROMPT_TEXT_CHARS: usize = 6000;

const STOP_WORDS: &[&str] = &[
    "about", "above", "after", "again", "also", "because", "been", "before", "being", "below",
    "between", "both", "could", "does", "doing", "down", "during", "each", "even", "every",
    "from", "further", "going", "gonna", "have", "having", "here", "into", "just", "know",
    "like", "little", "make", "many", "more", "most", "much", "must", "need", "only", "other",
    "over", "really", "right", "same", "should", "some", "something", "such", "than", "that",
    "their", "them", "then", "there", "these", "they", "thing", "things", "think", "this",
    "those", "through", "under", "until", "very", "want", "well", "were", "what", "when",
    "where", "which", "while", "will", "with", "would", "yeah", "your", "you're", "we're",
    "it's", "that's", "don't", "let's", "okay", "actually", "basically", "today",
    // common non-English fillers
    "para", "como", "pero", "esto", "esta", "este", "porque", "donde", "cuando", "também",
    "isso", "esse", "essa", "mais", "muito", "pour", "dans", "avec", "nous", "vous", "sont",
    "cette", "aussi", "oder", "aber", "wenn", "dass", "nicht", "sind", "eine", "einen", "auch",
];

/// Where an analysis came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisSource {
    Heuristic,
    Llm,
}

/// Topic, summary and keyword analysis of a transcript
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub main_topic: String,
    pub summary: String,
    pub key_sentences: Vec<String>,
    pub tags: Vec<String>,
    pub hashtags: Vec<String>,
    pub source: AnalysisSource,
}

/// Upload-ready metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub hashtags: Vec<String>,
}

/// Output of one enrichment run
#[derive(Debug, Clone)]
pub struct Enrichment {
    pub analysis: Analysis,
    /// Chapters, re-titled when the LLM supplied matching titles
    pub chapters: Vec<Chapter>,
}

/// Shape requested from the LLM; every field is optional
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LlmAnalysis {
    main_topic: Option<String>,
    summary: Option<String>,
    tags: Vec<String>,
    hashtags: Vec<String>,
    chapter_titles: Vec<String>,
}

/// Keyword-frequency analysis; never fails
pub fn analyze_heuristic(full_text: &str) -> Analysis {
    let text = full_text.trim();
    let sentences = split_sentences(text);

    let main_topic = sentences
        .iter()
        .find(|s| s.chars().count() > MIN_SENTENCE_CHARS)
        .map(|s| s.to_string())
        .unwrap_or_else(|| {
            let head = truncate_chars(text, TOPIC_FALLBACK_CHARS);
            if head.is_empty() {
                "Video".to_string()
            } else {
                head
            }
        });

    let summary = if text.chars().count() > SUMMARY_CHARS {
        format!("{}...", truncate_chars(text, SUMMARY_CHARS))
    } else {
        text.to_string()
    };

    let key_sentences = sentences
        .iter()
        .filter(|s| s.chars().count() > MIN_SENTENCE_CHARS)
        .take(MAX_KEY_SENTENCES)
        .map(|s| s.to_string())
        .collect();

    let tags = extract_keywords(text, MAX_TAGS);
    let hashtags = tags.iter().take(MAX_HASHTAGS).map(|t| to_hashtag(t)).collect();

    Analysis {
        main_topic,
        summary,
        key_sentences,
        tags,
        hashtags,
        source: AnalysisSource::Heuristic,
    }
}

/// Distinct lowercase keywords ranked by frequency, ties by first occurrence
pub fn extract_keywords(text: &str, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();

    let tokens = text
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\'').to_lowercase())
        .filter(|t| t.chars().count() >= MIN_KEYWORD_CHARS)
        .filter(|t| !t.chars().all(|c| c.is_numeric()))
        .filter(|t| !STOP_WORDS.contains(&t.as_str()));

    for (position, token) in tokens.enumerate() {
        counts.entry(token).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked.into_iter().take(limit).map(|(word, _)| word).collect()
}

/// `machine learning` → `#MachineLearning`
pub fn to_hashtag(tag: &str) -> String {
    let camel: String = tag
        .trim_start_matches('#')
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();
    format!("#{}", camel)
}

fn split_sentences(text: &str) -> Vec<&str> {
    text.split_inclusive(['.', '!', '?', '。', '！', '？'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect::<String>().trim_end().to_string()
}

/// Title, description and tags for an upload
pub fn build_metadata(analysis: &Analysis, chapters: &[Chapter]) -> Metadata {
    let mut sections = Vec::new();
    if !analysis.summary.is_empty() {
        sections.push(analysis.summary.clone());
    }
    if !chapters.is_empty() {
        sections.push(description_block(chapters));
    }
    if !analysis.hashtags.is_empty() {
        sections.push(analysis.hashtags.join(" "));
    }

    Metadata {
        title: truncate_chars(&analysis.main_topic, TITLE_CHARS),
        description: sections.join("\n\n"),
        tags: analysis.tags.clone(),
        hashtags: analysis.hashtags.clone(),
    }
}

/// Strip Markdown code fences and surrounding prose, then parse
fn parse_llm_response(content: &str) -> Result<LlmAnalysis, EnrichmentError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```"))
        .unwrap_or(trimmed);

    let start = unfenced.find('{');
    let end = unfenced.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => return Err(EnrichmentError::Parse("no JSON object in LLM response".to_string())),
    };

    serde_json::from_str(json).map_err(|e| EnrichmentError::Parse(e.to_string()))
}

fn merge(heuristic: Analysis, llm: &LlmAnalysis) -> Analysis {
    let non_empty = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let tags: Vec<String> = llm
        .tags
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .take(MAX_TAGS)
        .collect();
    let hashtags: Vec<String> = if llm.hashtags.is_empty() {
        tags.iter().take(MAX_HASHTAGS).map(|t| to_hashtag(t)).collect()
    } else {
        llm.hashtags.iter().take(MAX_HASHTAGS).map(|h| to_hashtag(h)).collect()
    };

    Analysis {
        main_topic: non_empty(&llm.main_topic).unwrap_or(heuristic.main_topic),
        summary: non_empty(&llm.summary).unwrap_or(heuristic.summary),
        key_sentences: heuristic.key_sentences,
        tags: if tags.is_empty() { heuristic.tags } else { tags },
        hashtags: if hashtags.is_empty() { heuristic.hashtags } else { hashtags },
        source: AnalysisSource::Llm,
    }
}

fn retitle(chapters: &[Chapter], titles: &[String]) -> Vec<Chapter> {
    if titles.len() != chapters.len() {
        if !titles.is_empty() {
            debug!(
                "Ignoring {} LLM chapter titles for {} chapters",
                titles.len(),
                chapters.len()
            );
        }
        return chapters.to_vec();
    }

    chapters
        .iter()
        .zip(titles)
        .map(|(chapter, title)| match title.trim() {
            "" => chapter.clone(),
            title => chapter.retitled(title),
        })
        .collect()
}

fn build_prompt(full_text: &str, chapters: &[Chapter]) -> Vec<ChatMessage> {
    let chapter_lines = chapters
        .iter()
        .map(|c| format!("{}. [{}] {}", c.index, c.formatted_start_time, c.description))
        .collect::<Vec<_>>()
        .join("\n");

    vec![
        ChatMessage::system(
            "You analyze video transcripts. Reply with a single JSON object and nothing else.",
        ),
        ChatMessage::user(format!(
            "Analyze this transcript and respond with JSON of the form \
             {{\"mainTopic\": string, \"summary\": string, \"tags\": [string], \
             \"hashtags\": [string], \"chapterTitles\": [string]}}.\n\
             Provide exactly {} chapter titles, one per chapter below, in order, \
             each at most 60 characters.\n\n\
             Chapters:\n{}\n\nTranscript:\n{}",
            chapters.len(),
            chapter_lines,
            truncate_chars(full_text, PROMPT_TEXT_CHARS)
        )),
    ]
}

/// Heuristic analysis with optional LLM refinement
pub struct Enricher {
    llm: Option<Box<dyn LLM>>,
    timeout: Duration,
}

impl Enricher {
    /// Build from configuration; an unusable LLM configuration means heuristic only
    pub fn new(config: &LLMConfig) -> Self {
        let llm = match create_llm(config) {
            Ok(llm) => {
                info!("🤖 LLM enrichment enabled ({:?}, model {})", config.provider, config.model);
                Some(llm)
            }
            Err(e) => {
                debug!("LLM enrichment unavailable: {}", e);
                None
            }
        };

        Self {
            llm,
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    pub fn heuristic_only() -> Self {
        Self {
            llm: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_llm(llm: Box<dyn LLM>, timeout: Duration) -> Self {
        Self {
            llm: Some(llm),
            timeout,
        }
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    /// Analyze the transcript; chapters are returned re-titled or unchanged
    pub async fn enrich(&self, full_text: &str, chapters: &[Chapter]) -> Enrichment {
        let heuristic = analyze_heuristic(full_text);

        let Some(llm) = &self.llm else {
            return Enrichment {
                analysis: heuristic,
                chapters: chapters.to_vec(),
            };
        };

        match self.ask(llm.as_ref(), full_text, chapters).await {
            Ok(answer) => {
                info!("✅ LLM enrichment succeeded");
                Enrichment {
                    chapters: retitle(chapters, &answer.chapter_titles),
                    analysis: merge(heuristic, &answer),
                }
            }
            Err(e) => {
                warn!("LLM enrichment failed, using heuristic analysis: {}", e);
                Enrichment {
                    analysis: heuristic,
                    chapters: chapters.to_vec(),
                }
            }
        }
    }

    async fn ask(
        &self,
        llm: &dyn LLM,
        full_text: &str,
        chapters: &[Chapter],
    ) -> Result<LlmAnalysis, EnrichmentError> {
        let response = tokio::time::timeout(self.timeout, llm.chat(build_prompt(full_text, chapters)))
            .await
            .map_err(|_| EnrichmentError::Timeout(self.timeout))??;

        if let Some(tokens) = response.tokens_used {
            debug!("LLM enrichment used {} tokens", tokens);
        }
        parse_llm_response(&response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LLMProvider, LLMResponse};
    use async_trait::async_trait;

    struct CannedLlm {
        reply: Result<String, u16>,
        delay: Duration,
    }

    #[async_trait]
    impl LLM for CannedLlm {
        async fn chat(&self, _messages: Vec<ChatMessage>) -> Result<LLMResponse, EnrichmentError> {
            tokio::time::sleep(self.delay).await;
            match &self.reply {
                Ok(content) => Ok(LLMResponse {
                    content: content.clone(),
                    tokens_used: Some(42),
                }),
                Err(status) => Err(EnrichmentError::Api {
                    status: *status,
                    body: "boom".to_string(),
                }),
            }
        }

        fn provider_type(&self) -> LLMProvider {
            LLMProvider::LMStudio
        }
    }

    fn enricher(reply: Result<&str, u16>) -> Enricher {
        Enricher::with_llm(
            Box::new(CannedLlm {
                reply: reply.map(str::to_string),
                delay: Duration::ZERO,
            }),
            Duration::from_secs(5),
        )
    }

    fn chapters() -> Vec<Chapter> {
        vec![
            Chapter::new(1, "Opening and Greetings".to_string(), 0.0, 60.0, String::new()),
            Chapter::new(2, "Topic Introduction".to_string(), 60.0, 120.0, String::new()),
        ]
    }

    const TEXT: &str = "Welcome to this rust tutorial. Today we cover rust ownership. \
                        Ownership rules keep memory safe. Borrowing lets functions use values. \
                        Rust makes ownership explicit.";

    #[test]
    fn test_heuristic_analysis() {
        let analysis = analyze_heuristic(TEXT);

        assert_eq!(analysis.main_topic, "Welcome to this rust tutorial.");
        assert_eq!(analysis.summary, TEXT);
        assert_eq!(analysis.tags[0], "rust");
        assert_eq!(analysis.tags[1], "ownership");
        assert!(!analysis.tags.contains(&"this".to_string()));
        assert_eq!(analysis.hashtags[0], "#Rust");
        assert!(analysis.hashtags.len() <= 5);
        assert_eq!(analysis.key_sentences.len(), 5);
        assert_eq!(analysis.source, AnalysisSource::Heuristic);
    }

    #[test]
    fn test_heuristic_edge_cases() {
        let long = "word ".repeat(100);
        let analysis = analyze_heuristic(&long);
        assert!(analysis.summary.ends_with("..."));
        assert_eq!(analysis.summary.chars().count(), 199 + 3);

        let empty = analyze_heuristic("   ");
        assert_eq!(empty.main_topic, "Video");
        assert!(empty.tags.is_empty());

        let short = analyze_heuristic("Hi. Ok.");
        assert_eq!(short.main_topic, "Hi. Ok.");
    }

    #[test]
    fn test_keyword_ties_keep_first_occurrence() {
        let keywords = extract_keywords("zebra apple zebra apple mango", 10);
        assert_eq!(keywords, vec!["zebra", "apple", "mango"]);
    }

    #[test]
    fn test_to_hashtag() {
        assert_eq!(to_hashtag("machine learning"), "#MachineLearning");
        assert_eq!(to_hashtag("#rust-lang"), "#RustLang");
        assert_eq!(to_hashtag("tutorial"), "#Tutorial");
    }

    #[test]
    fn test_parse_fenced_response() {
        let content = "```json\n{\"mainTopic\": \"Rust ownership\", \"chapterTitles\": [\"A\", \"B\"]}\n```";
        let parsed = parse_llm_response(content).unwrap();
        assert_eq!(parsed.main_topic.as_deref(), Some("Rust ownership"));
        assert_eq!(parsed.chapter_titles, vec!["A", "B"]);

        let prose = "Sure! Here it is: {\"summary\": \"s\"} Hope this helps.";
        assert_eq!(parse_llm_response(prose).unwrap().summary.as_deref(), Some("s"));

        assert!(matches!(parse_llm_response("no json"), Err(EnrichmentError::Parse(_))));
    }

    #[test]
    fn test_build_metadata() {
        let analysis = analyze_heuristic(TEXT);
        let metadata = build_metadata(&analysis, &chapters());

        assert_eq!(metadata.title, "Welcome to this rust tutorial.");
        assert!(metadata.description.starts_with(TEXT));
        assert!(metadata.description.contains("\n\n0:00 Opening and Greetings\n1:00 Topic Introduction\n\n#Rust"));
        assert_eq!(metadata.tags, analysis.tags);

        let long_topic = Analysis {
            main_topic: "x".repeat(150),
            ..analysis
        };
        assert_eq!(build_metadata(&long_topic, &[]).title.chars().count(), 100);
    }

    #[tokio::test]
    async fn test_llm_answer_retitles_chapters() {
        let reply = r#"{"mainTopic": "Rust Ownership Explained", "summary": "A tour of ownership.",
                        "tags": ["Rust", "Ownership"], "chapterTitles": ["Welcome", "Ownership Basics"]}"#;
        let original = chapters();
        let result = enricher(Ok(reply)).enrich(TEXT, &original).await;

        assert_eq!(result.analysis.source, AnalysisSource::Llm);
        assert_eq!(result.analysis.main_topic, "Rust Ownership Explained");
        assert_eq!(result.analysis.tags, vec!["rust", "ownership"]);
        assert_eq!(result.analysis.hashtags, vec!["#Rust", "#Ownership"]);
        assert_eq!(result.chapters[1].title, "Ownership Basics");
        assert_eq!(result.chapters[1].start_time, 60.0);
        assert_eq!(original[1].title, "Topic Introduction");
    }

    #[tokio::test]
    async fn test_mismatched_title_count_keeps_titles() {
        let reply = r#"{"mainTopic": "Rust", "chapterTitles": ["Only one"]}"#;
        let result = enricher(Ok(reply)).enrich(TEXT, &chapters()).await;

        assert_eq!(result.analysis.main_topic, "Rust");
        assert_eq!(result.chapters, chapters());
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back_to_heuristic() {
        let result = enricher(Err(500)).enrich(TEXT, &chapters()).await;
        assert_eq!(result.analysis, analyze_heuristic(TEXT));
        assert_eq!(result.chapters, chapters());

        let garbage = enricher(Ok("I cannot help with that")).enrich(TEXT, &chapters()).await;
        assert_eq!(garbage.analysis.source, AnalysisSource::Heuristic);
    }

    #[tokio::test]
    async fn test_llm_timeout_falls_back_to_heuristic() {
        let slow = Enricher::with_llm(
            Box::new(CannedLlm {
                reply: Ok("{}".to_string()),
                delay: Duration::from_secs(60),
            }),
            Duration::from_millis(50),
        );

        let result = slow.enrich(TEXT, &chapters()).await;
        assert_eq!(result.analysis.source, AnalysisSource::Heuristic);
    }

    #[tokio::test]
    async fn test_without_llm_is_heuristic() {
        let result = Enricher::heuristic_only().enrich(TEXT, &chapters()).await;
        assert_eq!(result.analysis.source, AnalysisSource::Heuristic);
        assert!(!Enricher::new(&LLMConfig::default()).has_llm());
    }
}

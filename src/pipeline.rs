/// Staged pipeline: Fetch → Parse → Detect → Assemble → Enrich
///
/// Each request carries its own [`PipelineContext`]; nothing mutable is shared
/// between runs except the optional [`Registry`], which lives outside the
/// pipeline and is only told about stage transitions and results.
use crate::chapters::{BreakCandidate, BreakDetector, Chapter, ChapterAssembler};
use crate::config::Config;
use crate::demo::DemoGenerator;
use crate::enrich::{analyze_heuristic, build_metadata, Analysis, Enricher, Enrichment, Metadata};
use crate::error::{PipelineError, TransportError};
use crate::language::Language;
use crate::registry::{Registry, RegistryKey};
use crate::transcript::{parse, Timeline, TranscriptData, TranscriptResult, TranscriptSource};
use crate::transport::RelayChain;
use crate::video_id::{extract_video_id, VideoId};
use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Parse,
    Detect,
    Assemble,
    Enrich,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Parse => "parse",
            Stage::Detect => "detect",
            Stage::Assemble => "assemble",
            Stage::Enrich => "enrich",
        };
        f.write_str(name)
    }
}

/// Per-request state threaded through every stage
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub video_id: VideoId,
    pub language: String,
    pub cancel: CancellationToken,
    pub started_at: DateTime<Utc>,
}

impl PipelineContext {
    pub fn new(video_id: VideoId, language: impl Into<String>) -> Self {
        Self {
            video_id,
            language: language.into(),
            cancel: CancellationToken::new(),
            started_at: Utc::now(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn registry_key(&self) -> RegistryKey {
        RegistryKey::new(self.video_id.as_str(), self.language.as_str())
    }

    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

/// Chapters plus analysis for one video
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChapterReport {
    pub video_id: String,
    pub language: String,
    pub source: TranscriptSource,
    pub is_demo_data: bool,
    pub duration: f64,
    pub word_count: usize,
    pub chapters: Vec<Chapter>,
    pub candidates: Vec<BreakCandidate>,
    pub analysis: Analysis,
    pub metadata: Metadata,
    /// Why demo data was substituted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl ChapterReport {
    pub fn new(data: &TranscriptData, candidates: Vec<BreakCandidate>, enrichment: Enrichment) -> Self {
        let metadata = build_metadata(&enrichment.analysis, &enrichment.chapters);
        Self {
            video_id: data.video_id.clone(),
            language: data.language.clone(),
            source: data.source,
            is_demo_data: data.is_demo_data,
            duration: data.duration,
            word_count: data.transcript.len(),
            chapters: enrichment.chapters,
            candidates,
            analysis: enrichment.analysis,
            metadata,
            fallback_reason: None,
            generated_at: Utc::now(),
        }
    }

    /// Report with keyword analysis only
    pub fn heuristic(data: TranscriptData, chapters: Vec<Chapter>, candidates: Vec<BreakCandidate>) -> Self {
        let enrichment = Enrichment {
            analysis: analyze_heuristic(&data.full_text),
            chapters,
        };
        Self::new(&data, candidates, enrichment)
    }
}

/// Metadata-only view of a report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetadataReport {
    pub video_id: String,
    pub is_demo_data: bool,
    pub metadata: Metadata,
    pub analysis: Analysis,
}

impl From<ChapterReport> for MetadataReport {
    fn from(report: ChapterReport) -> Self {
        Self {
            video_id: report.video_id,
            is_demo_data: report.is_demo_data,
            metadata: report.metadata,
            analysis: report.analysis,
        }
    }
}

fn default_allow_demo() -> bool {
    true
}

/// Caller requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum Request {
    GetTranscript {
        /// Video URL or bare identifier
        video: String,
        #[serde(default)]
        language: Option<String>,
    },
    GenerateChapters {
        video: String,
        #[serde(default)]
        language: Option<String>,
        #[serde(default = "default_allow_demo", rename = "allowDemo")]
        allow_demo: bool,
    },
    GenerateMetadata {
        video: String,
        #[serde(default)]
        language: Option<String>,
        #[serde(default = "default_allow_demo", rename = "allowDemo")]
        allow_demo: bool,
    },
}

/// Success/error envelope
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl<T> From<Result<T, PipelineError>> for Outcome<T> {
    fn from(result: Result<T, PipelineError>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
                suggestion: None,
            },
            Err(e) => Self {
                success: false,
                data: None,
                error: Some(e.to_string()),
                suggestion: Some(e.suggestion().to_string()),
            },
        }
    }
}

/// Responses, tagged with the kind of the request they answer
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum Response {
    GetTranscript(TranscriptResult),
    GenerateChapters(Outcome<ChapterReport>),
    GenerateMetadata(Outcome<MetadataReport>),
}

/// Result for one input of a batch
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub input: String,
    #[serde(flatten)]
    pub outcome: Outcome<ChapterReport>,
}

impl BatchItem {
    pub fn is_success(&self) -> bool {
        self.outcome.success
    }

    pub fn is_demo(&self) -> bool {
        self.outcome.data.as_ref().map_or(false, |r| r.is_demo_data)
    }
}

/// Overall batch results
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub total: usize,
    pub successful: usize,
    pub demo: usize,
    pub failed: usize,
    pub elapsed_seconds: f64,
    pub items: Vec<BatchItem>,
}

/// Caption-to-chapters pipeline
pub struct Pipeline {
    config: Config,
    transport: RelayChain,
    enricher: Enricher,
    demo: DemoGenerator,
    registry: Option<Arc<Registry>>,
    shutdown: CancellationToken,
}

impl Pipeline {
    /// Build the relay chain and enricher described by `config`
    pub fn new(config: Config) -> Result<Self> {
        let transport = RelayChain::from_config(&config.transport)?;
        Ok(Self::with_transport(config, transport))
    }

    /// Use an explicit relay chain
    pub fn with_transport(config: Config, transport: RelayChain) -> Self {
        let enricher = Enricher::new(&config.llm);
        let demo = DemoGenerator::new(config.detection.clone(), config.assembly.clone());
        Self {
            config,
            transport,
            enricher,
            demo,
            registry: None,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_enricher(mut self, enricher: Enricher) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cancelling this token cancels every context created by [`Pipeline::context`]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Context for `input` (URL or id); `language` defaults to the configured one
    pub fn context(&self, input: &str, language: Option<&str>) -> Result<PipelineContext, PipelineError> {
        let video_id = VideoId::parse(input)?;
        let language = language.unwrap_or(&self.config.default_language);
        Ok(PipelineContext::new(video_id, language).with_cancel(self.shutdown.child_token()))
    }

    async fn mark(&self, ctx: &PipelineContext, stage: Stage) {
        debug!("{} → {}", ctx.video_id, stage);
        if let Some(registry) = &self.registry {
            registry.set_stage(&ctx.registry_key(), stage).await;
        }
    }

    /// Fetch and Parse stages
    async fn fetch_timeline(&self, ctx: &PipelineContext) -> Result<Timeline, PipelineError> {
        self.mark(ctx, Stage::Fetch).await;
        info!("📥 Fetching {} captions for {}", ctx.language, ctx.video_id);

        let width = self.config.transport.race_width;
        let payload = if width > 1 {
            self.transport
                .fetch_racing(&ctx.video_id, &ctx.language, &ctx.cancel, width)
                .await?
        } else {
            self.transport
                .fetch_caption_payload(&ctx.video_id, &ctx.language, &ctx.cancel)
                .await?
        };

        self.mark(ctx, Stage::Parse).await;
        let timeline = parse(&payload)?;
        info!(
            "📝 Parsed {} words ({:.1}s) for {}",
            timeline.len(),
            timeline.duration(),
            ctx.video_id
        );
        Ok(timeline)
    }

    /// Caption transcript, or an error envelope with a suggestion
    pub async fn get_transcript(&self, ctx: &PipelineContext) -> TranscriptResult {
        match self.fetch_timeline(ctx).await {
            Ok(timeline) => TranscriptResult::success(TranscriptData::from_timeline(
                ctx.video_id.as_str(),
                &ctx.language,
                &timeline,
                TranscriptSource::Captions,
            )),
            Err(e) => {
                warn!("Transcript for {} unavailable: {}", ctx.video_id, e);
                TranscriptResult::failure(e.to_string(), e.suggestion())
            }
        }
    }

    /// Run every stage; on fetch or parse failure substitute demo data when allowed
    pub async fn generate_chapters(
        &self,
        ctx: &PipelineContext,
        allow_demo: bool,
    ) -> Result<ChapterReport, PipelineError> {
        let Some(registry) = &self.registry else {
            return self.run_stages(ctx, allow_demo).await;
        };

        let key = ctx.registry_key();
        if let Some(cached) = registry.cached_report(&key).await {
            info!("♻️ Using cached chapters for {} ({})", ctx.video_id, ctx.language);
            return Ok(cached);
        }
        let Some(run) = registry.begin(&key).await else {
            return Err(PipelineError::InProgress(ctx.video_id.to_string()));
        };

        let result = self.run_stages(ctx, allow_demo).await;
        match &result {
            // Demo output is never cached as the video's chapters
            Ok(report) if report.is_demo_data => {
                let reason = report.fallback_reason.clone().unwrap_or_else(|| "demo data".to_string());
                run.fail(reason).await;
            }
            Ok(report) => run.complete(report.clone()).await,
            Err(e) => run.fail(e.to_string()).await,
        }
        result
    }

    async fn run_stages(&self, ctx: &PipelineContext, allow_demo: bool) -> Result<ChapterReport, PipelineError> {
        let timeline = match self.fetch_timeline(ctx).await {
            Ok(timeline) => timeline,
            Err(e @ PipelineError::Transport(TransportError::Cancelled)) => return Err(e),
            Err(e) if allow_demo => {
                warn!("⚠️ Falling back to demo data for {}: {}", ctx.video_id, e);
                return Ok(self.generate_demo_report(ctx, e.to_string()));
            }
            Err(e) => return Err(e),
        };

        let language = Language::from_code(&ctx.language);

        self.mark(ctx, Stage::Detect).await;
        let candidates = BreakDetector::new(self.config.detection.clone(), language).detect_breaks(&timeline);

        self.mark(ctx, Stage::Assemble).await;
        let chapters = ChapterAssembler::new(self.config.assembly.clone(), language).assemble(&timeline, &candidates);

        self.mark(ctx, Stage::Enrich).await;
        let enrichment = self.enricher.enrich(timeline.full_text(), &chapters).await;

        let data = TranscriptData::from_timeline(
            ctx.video_id.as_str(),
            &ctx.language,
            &timeline,
            TranscriptSource::Captions,
        );
        let report = ChapterReport::new(&data, candidates, enrichment);

        info!(
            "🎉 {} chapters for {} in {}ms",
            report.chapters.len(),
            ctx.video_id,
            ctx.elapsed().num_milliseconds()
        );
        Ok(report)
    }

    /// Demo transcript run through the regular detector and assembler
    pub fn generate_demo_report(&self, ctx: &PipelineContext, reason: impl Into<String>) -> ChapterReport {
        let run = self.demo.generate(ctx.video_id.as_str(), &ctx.language);
        let mut report = ChapterReport::heuristic(run.data, run.chapters, run.candidates);
        report.fallback_reason = Some(reason.into());
        report
    }

    /// Dispatch a tagged request
    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::GetTranscript { video, language } => {
                Response::GetTranscript(self.transcript_for(&video, language.as_deref()).await)
            }
            Request::GenerateChapters {
                video,
                language,
                allow_demo,
            } => Response::GenerateChapters(self.chapters_for(&video, language.as_deref(), allow_demo).await.into()),
            Request::GenerateMetadata {
                video,
                language,
                allow_demo,
            } => Response::GenerateMetadata(
                self.chapters_for(&video, language.as_deref(), allow_demo)
                    .await
                    .map(MetadataReport::from)
                    .into(),
            ),
        }
    }

    /// Transcript for a raw input; an unrecognized input becomes a failed result
    pub async fn transcript_for(&self, video: &str, language: Option<&str>) -> TranscriptResult {
        match self.context(video, language) {
            Ok(ctx) => self.get_transcript(&ctx).await,
            Err(e) => TranscriptResult::failure(e.to_string(), e.suggestion()),
        }
    }

    async fn chapters_for(
        &self,
        video: &str,
        language: Option<&str>,
        allow_demo: bool,
    ) -> Result<ChapterReport, PipelineError> {
        let ctx = self.context(video, language)?;
        self.generate_chapters(&ctx, allow_demo).await
    }

    /// Run independent pipelines for several inputs, at most `concurrency` at a time.
    ///
    /// `concurrency` defaults to the configured worker count. Items complete in any order.
    pub async fn process_batch(&self, inputs: &[String], concurrency: Option<usize>, allow_demo: bool) -> BatchReport {
        let start = Instant::now();
        let concurrency = concurrency.unwrap_or(self.config.performance.max_workers).max(1);
        info!("🚀 Processing {} videos with {} workers", inputs.len(), concurrency);

        let items: Vec<BatchItem> = stream::iter(inputs.iter().cloned())
            .map(|input| async move {
                let outcome = self.chapters_for(&input, None, allow_demo).await.into();
                BatchItem { input, outcome }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let successful = items.iter().filter(|i| i.is_success()).count();
        let demo = items.iter().filter(|i| i.is_demo()).count();
        let report = BatchReport {
            total: items.len(),
            successful,
            demo,
            failed: items.len() - successful,
            elapsed_seconds: start.elapsed().as_secs_f64(),
            items,
        };

        info!(
            "✅ Batch complete: {} succeeded ({} demo), {} failed in {:.1}s",
            report.successful, report.demo, report.failed, report.elapsed_seconds
        );
        report
    }
}

/// Drop repeated inputs that name the same video, keeping first-seen order.
///
/// Inputs without a recognizable video id are compared by their trimmed text.
pub fn dedupe_inputs(inputs: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    inputs
        .iter()
        .filter(|input| {
            let key = extract_video_id(input).unwrap_or_else(|| input.trim().to_string());
            let fresh = seen.insert(key);
            if !fresh {
                debug!("Skipping duplicate input {}", input);
            }
            fresh
        })
        .cloned()
        .collect()
}

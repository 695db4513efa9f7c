/// YouTube Chapter Analyzer - Rust Implementation
///
/// Generates chapter markers, a summary and upload metadata for a YouTube video
/// from its existing captions. Captions are fetched through a prioritized chain
/// of best-effort relays, parsed into a word timeline and segmented using
/// silence gaps and discourse markers.

pub mod chapters;
pub mod config;
pub mod demo;
pub mod enrich;
pub mod error;
pub mod export;
pub mod language;
pub mod llm;
pub mod pipeline;
pub mod registry;
pub mod transcript;
pub mod transport;
pub mod video_id;

// Re-export main types for easy access
pub use crate::chapters::{BreakCandidate, BreakDetector, BreakReason, Chapter, ChapterAssembler};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::demo::{generate_demo, DemoGenerator};
pub use crate::enrich::{build_metadata, Analysis, Enricher, Metadata};
pub use crate::error::{EnrichmentError, ParseError, PipelineError, RelayError, TransportError};
pub use crate::export::{description_block, SrtWriter};
pub use crate::language::Language;
pub use crate::llm::{LLMConfig, LLMProvider};
pub use crate::pipeline::{ChapterReport, Pipeline, PipelineContext, Request, Response};
pub use crate::registry::Registry;
pub use crate::transcript::{Timeline, TranscriptResult, Word};
pub use crate::transport::{CaptionTransport, RelayChain};
pub use crate::video_id::{extract_video_id, VideoId};

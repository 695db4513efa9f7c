pub mod providers;

use crate::error::EnrichmentError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// LLM provider types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LLMProvider {
    LMStudio,
    Gemini,
    OpenAI,
}

/// LLM configuration for optional enrichment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LLMConfig {
    /// Use the LLM for analysis and chapter titles
    pub enabled: bool,
    pub provider: LLMProvider,
    /// Chat endpoint override; unset means the provider's usual URL
    /// (the local LMStudio server, or the public API for cloud providers)
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Hard limit on one enrichment call
    pub timeout_seconds: u64,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: LLMProvider::LMStudio,
            endpoint: None,
            api_key: None,
            model: "local-model".to_string(),
            max_tokens: 2048,
            temperature: 0.3,
            timeout_seconds: 30,
        }
    }
}

impl LLMConfig {
    /// Whether a provider can be built from this configuration
    pub fn check(&self) -> Result<(), EnrichmentError> {
        if !self.enabled {
            return Err(EnrichmentError::NotConfigured("LLM enrichment disabled".to_string()));
        }
        match self.provider {
            LLMProvider::Gemini | LLMProvider::OpenAI if self.api_key.is_none() => Err(
                EnrichmentError::NotConfigured(format!("{:?} API key required", self.provider)),
            ),
            _ => Ok(()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.check().is_ok()
    }
}

/// Chat message for LLM communication
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// LLM response
#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: String,
    pub tokens_used: Option<u32>,
}

/// Trait for LLM providers
#[async_trait]
pub trait LLM: Send + Sync {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<LLMResponse, EnrichmentError>;
    fn provider_type(&self) -> LLMProvider;
}

/// Create LLM instance based on configuration
pub fn create_llm(config: &LLMConfig) -> Result<Box<dyn LLM>, EnrichmentError> {
    config.check()?;
    match config.provider {
        LLMProvider::LMStudio | LLMProvider::OpenAI => {
            Ok(Box::new(providers::ChatCompletionsProvider::new(config.clone())?))
        }
        LLMProvider::Gemini => Ok(Box::new(providers::GeminiProvider::new(config.clone())?)),
    }
}

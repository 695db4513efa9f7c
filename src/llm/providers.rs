use super::{ChatMessage, LLMConfig, LLMProvider, LLMResponse, LLM};
use crate::error::EnrichmentError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const LMSTUDIO_CHAT_URL: &str = "http://localhost:1234/v1/chat/completions";
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

fn http_client(config: &LLMConfig) -> Result<reqwest::Client, EnrichmentError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .build()?)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, EnrichmentError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(EnrichmentError::Api { status, body })
}

/// OpenAI-style `/chat/completions` endpoint, shared by OpenAI and LMStudio
pub struct ChatCompletionsProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    choices: Vec<ChatCompletionsChoice>,
    usage: Option<ChatCompletionsUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsUsage {
    total_tokens: u32,
}

impl ChatCompletionsProvider {
    pub fn new(config: LLMConfig) -> Result<Self, EnrichmentError> {
        let client = http_client(&config)?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> &str {
        match (&self.config.endpoint, self.config.provider) {
            (Some(endpoint), _) => endpoint,
            (None, LLMProvider::OpenAI) => OPENAI_CHAT_URL,
            (None, _) => LMSTUDIO_CHAT_URL,
        }
    }
}

#[async_trait]
impl LLM for ChatCompletionsProvider {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<LLMResponse, EnrichmentError> {
        let endpoint = self.endpoint();

        let request = ChatCompletionsRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!("Sending request to {:?} at {}", self.config.provider, endpoint);

        let mut builder = self.client.post(endpoint).json(&request);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = check_status(builder.send().await?).await?;
        let parsed: ChatCompletionsResponse = response.json().await?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| EnrichmentError::Parse("response has no choices".to_string()))?;

        Ok(LLMResponse {
            content,
            tokens_used: parsed.usage.map(|u| u.total_tokens),
        })
    }

    fn provider_type(&self) -> LLMProvider {
        self.config.provider
    }
}

/// Gemini provider implementation
pub struct GeminiProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GeminiUsage {
    #[serde(rename = "totalTokenCount")]
    total_token_count: u32,
}

impl GeminiProvider {
    pub fn new(config: LLMConfig) -> Result<Self, EnrichmentError> {
        if config.api_key.is_none() {
            return Err(EnrichmentError::NotConfigured("Gemini API key required".to_string()));
        }
        let client = http_client(&config)?;
        Ok(Self { config, client })
    }

    fn url(&self) -> String {
        let base = self.config.endpoint.as_deref().unwrap_or(GEMINI_API_BASE);
        format!("{}/{}:generateContent", base.trim_end_matches('/'), self.config.model)
    }
}

#[async_trait]
impl LLM for GeminiProvider {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<LLMResponse, EnrichmentError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| EnrichmentError::NotConfigured("Gemini API key required".to_string()))?;

        // Gemini takes a single user turn
        let content = messages
            .iter()
            .map(|msg| format!("{}: {}", msg.role, msg.content))
            .collect::<Vec<_>>()
            .join("\n");

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: content }],
            }],
            generation_config: GeminiGenerationConfig {
                max_output_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            },
        };

        debug!("Sending request to Gemini API");

        let response = self
            .client
            .post(self.url())
            .query(&[("key", api_key.as_str())])
            .json(&request)
            .send()
            .await?;
        let parsed: GeminiResponse = check_status(response).await?.json().await?;

        let content = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| EnrichmentError::Parse("response has no candidates".to_string()))?;

        Ok(LLMResponse {
            content,
            tokens_used: parsed.usage_metadata.map(|u| u.total_token_count),
        })
    }

    fn provider_type(&self) -> LLMProvider {
        LLMProvider::Gemini
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(provider: LLMProvider, endpoint: String) -> LLMConfig {
        LLMConfig {
            enabled: true,
            provider,
            endpoint: Some(endpoint),
            api_key: Some("secret".to_string()),
            model: "test-model".to_string(),
            ..LLMConfig::default()
        }
    }

    #[tokio::test]
    async fn test_chat_completions_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "hi there"}}],
                "usage": {"total_tokens": 12}
            })))
            .mount(&server)
            .await;

        let provider = ChatCompletionsProvider::new(config(
            LLMProvider::OpenAI,
            format!("{}/v1/chat/completions", server.uri()),
        ))
        .unwrap();
        let response = provider.chat(vec![ChatMessage::user("hello")]).await.unwrap();

        assert_eq!(response.content, "hi there");
        assert_eq!(response.tokens_used, Some(12));
    }

    #[tokio::test]
    async fn test_api_error_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let provider = ChatCompletionsProvider::new(config(LLMProvider::LMStudio, server.uri())).unwrap();
        let err = provider.chat(vec![ChatMessage::user("hello")]).await.unwrap_err();

        match err {
            EnrichmentError::Api { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "slow down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_gemini_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/test-model:generateContent"))
            .and(query_param("key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "{\"mainTopic\": \"Rust\"}"}]}}]
            })))
            .mount(&server)
            .await;

        let provider =
            GeminiProvider::new(config(LLMProvider::Gemini, format!("{}/models", server.uri()))).unwrap();
        let response = provider.chat(vec![ChatMessage::user("hello")]).await.unwrap();

        assert_eq!(response.content, "{\"mainTopic\": \"Rust\"}");
        assert_eq!(response.tokens_used, None);
    }

    #[test]
    fn test_default_endpoints_from_toml_config() {
        let openai: LLMConfig = toml::from_str("enabled = true\nprovider = \"OpenAI\"\napi_key = \"sk\"").unwrap();
        assert_eq!(ChatCompletionsProvider::new(openai).unwrap().endpoint(), OPENAI_CHAT_URL);

        let local: LLMConfig = toml::from_str("enabled = true\nprovider = \"LMStudio\"").unwrap();
        assert_eq!(ChatCompletionsProvider::new(local).unwrap().endpoint(), LMSTUDIO_CHAT_URL);

        let gemini: LLMConfig =
            toml::from_str("enabled = true\nprovider = \"Gemini\"\napi_key = \"g\"\nmodel = \"gemini-pro\"").unwrap();
        assert_eq!(
            GeminiProvider::new(gemini).unwrap().url(),
            format!("{}/gemini-pro:generateContent", GEMINI_API_BASE)
        );
    }
}

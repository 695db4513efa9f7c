/// Relay strategies for reaching YouTube's timed-text endpoint
use super::page_data::{extract_caption_tracks, select_track};
use super::{get_text, CaptionRequest, CaptionTransport};
use crate::error::{ParseError, RelayError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

pub const YOUTUBE_TIMEDTEXT_URL: &str = "https://www.youtube.com/api/timedtext";
pub const YOUTUBE_WATCH_URL: &str = "https://www.youtube.com/watch";

/// Serializable description of one relay, in priority order inside the config
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RelayConfig {
    /// Call the timed-text endpoint directly
    Direct {
        #[serde(default = "default_timedtext_url")]
        base_url: String,
    },
    /// Prefix relay that takes the percent-encoded target URL appended to `prefix`
    RawProxy { name: String, prefix: String },
    /// JSON-wrapping relay (`{"contents": "..."}`)
    AllOrigins { endpoint: String },
    /// Resolve the caption track from the watch page, optionally through a prefix relay
    WatchPage {
        #[serde(default)]
        prefix: Option<String>,
    },
}

fn default_timedtext_url() -> String {
    YOUTUBE_TIMEDTEXT_URL.to_string()
}

/// Default relay order: direct first, then public relays
pub fn default_relays() -> Vec<RelayConfig> {
    vec![
        RelayConfig::Direct {
            base_url: default_timedtext_url(),
        },
        RelayConfig::WatchPage { prefix: None },
        RelayConfig::AllOrigins {
            endpoint: "https://api.allorigins.win/get".to_string(),
        },
        RelayConfig::RawProxy {
            name: "corsproxy".to_string(),
            prefix: "https://corsproxy.io/?".to_string(),
        },
        RelayConfig::RawProxy {
            name: "codetabs".to_string(),
            prefix: "https://api.codetabs.com/v1/proxy?quest=".to_string(),
        },
    ]
}

/// Instantiate the strategy for a relay description
pub fn build_relay(config: &RelayConfig) -> Box<dyn CaptionTransport> {
    match config {
        RelayConfig::Direct { base_url } => Box::new(DirectRelay::with_base(base_url.clone())),
        RelayConfig::RawProxy { name, prefix } => Box::new(RawProxyRelay::new(name.clone(), prefix.clone())),
        RelayConfig::AllOrigins { endpoint } => Box::new(AllOriginsRelay::new(endpoint.clone())),
        RelayConfig::WatchPage { prefix } => Box::new(WatchPageRelay::new(prefix.clone())),
    }
}

/// Timed-text URL for a video and language
pub fn timedtext_url(base: &str, request: &CaptionRequest<'_>) -> Result<Url, RelayError> {
    Ok(Url::parse_with_params(
        base,
        &[("lang", request.language), ("v", request.video_id.as_str())],
    )?)
}

/// Wrap `target` for a prefix-style relay
fn proxied(prefix: &str, target: &str) -> String {
    format!("{}{}", prefix, urlencoding::encode(target))
}

/// Direct call to the timed-text endpoint
#[derive(Debug, Clone)]
pub struct DirectRelay {
    base_url: String,
}

impl DirectRelay {
    pub fn new() -> Self {
        Self::with_base(YOUTUBE_TIMEDTEXT_URL)
    }

    pub fn with_base(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for DirectRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptionTransport for DirectRelay {
    fn name(&self) -> &str {
        "direct"
    }

    async fn fetch(&self, client: &Client, request: &CaptionRequest<'_>) -> Result<String, RelayError> {
        let url = timedtext_url(&self.base_url, request)?;
        debug!("GET {}", url);
        get_text(client, url.as_str()).await
    }
}

/// Prefix relay returning the target body unchanged
#[derive(Debug, Clone)]
pub struct RawProxyRelay {
    name: String,
    prefix: String,
    target_base: String,
}

impl RawProxyRelay {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            target_base: YOUTUBE_TIMEDTEXT_URL.to_string(),
        }
    }

    /// Override the timed-text URL the relay is asked to fetch
    pub fn with_target_base(mut self, target_base: impl Into<String>) -> Self {
        self.target_base = target_base.into();
        self
    }

    pub fn relay_url(&self, request: &CaptionRequest<'_>) -> Result<String, RelayError> {
        let target = timedtext_url(&self.target_base, request)?;
        Ok(proxied(&self.prefix, target.as_str()))
    }
}

#[async_trait]
impl CaptionTransport for RawProxyRelay {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, client: &Client, request: &CaptionRequest<'_>) -> Result<String, RelayError> {
        let url = self.relay_url(request)?;
        debug!("GET {} via {}", url, self.name);
        get_text(client, &url).await
    }
}

#[derive(Debug, Deserialize)]
struct AllOriginsEnvelope {
    contents: Option<String>,
    status: Option<AllOriginsStatus>,
}

#[derive(Debug, Deserialize)]
struct AllOriginsStatus {
    http_code: Option<u16>,
}

/// JSON-wrapping relay; the target body arrives in the `contents` field
#[derive(Debug, Clone)]
pub struct AllOriginsRelay {
    endpoint: String,
    target_base: String,
}

impl AllOriginsRelay {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            target_base: YOUTUBE_TIMEDTEXT_URL.to_string(),
        }
    }

    pub fn with_target_base(mut self, target_base: impl Into<String>) -> Self {
        self.target_base = target_base.into();
        self
    }

    pub fn relay_url(&self, request: &CaptionRequest<'_>) -> Result<Url, RelayError> {
        let target = timedtext_url(&self.target_base, request)?;
        Ok(Url::parse_with_params(&self.endpoint, &[("url", target.as_str())])?)
    }

    /// Pull the target body out of the relay envelope
    pub fn unwrap_envelope(body: &str) -> Result<String, RelayError> {
        let envelope: AllOriginsEnvelope = serde_json::from_str(body)
            .map_err(|e| RelayError::Malformed(format!("invalid envelope: {}", e)))?;

        if let Some(code) = envelope.status.and_then(|s| s.http_code) {
            if !(200..300).contains(&code) {
                return Err(RelayError::Status(code));
            }
        }

        envelope
            .contents
            .filter(|c| !c.is_empty())
            .ok_or_else(|| RelayError::Malformed("envelope has no contents".to_string()))
    }
}

#[async_trait]
impl CaptionTransport for AllOriginsRelay {
    fn name(&self) -> &str {
        "allorigins"
    }

    async fn fetch(&self, client: &Client, request: &CaptionRequest<'_>) -> Result<String, RelayError> {
        let url = self.relay_url(request)?;
        debug!("GET {}", url);
        let body = get_text(client, url.as_str()).await?;
        Self::unwrap_envelope(&body)
    }
}

/// Two-step relay: read the caption track list off the watch page, then fetch the track
#[derive(Debug, Clone)]
pub struct WatchPageRelay {
    prefix: Option<String>,
    watch_base: String,
}

impl WatchPageRelay {
    pub fn new(prefix: Option<String>) -> Self {
        Self {
            prefix,
            watch_base: YOUTUBE_WATCH_URL.to_string(),
        }
    }

    pub fn with_watch_base(mut self, watch_base: impl Into<String>) -> Self {
        self.watch_base = watch_base.into();
        self
    }

    fn route(&self, target: &str) -> String {
        match &self.prefix {
            Some(prefix) => proxied(prefix, target),
            None => target.to_string(),
        }
    }
}

#[async_trait]
impl CaptionTransport for WatchPageRelay {
    fn name(&self) -> &str {
        "watch-page"
    }

    async fn fetch(&self, client: &Client, request: &CaptionRequest<'_>) -> Result<String, RelayError> {
        let watch_url = Url::parse_with_params(&self.watch_base, &[("v", request.video_id.as_str())])?;
        let page = get_text(client, &self.route(watch_url.as_str())).await?;

        let tracks = extract_caption_tracks(&page).map_err(|e| match e {
            ParseError::NoCaptionTracks => RelayError::Rejected(e.to_string()),
            other => RelayError::Malformed(other.to_string()),
        })?;
        let track = select_track(&tracks, request.language)
            .ok_or_else(|| RelayError::Rejected("caption track list is empty".to_string()))?;

        debug!(
            "Selected caption track {} ({}) for {}",
            track.language_code,
            if track.is_auto_generated() { "auto" } else { "manual" },
            request.video_id
        );

        get_text(client, &self.route(&track.base_url)).await
    }
}

/// Caption acquisition through a prioritized list of best-effort relays
///
/// Each relay is a [`CaptionTransport`] strategy that owns its URL building and
/// response unwrapping. A [`RelayChain`] walks them in priority order with a hard
/// per-attempt timeout, validates every payload before accepting it, and gives up
/// only once every relay has been tried exactly once.
pub mod page_data;
pub mod relays;

pub use page_data::{extract_caption_tracks, select_track, CaptionTrack};
pub use relays::{build_relay, AllOriginsRelay, DirectRelay, RawProxyRelay, RelayConfig, WatchPageRelay};

use crate::config::TransportConfig;
use crate::error::{RelayError, TransportError};
use crate::video_id::VideoId;
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Markers that identify a caption payload rather than an error or consent page
const CAPTION_MARKERS: [&str; 4] = ["<transcript", "<timedtext", "<text ", "\"events\""];

/// What a relay is asked to fetch
#[derive(Debug, Clone)]
pub struct CaptionRequest<'a> {
    pub video_id: &'a VideoId,
    pub language: &'a str,
}

/// One relay strategy
#[async_trait]
pub trait CaptionTransport: Send + Sync {
    /// Short name used in logs and error attribution
    fn name(&self) -> &str;

    /// Fetch and unwrap the raw caption payload for `request`
    async fn fetch(&self, client: &Client, request: &CaptionRequest<'_>) -> Result<String, RelayError>;
}

/// Timing and validation settings shared by every relay attempt
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub attempt_timeout: Duration,
    pub backoff: Duration,
    pub min_payload_bytes: usize,
    pub user_agent: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(12),
            backoff: Duration::from_millis(500),
            min_payload_bytes: 50,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        }
    }
}

impl From<&TransportConfig> for TransportSettings {
    fn from(config: &TransportConfig) -> Self {
        Self {
            attempt_timeout: Duration::from_secs(config.attempt_timeout_seconds),
            backoff: Duration::from_millis(config.backoff_millis),
            min_payload_bytes: config.min_payload_bytes,
            user_agent: config.user_agent.clone(),
        }
    }
}

/// Prioritized relay list
pub struct RelayChain {
    relays: Vec<Box<dyn CaptionTransport>>,
    client: Client,
    settings: TransportSettings,
}

impl RelayChain {
    /// Create an empty chain
    pub fn new(settings: TransportSettings) -> Result<Self, RelayError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .build()?;

        Ok(Self {
            relays: Vec::new(),
            client,
            settings,
        })
    }

    /// Build the chain described by the transport configuration
    pub fn from_config(config: &TransportConfig) -> Result<Self, RelayError> {
        let mut chain = Self::new(TransportSettings::from(config))?;
        for relay in &config.relays {
            chain.relays.push(build_relay(relay));
        }
        info!("🌐 Caption relay chain: {}", chain.relay_names().join(" -> "));
        Ok(chain)
    }

    /// Append a relay at the lowest priority
    pub fn with_relay(mut self, relay: impl CaptionTransport + 'static) -> Self {
        self.relays.push(Box::new(relay));
        self
    }

    pub fn relay_names(&self) -> Vec<&str> {
        self.relays.iter().map(|r| r.name()).collect()
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    /// Fetch a validated caption payload, trying each relay once in priority order.
    ///
    /// Worst-case latency is bounded by `relays × attempt_timeout` plus backoffs.
    pub async fn fetch_caption_payload(
        &self,
        video_id: &VideoId,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<String, TransportError> {
        if self.relays.is_empty() {
            return Err(TransportError::NoRelays);
        }

        let request = CaptionRequest { video_id, language };
        let mut last_cause = String::new();
        let mut all_answered = true;

        for (i, relay) in self.relays.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(TransportError::Cancelled);
            }

            if i > 0 {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                    _ = tokio::time::sleep(self.settings.backoff) => {}
                }
            }

            debug!("Trying relay {} ({}/{}) for {}", relay.name(), i + 1, self.relays.len(), video_id);

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                outcome = self.attempt(relay.as_ref(), &request) => outcome,
            };

            match outcome {
                Ok(payload) => {
                    info!("✅ Captions for {} fetched via {} ({} bytes)", video_id, relay.name(), payload.len());
                    return Ok(payload);
                }
                Err(e) => {
                    warn!("⚠️ Relay {} failed for {}: {}", relay.name(), video_id, e);
                    all_answered &= e.is_answered_without_captions();
                    last_cause = format!("{}: {}", relay.name(), e);
                }
            }
        }

        Err(exhausted(self.relays.len(), last_cause, all_answered))
    }

    /// Race up to `width` relays at a time and accept the first validated payload.
    ///
    /// Remaining in-flight requests are dropped as soon as one succeeds.
    pub async fn fetch_racing(
        &self,
        video_id: &VideoId,
        language: &str,
        cancel: &CancellationToken,
        width: usize,
    ) -> Result<String, TransportError> {
        if self.relays.is_empty() {
            return Err(TransportError::NoRelays);
        }

        let request = CaptionRequest { video_id, language };
        let mut pending = self.relays.iter();
        let mut in_flight = FuturesUnordered::new();
        for relay in pending.by_ref().take(width.max(1)) {
            in_flight.push(self.named_attempt(relay.as_ref(), &request));
        }

        let mut attempts = 0;
        let mut last_cause = String::new();
        let mut all_answered = true;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                next = in_flight.next() => next,
            };

            match next {
                Some((name, Ok(payload))) => {
                    info!("✅ Captions for {} won by {} ({} bytes)", video_id, name, payload.len());
                    return Ok(payload);
                }
                Some((name, Err(e))) => {
                    attempts += 1;
                    warn!("⚠️ Relay {} failed for {}: {}", name, video_id, e);
                    all_answered &= e.is_answered_without_captions();
                    last_cause = format!("{}: {}", name, e);
                    if let Some(relay) = pending.next() {
                        in_flight.push(self.named_attempt(relay.as_ref(), &request));
                    }
                }
                None => break,
            }
        }

        Err(exhausted(attempts, last_cause, all_answered))
    }

    async fn named_attempt<'a>(
        &'a self,
        relay: &'a dyn CaptionTransport,
        request: &'a CaptionRequest<'a>,
    ) -> (&'a str, Result<String, RelayError>) {
        (relay.name(), self.attempt(relay, request).await)
    }

    async fn attempt(&self, relay: &dyn CaptionTransport, request: &CaptionRequest<'_>) -> Result<String, RelayError> {
        let timeout = self.settings.attempt_timeout;
        let body = match tokio::time::timeout(timeout, relay.fetch(&self.client, request)).await {
            Ok(result) => result?,
            Err(_) => return Err(RelayError::Timeout(timeout)),
        };

        validate_payload(&body, self.settings.min_payload_bytes)?;
        Ok(body)
    }
}

/// Final error once every relay failed; relays that all answered without
/// captions mean the video has none, anything else is a reachability problem
fn exhausted(attempts: usize, last_cause: String, all_answered: bool) -> TransportError {
    if all_answered && attempts > 0 {
        TransportError::NoCaptions { attempts, last_cause }
    } else {
        TransportError::Exhausted { attempts, last_cause }
    }
}

/// Reject bodies that are too small or carry no caption container
pub fn validate_payload(body: &str, min_bytes: usize) -> Result<(), RelayError> {
    if body.len() < min_bytes {
        return Err(RelayError::Rejected(format!(
            "payload too small ({} bytes, need {})",
            body.len(),
            min_bytes
        )));
    }

    if !CAPTION_MARKERS.iter().any(|marker| body.contains(marker)) {
        return Err(RelayError::Rejected("no caption track container in payload".to_string()));
    }

    Ok(())
}

/// GET `url` and return the body of a 2xx response
pub(crate) async fn get_text(client: &Client, url: &str) -> Result<String, RelayError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(RelayError::Status(status.as_u16()));
    }
    Ok(response.text().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const PAYLOAD: &str = r#"<transcript><text start="0" dur="2">hello there</text></transcript>"#;

    struct StaticRelay {
        name: &'static str,
        body: Result<&'static str, u16>,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl StaticRelay {
        fn ok(name: &'static str, body: &'static str) -> Self {
            Self { name, body: Ok(body), delay: Duration::ZERO, calls: Arc::default() }
        }

        fn failing(name: &'static str, status: u16) -> Self {
            Self { name, body: Err(status), delay: Duration::ZERO, calls: Arc::default() }
        }

        fn slow(name: &'static str, delay: Duration) -> Self {
            Self { name, body: Ok(PAYLOAD), delay, calls: Arc::default() }
        }
    }

    #[async_trait]
    impl CaptionTransport for StaticRelay {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, _client: &Client, _request: &CaptionRequest<'_>) -> Result<String, RelayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match self.body {
                Ok(body) => Ok(body.to_string()),
                Err(status) => Err(RelayError::Status(status)),
            }
        }
    }

    fn fast_settings() -> TransportSettings {
        TransportSettings {
            attempt_timeout: Duration::from_millis(50),
            backoff: Duration::from_millis(1),
            ..TransportSettings::default()
        }
    }

    fn video() -> VideoId {
        VideoId::parse("dQw4w9WgXcQ").unwrap()
    }

    #[tokio::test]
    async fn test_falls_through_to_next_relay() {
        let first = StaticRelay::failing("first", 503);
        let first_calls = first.calls.clone();
        let chain = RelayChain::new(fast_settings())
            .unwrap()
            .with_relay(first)
            .with_relay(StaticRelay::ok("second", PAYLOAD));

        let payload = chain
            .fetch_caption_payload(&video(), "en", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(payload, PAYLOAD);
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_relays_timing_out_reports_last_cause() {
        let chain = RelayChain::new(fast_settings())
            .unwrap()
            .with_relay(StaticRelay::slow("alpha", Duration::from_secs(5)))
            .with_relay(StaticRelay::slow("omega", Duration::from_secs(5)));

        let err = chain
            .fetch_caption_payload(&video(), "en", &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            TransportError::Exhausted { attempts, last_cause } => {
                assert_eq!(attempts, 2);
                assert!(last_cause.starts_with("omega"));
                assert!(last_cause.contains("timed out"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_payload_is_rejected() {
        let chain = RelayChain::new(fast_settings())
            .unwrap()
            .with_relay(StaticRelay::ok("consent", "<html><body>Before you continue to YouTube, please accept cookies</body></html>"));

        let err = chain
            .fetch_caption_payload(&video(), "en", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.last_cause().unwrap().contains("no caption track container"));
    }

    #[tokio::test]
    async fn test_empty_answers_everywhere_mean_no_captions() {
        let chain = RelayChain::new(fast_settings())
            .unwrap()
            .with_relay(StaticRelay::ok("direct", ""))
            .with_relay(StaticRelay::ok("proxy", "<transcript/>"));

        let err = chain
            .fetch_caption_payload(&video(), "en", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NoCaptions { attempts: 2, .. }));

        let mixed = RelayChain::new(fast_settings())
            .unwrap()
            .with_relay(StaticRelay::ok("direct", ""))
            .with_relay(StaticRelay::failing("proxy", 502));
        let err = mixed
            .fetch_caption_payload(&video(), "en", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Exhausted { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_empty_chain() {
        let chain = RelayChain::new(fast_settings()).unwrap();
        let err = chain
            .fetch_caption_payload(&video(), "en", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NoRelays));
    }

    #[tokio::test]
    async fn test_cancellation_stops_in_flight_request() {
        let settings = TransportSettings {
            attempt_timeout: Duration::from_secs(30),
            ..fast_settings()
        };
        let chain = RelayChain::new(settings)
            .unwrap()
            .with_relay(StaticRelay::slow("stuck", Duration::from_secs(30)));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = chain.fetch_caption_payload(&video(), "en", &cancel).await.unwrap_err();

        assert!(matches!(err, TransportError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_racing_accepts_first_valid_payload() {
        let chain = RelayChain::new(fast_settings())
            .unwrap()
            .with_relay(StaticRelay::failing("broken", 500))
            .with_relay(StaticRelay::ok("good", PAYLOAD))
            .with_relay(StaticRelay::slow("slow", Duration::from_secs(5)));

        let payload = chain
            .fetch_racing(&video(), "en", &CancellationToken::new(), 2)
            .await
            .unwrap();

        assert_eq!(payload, PAYLOAD);
    }

    #[test]
    fn test_validate_payload() {
        assert!(validate_payload(PAYLOAD, 50).is_ok());
        assert!(validate_payload("<transcript/>", 50).is_err());
        assert!(validate_payload(r#"{"events":[{"tStartMs":0,"dDurationMs":1000,"segs":[]}]}"#, 50).is_ok());
    }
}

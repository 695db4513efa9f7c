use crate::chapters::{AssemblyConfig, DetectionConfig};
use crate::llm::LLMConfig;
use crate::transport::relays::default_relays;
use crate::transport::RelayConfig;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the YouTube chapter analyzer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Caption language requested when a request does not name one
    pub default_language: String,

    /// Caption relay settings
    pub transport: TransportConfig,

    /// Break-point detection settings
    pub detection: DetectionConfig,

    /// Chapter assembly settings
    pub assembly: AssemblyConfig,

    /// Optional LLM enrichment settings
    pub llm: LLMConfig,

    /// Output and logging settings
    pub output: OutputConfig,

    /// Performance and resource settings
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    /// Relays in priority order
    pub relays: Vec<RelayConfig>,

    /// Hard timeout for one relay attempt (seconds)
    pub attempt_timeout_seconds: u64,

    /// Pause between failed relays (milliseconds)
    pub backoff_millis: u64,

    /// Payloads shorter than this are rejected
    pub min_payload_bytes: usize,

    pub user_agent: String,

    /// Relays raced concurrently; 1 means strictly sequential
    pub race_width: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Description,
    Srt,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Log level
    pub log_level: String,

    /// Default CLI output format
    pub format: OutputFormat,

    /// Directory for written reports; stdout when unset
    pub output_dir: Option<PathBuf>,

    /// Pretty-print JSON output
    pub pretty: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Maximum number of videos processed concurrently
    pub max_workers: usize,

    /// Registry entry lifetime in seconds
    pub cache_ttl_seconds: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            relays: default_relays(),
            attempt_timeout_seconds: 12,
            backoff_millis: 500,
            min_payload_bytes: 50,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            race_width: 1,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: OutputFormat::Json,
            output_dir: None,
            pretty: true,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get().min(8), // Use available cores, max 8
            cache_ttl_seconds: 3600,             // 1 hour
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            transport: TransportConfig::default(),
            detection: DetectionConfig::default(),
            assembly: AssemblyConfig::default(),
            llm: LLMConfig::default(),
            output: OutputConfig::default(),
            performance: PerformanceConfig::default(),
        }
    }
}

impl Config {
    /// Candidate configuration files, first match wins
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("yt-chapters.toml"),
            PathBuf::from("config/yt-chapters.toml"),
        ];
        if let Ok(home) = std::env::var("HOME") {
            paths.push(PathBuf::from(home).join(".config/yt-chapters/config.toml"));
        }
        paths
    }

    /// Load configuration from the first readable file, then apply env overrides.
    ///
    /// Falls back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        for path in Self::search_paths() {
            if !path.exists() {
                continue;
            }
            match Self::from_file(&path) {
                Ok(config) => return Ok(config.with_env_overrides()),
                Err(e) => tracing::warn!("Failed to parse config file {}: {}", path.display(), e),
            }
        }

        Self::from_env()
    }

    /// Load configuration from one TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Cannot read {}: {}", path.display(), e))?;
        let config: Config = toml::from_str(&config_str)?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Defaults with environment variable overrides
    pub fn from_env() -> Result<Self> {
        Ok(Self::default().with_env_overrides())
    }

    /// Apply `YT_CHAPTERS_*` environment variables on top of this configuration
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(language) = var("YT_CHAPTERS_LANGUAGE") {
            self.default_language = language;
        }

        if let Some(api_key) = var("YT_CHAPTERS_LLM_API_KEY") {
            self.llm.api_key = Some(api_key);
        }

        if let Some(timeout) = var("YT_CHAPTERS_RELAY_TIMEOUT") {
            match timeout.parse() {
                Ok(seconds) => self.transport.attempt_timeout_seconds = seconds,
                Err(_) => tracing::warn!("Ignoring invalid YT_CHAPTERS_RELAY_TIMEOUT: {}", timeout),
            }
        }

        if let Some(log_level) = var("YT_CHAPTERS_LOG_LEVEL") {
            self.output.log_level = log_level;
        }

        if let Some(workers) = var("YT_CHAPTERS_WORKERS") {
            match workers.parse() {
                Ok(workers) => self.performance.max_workers = workers,
                Err(_) => tracing::warn!("Ignoring invalid YT_CHAPTERS_WORKERS: {}", workers),
            }
        }

        self
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.as_ref().display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.performance.max_workers == 0 {
            return Err(anyhow!("max_workers must be greater than 0"));
        }

        if self.transport.relays.is_empty() {
            return Err(anyhow!("at least one caption relay must be configured"));
        }

        if self.transport.attempt_timeout_seconds == 0 {
            return Err(anyhow!("attempt_timeout_seconds must be greater than 0"));
        }

        if self.transport.race_width == 0 {
            return Err(anyhow!("race_width must be at least 1"));
        }

        if self.detection.silence_threshold <= 0.0 || self.detection.silence_full_confidence <= 0.0 {
            return Err(anyhow!("silence thresholds must be positive"));
        }

        if self.detection.min_chapter_length < 0.0 {
            return Err(anyhow!("min_chapter_length must not be negative"));
        }

        if self.assembly.max_chapters == 0 {
            return Err(anyhow!("max_chapters must be greater than 0"));
        }

        if self.llm.enabled {
            self.llm.check()?;
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "YouTube Chapter Analyzer Configuration:\n\
            - Default Language: {}\n\
            - Relays: {}\n\
            - Attempt Timeout: {}s\n\
            - Race Width: {}\n\
            - Max Chapters: {}\n\
            - LLM Enrichment: {}\n\
            - Workers: {}\n\
            - Cache TTL: {}s",
            self.default_language,
            self.transport.relays.len(),
            self.transport.attempt_timeout_seconds,
            self.transport.race_width,
            self.assembly.max_chapters,
            if self.llm.is_configured() {
                format!("{:?} ({})", self.llm.provider, self.llm.model)
            } else {
                "disabled".to_string()
            },
            self.performance.max_workers,
            self.performance.cache_ttl_seconds
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.config.default_language = language.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.performance.max_workers = workers;
        self
    }

    pub fn with_relays(mut self, relays: Vec<RelayConfig>) -> Self {
        self.config.transport.relays = relays;
        self
    }

    pub fn with_attempt_timeout(mut self, seconds: u64) -> Self {
        self.config.transport.attempt_timeout_seconds = seconds;
        self
    }

    pub fn with_backoff_millis(mut self, millis: u64) -> Self {
        self.config.transport.backoff_millis = millis;
        self
    }

    pub fn with_race_width(mut self, width: usize) -> Self {
        self.config.transport.race_width = width;
        self
    }

    pub fn with_llm(mut self, llm: LLMConfig) -> Self {
        self.config.llm = llm;
        self
    }

    pub fn with_cache_ttl(mut self, seconds: u64) -> Self {
        self.config.performance.cache_ttl_seconds = seconds;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

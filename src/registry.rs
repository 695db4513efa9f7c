/// In-memory status and result registry for pipeline runs
use crate::pipeline::{ChapterReport, Stage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// An active entry not updated for this long is treated as abandoned
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Registry key: one entry per video and caption language
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryKey {
    pub video_id: String,
    pub language: String,
}

impl RegistryKey {
    pub fn new(video_id: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            language: language.into(),
        }
    }
}

/// Lifecycle of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running(Stage),
    Completed,
    Failed(String),
}

impl JobStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running(_))
    }
}

#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub status: JobStatus,
    pub report: Option<ChapterReport>,
    updated_at: Instant,
}

impl RegistryEntry {
    fn new(status: JobStatus) -> Self {
        Self {
            status,
            report: None,
            updated_at: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.updated_at.elapsed()
    }
}

/// Status registry keyed by `(video_id, language)`; entries expire after `ttl`
#[derive(Debug)]
pub struct Registry {
    entries: RwLock<HashMap<RegistryKey, RegistryEntry>>,
    ttl: Duration,
    stall_timeout: Duration,
}

impl Registry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
        }
    }

    /// Override how long an active run may go without a stage update
    pub fn with_stall_timeout(mut self, stall_timeout: Duration) -> Self {
        self.stall_timeout = stall_timeout;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, entry: &RegistryEntry) -> bool {
        entry.age() < self.ttl
    }

    fn is_live(&self, entry: &RegistryEntry) -> bool {
        entry.status.is_active() && entry.age() < self.ttl.min(self.stall_timeout)
    }

    /// Claim `key` for a new run.
    ///
    /// Returns `false` while a live run for the same key is still pending or running.
    pub async fn try_begin(&self, key: &RegistryKey) -> bool {
        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.get(key) {
            if self.is_live(existing) {
                debug!("Run for {:?} already in progress", key);
                return false;
            }
        }
        entries.insert(key.clone(), RegistryEntry::new(JobStatus::Pending));
        true
    }

    /// Claim `key` and return a guard that releases the claim if the run is dropped unfinished
    pub async fn begin(self: &Arc<Self>, key: &RegistryKey) -> Option<RunGuard> {
        if !self.try_begin(key).await {
            return None;
        }
        Some(RunGuard {
            registry: Arc::clone(self),
            key: key.clone(),
            finished: false,
        })
    }

    /// Remove `key` if its run is still marked active
    pub async fn abandon(&self, key: &RegistryKey) {
        let mut entries = self.entries.write().await;
        Self::remove_active(&mut entries, key);
    }

    fn remove_active(entries: &mut HashMap<RegistryKey, RegistryEntry>, key: &RegistryKey) {
        if entries.get(key).map_or(false, |e| e.status.is_active()) {
            entries.remove(key);
            warn!("⚠️ Run for {} ({}) was abandoned", key.video_id, key.language);
        }
    }

    pub async fn set_stage(&self, key: &RegistryKey, stage: Stage) {
        self.update(key, JobStatus::Running(stage), None).await;
    }

    pub async fn complete(&self, key: &RegistryKey, report: ChapterReport) {
        self.update(key, JobStatus::Completed, Some(report)).await;
    }

    pub async fn fail(&self, key: &RegistryKey, error: impl Into<String>) {
        self.update(key, JobStatus::Failed(error.into()), None).await;
    }

    async fn update(&self, key: &RegistryKey, status: JobStatus, report: Option<ChapterReport>) {
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| RegistryEntry::new(JobStatus::Pending));
        entry.status = status;
        entry.updated_at = Instant::now();
        if report.is_some() {
            entry.report = report;
        }
    }

    /// Entry for `key`, ignoring expired ones
    pub async fn get(&self, key: &RegistryKey) -> Option<RegistryEntry> {
        let entries = self.entries.read().await;
        entries.get(key).filter(|e| self.is_fresh(e)).cloned()
    }

    pub async fn status(&self, key: &RegistryKey) -> Option<JobStatus> {
        self.get(key).await.map(|e| e.status)
    }

    /// Fresh completed report for `key`, if any
    pub async fn cached_report(&self, key: &RegistryKey) -> Option<ChapterReport> {
        self.get(key)
            .await
            .filter(|e| e.status == JobStatus::Completed)
            .and_then(|e| e.report)
    }

    /// Drop expired entries, returning how many were removed
    pub async fn evict_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.age() < self.ttl);
        let removed = before - entries.len();
        if removed > 0 {
            debug!("Evicted {} expired registry entries", removed);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Claim on a registry key held for the duration of one run.
///
/// Dropping it without calling [`RunGuard::complete`] or [`RunGuard::fail`]
/// removes the active entry so the next request can start over.
#[derive(Debug)]
pub struct RunGuard {
    registry: Arc<Registry>,
    key: RegistryKey,
    finished: bool,
}

impl RunGuard {
    pub fn key(&self) -> &RegistryKey {
        &self.key
    }

    pub async fn complete(mut self, report: ChapterReport) {
        self.finished = true;
        self.registry.complete(&self.key, report).await;
    }

    pub async fn fail(mut self, error: impl Into<String>) {
        self.finished = true;
        self.registry.fail(&self.key, error).await;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        if let Ok(mut entries) = self.registry.entries.try_write() {
            Registry::remove_active(&mut entries, &self.key);
            return;
        }

        // Lock is busy; release from a task instead
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let registry = Arc::clone(&self.registry);
            let key = self.key.clone();
            handle.spawn(async move { registry.abandon(&key).await });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::DemoGenerator;

    fn key() -> RegistryKey {
        RegistryKey::new("dQw4w9WgXcQ", "en")
    }

    fn report() -> ChapterReport {
        let run = DemoGenerator::default().generate("dQw4w9WgXcQ", "en");
        ChapterReport::heuristic(run.data, run.chapters, run.candidates)
    }

    #[tokio::test]
    async fn test_try_begin_deduplicates_active_runs() {
        let registry = Registry::new(Duration::from_secs(60));

        assert!(registry.try_begin(&key()).await);
        assert!(!registry.try_begin(&key()).await);

        registry.set_stage(&key(), Stage::Detect).await;
        assert_eq!(registry.status(&key()).await, Some(JobStatus::Running(Stage::Detect)));
        assert!(!registry.try_begin(&key()).await);

        registry.fail(&key(), "boom").await;
        assert!(registry.try_begin(&key()).await);

        assert!(registry.try_begin(&RegistryKey::new("dQw4w9WgXcQ", "es")).await);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_completed_report_is_cached() {
        let registry = Registry::new(Duration::from_secs(60));
        registry.try_begin(&key()).await;
        assert!(registry.cached_report(&key()).await.is_none());

        registry.complete(&key(), report()).await;

        let cached = registry.cached_report(&key()).await.unwrap();
        assert!(cached.is_demo_data);
        assert!(registry.try_begin(&key()).await);
    }

    #[tokio::test]
    async fn test_expired_entries_are_ignored_and_evicted() {
        let registry = Registry::new(Duration::ZERO);
        registry.complete(&key(), report()).await;

        assert!(registry.get(&key()).await.is_none());
        assert!(registry.cached_report(&key()).await.is_none());
        assert_eq!(registry.len().await, 1);

        assert_eq!(registry.evict_expired().await, 1);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_dropped_guard_releases_claim() {
        let registry = Arc::new(Registry::new(Duration::from_secs(60)));

        let guard = registry.begin(&key()).await.unwrap();
        registry.set_stage(&key(), Stage::Fetch).await;
        assert!(registry.begin(&key()).await.is_none());

        drop(guard);
        assert!(registry.get(&key()).await.is_none());

        let guard = registry.begin(&key()).await.unwrap();
        guard.fail("relays down").await;
        assert_eq!(
            registry.status(&key()).await,
            Some(JobStatus::Failed("relays down".to_string()))
        );
    }

    #[tokio::test]
    async fn test_stalled_run_can_be_reclaimed() {
        let registry = Registry::new(Duration::from_secs(60)).with_stall_timeout(Duration::ZERO);

        assert!(registry.try_begin(&key()).await);
        registry.set_stage(&key(), Stage::Fetch).await;

        assert!(registry.try_begin(&key()).await);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(JobStatus::Running(Stage::Fetch)).unwrap();
        assert_eq!(json, serde_json::json!({"state": "running", "detail": "fetch"}));

        let json = serde_json::to_value(JobStatus::Completed).unwrap();
        assert_eq!(json, serde_json::json!({"state": "completed"}));
    }
}

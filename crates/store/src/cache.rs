//! Result cache with absolute per-entry deadlines.
//!
//! Deadlines are computed at `put` time from the injected [`Clock`]. A read
//! at or after the deadline never returns the entry, whether or not the
//! background sweep has physically removed it yet.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use noise_core::clock::{deadline_after, Clock};
use noise_core::error::CoreError;
use noise_core::types::JobId;
use tokio::sync::RwLock;

use crate::models::artifact::{ArtifactPayload, CacheLookup, ResultArtifact};

pub struct ResultCache {
    entries: RwLock<HashMap<JobId, Arc<ResultArtifact>>>,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Store the artifact for `key`, live for `ttl` from now.
    ///
    /// A live artifact is never replaced; an expired one is.
    pub async fn put(
        &self,
        key: JobId,
        payload: ArtifactPayload,
        ttl: Duration,
    ) -> Result<Arc<ResultArtifact>, CoreError> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        if entries.get(&key).is_some_and(|e| e.expires_at > now) {
            return Err(CoreError::Conflict(format!("result for job {key} already stored")));
        }
        let artifact = Arc::new(ResultArtifact {
            job_id: key,
            payload,
            produced_at: now,
            expires_at: deadline_after(now, ttl),
        });
        entries.insert(key, Arc::clone(&artifact));
        Ok(artifact)
    }

    pub async fn get(&self, key: JobId) -> CacheLookup<Arc<ResultArtifact>> {
        let now = self.clock.now();
        match self.entries.read().await.get(&key) {
            None => CacheLookup::Absent,
            Some(entry) if entry.expires_at <= now => CacheLookup::Expired,
            Some(entry) => CacheLookup::Hit(Arc::clone(entry)),
        }
    }

    /// Remove the entry for `key`. Returns whether one existed.
    pub async fn invalidate(&self, key: JobId) -> bool {
        self.entries.write().await.remove(&key).is_some()
    }

    /// Physically remove expired entries. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of stored entries, expired ones included until swept.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use noise_core::clock::ManualClock;
    use serde_json::json;

    use super::*;

    fn cache() -> (Arc<ManualClock>, ResultCache) {
        let clock = Arc::new(ManualClock::starting_now());
        let cache = ResultCache::new(clock.clone());
        (clock, cache)
    }

    fn doc() -> ArtifactPayload {
        ArtifactPayload::Inline(json!({"type": "FeatureCollection", "features": []}))
    }

    #[tokio::test]
    async fn hit_before_deadline() {
        let (_, cache) = cache();
        let key = JobId::now_v7();
        cache.put(key, doc(), Duration::from_secs(10)).await.unwrap();

        let hit = cache.get(key).await.hit().expect("entry should be live");
        assert_eq!(hit.job_id, key);
        assert_eq!(hit.payload, doc());
    }

    #[tokio::test]
    async fn ttl_one_read_after_two_is_expired() {
        let (clock, cache) = cache();
        let key = JobId::now_v7();
        cache.put(key, doc(), Duration::from_secs(1)).await.unwrap();

        clock.advance(chrono::Duration::seconds(2));
        assert_matches!(cache.get(key).await, CacheLookup::Expired);
    }

    #[tokio::test]
    async fn entry_is_gone_at_the_deadline_instant() {
        let (clock, cache) = cache();
        let key = JobId::now_v7();
        cache.put(key, doc(), Duration::from_secs(5)).await.unwrap();

        clock.advance(chrono::Duration::seconds(5));
        assert_matches!(cache.get(key).await, CacheLookup::Expired);
    }

    #[tokio::test]
    async fn unknown_key_is_absent() {
        let (_, cache) = cache();
        assert_matches!(cache.get(JobId::now_v7()).await, CacheLookup::Absent);
    }

    #[tokio::test]
    async fn live_entry_is_not_replaced() {
        let (clock, cache) = cache();
        let key = JobId::now_v7();
        cache.put(key, doc(), Duration::from_secs(5)).await.unwrap();
        assert_matches!(
            cache.put(key, doc(), Duration::from_secs(5)).await,
            Err(CoreError::Conflict(_))
        );

        clock.advance(chrono::Duration::seconds(6));
        assert!(cache.put(key, doc(), Duration::from_secs(5)).await.is_ok());
    }

    #[tokio::test]
    async fn sweep_removes_only_expired() {
        let (clock, cache) = cache();
        let short = JobId::now_v7();
        let long = JobId::now_v7();
        cache.put(short, doc(), Duration::from_secs(1)).await.unwrap();
        cache.put(long, doc(), Duration::from_secs(100)).await.unwrap();

        clock.advance(chrono::Duration::seconds(2));
        assert_eq!(cache.sweep().await, 1);
        assert_eq!(cache.len().await, 1);
        assert_matches!(cache.get(short).await, CacheLookup::Absent);
        assert_matches!(cache.get(long).await, CacheLookup::Hit(_));
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let (_, cache) = cache();
        let key = JobId::now_v7();
        cache.put(key, doc(), Duration::from_secs(10)).await.unwrap();
        assert!(cache.invalidate(key).await);
        assert!(!cache.invalidate(key).await);
        assert!(cache.is_empty().await);
    }
}

//! Recently generated candidate sets.
//!
//! Generation runs are slow, and repeating one with the same constraints
//! yields the same candidates. A set is keyed by the normalized request
//! together with the major marker it was filtered under, since the marker
//! decides which candidates pass the major-credit bound.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt::Write;
use std::time::{Duration, Instant};

use super::GenerationRequest;
use crate::timetable::Timetable;

/// Identifies one generation run: request constraints plus major marker.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn new(request: &GenerationRequest, major_marker: &str) -> Self {
        let encoded = serde_json::to_vec(&request.normalized()).unwrap_or_default();
        let digest = Sha256::new()
            .chain_update(major_marker.as_bytes())
            .chain_update([0u8])
            .chain_update(&encoded)
            .finalize();

        let mut key = String::with_capacity(32);
        for byte in &digest[..16] {
            let _ = write!(key, "{byte:02x}");
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0[..8.min(self.0.len())])
    }
}

struct CandidateSet {
    timetables: Vec<Timetable>,
    generated_at: DateTime<Utc>,
    expires_at: Instant,
}

impl CandidateSet {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Shared store of finished candidate sets with per-set expiry.
pub struct CandidateCache {
    sets: DashMap<RequestKey, CandidateSet>,
    ttl: Duration,
}

impl CandidateCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sets: DashMap::new(),
            ttl,
        }
    }

    /// Candidates from a live set; an expired set is evicted on lookup.
    pub fn get(&self, key: &RequestKey) -> Option<Vec<Timetable>> {
        let now = Instant::now();
        if let Some(set) = self.sets.get(key) {
            if set.is_live(now) {
                return Some(set.timetables.clone());
            }
        }
        self.sets.remove_if(key, |_, set| !set.is_live(now));
        None
    }

    /// When the live set under `key` was generated.
    pub fn generated_at(&self, key: &RequestKey) -> Option<DateTime<Utc>> {
        self.sets
            .get(key)
            .filter(|set| set.is_live(Instant::now()))
            .map(|set| set.generated_at)
    }

    pub fn insert(&self, key: RequestKey, timetables: Vec<Timetable>) {
        self.insert_with_ttl(key, timetables, self.ttl);
    }

    pub fn insert_with_ttl(&self, key: RequestKey, timetables: Vec<Timetable>, ttl: Duration) {
        let set = CandidateSet {
            timetables,
            generated_at: Utc::now(),
            expires_at: Instant::now() + ttl,
        };
        self.sets.insert(key, set);
    }

    pub fn invalidate(&self, key: &RequestKey) {
        self.sets.remove(key);
    }

    pub fn clear(&self) {
        self.sets.clear();
    }

    /// Number of stored sets, expired ones included.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        self.sets.retain(|_, set| set.is_live(now));
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let mut stats = CacheStats::default();
        for set in self.sets.iter() {
            if set.is_live(now) {
                stats.live_sets += 1;
                stats.live_candidates += set.timetables.len();
            } else {
                stats.expired_sets += 1;
            }
        }
        stats
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub live_sets: usize,
    pub expired_sets: usize,
    /// Candidate timetables across all live sets
    pub live_candidates: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::Weekday;

    fn request(max: u32) -> GenerationRequest {
        GenerationRequest {
            max_credits: Some(max),
            free_days: vec![Weekday::Fri],
            ..Default::default()
        }
    }

    #[test]
    fn test_key_depends_on_request_and_marker() {
        let key1 = request(18).cache_key("전공");
        let key2 = request(18).cache_key("전공");
        let key3 = request(21).cache_key("전공");
        let key4 = request(18).cache_key("Major");

        assert_eq!(key1, key2);
        assert_ne!(key1, key3);
        assert_ne!(key1, key4);
        assert_eq!(key1.as_str().len(), 32);
        assert_eq!(key1.to_string().len(), 8);
    }

    #[test]
    fn test_insert_and_expire() {
        let cache = CandidateCache::new(Duration::from_secs(60));
        let key = request(18).cache_key("전공");

        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), vec![Timetable::new(), Timetable::new()]);
        assert_eq!(cache.get(&key).map(|c| c.len()), Some(2));
        assert!(cache.generated_at(&key).is_some());
        assert_eq!(cache.stats().live_candidates, 2);

        cache.insert_with_ttl(key.clone(), vec![], Duration::ZERO);
        assert_eq!(cache.stats().expired_sets, 1);
        assert!(cache.generated_at(&key).is_none());
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cleanup_and_invalidate() {
        let cache = CandidateCache::new(Duration::from_secs(60));
        cache.insert(request(18).cache_key("전공"), vec![]);
        cache.insert_with_ttl(request(21).cache_key("전공"), vec![], Duration::ZERO);

        cache.cleanup_expired();
        assert_eq!(cache.len(), 1);

        cache.invalidate(&request(18).cache_key("전공"));
        assert!(cache.is_empty());

        cache.insert(request(18).cache_key("Major"), vec![]);
        cache.clear();
        assert!(cache.is_empty());
    }
}

use papaya::HashMap;

/// Deduplicates in-flight drains: once an `instance_id` is seeded, further
/// drain messages for it are dropped until the entry ages out.
///
/// Eviction is boundary-exclusive on the *old* side: an entry is evicted
/// once its age reaches `ttl_seconds`, but an entry one second younger than
/// that survives (see the B2 boundary property).
pub struct TtlCache {
    entries: HashMap<String, i64>,
    ttl_seconds: i64,
}

impl TtlCache {
    pub fn new(ttl_seconds: i64) -> Self {
        TtlCache { entries: HashMap::new(), ttl_seconds }
    }

    pub fn insert(&self, instance_id: &str, now_unix: i64) {
        self.entries.pin().insert(instance_id.to_string(), now_unix);
    }

    pub fn remove(&self, instance_id: &str) {
        self.entries.pin().remove(instance_id);
    }

    pub fn contains(&self, instance_id: &str) -> bool {
        self.entries.pin().contains_key(instance_id)
    }

    /// `true` iff an entry exists and is still within its TTL window.
    pub fn is_fresh(&self, instance_id: &str, now_unix: i64) -> bool {
        match self.entries.pin().get(instance_id) {
            Some(&ts) => now_unix - ts < self.ttl_seconds,
            None => false,
        }
    }

    /// Evicts every entry whose age is at least `ttl_seconds`.
    pub fn clean_processing_hosts_cache(&self, now_unix: i64) {
        let guard = self.entries.pin();
        let stale: Vec<String> = guard
            .iter()
            .filter(|(_, &ts)| now_unix - ts >= self.ttl_seconds)
            .map(|(k, _)| k.clone())
            .collect();
        drop(guard);
        let guard = self.entries.pin();
        for key in stale {
            guard.remove(&key);
        }
    }
}

//! Spatial Index Service (spec.md §4.1/§9): builds and caches per-layer
//! bounding-box indices keyed by `(jobId, layerId, fingerprint)`, with
//! per-key single-flight construction — the first requester builds, others
//! wait (spec.md §5).

use std::sync::Arc;

use dashmap::DashMap;
use geo::Rect;
use geoqc_index::SpatialIndex;
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IndexKey {
    job_id: String,
    layer_id: String,
    fingerprint: u64,
}

enum Slot {
    Building(Arc<Notify>),
    Ready(Arc<SpatialIndex>),
}

#[derive(Default)]
pub struct SpatialIndexCache {
    slots: DashMap<IndexKey, Slot>,
}

impl SpatialIndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached index for `(job_id, layer_id, fingerprint)`,
    /// building it from `items` via `build` only if no other caller has
    /// already started (or finished) building it. Concurrent callers for
    /// the same key wait on the first builder rather than duplicating work.
    pub async fn get_or_build(
        &self,
        job_id: &str,
        layer_id: &str,
        fingerprint: u64,
        items: impl FnOnce() -> Vec<(i64, Rect<f64>)>,
    ) -> Arc<SpatialIndex> {
        let key = IndexKey {
            job_id: job_id.to_string(),
            layer_id: layer_id.to_string(),
            fingerprint,
        };

        loop {
            let notify = match self.slots.entry(key.clone()) {
                dashmap::mapref::entry::Entry::Occupied(entry) => match entry.get() {
                    Slot::Ready(index) => return index.clone(),
                    Slot::Building(notify) => notify.clone(),
                },
                dashmap::mapref::entry::Entry::Vacant(entry) => {
                    entry.insert(Slot::Building(Arc::new(Notify::new())));
                    let index = Arc::new(SpatialIndex::build(items()));
                    if let Some(mut slot) = self.slots.get_mut(&key) {
                        if let Slot::Building(notify) = std::mem::replace(&mut *slot, Slot::Ready(index.clone())) {
                            notify.notify_waiters();
                        }
                    }
                    return index;
                }
            };
            notify.notified().await;
        }
    }

    /// Evicts every index owned by `job_id` (called on job deletion, per
    /// spec.md §4.8).
    pub fn evict_job(&self, job_id: &str) {
        self.slots.retain(|key, _| key.job_id != job_id);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Coord;

    fn rect(n: f64) -> Rect<f64> {
        Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: n, y: n })
    }

    #[tokio::test]
    async fn builds_once_and_caches() {
        let cache = SpatialIndexCache::new();
        let index = cache
            .get_or_build("job1", "layer1", 42, || vec![(1, rect(1.0)), (2, rect(2.0))])
            .await;
        assert_eq!(index.len(), 2);

        let cached = cache
            .get_or_build("job1", "layer1", 42, || panic!("should not rebuild"))
            .await;
        assert_eq!(Arc::as_ptr(&index), Arc::as_ptr(&cached));
    }

    #[tokio::test]
    async fn eviction_removes_only_that_job() {
        let cache = SpatialIndexCache::new();
        cache.get_or_build("job1", "layer1", 1, || vec![(1, rect(1.0))]).await;
        cache.get_or_build("job2", "layer1", 1, || vec![(1, rect(1.0))]).await;
        cache.evict_job("job1");
        assert_eq!(cache.len(), 1);
    }
}

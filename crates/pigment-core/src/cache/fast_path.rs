//! Per-worker fast-path memoization

use std::sync::Arc;

use super::handle::{CachedTransform, CachedTransformEntry};
use super::key::TransformCacheKey;
use crate::color_space::ColorSpace;
use crate::transform::{ConversionFlags, RenderingIntent};

/// Single-entry memo owned by one worker thread
///
/// A worker that converts the same pair over and over hits this slot
/// without touching the cache's lock. The slot does not count as a live
/// use of its transform: it is only a shortcut back to the entry, and it
/// is dropped lazily as soon as the cache's generation moves on (every
/// color space destruction bumps it).
///
/// Slots are created by [`ConversionCache::fast_path_slot`](super::ConversionCache::fast_path_slot)
/// and must not be shared between threads; the `&mut` receiver enforces
/// that.
pub struct FastPathSlot {
    cache_id: u64,
    generation: u64,
    cached: Option<(TransformCacheKey, Arc<CachedTransformEntry>)>,
    hits: u64,
}

impl FastPathSlot {
    pub(crate) fn new(cache_id: u64) -> Self {
        Self {
            cache_id,
            generation: 0,
            cached: None,
            hits: 0,
        }
    }

    pub(crate) fn lookup(
        &mut self,
        cache_id: u64,
        generation: u64,
        src: &ColorSpace,
        dst: &ColorSpace,
        intent: RenderingIntent,
        flags: ConversionFlags,
    ) -> Option<CachedTransform> {
        if self.cache_id != cache_id {
            return None;
        }
        if self.generation != generation {
            self.cached = None;
            return None;
        }

        let (key, entry) = self.cached.as_ref()?;
        if !key.matches(src, dst, intent, flags) {
            return None;
        }

        // Pin the entry before checking its binding so a concurrent
        // re-point cannot slip in between.
        let handle = CachedTransform::try_acquire(entry)?;
        if !handle
            .transformation()
            .is_bound_to_pair(src.instance_id(), dst.instance_id())
        {
            return None;
        }

        self.hits += 1;
        Some(handle)
    }

    pub(crate) fn store(
        &mut self,
        cache_id: u64,
        generation: u64,
        key: TransformCacheKey,
        entry: Arc<CachedTransformEntry>,
    ) {
        self.cache_id = cache_id;
        self.generation = generation;
        self.cached = Some((key, entry));
    }

    /// Forget the memoized transform
    pub fn clear(&mut self) {
        self.cached = None;
    }

    /// Whether the slot currently memoizes a transform
    pub fn is_populated(&self) -> bool {
        self.cached.is_some()
    }

    /// Key of the memoized transform
    pub fn cached_key(&self) -> Option<&TransformCacheKey> {
        self.cached.as_ref().map(|(key, _)| key)
    }

    /// Number of lookups answered by this slot
    pub fn hits(&self) -> u64 {
        self.hits
    }
}

impl std::fmt::Debug for FastPathSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastPathSlot")
            .field("cache_id", &self.cache_id)
            .field("generation", &self.generation)
            .field("key", &self.cached_key())
            .field("hits", &self.hits)
            .finish()
    }
}

//! Color conversion cache
//!
//! Building a conversion transform means parsing profiles, composing
//! matrices and filling LUTs, which is far too slow for per-tile or
//! per-dab code. [`ConversionCache`] builds each transform once and hands
//! out counted [`CachedTransform`] handles to it.
//!
//! Lookups go through two levels:
//!
//! 1. the caller's [`FastPathSlot`], which remembers the last transform the
//!    worker asked for and is checked without any locking;
//! 2. a shared multi-map behind a mutex, which either returns an existing
//!    entry (re-pointed at the caller's color space instances) or builds a
//!    new one.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pigment_core::{
//!     ChannelDepth, ColorProfile, ColorSpace, ConversionCache, ConversionFlags, Layout,
//!     RenderingIntent,
//! };
//!
//! let cache = Arc::new(ConversionCache::new());
//! let srgb = ColorSpace::new_with_cache(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_srgb(), &cache);
//! let p3 = ColorSpace::new_with_cache(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_display_p3(), &cache);
//!
//! let mut slot = cache.fast_path_slot();
//! let converter = cache
//!     .cached_converter(&mut slot, &srgb, &p3, RenderingIntent::Perceptual, ConversionFlags::default())
//!     .unwrap();
//!
//! let src = [255u8, 128, 64];
//! let mut dst = [0u8; 3];
//! converter.transform(&src, &mut dst).unwrap();
//! ```

mod fast_path;
mod handle;
mod key;

pub use fast_path::FastPathSlot;
pub use handle::CachedTransform;
pub use key::TransformCacheKey;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, error, trace};

use crate::Result;
use crate::color_space::ColorSpace;
use crate::transform::{ConversionFlags, RenderingIntent};
use handle::CachedTransformEntry;

static NEXT_CACHE_ID: AtomicU64 = AtomicU64::new(1);

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the shared map
    pub slow_path_hits: u64,
    /// Transforms built on a miss
    pub constructions: u64,
    /// Entries removed by invalidation
    pub purged: u64,
    /// Calls to [`ConversionCache::color_space_is_destroyed`]
    pub invalidations: u64,
}

#[derive(Default)]
struct StatsCounters {
    slow_path_hits: AtomicU64,
    constructions: AtomicU64,
    purged: AtomicU64,
    invalidations: AtomicU64,
}

/// Shared cache of color conversion transforms
///
/// Meant to be created once by the host application and shared, usually as
/// `Arc<ConversionCache>`, with every worker that converts pixels. Entries
/// are never evicted for capacity; they leave the cache only when one of
/// their color spaces is destroyed.
pub struct ConversionCache {
    id: u64,
    entries: Mutex<HashMap<TransformCacheKey, Vec<Arc<CachedTransformEntry>>>>,
    generation: AtomicU64,
    stats: StatsCounters,
}

impl ConversionCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            id: NEXT_CACHE_ID.fetch_add(1, Ordering::Relaxed),
            entries: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            stats: StatsCounters::default(),
        }
    }

    /// Create a fast-path slot for one worker thread
    pub fn fast_path_slot(&self) -> FastPathSlot {
        FastPathSlot::new(self.id)
    }

    /// Get a handle to the transform for `(src, dst, intent, flags)`
    ///
    /// Checks `slot` first; on a miss, looks the key up under the lock and
    /// builds the transform if needed, then memoizes the result in `slot`.
    /// Construction failures are returned as produced by
    /// [`ColorSpace::create_color_converter`].
    pub fn cached_converter(
        &self,
        slot: &mut FastPathSlot,
        src: &Arc<ColorSpace>,
        dst: &Arc<ColorSpace>,
        intent: RenderingIntent,
        flags: ConversionFlags,
    ) -> Result<CachedTransform> {
        let generation = self.generation.load(Ordering::Acquire);
        if let Some(handle) = slot.lookup(self.id, generation, src, dst, intent, flags) {
            return Ok(handle);
        }

        let (key, handle, generation) = self.lookup_or_create(src, dst, intent, flags)?;
        slot.store(self.id, generation, key, Arc::clone(handle.entry()));
        Ok(handle)
    }

    /// Get a handle through the locked path only
    ///
    /// For callers that do not run on a long-lived worker and have no slot.
    pub fn cached_converter_locked(
        &self,
        src: &Arc<ColorSpace>,
        dst: &Arc<ColorSpace>,
        intent: RenderingIntent,
        flags: ConversionFlags,
    ) -> Result<CachedTransform> {
        self.lookup_or_create(src, dst, intent, flags)
            .map(|(_, handle, _)| handle)
    }

    fn lookup_or_create(
        &self,
        src: &Arc<ColorSpace>,
        dst: &Arc<ColorSpace>,
        intent: RenderingIntent,
        flags: ConversionFlags,
    ) -> Result<(TransformCacheKey, CachedTransform, u64)> {
        let key = TransformCacheKey::new(src, dst, intent, flags);

        let mut entries = self.entries.lock();
        let generation = self.generation.load(Ordering::Acquire);

        if let Some(bucket) = entries.get(&key) {
            let (src_id, dst_id) = (src.instance_id(), dst.instance_id());
            // Value-equal instances convert identically, so an idle entry
            // is re-pointed instead of rebuilt. Entries with live handles
            // keep their binding.
            let found = bucket
                .iter()
                .find(|entry| entry.transform().is_bound_to_pair(src_id, dst_id))
                .or_else(|| bucket.iter().find(|entry| entry.try_rebind(src, dst)));

            if let Some(entry) = found {
                self.stats.slow_path_hits.fetch_add(1, Ordering::Relaxed);
                trace!(%src, %dst, ?intent, "conversion cache hit");
                return Ok((key, CachedTransform::acquire(entry), generation));
            }
        }

        debug!(%src, %dst, ?intent, ?flags, "building color conversion transform");
        let transform = src
            .create_color_converter(dst, intent, flags)
            .inspect_err(|e| debug!(%src, %dst, error = %e, "color conversion transform failed"))?;

        let entry = Arc::new(CachedTransformEntry::new(transform));
        let handle = CachedTransform::acquire(&entry);
        entries.entry(key.clone()).or_default().push(entry);
        self.stats.constructions.fetch_add(1, Ordering::Relaxed);

        Ok((key, handle, generation))
    }

    /// Drop every transform bound to a color space that is about to die
    ///
    /// Must be called once by the color space right before it is destroyed.
    /// Also invalidates every worker's fast-path slot.
    ///
    /// A transform still in use at this point means some caller holds a
    /// handle across the destruction of its color space. That is a bug in
    /// the caller: it fails a debug assertion, and is logged in release
    /// builds. The purged entry stays alive for the offending handle.
    pub fn color_space_is_destroyed(&self, color_space: &ColorSpace) {
        let doomed = color_space.instance_id();

        let mut entries = self.entries.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.stats.invalidations.fetch_add(1, Ordering::Relaxed);

        let mut purged = 0u64;
        entries.retain(|_, bucket| {
            bucket.retain(|entry| {
                if !entry.transform().is_bound_to(doomed) {
                    return true;
                }

                let live_uses = entry.live_uses();
                if live_uses != 0 {
                    error!(
                        %color_space,
                        live_uses,
                        "color space destroyed while a conversion transform bound to it is in use"
                    );
                }
                debug_assert_eq!(
                    live_uses, 0,
                    "conversion transform bound to {color_space} is still in use"
                );

                purged += 1;
                false
            });
            !bucket.is_empty()
        });

        if purged > 0 {
            self.stats.purged.fetch_add(purged, Ordering::Relaxed);
            debug!(%color_space, purged, "purged conversion transforms");
        }
    }

    /// Number of cached transforms
    pub fn len(&self) -> usize {
        self.entries.lock().values().map(Vec::len).sum()
    }

    /// Whether the cache holds no transforms
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a transform is cached for the request, whatever instances
    /// it is currently bound to
    pub fn contains(
        &self,
        src: &ColorSpace,
        dst: &ColorSpace,
        intent: RenderingIntent,
        flags: ConversionFlags,
    ) -> bool {
        let key = TransformCacheKey::new(src, dst, intent, flags);
        self.entries.lock().contains_key(&key)
    }

    /// Current invalidation generation
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Counter snapshot
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            slow_path_hits: self.stats.slow_path_hits.load(Ordering::Relaxed),
            constructions: self.stats.constructions.load(Ordering::Relaxed),
            purged: self.stats.purged.load(Ordering::Relaxed),
            invalidations: self.stats.invalidations.load(Ordering::Relaxed),
        }
    }
}

impl Default for ConversionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConversionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionCache")
            .field("id", &self.id)
            .field("len", &self.len())
            .field("generation", &self.generation())
            .finish()
    }
}

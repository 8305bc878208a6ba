//! Cached transform entries and the handles that reference them

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::Result;
use crate::color_space::ColorSpace;
use crate::transform::ConversionTransform;

/// Set in `live_uses` while the cache re-points an idle entry
const REBINDING: usize = 1 << (usize::BITS - 1);

/// One cached transform plus the number of live handles pointing at it
pub(crate) struct CachedTransformEntry {
    transform: ConversionTransform,
    live_uses: AtomicUsize,
}

impl CachedTransformEntry {
    pub(crate) fn new(transform: ConversionTransform) -> Self {
        Self {
            transform,
            live_uses: AtomicUsize::new(0),
        }
    }

    pub(crate) fn transform(&self) -> &ConversionTransform {
        &self.transform
    }

    pub(crate) fn live_uses(&self) -> usize {
        self.live_uses.load(Ordering::Acquire) & !REBINDING
    }

    /// Re-point the transform at value-equal color spaces
    ///
    /// Only succeeds while no handle is alive, so a handle always reports
    /// the instances it was acquired for. Must be called with the cache
    /// lock held.
    pub(crate) fn try_rebind(&self, src: &Arc<ColorSpace>, dst: &Arc<ColorSpace>) -> bool {
        if self
            .live_uses
            .compare_exchange(0, REBINDING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.transform.rebind(src, dst);
        self.live_uses.store(0, Ordering::Release);
        true
    }
}

/// Handle to a cached conversion transform
///
/// Every handle counts as one live use of its transform. Hold it for the
/// duration of a pixel-processing loop and drop it afterwards; a color
/// space must not be destroyed while a handle bound to it is alive.
pub struct CachedTransform {
    entry: Arc<CachedTransformEntry>,
}

impl CachedTransform {
    pub(crate) fn acquire(entry: &Arc<CachedTransformEntry>) -> Self {
        entry.live_uses.fetch_add(1, Ordering::AcqRel);
        Self {
            entry: Arc::clone(entry),
        }
    }

    /// Acquire without the cache lock; fails while the entry is being
    /// re-pointed
    pub(crate) fn try_acquire(entry: &Arc<CachedTransformEntry>) -> Option<Self> {
        let mut current = entry.live_uses.load(Ordering::Acquire);
        loop {
            if current & REBINDING != 0 {
                return None;
            }
            match entry.live_uses.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(Self {
                        entry: Arc::clone(entry),
                    });
                }
                Err(actual) => current = actual,
            }
        }
    }

    pub(crate) fn entry(&self) -> &Arc<CachedTransformEntry> {
        &self.entry
    }

    /// The underlying transform
    pub fn transformation(&self) -> &ConversionTransform {
        self.entry.transform()
    }

    /// Number of live handles on this transform, this one included
    pub fn live_uses(&self) -> usize {
        self.entry.live_uses()
    }

    /// Whether both handles point at the same cached transform
    pub fn shares_transform_with(&self, other: &CachedTransform) -> bool {
        Arc::ptr_eq(&self.entry, &other.entry)
    }

    /// Transform 8-bit pixel data
    pub fn transform(&self, src: &[u8], dst: &mut [u8]) -> Result<()> {
        self.transformation().transform(src, dst)
    }

    /// Transform 16-bit pixel data
    pub fn transform_u16(&self, src: &[u16], dst: &mut [u16]) -> Result<()> {
        self.transformation().transform_u16(src, dst)
    }

    /// Transform 32-bit floating point pixel data
    pub fn transform_f32(&self, src: &[f32], dst: &mut [f32]) -> Result<()> {
        self.transformation().transform_f32(src, dst)
    }
}

impl Clone for CachedTransform {
    fn clone(&self) -> Self {
        Self::acquire(&self.entry)
    }
}

impl Drop for CachedTransform {
    fn drop(&mut self) {
        let previous = self.entry.live_uses.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "cached transform released more often than acquired");
    }
}

impl fmt::Debug for CachedTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedTransform")
            .field("transform", self.transformation())
            .field("live_uses", &self.live_uses())
            .finish()
    }
}

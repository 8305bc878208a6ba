//! Cache keys

use crate::color_space::{ColorSpace, ColorSpaceDescriptor};
use crate::transform::{ConversionFlags, RenderingIntent};

/// Key of the conversion cache
///
/// Equality and hashing go through the color spaces' descriptors, so a
/// value-equal but distinct color space instance finds the same entry.
/// Instance identity is tracked by the cached transform, not the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransformCacheKey {
    src: ColorSpaceDescriptor,
    dst: ColorSpaceDescriptor,
    intent: RenderingIntent,
    flags: ConversionFlags,
}

impl TransformCacheKey {
    /// Build a key for a conversion request
    pub fn new(
        src: &ColorSpace,
        dst: &ColorSpace,
        intent: RenderingIntent,
        flags: ConversionFlags,
    ) -> Self {
        Self {
            src: src.descriptor().clone(),
            dst: dst.descriptor().clone(),
            intent,
            flags,
        }
    }

    /// Compare against a request without building a key
    pub(crate) fn matches(
        &self,
        src: &ColorSpace,
        dst: &ColorSpace,
        intent: RenderingIntent,
        flags: ConversionFlags,
    ) -> bool {
        self.intent == intent
            && self.flags == flags
            && self.src == *src.descriptor()
            && self.dst == *dst.descriptor()
    }

    /// Source color space descriptor
    pub fn src(&self) -> &ColorSpaceDescriptor {
        &self.src
    }

    /// Destination color space descriptor
    pub fn dst(&self) -> &ColorSpaceDescriptor {
        &self.dst
    }

    /// Rendering intent
    pub fn intent(&self) -> RenderingIntent {
        self.intent
    }

    /// Conversion flags
    pub fn flags(&self) -> ConversionFlags {
        self.flags
    }
}

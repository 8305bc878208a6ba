//! Color spaces
//!
//! A [`ColorSpace`] pairs a pixel layout and channel depth with a profile.
//! Color spaces are compared two ways:
//!
//! - by value, through their [`ColorSpaceDescriptor`]: two instances built
//!   from the same layout, depth and profile are interchangeable for
//!   conversion purposes and share cache entries;
//! - by identity, through their [`InstanceId`]: the cache uses it to find
//!   the transforms that must go away when one particular instance dies.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::cache::ConversionCache;
use crate::profile::ColorProfile;
use crate::transform::{ChannelDepth, ConversionFlags, ConversionTransform, Layout, RenderingIntent};
use crate::Result;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a color space instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    fn next() -> Self {
        Self(NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric id
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Value identity of a color space
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColorSpaceDescriptor {
    /// Channel layout
    pub layout: Layout,
    /// Channel depth
    pub depth: ChannelDepth,
    /// Profile name
    pub profile_name: String,
    /// Profile content fingerprint
    pub profile_fingerprint: u64,
}

/// A color space: layout, depth and profile
///
/// Always handled through `Arc<ColorSpace>`. Transforms and the conversion
/// cache only keep weak references, so dropping the last `Arc` really
/// destroys the color space.
pub struct ColorSpace {
    instance: InstanceId,
    descriptor: ColorSpaceDescriptor,
    profile: ColorProfile,
    cache: Option<Weak<ConversionCache>>,
}

impl ColorSpace {
    /// Create a color space that nobody is notified about on destruction
    ///
    /// Callers that put such a color space through a [`ConversionCache`]
    /// must call [`ConversionCache::color_space_is_destroyed`] themselves
    /// before dropping it.
    pub fn new(layout: Layout, depth: ChannelDepth, profile: ColorProfile) -> Arc<Self> {
        Arc::new(Self::build(layout, depth, profile, None))
    }

    /// Create a color space that invalidates its cache entries when dropped
    pub fn new_with_cache(
        layout: Layout,
        depth: ChannelDepth,
        profile: ColorProfile,
        cache: &Arc<ConversionCache>,
    ) -> Arc<Self> {
        Arc::new(Self::build(layout, depth, profile, Some(Arc::downgrade(cache))))
    }

    fn build(
        layout: Layout,
        depth: ChannelDepth,
        profile: ColorProfile,
        cache: Option<Weak<ConversionCache>>,
    ) -> Self {
        let descriptor = ColorSpaceDescriptor {
            layout,
            depth,
            profile_name: profile.name().to_owned(),
            profile_fingerprint: profile.fingerprint(),
        };
        Self {
            instance: InstanceId::next(),
            descriptor,
            profile,
            cache,
        }
    }

    /// Identity of this instance
    pub fn instance_id(&self) -> InstanceId {
        self.instance
    }

    /// Value identity of this color space
    pub fn descriptor(&self) -> &ColorSpaceDescriptor {
        &self.descriptor
    }

    /// Channel layout
    pub fn layout(&self) -> Layout {
        self.descriptor.layout
    }

    /// Channel depth
    pub fn depth(&self) -> ChannelDepth {
        self.descriptor.depth
    }

    /// Bytes per pixel
    pub fn pixel_size(&self) -> usize {
        self.layout().channels() * self.depth().bytes()
    }

    /// Profile
    pub fn profile(&self) -> &ColorProfile {
        &self.profile
    }

    /// Whether `other` is this very instance
    pub fn is_same_instance(&self, other: &ColorSpace) -> bool {
        self.instance == other.instance
    }

    /// Build a new, uncached conversion transform to `dst`
    ///
    /// This is the expensive constructor the conversion cache wraps.
    pub fn create_color_converter(
        self: &Arc<Self>,
        dst: &Arc<ColorSpace>,
        intent: RenderingIntent,
        flags: ConversionFlags,
    ) -> Result<ConversionTransform> {
        ConversionTransform::new(self, dst, intent, flags)
    }
}

impl PartialEq for ColorSpace {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor == other.descriptor
    }
}

impl Eq for ColorSpace {}

impl Hash for ColorSpace {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.descriptor.hash(state);
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}/{:?}/{}",
            self.descriptor.layout, self.descriptor.depth, self.descriptor.profile_name
        )
    }
}

impl fmt::Debug for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColorSpace")
            .field("instance", &self.instance)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

impl Drop for ColorSpace {
    fn drop(&mut self) {
        if let Some(cache) = self.cache.as_ref().and_then(Weak::upgrade) {
            cache.color_space_is_destroyed(self);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_distinct_instances_compare_equal() {
        let a = ColorSpace::new(Layout::Rgba, ChannelDepth::U8, ColorProfile::new_srgb());
        let b = ColorSpace::new(Layout::Rgba, ChannelDepth::U8, ColorProfile::new_srgb());

        assert_eq!(*a, *b);
        assert!(!a.is_same_instance(&b));
        assert_ne!(a.instance_id(), b.instance_id());

        let mut set = HashSet::new();
        set.insert(a.descriptor().clone());
        assert!(set.contains(b.descriptor()));
    }

    #[test]
    fn test_depth_and_profile_take_part_in_equality() {
        let a = ColorSpace::new(Layout::Rgba, ChannelDepth::U8, ColorProfile::new_srgb());
        let b = ColorSpace::new(Layout::Rgba, ChannelDepth::U16, ColorProfile::new_srgb());
        let c = ColorSpace::new(Layout::Rgba, ChannelDepth::U8, ColorProfile::new_display_p3());

        assert_ne!(*a, *b);
        assert_ne!(*a, *c);
    }

    #[test]
    fn test_pixel_size() {
        let cs = ColorSpace::new(Layout::Rgba, ChannelDepth::F32, ColorProfile::new_srgb());
        assert_eq!(cs.pixel_size(), 16);
    }

    #[test]
    fn test_display() {
        let cs = ColorSpace::new(Layout::Rgb, ChannelDepth::U16, ColorProfile::new_srgb());
        assert_eq!(cs.to_string(), "Rgb/U16/sRGB built-in");
    }
}

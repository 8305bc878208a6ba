//! Color conversion transforms
//!
//! A [`ConversionTransform`] is the expensive object the cache exists for:
//! it owns a prepared moxcms executor for one (source, destination, intent,
//! flags) combination. It also remembers which color space instances it is
//! currently bound to, so the cache can re-point it at value-equal instances
//! instead of rebuilding it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use moxcms::TransformExecutor;
use parking_lot::RwLock;

use crate::color_space::{ColorSpace, InstanceId};
use crate::{Error, Result};

/// Rendering intent for color transformations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderingIntent {
    /// Perceptual rendering intent - best for photographic images
    #[default]
    Perceptual,
    /// Relative colorimetric - preserves in-gamut colors, clips out-of-gamut
    RelativeColorimetric,
    /// Saturation - maintains saturation, may shift hue
    Saturation,
    /// Absolute colorimetric - preserves white point
    AbsoluteColorimetric,
}

impl From<RenderingIntent> for moxcms::RenderingIntent {
    fn from(intent: RenderingIntent) -> Self {
        match intent {
            RenderingIntent::Perceptual => moxcms::RenderingIntent::Perceptual,
            RenderingIntent::RelativeColorimetric => moxcms::RenderingIntent::RelativeColorimetric,
            RenderingIntent::Saturation => moxcms::RenderingIntent::Saturation,
            RenderingIntent::AbsoluteColorimetric => moxcms::RenderingIntent::AbsoluteColorimetric,
        }
    }
}

impl From<moxcms::RenderingIntent> for RenderingIntent {
    fn from(intent: moxcms::RenderingIntent) -> Self {
        match intent {
            moxcms::RenderingIntent::Perceptual => RenderingIntent::Perceptual,
            moxcms::RenderingIntent::RelativeColorimetric => RenderingIntent::RelativeColorimetric,
            moxcms::RenderingIntent::Saturation => RenderingIntent::Saturation,
            moxcms::RenderingIntent::AbsoluteColorimetric => RenderingIntent::AbsoluteColorimetric,
        }
    }
}

/// Channel layout of a color space's pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// RGB, 3 channels
    Rgb,
    /// RGBA, 4 channels (alpha preserved)
    Rgba,
    /// Grayscale, 1 channel
    Gray,
    /// Grayscale + Alpha, 2 channels
    GrayAlpha,
}

impl Layout {
    /// Get number of channels for this layout
    pub fn channels(&self) -> usize {
        match self {
            Layout::Rgb => 3,
            Layout::Rgba => 4,
            Layout::Gray => 1,
            Layout::GrayAlpha => 2,
        }
    }

    /// Check if layout has alpha channel
    pub fn has_alpha(&self) -> bool {
        matches!(self, Layout::Rgba | Layout::GrayAlpha)
    }
}

impl From<Layout> for moxcms::Layout {
    fn from(layout: Layout) -> Self {
        match layout {
            Layout::Rgb => moxcms::Layout::Rgb,
            Layout::Rgba => moxcms::Layout::Rgba,
            Layout::Gray => moxcms::Layout::Gray,
            Layout::GrayAlpha => moxcms::Layout::GrayAlpha,
        }
    }
}

/// Numeric type of every channel in a pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelDepth {
    /// 8-bit unsigned integer channels
    U8,
    /// 16-bit unsigned integer channels
    U16,
    /// 32-bit floating point channels
    F32,
}

impl ChannelDepth {
    /// Size of one channel in bytes
    pub fn bytes(&self) -> usize {
        match self {
            ChannelDepth::U8 => 1,
            ChannelDepth::U16 => 2,
            ChannelDepth::F32 => 4,
        }
    }
}

/// Flags that change how a conversion transform is built
///
/// Flags take part in cache-key equality, so two requests that differ only
/// in flags get separate transforms. The engine only honors
/// `no_optimization` and `high_quality`; the rest are carried in the key
/// and reported back, but do not change the pixels yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConversionFlags {
    /// Use black point compensation (not yet implemented)
    pub black_point_compensation: bool,
    /// Disable engine-side shortcuts (CICP transfer fast paths)
    pub no_optimization: bool,
    /// Prefer floating point precision over fixed-point speed
    pub high_quality: bool,
    /// Allow lower precision paths (not yet implemented)
    pub low_quality: bool,
    /// Do not snap white to white after conversion (not yet implemented)
    pub no_white_on_white_fixup: bool,
}

impl ConversionFlags {
    /// Create empty flags
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable black point compensation
    pub fn with_bpc(mut self) -> Self {
        self.black_point_compensation = true;
        self
    }

    /// Disable engine optimizations
    pub fn with_no_optimization(mut self) -> Self {
        self.no_optimization = true;
        self
    }

    /// Request the high quality path
    pub fn with_high_quality(mut self) -> Self {
        self.high_quality = true;
        self.low_quality = false;
        self
    }

    /// Request the low quality path
    pub fn with_low_quality(mut self) -> Self {
        self.low_quality = true;
        self.high_quality = false;
        self
    }

    /// Engine options for these flags
    pub(crate) fn transform_options(&self, intent: RenderingIntent) -> moxcms::TransformOptions {
        moxcms::TransformOptions {
            rendering_intent: intent.into(),
            allow_use_cicp_transfer: !self.no_optimization,
            prefer_fixed_point: !self.high_quality,
            ..Default::default()
        }
    }
}

enum Executor {
    U8(Arc<dyn TransformExecutor<u8> + Send + Sync>),
    U16(Arc<dyn TransformExecutor<u16> + Send + Sync>),
    F32(Arc<dyn TransformExecutor<f32> + Send + Sync>),
}

/// Non-owning link from a transform to one of its color spaces
struct BoundColorSpace {
    instance: AtomicU64,
    space: RwLock<Weak<ColorSpace>>,
}

impl BoundColorSpace {
    fn new(space: &Arc<ColorSpace>) -> Self {
        Self {
            instance: AtomicU64::new(space.instance_id().get()),
            space: RwLock::new(Arc::downgrade(space)),
        }
    }

    fn rebind(&self, space: &Arc<ColorSpace>) {
        *self.space.write() = Arc::downgrade(space);
        self.instance.store(space.instance_id().get(), Ordering::Release);
    }

    fn instance(&self) -> InstanceId {
        InstanceId::from_raw(self.instance.load(Ordering::Acquire))
    }

    fn upgrade(&self) -> Option<Arc<ColorSpace>> {
        self.space.read().upgrade()
    }
}

/// A prepared conversion between two color spaces
///
/// Transforms hold weak references to their color spaces: the color space
/// registry owns them, and a dying color space purges its transforms from
/// the cache before it goes away.
pub struct ConversionTransform {
    executor: Executor,
    src: BoundColorSpace,
    dst: BoundColorSpace,
    depth: ChannelDepth,
    intent: RenderingIntent,
    flags: ConversionFlags,
}

impl ConversionTransform {
    pub(crate) fn new(
        src: &Arc<ColorSpace>,
        dst: &Arc<ColorSpace>,
        intent: RenderingIntent,
        flags: ConversionFlags,
    ) -> Result<Self> {
        if src.depth() != dst.depth() {
            return Err(Error::UnsupportedConversion {
                src: src.to_string(),
                dst: dst.to_string(),
            });
        }

        let src_profile = src.profile().inner();
        let dst_profile = dst.profile().inner();
        let src_layout = src.layout().into();
        let dst_layout = dst.layout().into();
        let options = flags.transform_options(intent);

        let executor = match src.depth() {
            ChannelDepth::U8 => Executor::U8(
                src_profile
                    .create_transform_8bit(src_layout, dst_profile, dst_layout, options)
                    .map(Arc::<dyn TransformExecutor<u8> + Send + Sync>::from)
                    .map_err(|e| Error::Transform(format!("{:?}", e)))?,
            ),
            ChannelDepth::U16 => Executor::U16(
                src_profile
                    .create_transform_16bit(src_layout, dst_profile, dst_layout, options)
                    .map(Arc::<dyn TransformExecutor<u16> + Send + Sync>::from)
                    .map_err(|e| Error::Transform(format!("{:?}", e)))?,
            ),
            ChannelDepth::F32 => Executor::F32(
                src_profile
                    .create_transform_f32(src_layout, dst_profile, dst_layout, options)
                    .map(Arc::<dyn TransformExecutor<f32> + Send + Sync>::from)
                    .map_err(|e| Error::Transform(format!("{:?}", e)))?,
            ),
        };

        Ok(Self {
            executor,
            src: BoundColorSpace::new(src),
            dst: BoundColorSpace::new(dst),
            depth: src.depth(),
            intent,
            flags,
        })
    }

    /// Source color space this transform is currently bound to
    ///
    /// Returns `None` once that color space has been dropped.
    pub fn src_color_space(&self) -> Option<Arc<ColorSpace>> {
        self.src.upgrade()
    }

    /// Destination color space this transform is currently bound to
    pub fn dst_color_space(&self) -> Option<Arc<ColorSpace>> {
        self.dst.upgrade()
    }

    /// Instance id of the bound source color space
    pub fn src_instance(&self) -> InstanceId {
        self.src.instance()
    }

    /// Instance id of the bound destination color space
    pub fn dst_instance(&self) -> InstanceId {
        self.dst.instance()
    }

    /// Whether either end is bound to the given color space instance
    pub fn is_bound_to(&self, instance: InstanceId) -> bool {
        self.src_instance() == instance || self.dst_instance() == instance
    }

    pub(crate) fn is_bound_to_pair(&self, src: InstanceId, dst: InstanceId) -> bool {
        self.src_instance() == src && self.dst_instance() == dst
    }

    /// Must be called with the cache lock held.
    pub(crate) fn rebind(&self, src: &Arc<ColorSpace>, dst: &Arc<ColorSpace>) {
        self.src.rebind(src);
        self.dst.rebind(dst);
    }

    /// Channel depth on both ends
    pub fn depth(&self) -> ChannelDepth {
        self.depth
    }

    /// Rendering intent the transform was built with
    pub fn intent(&self) -> RenderingIntent {
        self.intent
    }

    /// Flags the transform was built with
    pub fn flags(&self) -> ConversionFlags {
        self.flags
    }

    /// Transform 8-bit pixel data
    pub fn transform(&self, src: &[u8], dst: &mut [u8]) -> Result<()> {
        match &self.executor {
            Executor::U8(t) => t
                .transform(src, dst)
                .map_err(|e| Error::Transform(format!("{:?}", e))),
            _ => Err(Error::Transform("Wrong bit depth for transform".into())),
        }
    }

    /// Transform 16-bit pixel data
    pub fn transform_u16(&self, src: &[u16], dst: &mut [u16]) -> Result<()> {
        match &self.executor {
            Executor::U16(t) => t
                .transform(src, dst)
                .map_err(|e| Error::Transform(format!("{:?}", e))),
            _ => Err(Error::Transform("Wrong bit depth for transform".into())),
        }
    }

    /// Transform 32-bit floating point pixel data
    pub fn transform_f32(&self, src: &[f32], dst: &mut [f32]) -> Result<()> {
        match &self.executor {
            Executor::F32(t) => t
                .transform(src, dst)
                .map_err(|e| Error::Transform(format!("{:?}", e))),
            _ => Err(Error::Transform("Wrong bit depth for transform".into())),
        }
    }
}

impl std::fmt::Debug for ConversionTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionTransform")
            .field("src_instance", &self.src_instance())
            .field("dst_instance", &self.dst_instance())
            .field("depth", &self.depth)
            .field("intent", &self.intent)
            .field("flags", &self.flags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ColorProfile;

    #[test]
    fn test_layout_channels() {
        assert_eq!(Layout::Rgb.channels(), 3);
        assert_eq!(Layout::Rgba.channels(), 4);
        assert_eq!(Layout::Gray.channels(), 1);
        assert_eq!(Layout::GrayAlpha.channels(), 2);
    }

    #[test]
    fn test_flags_builder() {
        let flags = ConversionFlags::new().with_bpc().with_low_quality();
        assert!(flags.black_point_compensation);
        assert!(flags.low_quality);
        assert!(!flags.high_quality);

        let flags = flags.with_high_quality();
        assert!(flags.high_quality);
        assert!(!flags.low_quality);
        assert_ne!(flags, ConversionFlags::default());
    }

    #[test]
    fn test_transform_identity() {
        let srgb = ColorSpace::new(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_srgb());
        let transform = ConversionTransform::new(
            &srgb,
            &srgb,
            RenderingIntent::Perceptual,
            ConversionFlags::default(),
        )
        .unwrap();

        let src = [255u8, 128, 64];
        let mut dst = [0u8; 3];
        transform.transform(&src, &mut dst).unwrap();

        // Identity transform should preserve values (with possible minor rounding)
        assert!((dst[0] as i32 - 255).abs() <= 1);
        assert!((dst[1] as i32 - 128).abs() <= 1);
        assert!((dst[2] as i32 - 64).abs() <= 1);
    }

    #[test]
    fn test_transform_srgb_to_p3() {
        let srgb = ColorSpace::new(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_srgb());
        let p3 = ColorSpace::new(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_display_p3());

        let transform = ConversionTransform::new(
            &srgb,
            &p3,
            RenderingIntent::Perceptual,
            ConversionFlags::default(),
        )
        .unwrap();

        // Transform pure red
        let src = [255u8, 0, 0];
        let mut dst = [0u8; 3];
        transform.transform(&src, &mut dst).unwrap();

        // sRGB red should become less saturated in P3
        assert!(dst[0] < 255);
        assert!(dst[1] > 0);
    }

    #[test]
    fn test_key_only_flags_keep_engine_output() {
        let srgb = ColorSpace::new(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_srgb());
        let p3 = ColorSpace::new(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_display_p3());
        let src = [255u8, 0, 0, 12, 200, 90, 0, 0, 0, 255, 255, 255];

        let convert = |flags: ConversionFlags| {
            let transform =
                ConversionTransform::new(&srgb, &p3, RenderingIntent::Perceptual, flags).unwrap();
            assert_eq!(transform.flags(), flags);
            let mut dst = [0u8; 12];
            transform.transform(&src, &mut dst).unwrap();
            dst
        };

        let plain = convert(ConversionFlags::default());
        let mut no_fixup = ConversionFlags::default();
        no_fixup.no_white_on_white_fixup = true;
        assert_eq!(convert(ConversionFlags::default().with_bpc()), plain);
        assert_eq!(convert(ConversionFlags::default().with_low_quality()), plain);
        assert_eq!(convert(no_fixup), plain);
    }

    #[test]
    fn test_wrong_depth_is_rejected() {
        let srgb = ColorSpace::new(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_srgb());
        let transform = ConversionTransform::new(
            &srgb,
            &srgb,
            RenderingIntent::Perceptual,
            ConversionFlags::default(),
        )
        .unwrap();

        let src = [0u16; 3];
        let mut dst = [0u16; 3];
        assert!(transform.transform_u16(&src, &mut dst).is_err());
    }

    #[test]
    fn test_mixed_depth_is_unsupported() {
        let a = ColorSpace::new(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_srgb());
        let b = ColorSpace::new(Layout::Rgb, ChannelDepth::U16, ColorProfile::new_srgb());
        let result = ConversionTransform::new(&a, &b, RenderingIntent::Perceptual, ConversionFlags::default());
        assert!(matches!(result, Err(Error::UnsupportedConversion { .. })));
    }

    #[test]
    fn test_rebind_reports_new_instances() {
        let a = ColorSpace::new(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_srgb());
        let b = ColorSpace::new(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_srgb());
        let transform =
            ConversionTransform::new(&a, &a, RenderingIntent::Perceptual, ConversionFlags::default())
                .unwrap();
        assert!(transform.is_bound_to(a.instance_id()));

        transform.rebind(&b, &b);
        assert!(!transform.is_bound_to(a.instance_id()));
        assert!(transform.is_bound_to_pair(b.instance_id(), b.instance_id()));
        assert!(Arc::ptr_eq(&transform.src_color_space().unwrap(), &b));
    }
}

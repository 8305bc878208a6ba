//! Pixel layouts and channel arithmetic
//!
//! Composite kernels work on four-channel pixels with alpha in the last
//! position. The per-depth arithmetic lives in [`Channel`]: integer depths
//! use fixed-point multiply/divide/lerp with rounding, `f32` uses plain
//! float math.

use std::fmt;

use bytemuck::Pod;

use crate::color_space::ColorSpace;
use crate::error::{Error, Result};
use crate::transform::{ChannelDepth, Layout};

/// One channel value with its blending arithmetic
pub trait Channel: Pod + PartialOrd + fmt::Debug + Send + Sync + 'static {
    /// Fully transparent / black
    const ZERO: Self;
    /// Fully opaque / white
    const UNIT: Self;

    /// `a * b` normalized to the unit range
    fn mul(a: Self, b: Self) -> Self;

    /// `a / b` normalized to the unit range; zero when `b` is zero
    fn div(a: Self, b: Self) -> Self;

    /// `a + (b - a) * t`
    fn lerp(a: Self, b: Self, t: Self) -> Self;

    /// `a + b`, saturating at the unit value for integer depths
    fn add(a: Self, b: Self) -> Self;

    /// `UNIT - a`
    fn inv(a: Self) -> Self;

    /// `a + b - a * b`
    fn union_shape(a: Self, b: Self) -> Self;

    /// Convert a 0..1 parameter such as opacity
    fn from_unit_f32(value: f32) -> Self;

    /// Convert an 8-bit mask value
    fn from_mask(value: u8) -> Self;

    fn to_unit_f32(self) -> f32;
}

impl Channel for u8 {
    const ZERO: Self = 0;
    const UNIT: Self = u8::MAX;

    #[inline(always)]
    fn mul(a: Self, b: Self) -> Self {
        let t = u32::from(a) * u32::from(b) + 0x80;
        (((t >> 8) + t) >> 8) as u8
    }

    #[inline(always)]
    fn div(a: Self, b: Self) -> Self {
        if b == 0 {
            return 0;
        }
        let b = u32::from(b);
        ((u32::from(a) * 255 + b / 2) / b).min(255) as u8
    }

    #[inline(always)]
    fn lerp(a: Self, b: Self, t: Self) -> Self {
        let c = (i32::from(b) - i32::from(a)) * i32::from(t) + 0x80;
        (i32::from(a) + ((c + (c >> 8)) >> 8)).clamp(0, 255) as u8
    }

    #[inline(always)]
    fn add(a: Self, b: Self) -> Self {
        a.saturating_add(b)
    }

    #[inline(always)]
    fn inv(a: Self) -> Self {
        u8::MAX - a
    }

    #[inline(always)]
    fn union_shape(a: Self, b: Self) -> Self {
        (u32::from(a) + u32::from(b) - u32::from(Self::mul(a, b))).min(255) as u8
    }

    #[inline(always)]
    fn from_unit_f32(value: f32) -> Self {
        (value.clamp(0.0, 1.0) * 255.0).round() as u8
    }

    #[inline(always)]
    fn from_mask(value: u8) -> Self {
        value
    }

    #[inline(always)]
    fn to_unit_f32(self) -> f32 {
        f32::from(self) / 255.0
    }
}

impl Channel for u16 {
    const ZERO: Self = 0;
    const UNIT: Self = u16::MAX;

    #[inline(always)]
    fn mul(a: Self, b: Self) -> Self {
        let t = u64::from(a) * u64::from(b) + 0x8000;
        (((t >> 16) + t) >> 16) as u16
    }

    #[inline(always)]
    fn div(a: Self, b: Self) -> Self {
        if b == 0 {
            return 0;
        }
        let b = u64::from(b);
        ((u64::from(a) * 65535 + b / 2) / b).min(65535) as u16
    }

    #[inline(always)]
    fn lerp(a: Self, b: Self, t: Self) -> Self {
        let c = (i64::from(b) - i64::from(a)) * i64::from(t) + 0x8000;
        (i64::from(a) + ((c + (c >> 16)) >> 16)).clamp(0, 65535) as u16
    }

    #[inline(always)]
    fn add(a: Self, b: Self) -> Self {
        a.saturating_add(b)
    }

    #[inline(always)]
    fn inv(a: Self) -> Self {
        u16::MAX - a
    }

    #[inline(always)]
    fn union_shape(a: Self, b: Self) -> Self {
        (u32::from(a) + u32::from(b) - u32::from(Self::mul(a, b))).min(65535) as u16
    }

    #[inline(always)]
    fn from_unit_f32(value: f32) -> Self {
        (value.clamp(0.0, 1.0) * 65535.0).round() as u16
    }

    #[inline(always)]
    fn from_mask(value: u8) -> Self {
        u16::from(value) * 257
    }

    #[inline(always)]
    fn to_unit_f32(self) -> f32 {
        f32::from(self) / 65535.0
    }
}

impl Channel for f32 {
    const ZERO: Self = 0.0;
    const UNIT: Self = 1.0;

    #[inline(always)]
    fn mul(a: Self, b: Self) -> Self {
        a * b
    }

    #[inline(always)]
    fn div(a: Self, b: Self) -> Self {
        if b == 0.0 { 0.0 } else { a / b }
    }

    #[inline(always)]
    fn lerp(a: Self, b: Self, t: Self) -> Self {
        a + (b - a) * t
    }

    #[inline(always)]
    fn add(a: Self, b: Self) -> Self {
        a + b
    }

    #[inline(always)]
    fn inv(a: Self) -> Self {
        1.0 - a
    }

    #[inline(always)]
    fn union_shape(a: Self, b: Self) -> Self {
        a + b - a * b
    }

    #[inline(always)]
    fn from_unit_f32(value: f32) -> Self {
        value.clamp(0.0, 1.0)
    }

    #[inline(always)]
    fn from_mask(value: u8) -> Self {
        f32::from(value) / 255.0
    }

    #[inline(always)]
    fn to_unit_f32(self) -> f32 {
        self
    }
}

/// Memory layout of the pixels a kernel processes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    /// 8-bit BGRA, 32 bits per pixel
    Bgra8,
    /// 16-bit BGRA, 64 bits per pixel
    Bgra16,
    /// 32-bit float RGBA, 128 bits per pixel
    RgbaF32,
}

impl PixelLayout {
    /// Bytes per pixel
    pub fn pixel_size(&self) -> usize {
        match self {
            Self::Bgra8 => 4,
            Self::Bgra16 => 8,
            Self::RgbaF32 => 16,
        }
    }

    pub fn bits_per_pixel(&self) -> usize {
        self.pixel_size() * 8
    }

    pub fn depth(&self) -> ChannelDepth {
        match self {
            Self::Bgra8 => ChannelDepth::U8,
            Self::Bgra16 => ChannelDepth::U16,
            Self::RgbaF32 => ChannelDepth::F32,
        }
    }

    /// Kernel layout matching a four-channel color space
    pub fn for_color_space(color_space: &ColorSpace) -> Result<Self> {
        if color_space.layout() != Layout::Rgba {
            return Err(Error::UnsupportedLayout(format!(
                "composite kernels need four channels with alpha, got {color_space}"
            )));
        }
        Ok(match color_space.depth() {
            ChannelDepth::U8 => Self::Bgra8,
            ChannelDepth::U16 => Self::Bgra16,
            ChannelDepth::F32 => Self::RgbaF32,
        })
    }
}

/// Compile-time description of a pixel layout
pub trait PixelTraits: Send + Sync + 'static {
    type Channel: Channel;

    const LAYOUT: PixelLayout;
    const CHANNELS: usize = 4;
    const ALPHA_POS: usize = 3;
    const PIXEL_SIZE: usize = 4 * std::mem::size_of::<Self::Channel>();
}

/// 8-bit BGRA
pub struct BgrU8Traits;

impl PixelTraits for BgrU8Traits {
    type Channel = u8;
    const LAYOUT: PixelLayout = PixelLayout::Bgra8;
}

/// 16-bit BGRA
pub struct BgrU16Traits;

impl PixelTraits for BgrU16Traits {
    type Channel = u16;
    const LAYOUT: PixelLayout = PixelLayout::Bgra16;
}

/// 32-bit float RGBA
pub struct RgbF32Traits;

impl PixelTraits for RgbF32Traits {
    type Channel = f32;
    const LAYOUT: PixelLayout = PixelLayout::RgbaF32;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ColorProfile;

    #[test]
    fn test_u8_mul_identities() {
        for v in 0..=255u8 {
            assert_eq!(u8::mul(v, 255), v);
            assert_eq!(u8::mul(v, 0), 0);
        }
        assert_eq!(u8::mul(128, 128), 64);
    }

    #[test]
    fn test_u8_lerp_endpoints() {
        for a in [0u8, 17, 128, 255] {
            for b in [0u8, 99, 255] {
                assert_eq!(u8::lerp(a, b, 0), a);
                assert_eq!(u8::lerp(a, b, 255), b);
            }
        }
    }

    #[test]
    fn test_u8_div() {
        assert_eq!(u8::div(128, 255), 128);
        assert_eq!(u8::div(255, 255), 255);
        assert_eq!(u8::div(200, 100), 255);
        assert_eq!(u8::div(10, 0), 0);
    }

    #[test]
    fn test_u16_matches_u8_at_extremes() {
        assert_eq!(u16::mul(65535, 65535), 65535);
        assert_eq!(u16::mul(1234, 65535), 1234);
        assert_eq!(u16::lerp(0, 65535, 65535), 65535);
        assert_eq!(u16::lerp(65535, 0, 65535), 0);
        assert_eq!(u16::from_mask(255), 65535);
    }

    #[test]
    fn test_union_shape() {
        assert_eq!(u8::union_shape(0, 0), 0);
        assert_eq!(u8::union_shape(255, 10), 255);
        assert_eq!(u8::union_shape(0, 77), 77);
        assert!((f32::union_shape(0.5, 0.5) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_layout_sizes() {
        assert_eq!(PixelLayout::Bgra8.bits_per_pixel(), 32);
        assert_eq!(PixelLayout::Bgra16.bits_per_pixel(), 64);
        assert_eq!(PixelLayout::RgbaF32.bits_per_pixel(), 128);
        assert_eq!(BgrU16Traits::PIXEL_SIZE, PixelLayout::Bgra16.pixel_size());
        assert_eq!(RgbF32Traits::PIXEL_SIZE, 16);
    }

    #[test]
    fn test_for_color_space() {
        let rgba16 = ColorSpace::new(Layout::Rgba, ChannelDepth::U16, ColorProfile::new_srgb());
        assert_eq!(PixelLayout::for_color_space(&rgba16).unwrap(), PixelLayout::Bgra16);

        let rgb8 = ColorSpace::new(Layout::Rgb, ChannelDepth::U8, ColorProfile::new_srgb());
        assert!(matches!(
            PixelLayout::for_color_space(&rgb8),
            Err(Error::UnsupportedLayout(_))
        ));
    }
}

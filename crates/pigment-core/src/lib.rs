//! # pigment - color conversion caching and pixel kernels
//!
//! Building blocks for a paint engine's pixel pipeline.
//!
//! ## Goals
//!
//! - **Cheap conversions**: transforms are built once and shared through a
//!   [`ConversionCache`] with a lock-free per-worker fast path
//! - **Safe invalidation**: destroying a color space purges every cached
//!   transform still bound to it
//! - **Fast kernels**: composite ops and 8/16-bit scalers compiled for
//!   AVX2, SSE4.1 and NEON, selected once per factory at runtime
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use pigment_core::{
//!     ChannelDepth, ColorProfile, ColorSpace, CompositeOpFactory, CompositeOpId,
//!     CompositeParams, ConversionCache, ConversionFlags, Layout, PixelLayout, RenderingIntent,
//! };
//!
//! let cache = Arc::new(ConversionCache::new());
//! let srgb = ColorSpace::new_with_cache(Layout::Rgba, ChannelDepth::U8, ColorProfile::new_srgb(), &cache);
//! let p3 = ColorSpace::new_with_cache(Layout::Rgba, ChannelDepth::U8, ColorProfile::new_display_p3(), &cache);
//!
//! // Convert a pixel through the cache
//! let mut slot = cache.fast_path_slot();
//! let converter = cache
//!     .cached_converter(&mut slot, &srgb, &p3, RenderingIntent::Perceptual, ConversionFlags::default())
//!     .unwrap();
//! let src = [255u8, 128, 64, 255];
//! let mut converted = [0u8; 4];
//! converter.transform(&src, &mut converted).unwrap();
//!
//! // Blend it onto a canvas pixel
//! let op = CompositeOpFactory::new().create(CompositeOpId::Over, PixelLayout::Bgra8);
//! let mut canvas = [0u8, 0, 0, 255];
//! op.composite(CompositeParams::new(&mut canvas, 4, &converted, 4, 1, 1).with_opacity(0.5))
//!     .unwrap();
//! ```

pub mod cache;
pub mod color_space;
pub mod composite;
pub mod error;
pub mod pixel;
pub mod profile;
pub mod scaler;
pub mod simd;
pub mod transform;

pub use cache::{CacheStats, CachedTransform, ConversionCache, FastPathSlot, TransformCacheKey};
pub use color_space::{ColorSpace, ColorSpaceDescriptor, InstanceId};
pub use composite::{CompositeOp, CompositeOpFactory, CompositeOpId, CompositeParams};
pub use error::{Error, Result};
pub use pixel::{Channel, PixelLayout, PixelTraits};
pub use profile::ColorProfile;
pub use scaler::{PixelScaler, PixelScalerFactory};
pub use simd::{DispatchOptions, InstructionSet};
pub use transform::{ChannelDepth, ConversionFlags, ConversionTransform, Layout, RenderingIntent};

/// Version of pigment
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

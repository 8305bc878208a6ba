//! Composite operations
//!
//! A composite op blends a source pixel rectangle onto a destination
//! rectangle of the same layout, optionally through an 8-bit mask. Ops are
//! obtained from a [`CompositeOpFactory`], which picks the best kernel for
//! the running CPU once and hands out boxed [`CompositeOp`] trait objects.
//!
//! # Example
//!
//! ```
//! use pigment_core::{CompositeOpFactory, CompositeOpId, CompositeParams, PixelLayout};
//!
//! let factory = CompositeOpFactory::new();
//! let op = factory.create(CompositeOpId::Over, PixelLayout::Bgra8);
//!
//! let src = [10u8, 20, 30, 255];
//! let mut dst = [0u8; 4];
//! op.composite(CompositeParams::new(&mut dst, 4, &src, 4, 1, 1)).unwrap();
//! assert_eq!(dst, src);
//! ```

mod factory;
pub(crate) mod formulas;
pub(crate) mod kernel;

pub use factory::CompositeOpFactory;

use crate::error::{Error, Result};
use crate::pixel::PixelLayout;
use crate::simd::InstructionSet;

/// Blend mode of a composite op
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeOpId {
    /// Source-over alpha compositing
    Over,
    /// Replace the destination, blended by opacity
    Copy,
    /// Alpha darken with flow applied to opacity
    AlphaDarkenHard,
    /// Alpha darken with flow applied to the result only
    AlphaDarkenCreamy,
}

impl CompositeOpId {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Over => "normal",
            Self::Copy => "copy",
            Self::AlphaDarkenHard => "alphadarken-hard",
            Self::AlphaDarkenCreamy => "alphadarken-creamy",
        }
    }

    /// All blend modes the factory can build
    pub const ALL: [CompositeOpId; 4] = [
        Self::Over,
        Self::Copy,
        Self::AlphaDarkenHard,
        Self::AlphaDarkenCreamy,
    ];
}

/// Buffers and blending parameters for one composite call
///
/// Strides are in bytes. A source stride of zero repeats the first source
/// pixel over the whole rectangle.
#[derive(Debug)]
pub struct CompositeParams<'a> {
    pub dst: &'a mut [u8],
    pub dst_row_stride: usize,
    pub src: &'a [u8],
    pub src_row_stride: usize,
    pub mask: Option<&'a [u8]>,
    pub mask_row_stride: usize,
    pub rows: usize,
    pub cols: usize,
    /// 0.0 to 1.0
    pub opacity: f32,
    /// 0.0 to 1.0, only used by alpha darken
    pub flow: f32,
    /// 0.0 to 1.0, only used by alpha darken
    pub average_opacity: f32,
}

impl<'a> CompositeParams<'a> {
    /// Fully opaque, unmasked parameters
    pub fn new(
        dst: &'a mut [u8],
        dst_row_stride: usize,
        src: &'a [u8],
        src_row_stride: usize,
        rows: usize,
        cols: usize,
    ) -> Self {
        Self {
            dst,
            dst_row_stride,
            src,
            src_row_stride,
            mask: None,
            mask_row_stride: 0,
            rows,
            cols,
            opacity: 1.0,
            flow: 1.0,
            average_opacity: 1.0,
        }
    }

    /// Blend through an 8-bit mask, one byte per pixel
    pub fn with_mask(mut self, mask: &'a [u8], mask_row_stride: usize) -> Self {
        self.mask = Some(mask);
        self.mask_row_stride = mask_row_stride;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_flow(mut self, flow: f32) -> Self {
        self.flow = flow;
        self
    }

    pub fn with_average_opacity(mut self, average_opacity: f32) -> Self {
        self.average_opacity = average_opacity;
        self
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Check that every buffer covers the rectangle
    pub(crate) fn validate(&self, pixel_size: usize) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let row_bytes = self.cols.checked_mul(pixel_size);

        check_len(self.dst.len(), required(self.rows, self.dst_row_stride, row_bytes))?;
        let src_needed = if self.src_row_stride == 0 {
            Some(pixel_size)
        } else {
            required(self.rows, self.src_row_stride, row_bytes)
        };
        check_len(self.src.len(), src_needed)?;
        if let Some(mask) = self.mask {
            check_len(mask.len(), required(self.rows, self.mask_row_stride, Some(self.cols)))?;
        }
        Ok(())
    }
}

/// Bytes spanned by `rows` rows, or `None` if that overflows
pub(crate) fn required(rows: usize, row_stride: usize, row_bytes: Option<usize>) -> Option<usize> {
    rows.checked_sub(1)?
        .checked_mul(row_stride)?
        .checked_add(row_bytes?)
}

/// An overflowing requirement is reported as `usize::MAX` bytes
pub(crate) fn check_len(actual: usize, expected: Option<usize>) -> Result<()> {
    match expected {
        Some(expected) if actual >= expected => Ok(()),
        expected => Err(Error::BufferSize {
            expected: expected.unwrap_or(usize::MAX),
            actual,
        }),
    }
}

/// A blend kernel for one pixel layout
pub trait CompositeOp: Send + Sync {
    fn id(&self) -> CompositeOpId;

    fn layout(&self) -> PixelLayout;

    /// Instruction set the kernel was compiled for
    fn instruction_set(&self) -> InstructionSet;

    /// Blend `params.src` onto `params.dst`
    fn composite(&self, params: CompositeParams<'_>) -> Result<()>;
}

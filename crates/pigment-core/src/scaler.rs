//! 8-bit / 16-bit channel rescaling
//!
//! Widening multiplies by 257 so that 0 and 255 map exactly onto 0 and
//! 65535. Narrowing rounds back to the nearest 8-bit value, which makes
//! `narrow(widen(x)) == x` for every byte. 16-bit samples are stored in
//! native byte order.

use std::marker::PhantomData;

use tracing::debug;

use crate::composite::{check_len, required};
use crate::error::{Error, Result};
use crate::simd::arch::{Arch, Generic};
use crate::simd::{Candidate, DispatchOptions, InstructionSet, StrategyTable};

/// A validated run of rows to rescale
pub(crate) struct ScaleRows<'a> {
    pub src: &'a [u8],
    pub src_row_stride: usize,
    pub dst: &'a mut [u8],
    pub dst_row_stride: usize,
    pub rows: usize,
    /// Samples per row
    pub samples: usize,
}

#[inline(always)]
pub(crate) fn widen_rows(job: ScaleRows<'_>) {
    let ScaleRows {
        src,
        src_row_stride,
        dst,
        dst_row_stride,
        rows,
        samples,
    } = job;
    for row in 0..rows {
        let src_row = &src[row * src_row_stride..][..samples];
        let dst_row = &mut dst[row * dst_row_stride..][..samples * 2];
        for (s, d) in src_row.iter().zip(dst_row.chunks_exact_mut(2)) {
            d.copy_from_slice(&(u16::from(*s) * 257).to_ne_bytes());
        }
    }
}

#[inline(always)]
pub(crate) fn narrow_rows(job: ScaleRows<'_>) {
    let ScaleRows {
        src,
        src_row_stride,
        dst,
        dst_row_stride,
        rows,
        samples,
    } = job;
    for row in 0..rows {
        let src_row = &src[row * src_row_stride..][..samples * 2];
        let dst_row = &mut dst[row * dst_row_stride..][..samples];
        for (s, d) in src_row.chunks_exact(2).zip(dst_row.iter_mut()) {
            let v = u32::from(u16::from_ne_bytes([s[0], s[1]]));
            *d = ((v - (v >> 8) + 128) >> 8) as u8;
        }
    }
}

/// Rescales whole pixels between 8 and 16 bits per channel
///
/// Strides are in bytes.
pub trait PixelScaler: Send + Sync {
    fn channels_per_pixel(&self) -> usize;

    /// Instruction set the kernel was compiled for
    fn instruction_set(&self) -> InstructionSet;

    fn convert_u8_to_u16(
        &self,
        src: &[u8],
        src_row_stride: usize,
        dst: &mut [u8],
        dst_row_stride: usize,
        rows: usize,
        cols: usize,
    ) -> Result<()>;

    fn convert_u16_to_u8(
        &self,
        src: &[u8],
        src_row_stride: usize,
        dst: &mut [u8],
        dst_row_stride: usize,
        rows: usize,
        cols: usize,
    ) -> Result<()>;
}

struct OptimizedPixelScaler<A> {
    channels: usize,
    _arch: PhantomData<fn() -> A>,
}

impl<A: Arch> OptimizedPixelScaler<A> {
    fn boxed(channels: usize) -> Box<dyn PixelScaler> {
        Box::new(Self {
            channels,
            _arch: PhantomData,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn job<'a>(
        &self,
        src: &'a [u8],
        src_row_stride: usize,
        src_sample_size: usize,
        dst: &'a mut [u8],
        dst_row_stride: usize,
        dst_sample_size: usize,
        rows: usize,
        cols: usize,
    ) -> Result<Option<ScaleRows<'a>>> {
        if rows == 0 || cols == 0 {
            return Ok(None);
        }
        let samples = cols.checked_mul(self.channels).ok_or(Error::BufferSize {
            expected: usize::MAX,
            actual: src.len(),
        })?;
        check_len(
            src.len(),
            required(rows, src_row_stride, samples.checked_mul(src_sample_size)),
        )?;
        check_len(
            dst.len(),
            required(rows, dst_row_stride, samples.checked_mul(dst_sample_size)),
        )?;
        Ok(Some(ScaleRows {
            src,
            src_row_stride,
            dst,
            dst_row_stride,
            rows,
            samples,
        }))
    }
}

impl<A: Arch> PixelScaler for OptimizedPixelScaler<A> {
    fn channels_per_pixel(&self) -> usize {
        self.channels
    }

    fn instruction_set(&self) -> InstructionSet {
        A::ISA
    }

    fn convert_u8_to_u16(
        &self,
        src: &[u8],
        src_row_stride: usize,
        dst: &mut [u8],
        dst_row_stride: usize,
        rows: usize,
        cols: usize,
    ) -> Result<()> {
        if let Some(job) = self.job(src, src_row_stride, 1, dst, dst_row_stride, 2, rows, cols)? {
            A::widen(job);
        }
        Ok(())
    }

    fn convert_u16_to_u8(
        &self,
        src: &[u8],
        src_row_stride: usize,
        dst: &mut [u8],
        dst_row_stride: usize,
        rows: usize,
        cols: usize,
    ) -> Result<()> {
        if let Some(job) = self.job(src, src_row_stride, 2, dst, dst_row_stride, 1, rows, cols)? {
            A::narrow(job);
        }
        Ok(())
    }
}

type ScalerCtor = fn(usize) -> Box<dyn PixelScaler>;

fn strategy_table() -> StrategyTable<ScalerCtor> {
    let table = StrategyTable::new(OptimizedPixelScaler::<Generic>::boxed as ScalerCtor);

    #[cfg(target_arch = "x86_64")]
    let table = {
        use crate::simd::arch::{Avx2, Sse41};
        table
            .with(InstructionSet::Avx2, OptimizedPixelScaler::<Avx2>::boxed)
            .with(InstructionSet::Sse41, OptimizedPixelScaler::<Sse41>::boxed)
    };

    #[cfg(target_arch = "aarch64")]
    let table = table.with(
        InstructionSet::Neon,
        OptimizedPixelScaler::<crate::simd::arch::Neon>::boxed,
    );

    table
}

/// Hands out pixel scalers backed by the best kernel for this CPU
#[derive(Debug)]
pub struct PixelScalerFactory {
    selected: Candidate<ScalerCtor>,
}

impl PixelScalerFactory {
    pub fn new() -> Self {
        Self::with_options(&DispatchOptions::default())
    }

    pub fn with_options(options: &DispatchOptions) -> Self {
        let selected = strategy_table().select(options);
        debug!(isa = selected.isa.name(), "pixel scaler factory ready");
        Self { selected }
    }

    pub fn selected_instruction_set(&self) -> InstructionSet {
        self.selected.isa
    }

    /// Scaler for pixels of `channels_per_pixel` channels
    pub fn create(&self, channels_per_pixel: usize) -> Result<Box<dyn PixelScaler>> {
        if channels_per_pixel == 0 {
            return Err(Error::InvalidChannelCount(channels_per_pixel));
        }
        Ok((self.selected.create)(channels_per_pixel))
    }

    /// Scaler for four-channel pixels
    pub fn create_rgba_scaler(&self) -> Box<dyn PixelScaler> {
        (self.selected.create)(4)
    }
}

impl Default for PixelScalerFactory {
    fn default() -> Self {
        Self::new()
    }
}

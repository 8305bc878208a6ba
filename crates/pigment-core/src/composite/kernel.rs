//! Row loop shared by every composite op

use std::marker::PhantomData;

use super::formulas::CompositeFormula;
use super::{CompositeOp, CompositeOpId, CompositeParams};
use crate::error::Result;
use crate::pixel::{Channel, PixelLayout, PixelTraits};
use crate::simd::InstructionSet;
use crate::simd::arch::Arch;

/// Blend every pixel of a validated, non-empty rectangle
#[inline(always)]
pub(crate) fn composite_rows<T: PixelTraits, F: CompositeFormula<T::Channel>>(
    params: CompositeParams<'_>,
) {
    let pixel_size = T::PIXEL_SIZE;
    let blend = F::prepare(params.opacity, params.flow, params.average_opacity);
    let src_step = if params.src_row_stride == 0 { 0 } else { pixel_size };
    let row_bytes = params.cols * pixel_size;

    let CompositeParams {
        dst,
        dst_row_stride,
        src,
        src_row_stride,
        mask,
        mask_row_stride,
        rows,
        cols,
        ..
    } = params;

    for row in 0..rows {
        let dst_row = &mut dst[row * dst_row_stride..][..row_bytes];
        let src_row = &src[row * src_row_stride..];
        let mask_row = mask.map(|mask| &mask[row * mask_row_stride..][..cols]);

        for (col, dst_px) in dst_row.chunks_exact_mut(pixel_size).enumerate() {
            let offset = col * src_step;
            let src_value: [T::Channel; 4] =
                bytemuck::pod_read_unaligned(&src_row[offset..offset + pixel_size]);
            let dst_value: [T::Channel; 4] = bytemuck::pod_read_unaligned(dst_px);
            let mask_value = mask_row.map(|mask| T::Channel::from_mask(mask[col]));

            let out = F::compose(src_value, dst_value, mask_value, &blend);
            dst_px.copy_from_slice(bytemuck::bytes_of(&out));
        }
    }
}

/// Composite op for one layout, formula and instruction set
pub(crate) struct OptimizedCompositeOp<T, F, A> {
    _marker: PhantomData<fn() -> (T, F, A)>,
}

impl<T, F, A> OptimizedCompositeOp<T, F, A>
where
    T: PixelTraits,
    F: CompositeFormula<T::Channel>,
    A: Arch,
{
    pub(crate) fn boxed() -> Box<dyn CompositeOp> {
        Box::new(Self {
            _marker: PhantomData,
        })
    }
}

impl<T, F, A> CompositeOp for OptimizedCompositeOp<T, F, A>
where
    T: PixelTraits,
    F: CompositeFormula<T::Channel>,
    A: Arch,
{
    fn id(&self) -> CompositeOpId {
        F::ID
    }

    fn layout(&self) -> PixelLayout {
        T::LAYOUT
    }

    fn instruction_set(&self) -> InstructionSet {
        A::ISA
    }

    fn composite(&self, params: CompositeParams<'_>) -> Result<()> {
        params.validate(T::PIXEL_SIZE)?;
        if params.is_empty() {
            return Ok(());
        }
        A::composite::<T, F>(params);
        Ok(())
    }
}

//! Per-ISA entry points for the row kernels
//!
//! Each [`Arch`] implementation funnels the shared generic kernels through
//! a function compiled for its target features, letting the compiler
//! auto-vectorize the inner loops for that instruction set.

use super::InstructionSet;
use crate::composite::CompositeParams;
use crate::composite::formulas::CompositeFormula;
use crate::composite::kernel::composite_rows;
use crate::pixel::PixelTraits;
use crate::scaler::{ScaleRows, narrow_rows, widen_rows};

pub(crate) trait Arch: Send + Sync + 'static {
    const ISA: InstructionSet;

    fn composite<T: PixelTraits, F: CompositeFormula<T::Channel>>(params: CompositeParams<'_>);

    fn widen(job: ScaleRows<'_>);

    fn narrow(job: ScaleRows<'_>);
}

pub(crate) struct Generic;

impl Arch for Generic {
    const ISA: InstructionSet = InstructionSet::Generic;

    fn composite<T: PixelTraits, F: CompositeFormula<T::Channel>>(params: CompositeParams<'_>) {
        composite_rows::<T, F>(params)
    }

    fn widen(job: ScaleRows<'_>) {
        widen_rows(job)
    }

    fn narrow(job: ScaleRows<'_>) {
        narrow_rows(job)
    }
}

#[cfg(target_arch = "x86_64")]
pub(crate) use x86::{Avx2, Sse41};

#[cfg(target_arch = "x86_64")]
mod x86 {
    use super::*;

    pub(crate) struct Sse41;
    pub(crate) struct Avx2;

    #[target_feature(enable = "sse4.1")]
    unsafe fn composite_sse41<T: PixelTraits, F: CompositeFormula<T::Channel>>(
        params: CompositeParams<'_>,
    ) {
        composite_rows::<T, F>(params)
    }

    #[target_feature(enable = "sse4.1")]
    unsafe fn widen_sse41(job: ScaleRows<'_>) {
        widen_rows(job)
    }

    #[target_feature(enable = "sse4.1")]
    unsafe fn narrow_sse41(job: ScaleRows<'_>) {
        narrow_rows(job)
    }

    #[target_feature(enable = "avx2")]
    unsafe fn composite_avx2<T: PixelTraits, F: CompositeFormula<T::Channel>>(
        params: CompositeParams<'_>,
    ) {
        composite_rows::<T, F>(params)
    }

    #[target_feature(enable = "avx2")]
    unsafe fn widen_avx2(job: ScaleRows<'_>) {
        widen_rows(job)
    }

    #[target_feature(enable = "avx2")]
    unsafe fn narrow_avx2(job: ScaleRows<'_>) {
        narrow_rows(job)
    }

    // Kernels for these markers are only handed out by strategy tables
    // after `DispatchOptions::permits` confirmed the feature on the running
    // CPU.

    impl Arch for Sse41 {
        const ISA: InstructionSet = InstructionSet::Sse41;

        fn composite<T: PixelTraits, F: CompositeFormula<T::Channel>>(params: CompositeParams<'_>) {
            debug_assert!(Self::ISA.is_supported());
            // SAFETY: sse4.1 was detected before this marker was selected.
            unsafe { composite_sse41::<T, F>(params) }
        }

        fn widen(job: ScaleRows<'_>) {
            debug_assert!(Self::ISA.is_supported());
            // SAFETY: sse4.1 was detected before this marker was selected.
            unsafe { widen_sse41(job) }
        }

        fn narrow(job: ScaleRows<'_>) {
            debug_assert!(Self::ISA.is_supported());
            // SAFETY: sse4.1 was detected before this marker was selected.
            unsafe { narrow_sse41(job) }
        }
    }

    impl Arch for Avx2 {
        const ISA: InstructionSet = InstructionSet::Avx2;

        fn composite<T: PixelTraits, F: CompositeFormula<T::Channel>>(params: CompositeParams<'_>) {
            debug_assert!(Self::ISA.is_supported());
            // SAFETY: avx2 was detected before this marker was selected.
            unsafe { composite_avx2::<T, F>(params) }
        }

        fn widen(job: ScaleRows<'_>) {
            debug_assert!(Self::ISA.is_supported());
            // SAFETY: avx2 was detected before this marker was selected.
            unsafe { widen_avx2(job) }
        }

        fn narrow(job: ScaleRows<'_>) {
            debug_assert!(Self::ISA.is_supported());
            // SAFETY: avx2 was detected before this marker was selected.
            unsafe { narrow_avx2(job) }
        }
    }
}

/// NEON is part of the aarch64 baseline, so the generic kernels already
/// compile to it; the marker only records the selection.
#[cfg(target_arch = "aarch64")]
pub(crate) struct Neon;

#[cfg(target_arch = "aarch64")]
impl Arch for Neon {
    const ISA: InstructionSet = InstructionSet::Neon;

    fn composite<T: PixelTraits, F: CompositeFormula<T::Channel>>(params: CompositeParams<'_>) {
        composite_rows::<T, F>(params)
    }

    fn widen(job: ScaleRows<'_>) {
        widen_rows(job)
    }

    fn narrow(job: ScaleRows<'_>) {
        narrow_rows(job)
    }
}

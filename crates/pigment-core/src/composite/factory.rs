//! Composite op factory with per-CPU kernel selection

use tracing::debug;

use super::formulas::{AlphaDarkenFormula, CopyFormula, CreamyFlow, HardFlow, OverFormula};
use super::kernel::OptimizedCompositeOp;
use super::{CompositeOp, CompositeOpId};
use crate::color_space::ColorSpace;
use crate::error::{Error, Result};
use crate::pixel::{BgrU8Traits, BgrU16Traits, PixelLayout, PixelTraits, RgbF32Traits};
use crate::simd::arch::{Arch, Generic};
use crate::simd::{Candidate, DispatchOptions, InstructionSet, StrategyTable};

type CompositeCtor = fn(CompositeOpId) -> Box<dyn CompositeOp>;

fn instantiate<T: PixelTraits, A: Arch>(op: CompositeOpId) -> Box<dyn CompositeOp> {
    match op {
        CompositeOpId::Over => OptimizedCompositeOp::<T, OverFormula, A>::boxed(),
        CompositeOpId::Copy => OptimizedCompositeOp::<T, CopyFormula, A>::boxed(),
        CompositeOpId::AlphaDarkenHard => {
            OptimizedCompositeOp::<T, AlphaDarkenFormula<HardFlow>, A>::boxed()
        }
        CompositeOpId::AlphaDarkenCreamy => {
            OptimizedCompositeOp::<T, AlphaDarkenFormula<CreamyFlow>, A>::boxed()
        }
    }
}

fn strategy_table<T: PixelTraits>() -> StrategyTable<CompositeCtor> {
    let table = StrategyTable::new(instantiate::<T, Generic> as CompositeCtor);

    #[cfg(target_arch = "x86_64")]
    let table = {
        use crate::simd::arch::{Avx2, Sse41};
        table
            .with(InstructionSet::Avx2, instantiate::<T, Avx2>)
            .with(InstructionSet::Sse41, instantiate::<T, Sse41>)
    };

    #[cfg(target_arch = "aarch64")]
    let table = table.with(InstructionSet::Neon, instantiate::<T, crate::simd::arch::Neon>);

    table
}

/// Hands out composite ops backed by the best kernel for this CPU
///
/// The kernel for each pixel layout is chosen once, in the constructor;
/// every op created afterwards uses that choice.
#[derive(Debug)]
pub struct CompositeOpFactory {
    bgra8: Candidate<CompositeCtor>,
    bgra16: Candidate<CompositeCtor>,
    rgba_f32: Candidate<CompositeCtor>,
}

impl CompositeOpFactory {
    /// Select kernels for the running CPU
    pub fn new() -> Self {
        Self::with_options(&DispatchOptions::default())
    }

    /// Select kernels within the limits of `options`
    pub fn with_options(options: &DispatchOptions) -> Self {
        let factory = Self {
            bgra8: strategy_table::<BgrU8Traits>().select(options),
            bgra16: strategy_table::<BgrU16Traits>().select(options),
            rgba_f32: strategy_table::<RgbF32Traits>().select(options),
        };
        debug!(
            bgra8 = factory.bgra8.isa.name(),
            bgra16 = factory.bgra16.isa.name(),
            rgba_f32 = factory.rgba_f32.isa.name(),
            "composite op factory ready"
        );
        factory
    }

    fn candidate(&self, layout: PixelLayout) -> &Candidate<CompositeCtor> {
        match layout {
            PixelLayout::Bgra8 => &self.bgra8,
            PixelLayout::Bgra16 => &self.bgra16,
            PixelLayout::RgbaF32 => &self.rgba_f32,
        }
    }

    /// Instruction set backing ops of `layout`
    pub fn selected_instruction_set(&self, layout: PixelLayout) -> InstructionSet {
        self.candidate(layout).isa
    }

    /// Create an op for an explicit layout
    pub fn create(&self, op: CompositeOpId, layout: PixelLayout) -> Box<dyn CompositeOp> {
        (self.candidate(layout).create)(op)
    }

    /// Create an op for the pixels of `color_space`
    pub fn create_for(&self, op: CompositeOpId, color_space: &ColorSpace) -> Result<Box<dyn CompositeOp>> {
        Ok(self.create(op, PixelLayout::for_color_space(color_space)?))
    }

    fn create_checked(
        &self,
        op: CompositeOpId,
        layout: PixelLayout,
        color_space: &ColorSpace,
    ) -> Result<Box<dyn CompositeOp>> {
        let actual = PixelLayout::for_color_space(color_space)?;
        if actual != layout {
            return Err(Error::UnsupportedLayout(format!(
                "{} op needs {layout:?} pixels, {color_space} has {actual:?}",
                op.name()
            )));
        }
        Ok(self.create(op, layout))
    }

    pub fn create_over_op_32(&self, color_space: &ColorSpace) -> Result<Box<dyn CompositeOp>> {
        self.create_checked(CompositeOpId::Over, PixelLayout::Bgra8, color_space)
    }

    pub fn create_over_op_u64(&self, color_space: &ColorSpace) -> Result<Box<dyn CompositeOp>> {
        self.create_checked(CompositeOpId::Over, PixelLayout::Bgra16, color_space)
    }

    pub fn create_over_op_128(&self, color_space: &ColorSpace) -> Result<Box<dyn CompositeOp>> {
        self.create_checked(CompositeOpId::Over, PixelLayout::RgbaF32, color_space)
    }

    pub fn create_copy_op_32(&self, color_space: &ColorSpace) -> Result<Box<dyn CompositeOp>> {
        self.create_checked(CompositeOpId::Copy, PixelLayout::Bgra8, color_space)
    }

    pub fn create_copy_op_u64(&self, color_space: &ColorSpace) -> Result<Box<dyn CompositeOp>> {
        self.create_checked(CompositeOpId::Copy, PixelLayout::Bgra16, color_space)
    }

    pub fn create_copy_op_128(&self, color_space: &ColorSpace) -> Result<Box<dyn CompositeOp>> {
        self.create_checked(CompositeOpId::Copy, PixelLayout::RgbaF32, color_space)
    }

    pub fn create_alpha_darken_hard_op_32(&self, color_space: &ColorSpace) -> Result<Box<dyn CompositeOp>> {
        self.create_checked(CompositeOpId::AlphaDarkenHard, PixelLayout::Bgra8, color_space)
    }

    pub fn create_alpha_darken_hard_op_u64(&self, color_space: &ColorSpace) -> Result<Box<dyn CompositeOp>> {
        self.create_checked(CompositeOpId::AlphaDarkenHard, PixelLayout::Bgra16, color_space)
    }

    pub fn create_alpha_darken_hard_op_128(&self, color_space: &ColorSpace) -> Result<Box<dyn CompositeOp>> {
        self.create_checked(CompositeOpId::AlphaDarkenHard, PixelLayout::RgbaF32, color_space)
    }

    pub fn create_alpha_darken_creamy_op_32(&self, color_space: &ColorSpace) -> Result<Box<dyn CompositeOp>> {
        self.create_checked(CompositeOpId::AlphaDarkenCreamy, PixelLayout::Bgra8, color_space)
    }

    pub fn create_alpha_darken_creamy_op_u64(&self, color_space: &ColorSpace) -> Result<Box<dyn CompositeOp>> {
        self.create_checked(CompositeOpId::AlphaDarkenCreamy, PixelLayout::Bgra16, color_space)
    }

    pub fn create_alpha_darken_creamy_op_128(&self, color_space: &ColorSpace) -> Result<Box<dyn CompositeOp>> {
        self.create_checked(CompositeOpId::AlphaDarkenCreamy, PixelLayout::RgbaF32, color_space)
    }
}

impl Default for CompositeOpFactory {
    fn default() -> Self {
        Self::new()
    }
}

//! Kernel parity framework
//!
//! Runs the same composite case through two ops and measures how far their
//! outputs drift apart.

use std::fmt;

use pigment_core::{CompositeOp, CompositeParams, PixelLayout};
use thiserror::Error;

use crate::patterns::{TilePattern, decode, generate_mask, generate_tile};

/// Why a parity comparison could not run
#[derive(Error, Debug)]
pub enum ParityError {
    #[error("ops disagree on blend mode: {0} vs {1}")]
    ModeMismatch(&'static str, &'static str),

    #[error("composite failed: {0}")]
    Composite(#[from] pigment_core::Error),
}

/// One composite scenario
#[derive(Debug, Clone, Copy)]
pub struct ParityCase {
    pub seed: u64,
    pub width: usize,
    pub height: usize,
    pub opacity: f32,
    pub flow: f32,
    pub average_opacity: f32,
    pub masked: bool,
    /// Blend a single repeated source pixel
    pub repeat_src: bool,
}

impl ParityCase {
    /// Opaque, unmasked 16x16 case
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            width: 16,
            height: 16,
            opacity: 1.0,
            flow: 1.0,
            average_opacity: 1.0,
            masked: false,
            repeat_src: false,
        }
    }

    pub fn with_size(mut self, width: usize, height: usize) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_flow(mut self, flow: f32, average_opacity: f32) -> Self {
        self.flow = flow;
        self.average_opacity = average_opacity;
        self
    }

    pub fn masked(mut self) -> Self {
        self.masked = true;
        self
    }

    pub fn repeated_source(mut self) -> Self {
        self.repeat_src = true;
        self
    }

    /// Composite this case with `op` and return the destination bytes
    pub fn run(&self, op: &dyn CompositeOp) -> Result<Vec<u8>, ParityError> {
        let layout = op.layout();
        let stride = self.width * layout.pixel_size();
        let src = generate_tile(TilePattern::Random(self.seed), layout, self.width, self.height);
        let mut dst = generate_tile(
            TilePattern::Random(self.seed.wrapping_add(1)),
            layout,
            self.width,
            self.height,
        );
        let mask = generate_mask(self.seed.wrapping_add(2), self.width, self.height);

        let src_stride = if self.repeat_src { 0 } else { stride };
        let mut params = CompositeParams::new(&mut dst, stride, &src, src_stride, self.height, self.width)
            .with_opacity(self.opacity)
            .with_flow(self.flow)
            .with_average_opacity(self.average_opacity);
        if self.masked {
            params = params.with_mask(&mask, self.width);
        }
        op.composite(params)?;
        Ok(dst)
    }
}

/// Outcome of comparing two ops on one case
#[derive(Debug, Clone)]
pub struct KernelParity {
    pub layout: PixelLayout,
    pub op: &'static str,
    /// Largest channel difference, in unit range
    pub max_diff: f32,
    /// Channels that differ at all
    pub mismatches: usize,
    pub channels: usize,
}

impl KernelParity {
    pub fn is_exact(&self) -> bool {
        self.mismatches == 0
    }

    pub fn within(&self, tolerance: f32) -> bool {
        self.max_diff <= tolerance
    }
}

impl fmt::Display for KernelParity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?}: max diff {:.6}, {}/{} channels differ",
            self.op, self.layout, self.max_diff, self.mismatches, self.channels
        )
    }
}

/// Run `case` through two ops of the same layout and compare
pub fn compare_composite(
    reference: &dyn CompositeOp,
    candidate: &dyn CompositeOp,
    case: &ParityCase,
) -> Result<KernelParity, ParityError> {
    if reference.id() != candidate.id() {
        return Err(ParityError::ModeMismatch(reference.id().name(), candidate.id().name()));
    }
    let layout = reference.layout();
    let expected = decode(layout, &case.run(reference)?);
    let actual = decode(layout, &case.run(candidate)?);

    let mut max_diff = 0.0f32;
    let mut mismatches = 0;
    for (a, b) in expected.iter().zip(&actual) {
        if a.to_bits() != b.to_bits() {
            mismatches += 1;
            max_diff = max_diff.max((a - b).abs());
        }
    }

    let parity = KernelParity {
        layout,
        op: reference.id().name(),
        max_diff,
        mismatches,
        channels: expected.len(),
    };
    tracing::debug!(%parity, "kernel parity");
    Ok(parity)
}

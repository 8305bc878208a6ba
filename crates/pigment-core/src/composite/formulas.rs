//! Per-pixel blend formulas
//!
//! Formulas are written once over [`Channel`] and shared by every pixel
//! layout and instruction set. Alpha is always the last of four channels.

use std::marker::PhantomData;

use super::CompositeOpId;
use crate::pixel::Channel;

const ALPHA: usize = 3;

/// Blending parameters converted to the channel type
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlendParams<C> {
    pub opacity: C,
    pub flow: C,
    pub average_opacity: C,
}

pub(crate) trait CompositeFormula<C: Channel>: Send + Sync + 'static {
    const ID: CompositeOpId;

    fn prepare(opacity: f32, flow: f32, average_opacity: f32) -> BlendParams<C> {
        BlendParams {
            opacity: C::from_unit_f32(opacity),
            flow: C::from_unit_f32(flow),
            average_opacity: C::from_unit_f32(average_opacity),
        }
    }

    fn compose(src: [C; 4], dst: [C; 4], mask: Option<C>, params: &BlendParams<C>) -> [C; 4];
}

pub(crate) struct OverFormula;

impl<C: Channel> CompositeFormula<C> for OverFormula {
    const ID: CompositeOpId = CompositeOpId::Over;

    #[inline(always)]
    fn compose(src: [C; 4], mut dst: [C; 4], mask: Option<C>, params: &BlendParams<C>) -> [C; 4] {
        let mut src_alpha = src[ALPHA];
        if let Some(mask) = mask {
            src_alpha = C::mul(src_alpha, mask);
        }
        src_alpha = C::mul(src_alpha, params.opacity);
        if src_alpha == C::ZERO {
            return dst;
        }

        let dst_alpha = dst[ALPHA];
        let src_blend = if dst_alpha == C::UNIT {
            src_alpha
        } else if dst_alpha == C::ZERO {
            dst[ALPHA] = src_alpha;
            C::UNIT
        } else {
            let new_alpha = C::add(dst_alpha, C::mul(C::inv(dst_alpha), src_alpha));
            dst[ALPHA] = new_alpha;
            C::div(src_alpha, new_alpha)
        };

        if src_blend == C::UNIT {
            dst[..ALPHA].copy_from_slice(&src[..ALPHA]);
        } else {
            for i in 0..ALPHA {
                dst[i] = C::lerp(dst[i], src[i], src_blend);
            }
        }
        dst
    }
}

pub(crate) struct CopyFormula;

impl<C: Channel> CompositeFormula<C> for CopyFormula {
    const ID: CompositeOpId = CompositeOpId::Copy;

    #[inline(always)]
    fn compose(src: [C; 4], mut dst: [C; 4], mask: Option<C>, params: &BlendParams<C>) -> [C; 4] {
        let opacity = match mask {
            Some(mask) => C::mul(mask, params.opacity),
            None => params.opacity,
        };
        let src_alpha = src[ALPHA];
        let dst_alpha = dst[ALPHA];

        if dst_alpha == C::ZERO || opacity == C::UNIT {
            dst[..ALPHA].copy_from_slice(&src[..ALPHA]);
            dst[ALPHA] = C::lerp(dst_alpha, src_alpha, opacity);
        } else if opacity != C::ZERO {
            let new_alpha = C::lerp(dst_alpha, src_alpha, opacity);
            // Blend premultiplied, then divide back out
            if new_alpha != C::ZERO {
                for i in 0..ALPHA {
                    let dst_mult = C::mul(dst[i], dst_alpha);
                    let src_mult = C::mul(src[i], src_alpha);
                    dst[i] = C::div(C::lerp(dst_mult, src_mult, opacity), new_alpha);
                }
            }
            dst[ALPHA] = new_alpha;
        }
        dst
    }
}

/// How flow enters the alpha darken formula
pub(crate) trait FlowPolicy: Send + Sync + 'static {
    const ID: CompositeOpId;

    fn prepare<C: Channel>(opacity: f32, flow: f32, average_opacity: f32) -> BlendParams<C>;

    /// Destination alpha when flow is zero
    fn zero_flow_alpha<C: Channel>(src_alpha: C, dst_alpha: C) -> C;
}

/// Flow scales opacity and average opacity
pub(crate) struct HardFlow;

impl FlowPolicy for HardFlow {
    const ID: CompositeOpId = CompositeOpId::AlphaDarkenHard;

    fn prepare<C: Channel>(opacity: f32, flow: f32, average_opacity: f32) -> BlendParams<C> {
        BlendParams {
            opacity: C::from_unit_f32(opacity * flow),
            flow: C::from_unit_f32(flow),
            average_opacity: C::from_unit_f32(average_opacity * flow),
        }
    }

    #[inline(always)]
    fn zero_flow_alpha<C: Channel>(src_alpha: C, dst_alpha: C) -> C {
        C::union_shape(src_alpha, dst_alpha)
    }
}

/// Flow only mixes the final alpha
pub(crate) struct CreamyFlow;

impl FlowPolicy for CreamyFlow {
    const ID: CompositeOpId = CompositeOpId::AlphaDarkenCreamy;

    fn prepare<C: Channel>(opacity: f32, flow: f32, average_opacity: f32) -> BlendParams<C> {
        BlendParams {
            opacity: C::from_unit_f32(opacity),
            flow: C::from_unit_f32(flow),
            average_opacity: C::from_unit_f32(average_opacity),
        }
    }

    #[inline(always)]
    fn zero_flow_alpha<C: Channel>(_src_alpha: C, dst_alpha: C) -> C {
        dst_alpha
    }
}

pub(crate) struct AlphaDarkenFormula<P>(PhantomData<fn() -> P>);

impl<C: Channel, P: FlowPolicy> CompositeFormula<C> for AlphaDarkenFormula<P> {
    const ID: CompositeOpId = P::ID;

    fn prepare(opacity: f32, flow: f32, average_opacity: f32) -> BlendParams<C> {
        P::prepare(opacity, flow, average_opacity)
    }

    #[inline(always)]
    fn compose(src: [C; 4], mut dst: [C; 4], mask: Option<C>, params: &BlendParams<C>) -> [C; 4] {
        let src_alpha = src[ALPHA];
        let dst_alpha = dst[ALPHA];
        let msk_alpha = match mask {
            Some(mask) => C::mul(mask, src_alpha),
            None => src_alpha,
        };
        let applied_alpha = C::mul(msk_alpha, params.opacity);

        if dst_alpha != C::ZERO {
            for i in 0..ALPHA {
                dst[i] = C::lerp(dst[i], src[i], applied_alpha);
            }
        } else {
            dst[..ALPHA].copy_from_slice(&src[..ALPHA]);
        }

        let opacity = params.opacity;
        let average_opacity = params.average_opacity;
        let full_flow_alpha = if average_opacity > opacity {
            if average_opacity > dst_alpha {
                let reverse_blend = C::div(dst_alpha, average_opacity);
                C::lerp(applied_alpha, average_opacity, reverse_blend)
            } else {
                dst_alpha
            }
        } else if opacity > dst_alpha {
            C::lerp(dst_alpha, opacity, msk_alpha)
        } else {
            dst_alpha
        };

        dst[ALPHA] = if params.flow == C::UNIT {
            full_flow_alpha
        } else {
            let zero_flow_alpha = P::zero_flow_alpha(applied_alpha, dst_alpha);
            C::lerp(zero_flow_alpha, full_flow_alpha, params.flow)
        };
        dst
    }
}

//! CPU capability probing and kernel dispatch
//!
//! Kernel factories keep a small strategy table per pixel layout: an
//! ordered list of candidate constructors, most specialized first, with the
//! generic implementation as the guaranteed fallback. The table is probed
//! once, when the factory is built, against the running CPU and the
//! caller's [`DispatchOptions`].
//!
//! Supported instruction sets:
//! - x86-64: SSE4.1, AVX2
//! - ARM64: NEON
//!
//! Every candidate runs the same kernel source, only compiled for a
//! different target feature set, so results are bit-identical whichever
//! one is picked.

pub(crate) mod arch;

use tracing::debug;

/// Instruction set a kernel was compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionSet {
    /// Portable scalar code, always available
    Generic,
    /// x86-64 SSE4.1
    Sse41,
    /// x86-64 AVX2
    Avx2,
    /// ARM64 NEON
    Neon,
}

impl InstructionSet {
    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Generic => "scalar",
            Self::Sse41 => "SSE4.1",
            Self::Avx2 => "AVX2",
            Self::Neon => "NEON",
        }
    }

    /// Whether the running CPU can execute this instruction set
    pub fn is_supported(&self) -> bool {
        match self {
            Self::Generic => true,
            #[cfg(target_arch = "x86_64")]
            Self::Sse41 => has_sse41(),
            #[cfg(target_arch = "x86_64")]
            Self::Avx2 => has_avx2(),
            #[cfg(target_arch = "aarch64")]
            Self::Neon => has_neon(),
            #[allow(unreachable_patterns)]
            _ => false,
        }
    }

    /// Best instruction set of the running CPU
    pub fn detect() -> Self {
        [Self::Avx2, Self::Sse41, Self::Neon]
            .into_iter()
            .find(Self::is_supported)
            .unwrap_or(Self::Generic)
    }
}

/// Check if AVX2 is available at runtime
#[cfg(target_arch = "x86_64")]
pub fn has_avx2() -> bool {
    is_x86_feature_detected!("avx2")
}

/// Check if SSE4.1 is available at runtime
#[cfg(target_arch = "x86_64")]
pub fn has_sse41() -> bool {
    is_x86_feature_detected!("sse4.1")
}

/// Check if NEON is available (always true on aarch64)
#[cfg(target_arch = "aarch64")]
pub fn has_neon() -> bool {
    true
}

/// Get a description of the active SIMD features
pub fn active_features() -> &'static str {
    InstructionSet::detect().name()
}

/// Limits on which kernels a factory may select
///
/// The default allows everything the CPU supports.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Always use the generic implementation
    pub force_generic: bool,
    /// Instruction sets that must not be selected
    pub disabled: Vec<InstructionSet>,
}

impl DispatchOptions {
    /// Allow every supported instruction set
    pub fn new() -> Self {
        Self::default()
    }

    /// Only allow the generic implementation
    pub fn generic_only() -> Self {
        Self {
            force_generic: true,
            ..Self::default()
        }
    }

    /// Disallow one instruction set
    pub fn without(mut self, isa: InstructionSet) -> Self {
        if !self.disabled.contains(&isa) {
            self.disabled.push(isa);
        }
        self
    }

    /// Whether a candidate for `isa` may be selected on this CPU
    pub fn permits(&self, isa: InstructionSet) -> bool {
        match isa {
            InstructionSet::Generic => true,
            _ => !self.force_generic && !self.disabled.contains(&isa) && isa.is_supported(),
        }
    }
}

/// One entry of a strategy table
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate<C: Copy> {
    pub isa: InstructionSet,
    pub create: C,
}

/// Ordered candidate constructors for one pixel layout
pub(crate) struct StrategyTable<C: Copy> {
    specialized: Vec<Candidate<C>>,
    generic: C,
}

impl<C: Copy> StrategyTable<C> {
    pub fn new(generic: C) -> Self {
        Self {
            specialized: Vec::new(),
            generic,
        }
    }

    /// Append a candidate; earlier candidates are preferred
    pub fn with(mut self, isa: InstructionSet, create: C) -> Self {
        self.specialized.push(Candidate { isa, create });
        self
    }

    pub fn select(&self, options: &DispatchOptions) -> Candidate<C> {
        let selected = self
            .specialized
            .iter()
            .copied()
            .find(|candidate| options.permits(candidate.isa))
            .unwrap_or(Candidate {
                isa: InstructionSet::Generic,
                create: self.generic,
            });
        debug!(isa = selected.isa.name(), "selected kernel candidate");
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_features() {
        let features = active_features();
        println!("Active SIMD features: {}", features);
        assert!(!features.is_empty());
    }

    #[test]
    fn test_generic_always_permitted() {
        assert!(DispatchOptions::generic_only().permits(InstructionSet::Generic));
        assert!(!DispatchOptions::generic_only().permits(InstructionSet::Avx2));
        assert!(InstructionSet::Generic.is_supported());
    }

    #[test]
    fn test_detected_isa_is_supported() {
        let isa = InstructionSet::detect();
        assert!(isa.is_supported());
        assert!(DispatchOptions::new().permits(isa));
        assert!(!DispatchOptions::new().without(isa).permits(isa) || isa == InstructionSet::Generic);
    }

    #[test]
    fn test_table_prefers_earlier_candidates() {
        let table = StrategyTable::new(0u8)
            .with(InstructionSet::Avx2, 2)
            .with(InstructionSet::Sse41, 1);

        let generic = table.select(&DispatchOptions::generic_only());
        assert_eq!(generic.isa, InstructionSet::Generic);
        assert_eq!(generic.create, 0);

        let best = table.select(&DispatchOptions::new());
        match best.isa {
            InstructionSet::Avx2 => assert_eq!(best.create, 2),
            InstructionSet::Sse41 => assert_eq!(best.create, 1),
            _ => assert_eq!(best.create, 0),
        }

        let no_avx = table.select(&DispatchOptions::new().without(InstructionSet::Avx2));
        assert_ne!(no_avx.isa, InstructionSet::Avx2);
    }
}

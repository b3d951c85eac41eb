//! Kernel signatures, implementation tiers and CPU capability detection.
//!
//! Every kernel exists in a scalar reference form and optionally in one or
//! more optimized forms. The design follows these principles:
//!
//! 1. **Scalar reference**: every operation has a bit-exact scalar
//!    implementation in [`scalar`]. It defines correct output.
//!
//! 2. **Tiers**: optimized implementations are grouped into [`Tier`]s of
//!    increasing specificity. A tier may implement only some block sizes.
//!
//! 3. **Runtime selection**: [`TierMask::detect`] reports which tiers the
//!    running CPU can execute. Table construction only consumes the mask.
//!
//! 4. **Zero-cost when unused**: platform-specific code is only compiled
//!    for the target architecture.
//!
//! # Architecture
//!
//! ```text
//! simd/
//! ├── mod.rs         # This file - signatures, tiers, detection
//! ├── scalar.rs      # Reference implementations
//! ├── optimized.rs   # Portable optimized tier (multiversion + wide)
//! └── x86_64/
//!     ├── mod.rs     # x86_64 tier providers
//!     ├── ssse3.rs   # 8x8 inverse transform
//!     ├── sse41.rs   # Quantization and reconstruction
//!     └── avx2.rs    # DC prediction and inverse quantization
//! ```

pub mod optimized;
pub mod scalar;

#[cfg(all(target_arch = "x86_64", feature = "simd-intrinsics"))]
pub mod x86_64;

use crate::key::KernelKey;
use crate::types::{DequantizeParams, Neighbours, QuantizeParams};

/// DC intra prediction.
///
/// Signature: (dst, neighbours, key) where:
/// - dst: `n * n` predicted samples, stride `n`, `n = key.block_size()`
/// - neighbours: reconstructed border around the block
/// - key: block size and edge filter flag
pub type PredIntraFn = fn(&mut [u8], &Neighbours, KernelKey);

/// Forward quantization. Returns the coded block flag.
///
/// Signature: (dst, src, params); `dst.len() == src.len()`.
pub type QuantizeFn = fn(&mut [i16], &[i16], QuantizeParams) -> bool;

/// Inverse quantization.
///
/// Signature: (dst, src, params); `dst.len() == src.len()`.
pub type QuantizeInverseFn = fn(&mut [i16], &[i16], DequantizeParams);

/// Reconstruction of prediction plus residual.
///
/// Signature: (dst, dst_stride, pred, pred_stride, residual, n) where the
/// residual is `n * n` samples with stride `n`.
pub type ReconstructFn = fn(&mut [u8], usize, &[u8], usize, &[i16], usize);

/// Inverse transform of a coefficient block followed by add-residual.
///
/// Signature: (dst, dst_stride, pred, pred_stride, coeffs). The block size
/// is fixed per implementation; `coeffs` holds `n * n` values.
pub type InverseTransformAddFn = fn(&mut [u8], usize, &[u8], usize, &[i16]);

// =============================================================================
// Tiers
// =============================================================================

/// Implementation tier, in increasing order of specificity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Tier {
    /// Scalar reference; defines correct output.
    Reference = 0,
    /// Portable optimized code (autovectorized or `wide` vectors).
    Optimized = 1,
    /// x86_64 SSSE3 intrinsics.
    Ssse3 = 2,
    /// x86_64 SSE4.1 intrinsics.
    Sse41 = 3,
    /// x86_64 AVX2 intrinsics.
    Avx2 = 4,
}

impl Tier {
    /// All tiers, ascending.
    pub const ALL: [Tier; 5] = [
        Tier::Reference,
        Tier::Optimized,
        Tier::Ssse3,
        Tier::Sse41,
        Tier::Avx2,
    ];

    /// Short lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            Tier::Reference => "reference",
            Tier::Optimized => "optimized",
            Tier::Ssse3 => "ssse3",
            Tier::Sse41 => "sse4.1",
            Tier::Avx2 => "avx2",
        }
    }

    /// The mask containing only this tier.
    pub const fn mask(self) -> TierMask {
        TierMask(1 << self as u32)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of tiers, as produced by [`TierMask::detect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TierMask(u32);

impl TierMask {
    /// No tiers.
    pub const EMPTY: TierMask = TierMask(0);

    /// Reference only.
    pub const REFERENCE: TierMask = Tier::Reference.mask();

    /// Every tier, whether or not the CPU supports it.
    pub const ALL: TierMask = TierMask((1 << Tier::ALL.len()) - 1);

    /// Build from raw bits. Bits beyond the known tiers are dropped.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if `tier` is in the set.
    pub const fn contains(self, tier: Tier) -> bool {
        self.0 & tier.mask().0 != 0
    }

    /// Union.
    #[must_use]
    pub const fn with(self, tier: Tier) -> Self {
        Self(self.0 | tier.mask().0)
    }

    /// Union of two masks.
    #[must_use]
    pub const fn union(self, other: TierMask) -> Self {
        Self(self.0 | other.0)
    }

    /// Intersection of two masks.
    #[must_use]
    pub const fn intersection(self, other: TierMask) -> Self {
        Self(self.0 & other.0)
    }

    /// Member tiers, ascending.
    pub fn tiers(self) -> impl Iterator<Item = Tier> {
        Tier::ALL.into_iter().filter(move |&t| self.contains(t))
    }

    /// Number of member tiers.
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// True if no tier is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Tiers this build can execute on the current CPU.
    ///
    /// The ISA tiers are only reported when the `simd-intrinsics` feature is
    /// enabled and the corresponding instructions are available.
    #[must_use]
    pub fn detect() -> Self {
        #[allow(unused_mut)]
        let mut mask = Self::REFERENCE.with(Tier::Optimized);

        #[cfg(all(target_arch = "x86_64", feature = "simd-intrinsics"))]
        {
            if is_x86_feature_detected!("ssse3") {
                mask = mask.with(Tier::Ssse3);
            }
            if is_x86_feature_detected!("sse4.1") {
                mask = mask.with(Tier::Sse41);
            }
            if is_x86_feature_detected!("avx2") {
                mask = mask.with(Tier::Avx2);
            }
        }

        mask
    }
}

impl std::ops::BitOr for TierMask {
    type Output = TierMask;

    fn bitor(self, rhs: TierMask) -> TierMask {
        self.union(rhs)
    }
}

impl From<Tier> for TierMask {
    fn from(tier: Tier) -> Self {
        tier.mask()
    }
}

impl std::fmt::Display for TierMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for tier in self.tiers() {
            if !first {
                f.write_str("|")?;
            }
            f.write_str(tier.name())?;
            first = false;
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_includes_portable_tiers() {
        let mask = TierMask::detect();
        assert!(mask.contains(Tier::Reference));
        assert!(mask.contains(Tier::Optimized));
    }

    #[test]
    fn test_tiers_ascend() {
        let tiers: Vec<_> = TierMask::ALL.tiers().collect();
        assert_eq!(tiers, Tier::ALL.to_vec());
        assert!(tiers.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_mask_ops() {
        let mask = TierMask::REFERENCE | Tier::Avx2.into();
        assert_eq!(mask.len(), 2);
        assert!(mask.contains(Tier::Avx2));
        assert!(!mask.contains(Tier::Sse41));
        assert_eq!(mask.to_string(), "reference|avx2");
        assert_eq!(TierMask::EMPTY.to_string(), "none");
        assert_eq!(TierMask::from_bits(u32::MAX), TierMask::ALL);
    }

    #[test]
    fn test_mask_bits_and_intersection() {
        let sse = TierMask::REFERENCE.with(Tier::Ssse3).with(Tier::Sse41);
        assert_eq!(sse.bits(), 0b01101);
        assert_eq!(TierMask::from_bits(sse.bits()), sse);
        assert_eq!(TierMask::ALL.bits(), 0b11111);

        let portable = TierMask::REFERENCE.with(Tier::Optimized);
        assert_eq!(sse.intersection(portable), TierMask::REFERENCE);
        assert_eq!(sse.intersection(TierMask::ALL), sse);
        assert!(sse.intersection(Tier::Avx2.mask()).is_empty());
    }
}

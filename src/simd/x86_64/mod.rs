//! x86_64-specific SIMD implementations.
//!
//! Each submodule is one tier. Its kernels use `#[target_feature]` and are
//! only installed when the tier is in the requested mask, which
//! [`TierMask::detect`](crate::simd::TierMask::detect) only reports after
//! runtime feature detection.
//!
//! Instruction-set tiers cover a subset of keys. Keys they leave alone keep
//! the entry of the tier below.

pub mod avx2;
pub mod sse41;
pub mod ssse3;

use crate::dispatch::{KernelProvider, Operation, TableBuilder};
use crate::key::KernelKey;
use crate::simd::Tier;
use crate::types::Channel;

/// 8x8 inverse DCT.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ssse3Provider;

impl KernelProvider for Ssse3Provider {
    fn tier(&self) -> Tier {
        Tier::Ssse3
    }

    fn populate(&self, table: &mut TableBuilder) {
        table.set_inverse_transform_add(KernelKey::size(3), ssse3::inverse_transform_add_8x8);
    }
}

/// Forward quantization and reconstruction at every size.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sse41Provider;

impl KernelProvider for Sse41Provider {
    fn tier(&self) -> Tier {
        Tier::Sse41
    }

    fn populate(&self, table: &mut TableBuilder) {
        for key in Operation::Quantize.keys() {
            table.set_quantize(key, sse41::quantize);
            table.set_reconstruct(key, sse41::reconstruct);
        }
    }
}

/// Inverse quantization at every size; DC prediction for 8x8 and 16x16.
#[derive(Debug, Clone, Copy, Default)]
pub struct Avx2Provider;

impl KernelProvider for Avx2Provider {
    fn tier(&self) -> Tier {
        Tier::Avx2
    }

    fn populate(&self, table: &mut TableBuilder) {
        for key in Operation::QuantizeInverse.keys() {
            table.set_quantize_inverse(key, avx2::quantize_inverse);
        }
        for k in [3, 4] {
            for channel in [Channel::Luma, Channel::Chroma] {
                table.set_pred_intra_dc(KernelKey::intra(channel, k), avx2::pred_intra_dc);
            }
        }
    }
}

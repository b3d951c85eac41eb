//! Kernel dispatch table.
//!
//! A [`KernelTable`] maps each [`Operation`] and [`KernelKey`] to at most one
//! function pointer. Tables are built by layering [`KernelProvider`]s in
//! ascending [`Tier`] order:
//!
//! 1. The reference tier fills every key in each operation's domain.
//! 2. The optimized tier overwrites every entry.
//! 3. Each instruction-set tier overwrites only the keys it implements.
//!
//! A key outside an operation's domain stays empty. Lookups return `None`
//! for it, which callers treat as "unavailable", not as an error.
//!
//! Construction is a pure function of the tier mask (and of any extra
//! providers). Nothing is cached between builds.

use crate::key::{KernelKey, KEY_SPACE};
use crate::simd::{
    scalar, InverseTransformAddFn, PredIntraFn, QuantizeFn, QuantizeInverseFn, ReconstructFn,
    Tier, TierMask,
};
use crate::types::Channel;

// =============================================================================
// Operations
// =============================================================================

/// A kernel operation with its own slot array in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// DC intra prediction
    PredIntraDc,
    /// Forward quantization
    Quantize,
    /// Inverse quantization
    QuantizeInverse,
    /// Prediction plus residual
    Reconstruct,
    /// Inverse DCT plus add-residual
    InverseTransformAdd,
    /// 4x4 inverse DST plus add-residual
    InverseDstAdd,
}

impl Operation {
    /// Every operation, in sweep order.
    pub const ALL: [Operation; 6] = [
        Operation::PredIntraDc,
        Operation::Quantize,
        Operation::QuantizeInverse,
        Operation::Reconstruct,
        Operation::InverseTransformAdd,
        Operation::InverseDstAdd,
    ];

    /// Short name used in labels and log output.
    pub const fn name(self) -> &'static str {
        match self {
            Operation::PredIntraDc => "pred_intra_dc",
            Operation::Quantize => "quantize",
            Operation::QuantizeInverse => "quantize_inverse",
            Operation::Reconstruct => "reconstruct",
            Operation::InverseTransformAdd => "inverse_transform_add",
            Operation::InverseDstAdd => "inverse_dst_add",
        }
    }

    /// The valid key domain of this operation, in ascending index order.
    pub fn keys(self) -> Vec<KernelKey> {
        let mut keys: Vec<KernelKey> = match self {
            Operation::PredIntraDc => (2..=5u8)
                .flat_map(|k| {
                    [Channel::Luma, Channel::Chroma].map(|channel| KernelKey::intra(channel, k))
                })
                .collect(),
            Operation::InverseDstAdd => vec![KernelKey::size(2)],
            _ => (2..=5u8).map(KernelKey::size).collect(),
        };
        keys.sort();
        keys
    }

    /// True if `key` lies in this operation's domain.
    pub fn accepts(self, key: KernelKey) -> bool {
        match self {
            Operation::PredIntraDc => key == KernelKey::intra(key.channel(), key.log2_size()),
            Operation::InverseDstAdd => key == KernelKey::size(2),
            _ => key == KernelKey::size(key.log2_size()),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Entries and slots
// =============================================================================

/// A resolved kernel and the tier that provided it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry<F> {
    /// Kernel function pointer
    pub function: F,
    /// Tier whose provider installed this entry
    pub tier: Tier,
}

#[derive(Clone, Copy)]
struct Slots<F: Copy>([Option<Entry<F>>; KEY_SPACE]);

impl<F: Copy> Slots<F> {
    const fn empty() -> Self {
        Self([None; KEY_SPACE])
    }

    fn get(&self, key: KernelKey) -> Option<Entry<F>> {
        self.0[key.index()]
    }

    fn set(&mut self, key: KernelKey, entry: Entry<F>) {
        self.0[key.index()] = Some(entry);
    }

    fn count(&self) -> usize {
        self.0.iter().filter(|e| e.is_some()).count()
    }

    fn tiers(&self) -> impl Iterator<Item = Tier> + '_ {
        self.0.iter().flatten().map(|e| e.tier)
    }
}

// =============================================================================
// Providers
// =============================================================================

/// A source of kernel implementations for one tier.
///
/// `populate` installs entries through the builder; the builder stamps each
/// entry with [`tier`](Self::tier). Providers are only asked to populate when
/// their tier is in the requested mask.
pub trait KernelProvider {
    /// Tier of every entry this provider installs.
    fn tier(&self) -> Tier;

    /// Install entries for the keys this provider implements.
    fn populate(&self, table: &mut TableBuilder);
}

/// The scalar reference kernels, installed for every valid key.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceProvider;

const REFERENCE_INVERSE_TRANSFORM_ADD: [InverseTransformAddFn; 4] = [
    scalar::inverse_transform_add::<4>,
    scalar::inverse_transform_add_8x8,
    scalar::inverse_transform_add::<16>,
    scalar::inverse_transform_add::<32>,
];

impl KernelProvider for ReferenceProvider {
    fn tier(&self) -> Tier {
        Tier::Reference
    }

    fn populate(&self, table: &mut TableBuilder) {
        for key in Operation::PredIntraDc.keys() {
            table.set_pred_intra_dc(key, scalar::pred_intra_dc);
        }
        for key in Operation::Quantize.keys() {
            table.set_quantize(key, scalar::quantize);
        }
        for key in Operation::QuantizeInverse.keys() {
            table.set_quantize_inverse(key, scalar::quantize_inverse);
        }
        for key in Operation::Reconstruct.keys() {
            table.set_reconstruct(key, scalar::reconstruct);
        }
        for key in Operation::InverseTransformAdd.keys() {
            table.set_inverse_transform_add(
                key,
                REFERENCE_INVERSE_TRANSFORM_ADD[(key.log2_size() - 2) as usize],
            );
        }
        for key in Operation::InverseDstAdd.keys() {
            table.set_inverse_dst_add(key, scalar::inverse_dst_add);
        }
    }
}

/// Providers shipped with the crate, ascending by tier.
fn builtin_providers() -> Vec<&'static dyn KernelProvider> {
    #[allow(unused_mut)]
    let mut providers: Vec<&'static dyn KernelProvider> = vec![
        &ReferenceProvider,
        &crate::simd::optimized::OptimizedProvider,
    ];

    #[cfg(all(target_arch = "x86_64", feature = "simd-intrinsics"))]
    providers.extend_from_slice(&[
        &crate::simd::x86_64::Ssse3Provider as &'static dyn KernelProvider,
        &crate::simd::x86_64::Sse41Provider,
        &crate::simd::x86_64::Avx2Provider,
    ]);

    providers
}

// =============================================================================
// Builder
// =============================================================================

/// Mutable view handed to [`KernelProvider::populate`].
pub struct TableBuilder {
    table: KernelTable,
    tier: Tier,
    installed: usize,
}

macro_rules! setter {
    ($(#[$doc:meta])* $name:ident, $field:ident, $op:expr, $fn_ty:ty) => {
        $(#[$doc])*
        ///
        /// # Panics
        ///
        /// If `key` is outside the operation's domain.
        pub fn $name(&mut self, key: KernelKey, function: $fn_ty) {
            assert!($op.accepts(key), "{} has no kernel slot for {}", $op, key);
            self.table.$field.set(
                key,
                Entry {
                    function,
                    tier: self.tier,
                },
            );
            self.installed += 1;
        }
    };
}

impl TableBuilder {
    fn new() -> Self {
        Self {
            table: KernelTable::empty(),
            tier: Tier::Reference,
            installed: 0,
        }
    }

    /// Tier currently being populated.
    pub fn tier(&self) -> Tier {
        self.tier
    }

    setter!(
        /// Install a DC intra prediction kernel.
        set_pred_intra_dc, pred_intra_dc, Operation::PredIntraDc, PredIntraFn
    );
    setter!(
        /// Install a forward quantization kernel.
        set_quantize, quantize, Operation::Quantize, QuantizeFn
    );
    setter!(
        /// Install an inverse quantization kernel.
        set_quantize_inverse, quantize_inverse, Operation::QuantizeInverse, QuantizeInverseFn
    );
    setter!(
        /// Install a reconstruction kernel.
        set_reconstruct, reconstruct, Operation::Reconstruct, ReconstructFn
    );
    setter!(
        /// Install an inverse DCT kernel.
        set_inverse_transform_add, inverse_transform_add, Operation::InverseTransformAdd,
        InverseTransformAddFn
    );
    setter!(
        /// Install an inverse DST kernel.
        set_inverse_dst_add, inverse_dst_add, Operation::InverseDstAdd, InverseTransformAddFn
    );

    fn finish(self) -> KernelTable {
        self.table
    }
}

// =============================================================================
// Table
// =============================================================================

/// Immutable kernel dispatch table.
///
/// Holds only function pointers, so it is `Copy`, `Send` and `Sync`.
#[derive(Clone, Copy)]
pub struct KernelTable {
    mask: TierMask,
    pred_intra_dc: Slots<PredIntraFn>,
    quantize: Slots<QuantizeFn>,
    quantize_inverse: Slots<QuantizeInverseFn>,
    reconstruct: Slots<ReconstructFn>,
    inverse_transform_add: Slots<InverseTransformAddFn>,
    inverse_dst_add: Slots<InverseTransformAddFn>,
}

impl KernelTable {
    const fn empty() -> Self {
        Self {
            mask: TierMask::EMPTY,
            pred_intra_dc: Slots::empty(),
            quantize: Slots::empty(),
            quantize_inverse: Slots::empty(),
            reconstruct: Slots::empty(),
            inverse_transform_add: Slots::empty(),
            inverse_dst_add: Slots::empty(),
        }
    }

    /// Build a table from the built-in providers whose tier is in `mask`.
    ///
    /// The mask is trusted: the caller is responsible for only requesting
    /// tiers the CPU supports (see [`TierMask::detect`]).
    #[must_use]
    pub fn build(mask: TierMask) -> Self {
        Self::build_with(mask, &[])
    }

    /// Build a table from the built-in providers plus `extra`.
    ///
    /// Providers are applied in ascending tier order. Among providers of the
    /// same tier, built-ins go first, then `extra` in slice order.
    #[must_use]
    pub fn build_with(mask: TierMask, extra: &[&dyn KernelProvider]) -> Self {
        let mut providers: Vec<&dyn KernelProvider> = builtin_providers();
        providers.extend_from_slice(extra);
        providers.sort_by_key(|p| p.tier());

        let mut builder = TableBuilder::new();
        for provider in providers {
            let tier = provider.tier();
            if !mask.contains(tier) {
                continue;
            }
            builder.tier = tier;
            builder.installed = 0;
            provider.populate(&mut builder);
            log::debug!(
                "kernel table: {} provider installed {} entries",
                builder.tier(),
                builder.installed
            );
        }

        let mut table = builder.finish();
        table.mask = mask;
        table
    }

    /// The mask this table was built from.
    pub fn mask(&self) -> TierMask {
        self.mask
    }

    /// DC intra prediction kernel for `key`.
    pub fn pred_intra_dc(&self, key: KernelKey) -> Option<Entry<PredIntraFn>> {
        self.pred_intra_dc.get(key)
    }

    /// Forward quantization kernel for `key`.
    pub fn quantize(&self, key: KernelKey) -> Option<Entry<QuantizeFn>> {
        self.quantize.get(key)
    }

    /// Inverse quantization kernel for `key`.
    pub fn quantize_inverse(&self, key: KernelKey) -> Option<Entry<QuantizeInverseFn>> {
        self.quantize_inverse.get(key)
    }

    /// Reconstruction kernel for `key`.
    pub fn reconstruct(&self, key: KernelKey) -> Option<Entry<ReconstructFn>> {
        self.reconstruct.get(key)
    }

    /// Inverse DCT kernel for `key`.
    pub fn inverse_transform_add(&self, key: KernelKey) -> Option<Entry<InverseTransformAddFn>> {
        self.inverse_transform_add.get(key)
    }

    /// Inverse DST kernel for `key`.
    pub fn inverse_dst_add(&self, key: KernelKey) -> Option<Entry<InverseTransformAddFn>> {
        self.inverse_dst_add.get(key)
    }

    /// Tier of the entry for `(operation, key)`, if any.
    pub fn provenance(&self, operation: Operation, key: KernelKey) -> Option<Tier> {
        match operation {
            Operation::PredIntraDc => self.pred_intra_dc(key).map(|e| e.tier),
            Operation::Quantize => self.quantize(key).map(|e| e.tier),
            Operation::QuantizeInverse => self.quantize_inverse(key).map(|e| e.tier),
            Operation::Reconstruct => self.reconstruct(key).map(|e| e.tier),
            Operation::InverseTransformAdd => self.inverse_transform_add(key).map(|e| e.tier),
            Operation::InverseDstAdd => self.inverse_dst_add(key).map(|e| e.tier),
        }
    }

    /// Number of populated entries across all operations.
    pub fn len(&self) -> usize {
        self.pred_intra_dc.count()
            + self.quantize.count()
            + self.quantize_inverse.count()
            + self.reconstruct.count()
            + self.inverse_transform_add.count()
            + self.inverse_dst_add.count()
    }

    /// True if no entry is populated.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tiers that supplied at least one entry.
    pub fn tiers(&self) -> TierMask {
        self.pred_intra_dc
            .tiers()
            .chain(self.quantize.tiers())
            .chain(self.quantize_inverse.tiers())
            .chain(self.reconstruct.tiers())
            .chain(self.inverse_transform_add.tiers())
            .chain(self.inverse_dst_add.tiers())
            .fold(TierMask::EMPTY, TierMask::with)
    }
}

impl Default for KernelTable {
    fn default() -> Self {
        Self::build(TierMask::detect())
    }
}

impl std::fmt::Debug for KernelTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelTable")
            .field("mask", &self.mask)
            .field("entries", &self.len())
            .field("tiers", &self.tiers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Neighbours;

    #[test]
    fn test_accepts_agrees_with_keys() {
        for op in Operation::ALL {
            let domain = op.keys();
            for key in KernelKey::all() {
                assert_eq!(op.accepts(key), domain.contains(&key), "{} {}", op, key);
            }
        }
    }

    #[test]
    fn test_operation_domains() {
        assert_eq!(Operation::PredIntraDc.keys().len(), 8);
        assert_eq!(Operation::Quantize.keys().len(), 4);
        assert_eq!(Operation::InverseDstAdd.keys(), vec![KernelKey::size(2)]);
        assert!(!Operation::PredIntraDc.accepts(KernelKey::size(3)));
        assert!(Operation::PredIntraDc.accepts(KernelKey::size(5)));
    }

    #[test]
    fn test_reference_fills_every_valid_key() {
        let table = KernelTable::build(TierMask::REFERENCE);
        for op in Operation::ALL {
            for key in KernelKey::all() {
                let tier = table.provenance(op, key);
                if op.accepts(key) {
                    assert_eq!(tier, Some(Tier::Reference), "{} {}", op, key);
                } else {
                    assert_eq!(tier, None, "{} {}", op, key);
                }
            }
        }
        assert_eq!(table.len(), 8 + 4 * 4 + 1);
        assert_eq!(table.tiers(), TierMask::REFERENCE);
    }

    #[test]
    fn test_optimized_overwrites_uniformly() {
        let table = KernelTable::build(TierMask::REFERENCE.with(Tier::Optimized));
        for op in Operation::ALL {
            for key in op.keys() {
                assert_eq!(table.provenance(op, key), Some(Tier::Optimized), "{} {}", op, key);
            }
        }
    }

    #[test]
    fn test_empty_mask_builds_empty_table() {
        let table = KernelTable::build(TierMask::EMPTY);
        assert!(table.is_empty());
        assert!(table.quantize(KernelKey::size(3)).is_none());
    }

    struct PartialProvider;

    fn fill_seven(dst: &mut [u8], _: &Neighbours, key: KernelKey) {
        let n = key.block_size();
        dst[..n * n].fill(7);
    }

    impl KernelProvider for PartialProvider {
        fn tier(&self) -> Tier {
            Tier::Avx2
        }

        fn populate(&self, table: &mut TableBuilder) {
            assert_eq!(table.tier(), Tier::Avx2);
            table.set_pred_intra_dc(KernelKey::intra(Channel::Chroma, 3), fill_seven);
        }
    }

    #[test]
    fn test_partial_tier_keeps_lower_entries() {
        let mask = TierMask::REFERENCE.with(Tier::Avx2);
        let table = KernelTable::build_with(mask, &[&PartialProvider]);

        let chroma8 = KernelKey::intra(Channel::Chroma, 3);
        let entry = table.pred_intra_dc(chroma8).unwrap();
        assert_eq!(entry.tier, Tier::Avx2);
        let mut dst = [0u8; 64];
        (entry.function)(&mut dst, &Neighbours::filled(1), chroma8);
        assert!(dst.iter().all(|&v| v == 7));

        let chroma4 = KernelKey::intra(Channel::Chroma, 2);
        let tier = table.pred_intra_dc(chroma4).unwrap().tier;
        assert!(tier == Tier::Reference || tier == Tier::Avx2);
    }

    #[test]
    fn test_provider_outside_mask_is_ignored() {
        let table = KernelTable::build_with(TierMask::REFERENCE, &[&PartialProvider]);
        let entry = table.pred_intra_dc(KernelKey::intra(Channel::Chroma, 3)).unwrap();
        assert_eq!(entry.tier, Tier::Reference);
    }

    #[test]
    #[should_panic(expected = "no kernel slot")]
    fn test_out_of_domain_install_panics() {
        struct Bad;
        impl KernelProvider for Bad {
            fn tier(&self) -> Tier {
                Tier::Optimized
            }
            fn populate(&self, table: &mut TableBuilder) {
                table.set_inverse_dst_add(KernelKey::size(3), scalar::inverse_dst_add);
            }
        }
        let _ = KernelTable::build_with(TierMask::ALL, &[&Bad]);
    }

    #[test]
    fn test_table_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + Copy>() {}
        assert_send_sync::<KernelTable>();
    }
}

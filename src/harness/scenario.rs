//! Per-operation sweep scenarios.
//!
//! A scenario owns the seeded inputs of one configuration, its output
//! buffers and the kernel currently bound to it. The harness binds each
//! tier in turn, resets the outputs to a sentinel, invokes the kernel and
//! compares the captured output with the reference capture.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::buffer::AlignedBuf;
use crate::consts::{MAX_BLOCK_SAMPLES, MAX_BLOCK_SIZE};
use crate::dispatch::{KernelTable, Operation};
use crate::error::{Error, Result};
use crate::key::KernelKey;
use crate::simd::{
    InverseTransformAddFn, PredIntraFn, QuantizeFn, QuantizeInverseFn, ReconstructFn, Tier,
};
use crate::types::{Channel, DequantizeParams, Neighbours, QuantizeParams};

/// Sentinel written to pixel outputs before each batch.
pub const PIXEL_SENTINEL: u8 = 0xCD;

/// Sentinel written to coefficient outputs before each batch.
pub const COEFF_SENTINEL: i16 = 0x5A5A;

/// Row stride of the pixel buffers in stride-aware scenarios.
pub const SCENARIO_STRIDE: usize = MAX_BLOCK_SIZE;

/// The logically written output region of one run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    /// Pixel outputs, rows packed without padding
    pub pixels: Vec<u8>,
    /// Coefficient outputs
    pub coeffs: Vec<i16>,
    /// Coded block flag, for quantization
    pub cbf: Option<bool>,
}

/// One configuration of one operation.
pub trait Scenario {
    /// Operation under test.
    fn operation(&self) -> Operation;

    /// Human-readable configuration label.
    fn label(&self) -> String;

    /// Resolve this configuration's kernel from `table`.
    ///
    /// Returns false, leaving nothing bound, when the table has no entry
    /// or the entry was provided by a tier other than `tier`.
    fn bind(&mut self, table: &KernelTable, tier: Tier) -> bool;

    /// Fill every output buffer with its sentinel.
    fn reset(&mut self);

    /// Invoke the bound kernel `count` times.
    ///
    /// # Panics
    /// If nothing is bound.
    fn invoke(&mut self, count: u32);

    /// Copy out the logically written region.
    fn capture(&self) -> Snapshot;

    /// True if this run's output differs from `reference`.
    fn mismatch(&self, reference: &Snapshot) -> bool {
        self.capture() != *reference
    }
}

fn resolve<F>(entry: Option<crate::dispatch::Entry<F>>, tier: Tier) -> Option<F> {
    entry.filter(|e| e.tier == tier).map(|e| e.function)
}

fn bound<F>(function: Option<F>) -> F {
    match function {
        Some(f) => f,
        None => panic!("invoke called with no kernel bound"),
    }
}

fn rng_for(seed: u64, index: usize) -> StdRng {
    StdRng::seed_from_u64(seed.wrapping_add(index as u64))
}

fn block_label(operation: Operation, key: KernelKey) -> String {
    let n = key.block_size();
    format!("{} {}x{}", operation, n, n)
}

/// Copy an `n x n` region at `stride` into a packed vector.
fn packed_region(buf: &[u8], stride: usize, n: usize) -> Vec<u8> {
    (0..n).flat_map(|y| buf[y * stride..y * stride + n].iter().copied()).collect()
}

// ============================================================================
// DC intra prediction
// ============================================================================

/// DC intra prediction over a random neighbour border.
pub struct PredIntraScenario {
    key: KernelKey,
    neighbours: Box<Neighbours>,
    dst: AlignedBuf<u8, MAX_BLOCK_SAMPLES>,
    function: Option<PredIntraFn>,
}

impl PredIntraScenario {
    /// Scenario with explicit neighbours.
    pub fn new(key: KernelKey, neighbours: Neighbours) -> Result<Self> {
        Ok(Self {
            key,
            neighbours: Box::new(neighbours),
            dst: AlignedBuf::try_new(PIXEL_SENTINEL)?,
            function: None,
        })
    }

    /// Scenario with neighbours drawn from `rng`.
    pub fn random(key: KernelKey, rng: &mut StdRng) -> Result<Self> {
        let mut neighbours = Neighbours::filled(0);
        rng.fill(&mut neighbours.as_mut_slice()[..]);
        Self::new(key, neighbours)
    }

    /// Chroma at every size without edge filtering, then luma below 32x32
    /// with edge filtering.
    pub fn configurations(seed: u64) -> Result<Vec<Self>> {
        let keys = (2..=5)
            .map(|k| KernelKey::intra(Channel::Chroma, k))
            .chain((2..=4).map(|k| KernelKey::intra(Channel::Luma, k)));
        keys.enumerate()
            .map(|(i, key)| Self::random(key, &mut rng_for(seed, i)))
            .collect()
    }
}

impl Scenario for PredIntraScenario {
    fn operation(&self) -> Operation {
        Operation::PredIntraDc
    }

    fn label(&self) -> String {
        format!("{} {}", Operation::PredIntraDc, self.key)
    }

    fn bind(&mut self, table: &KernelTable, tier: Tier) -> bool {
        self.function = resolve(table.pred_intra_dc(self.key), tier);
        self.function.is_some()
    }

    fn reset(&mut self) {
        self.dst.fill(PIXEL_SENTINEL);
    }

    fn invoke(&mut self, count: u32) {
        let f = bound(self.function);
        let n = self.key.block_size();
        for _ in 0..count {
            f(&mut self.dst[..n * n], &self.neighbours, self.key);
        }
    }

    fn capture(&self) -> Snapshot {
        let n = self.key.block_size();
        Snapshot {
            pixels: self.dst[..n * n].to_vec(),
            ..Snapshot::default()
        }
    }
}

// ============================================================================
// Forward quantization
// ============================================================================

/// Forward quantization of a random coefficient block.
pub struct QuantizeScenario {
    key: KernelKey,
    params: QuantizeParams,
    src: AlignedBuf<i16, MAX_BLOCK_SAMPLES>,
    dst: AlignedBuf<i16, MAX_BLOCK_SAMPLES>,
    cbf: bool,
    function: Option<QuantizeFn>,
}

impl QuantizeScenario {
    /// Scenario with explicit input; `src` must hold `n * n` values.
    pub fn new(key: KernelKey, params: QuantizeParams, src: &[i16]) -> Result<Self> {
        let n = key.block_size();
        if src.len() != n * n {
            return Err(Error::BufferSizeMismatch {
                expected: n * n,
                actual: src.len(),
            });
        }
        let mut buf: AlignedBuf<i16, MAX_BLOCK_SAMPLES> = AlignedBuf::try_new(0)?;
        buf[..n * n].copy_from_slice(src);
        Ok(Self {
            key,
            params,
            src: buf,
            dst: AlignedBuf::try_new(COEFF_SENTINEL)?,
            cbf: false,
            function: None,
        })
    }

    /// Every size with scale 51, shift 20 and offset 14.
    pub fn configurations(seed: u64) -> Result<Vec<Self>> {
        let params = QuantizeParams::new(51, 20, 14);
        (2..=5)
            .enumerate()
            .map(|(i, k)| {
                let key = KernelKey::size(k);
                let n = key.block_size();
                let mut rng = rng_for(seed, i);
                let src: Vec<i16> = (0..n * n).map(|_| rng.gen()).collect();
                Self::new(key, params, &src)
            })
            .collect()
    }
}

impl Scenario for QuantizeScenario {
    fn operation(&self) -> Operation {
        Operation::Quantize
    }

    fn label(&self) -> String {
        block_label(Operation::Quantize, self.key)
    }

    fn bind(&mut self, table: &KernelTable, tier: Tier) -> bool {
        self.function = resolve(table.quantize(self.key), tier);
        self.function.is_some()
    }

    fn reset(&mut self) {
        self.dst.fill(COEFF_SENTINEL);
        self.cbf = false;
    }

    fn invoke(&mut self, count: u32) {
        let f = bound(self.function);
        let len = self.key.block_size() * self.key.block_size();
        for _ in 0..count {
            self.cbf = f(&mut self.dst[..len], &self.src[..len], self.params);
        }
    }

    fn capture(&self) -> Snapshot {
        let len = self.key.block_size() * self.key.block_size();
        Snapshot {
            coeffs: self.dst[..len].to_vec(),
            cbf: Some(self.cbf),
            ..Snapshot::default()
        }
    }
}

// ============================================================================
// Inverse quantization
// ============================================================================

/// Inverse quantization of a random level block.
pub struct QuantizeInverseScenario {
    key: KernelKey,
    params: DequantizeParams,
    src: AlignedBuf<i16, MAX_BLOCK_SAMPLES>,
    dst: AlignedBuf<i16, MAX_BLOCK_SAMPLES>,
    function: Option<QuantizeInverseFn>,
}

impl QuantizeInverseScenario {
    /// Scenario with explicit input; `src` must hold `n * n` values.
    pub fn new(key: KernelKey, params: DequantizeParams, src: &[i16]) -> Result<Self> {
        let n = key.block_size();
        if src.len() != n * n {
            return Err(Error::BufferSizeMismatch {
                expected: n * n,
                actual: src.len(),
            });
        }
        let mut buf: AlignedBuf<i16, MAX_BLOCK_SAMPLES> = AlignedBuf::try_new(0)?;
        buf[..n * n].copy_from_slice(src);
        Ok(Self {
            key,
            params,
            src: buf,
            dst: AlignedBuf::try_new(COEFF_SENTINEL)?,
            function: None,
        })
    }

    /// Every size with scale 51 and shift 14, levels in `[-256, -1]`.
    pub fn configurations(seed: u64) -> Result<Vec<Self>> {
        let params = DequantizeParams::new(51, 14);
        (2..=5)
            .enumerate()
            .map(|(i, k)| {
                let key = KernelKey::size(k);
                let n = key.block_size();
                let mut rng = rng_for(seed, i);
                let src: Vec<i16> = (0..n * n).map(|_| (rng.gen::<u8>() as i16) - 0x100).collect();
                Self::new(key, params, &src)
            })
            .collect()
    }
}

impl Scenario for QuantizeInverseScenario {
    fn operation(&self) -> Operation {
        Operation::QuantizeInverse
    }

    fn label(&self) -> String {
        block_label(Operation::QuantizeInverse, self.key)
    }

    fn bind(&mut self, table: &KernelTable, tier: Tier) -> bool {
        self.function = resolve(table.quantize_inverse(self.key), tier);
        self.function.is_some()
    }

    fn reset(&mut self) {
        self.dst.fill(COEFF_SENTINEL);
    }

    fn invoke(&mut self, count: u32) {
        let f = bound(self.function);
        let len = self.key.block_size() * self.key.block_size();
        for _ in 0..count {
            f(&mut self.dst[..len], &self.src[..len], self.params);
        }
    }

    fn capture(&self) -> Snapshot {
        let len = self.key.block_size() * self.key.block_size();
        Snapshot {
            coeffs: self.dst[..len].to_vec(),
            ..Snapshot::default()
        }
    }
}

// ============================================================================
// Reconstruction
// ============================================================================

/// Prediction plus random residual, both pixel buffers at stride 32.
pub struct ReconstructScenario {
    key: KernelKey,
    pred: AlignedBuf<u8, MAX_BLOCK_SAMPLES>,
    residual: AlignedBuf<i16, MAX_BLOCK_SAMPLES>,
    dst: AlignedBuf<u8, MAX_BLOCK_SAMPLES>,
    function: Option<ReconstructFn>,
}

impl ReconstructScenario {
    /// Scenario with a random prediction and residual in `[-256, 255]`.
    pub fn random(key: KernelKey, rng: &mut StdRng) -> Result<Self> {
        let mut pred: AlignedBuf<u8, MAX_BLOCK_SAMPLES> = AlignedBuf::try_new(0)?;
        rng.fill(pred.as_mut_slice());
        let mut residual: AlignedBuf<i16, MAX_BLOCK_SAMPLES> = AlignedBuf::try_new(0)?;
        for r in residual.iter_mut() {
            *r = rng.gen_range(-0x100..0x100);
        }
        Ok(Self {
            key,
            pred,
            residual,
            dst: AlignedBuf::try_new(PIXEL_SENTINEL)?,
            function: None,
        })
    }

    /// Every size.
    pub fn configurations(seed: u64) -> Result<Vec<Self>> {
        (2..=5)
            .enumerate()
            .map(|(i, k)| Self::random(KernelKey::size(k), &mut rng_for(seed, i)))
            .collect()
    }
}

impl Scenario for ReconstructScenario {
    fn operation(&self) -> Operation {
        Operation::Reconstruct
    }

    fn label(&self) -> String {
        block_label(Operation::Reconstruct, self.key)
    }

    fn bind(&mut self, table: &KernelTable, tier: Tier) -> bool {
        self.function = resolve(table.reconstruct(self.key), tier);
        self.function.is_some()
    }

    fn reset(&mut self) {
        self.dst.fill(PIXEL_SENTINEL);
    }

    fn invoke(&mut self, count: u32) {
        let f = bound(self.function);
        let n = self.key.block_size();
        for _ in 0..count {
            f(&mut self.dst, SCENARIO_STRIDE, &self.pred, SCENARIO_STRIDE, &self.residual[..n * n], n);
        }
    }

    fn capture(&self) -> Snapshot {
        Snapshot {
            pixels: packed_region(&self.dst, SCENARIO_STRIDE, self.key.block_size()),
            ..Snapshot::default()
        }
    }
}

// ============================================================================
// Inverse transforms
// ============================================================================

struct TransformBlock {
    key: KernelKey,
    coeffs: AlignedBuf<i16, MAX_BLOCK_SAMPLES>,
    pred: AlignedBuf<u8, MAX_BLOCK_SAMPLES>,
    dst: AlignedBuf<u8, MAX_BLOCK_SAMPLES>,
    function: Option<InverseTransformAddFn>,
}

impl TransformBlock {
    fn new(key: KernelKey, coeffs: &[i16], pred: &[u8]) -> Result<Self> {
        let n = key.block_size();
        if coeffs.len() != n * n {
            return Err(Error::BufferSizeMismatch {
                expected: n * n,
                actual: coeffs.len(),
            });
        }
        if pred.len() != n * n {
            return Err(Error::BufferSizeMismatch {
                expected: n * n,
                actual: pred.len(),
            });
        }
        let mut coeff_buf: AlignedBuf<i16, MAX_BLOCK_SAMPLES> = AlignedBuf::try_new(0)?;
        coeff_buf[..n * n].copy_from_slice(coeffs);
        let mut pred_buf: AlignedBuf<u8, MAX_BLOCK_SAMPLES> = AlignedBuf::try_new(0)?;
        for y in 0..n {
            pred_buf[y * SCENARIO_STRIDE..y * SCENARIO_STRIDE + n].copy_from_slice(&pred[y * n..(y + 1) * n]);
        }
        Ok(Self {
            key,
            coeffs: coeff_buf,
            pred: pred_buf,
            dst: AlignedBuf::try_new(PIXEL_SENTINEL)?,
            function: None,
        })
    }

    fn random(key: KernelKey, rng: &mut StdRng) -> Result<Self> {
        let n = key.block_size();
        let coeffs: Vec<i16> = (0..n * n).map(|_| rng.gen_range(-0x100..0x100)).collect();
        let pred: Vec<u8> = (0..n * n).map(|_| rng.gen()).collect();
        Self::new(key, &coeffs, &pred)
    }

    fn invoke(&mut self, count: u32) {
        let f = bound(self.function);
        let n = self.key.block_size();
        for _ in 0..count {
            f(&mut self.dst, SCENARIO_STRIDE, &self.pred, SCENARIO_STRIDE, &self.coeffs[..n * n]);
        }
    }

    fn capture(&self) -> Snapshot {
        Snapshot {
            pixels: packed_region(&self.dst, SCENARIO_STRIDE, self.key.block_size()),
            ..Snapshot::default()
        }
    }
}

/// Inverse DCT of a random coefficient block added to a random prediction.
pub struct InverseTransformScenario(TransformBlock);

impl InverseTransformScenario {
    /// Scenario with explicit `n * n` coefficients and packed prediction.
    pub fn new(key: KernelKey, coeffs: &[i16], pred: &[u8]) -> Result<Self> {
        TransformBlock::new(key, coeffs, pred).map(Self)
    }

    /// Every size, coefficients in `[-256, 255]`.
    pub fn configurations(seed: u64) -> Result<Vec<Self>> {
        (2..=5)
            .enumerate()
            .map(|(i, k)| TransformBlock::random(KernelKey::size(k), &mut rng_for(seed, i)).map(Self))
            .collect()
    }
}

impl Scenario for InverseTransformScenario {
    fn operation(&self) -> Operation {
        Operation::InverseTransformAdd
    }

    fn label(&self) -> String {
        block_label(Operation::InverseTransformAdd, self.0.key)
    }

    fn bind(&mut self, table: &KernelTable, tier: Tier) -> bool {
        self.0.function = resolve(table.inverse_transform_add(self.0.key), tier);
        self.0.function.is_some()
    }

    fn reset(&mut self) {
        self.0.dst.fill(PIXEL_SENTINEL);
    }

    fn invoke(&mut self, count: u32) {
        self.0.invoke(count);
    }

    fn capture(&self) -> Snapshot {
        self.0.capture()
    }
}

/// 4x4 inverse DST of a random coefficient block added to a random
/// prediction.
pub struct InverseDstScenario(TransformBlock);

impl InverseDstScenario {
    /// Scenario with explicit 16 coefficients and packed 4x4 prediction.
    pub fn new(coeffs: &[i16], pred: &[u8]) -> Result<Self> {
        TransformBlock::new(KernelKey::size(2), coeffs, pred).map(Self)
    }

    /// The single 4x4 configuration.
    pub fn configurations(seed: u64) -> Result<Vec<Self>> {
        let block = TransformBlock::random(KernelKey::size(2), &mut rng_for(seed, 0))?;
        Ok(vec![Self(block)])
    }
}

impl Scenario for InverseDstScenario {
    fn operation(&self) -> Operation {
        Operation::InverseDstAdd
    }

    fn label(&self) -> String {
        block_label(Operation::InverseDstAdd, self.0.key)
    }

    fn bind(&mut self, table: &KernelTable, tier: Tier) -> bool {
        self.0.function = resolve(table.inverse_dst_add(self.0.key), tier);
        self.0.function.is_some()
    }

    fn reset(&mut self) {
        self.0.dst.fill(PIXEL_SENTINEL);
    }

    fn invoke(&mut self, count: u32) {
        self.0.invoke(count);
    }

    fn capture(&self) -> Snapshot {
        self.0.capture()
    }
}

/// The standard sweep of `operation`, boxed for the harness.
pub fn configurations(operation: Operation, seed: u64) -> Result<Vec<Box<dyn Scenario>>> {
    fn boxed<S: Scenario + 'static>(v: Vec<S>) -> Vec<Box<dyn Scenario>> {
        v.into_iter().map(|s| Box::new(s) as Box<dyn Scenario>).collect()
    }

    Ok(match operation {
        Operation::PredIntraDc => boxed(PredIntraScenario::configurations(seed)?),
        Operation::Quantize => boxed(QuantizeScenario::configurations(seed)?),
        Operation::QuantizeInverse => boxed(QuantizeInverseScenario::configurations(seed)?),
        Operation::Reconstruct => boxed(ReconstructScenario::configurations(seed)?),
        Operation::InverseTransformAdd => boxed(InverseTransformScenario::configurations(seed)?),
        Operation::InverseDstAdd => boxed(InverseDstScenario::configurations(seed)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simd::TierMask;

    #[test]
    fn test_standard_sweep_sizes() {
        let counts: Vec<usize> = Operation::ALL
            .iter()
            .map(|&op| configurations(op, 1).unwrap().len())
            .collect();
        assert_eq!(counts, vec![7, 4, 4, 4, 4, 1]);
    }

    #[test]
    fn test_configurations_are_seeded() {
        let table = KernelTable::build(TierMask::REFERENCE);
        let run = |seed| {
            let mut s = QuantizeScenario::configurations(seed).unwrap().remove(1);
            assert!(s.bind(&table, Tier::Reference));
            s.reset();
            s.invoke(1);
            s.capture()
        };
        assert_eq!(run(3), run(3));
        assert_ne!(run(3), run(4));
    }

    #[test]
    fn test_bind_rejects_other_tiers() {
        let table = KernelTable::build(TierMask::REFERENCE);
        let mut s = ReconstructScenario::configurations(0).unwrap().remove(0);
        assert!(!s.bind(&table, Tier::Optimized));
        assert!(s.bind(&table, Tier::Reference));
    }

    #[test]
    fn test_reset_writes_sentinel() {
        let table = KernelTable::build(TierMask::REFERENCE);
        let mut s = PredIntraScenario::new(KernelKey::intra(Channel::Chroma, 2), Neighbours::filled(100)).unwrap();
        assert!(s.bind(&table, Tier::Reference));
        s.invoke(1);
        assert_eq!(s.capture().pixels, vec![100u8; 16]);
        s.reset();
        assert_eq!(s.capture().pixels, vec![PIXEL_SENTINEL; 16]);
    }

    #[test]
    fn test_capture_ignores_stride_padding() {
        let table = KernelTable::build(TierMask::REFERENCE);
        let mut s = ReconstructScenario::configurations(9).unwrap().remove(1);
        assert!(s.bind(&table, Tier::Reference));
        s.reset();
        s.invoke(1);
        let reference = s.capture();
        assert_eq!(reference.pixels.len(), 64);

        // Padding beyond the 8x8 block does not count as a mismatch
        s.dst[8] = 0;
        assert!(!s.mismatch(&reference));
        s.dst[SCENARIO_STRIDE] ^= 1;
        assert!(s.mismatch(&reference));
    }

    #[test]
    fn test_quantize_mismatch_includes_cbf() {
        let table = KernelTable::build(TierMask::REFERENCE);
        let mut s = QuantizeScenario::new(KernelKey::size(2), QuantizeParams::new(51, 20, 14), &[0; 16]).unwrap();
        assert!(s.bind(&table, Tier::Reference));
        s.reset();
        s.invoke(1);
        let mut reference = s.capture();
        assert_eq!(reference.cbf, Some(false));
        reference.cbf = Some(true);
        assert!(s.mismatch(&reference));
    }

    #[test]
    fn test_explicit_input_size_checked() {
        let err = QuantizeScenario::new(KernelKey::size(3), QuantizeParams::new(51, 20, 14), &[0; 16]);
        assert_eq!(
            err.err(),
            Some(Error::BufferSizeMismatch {
                expected: 64,
                actual: 16
            })
        );
    }
}

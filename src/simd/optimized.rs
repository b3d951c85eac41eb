//! Portable optimized tier.
//!
//! Two techniques, both architecture-independent:
//! - `wide` 8-lane vectors for the element-wise quantization kernels
//! - `multiversion` function cloning so the compiler autovectorizes the
//!   prediction, reconstruction and transform loops for AVX2, SSE4.1 and
//!   NEON, with runtime selection of the best clone
//!
//! The transform is computed as a direct matrix product rather than a
//! butterfly. Partial sums are exact in 32 bits, so the result is
//! bit-identical to the reference.

use multiversion::multiversion;
use wide::i32x8;

use crate::consts::{
    DCT_MATRIX_32, DST_MATRIX_4, FIRST_PASS_SHIFT, MAX_BLOCK_SAMPLES, MAX_BLOCK_SIZE,
    MAX_SAMPLE_VALUE, SECOND_PASS_SHIFT,
};
use crate::dispatch::{KernelProvider, TableBuilder};
use crate::key::{KernelKey, KeyParams};
use crate::simd::{scalar, InverseTransformAddFn, Tier};
use crate::types::{Channel, DequantizeParams, Neighbours, QuantizeParams};

/// DST-VII basis padded to the DCT row width, so both transforms share one
/// matrix-product kernel.
const DST_BASIS: [[i16; MAX_BLOCK_SIZE]; 4] = {
    let mut basis = [[0i16; MAX_BLOCK_SIZE]; 4];
    let mut r = 0;
    while r < 4 {
        let mut k = 0;
        while k < 4 {
            basis[r][k] = DST_MATRIX_4[r][k];
            k += 1;
        }
        r += 1;
    }
    basis
};

#[inline(always)]
fn load_i16x8(s: &[i16]) -> i32x8 {
    i32x8::new(std::array::from_fn(|i| s[i] as i32))
}

/// Saturate to i16 and store eight lanes.
#[inline(always)]
fn store_i16x8(v: i32x8, d: &mut [i16]) {
    let v = v
        .max(i32x8::splat(i16::MIN as i32))
        .min(i32x8::splat(i16::MAX as i32));
    for (d, v) in d.iter_mut().zip(v.to_array()) {
        *d = v as i16;
    }
}

// ============================================================================
// Intra prediction
// ============================================================================

/// DC intra prediction.
#[multiversion(targets(
    "x86_64+avx2",
    "x86_64+sse4.1",
    "x86+avx2",
    "x86+sse4.1",
    "aarch64+neon",
))]
pub fn pred_intra_dc(dst: &mut [u8], neighbours: &Neighbours, key: KernelKey) {
    let n = key.block_size();
    let log2_size = key.log2_size();
    assert!(dst.len() >= n * n, "prediction buffer too small");

    let border = neighbours.as_slice();
    let centre = crate::types::NEIGHBOUR_CORNER;
    let top = &border[centre + 1..centre + 1 + n];
    let left = &border[centre - n..centre];

    let sum: u32 = top.iter().chain(left).map(|&v| v as u32).sum();
    let dc = ((sum + n as u32) >> (log2_size + 1)) as u8;

    dst[..n * n].fill(dc);

    if key.edge_filter() {
        assert!(n < MAX_BLOCK_SIZE, "edge filtering requires a block smaller than 32x32");
        let dc3 = 3 * dc as u16 + 2;
        for (d, &t) in dst[1..n].iter_mut().zip(&top[1..]) {
            *d = ((t as u16 + dc3) >> 2) as u8;
        }
        for y in 1..n {
            dst[y * n] = ((neighbours.left(y) as u16 + dc3) >> 2) as u8;
        }
        dst[0] = ((neighbours.left(0) as u16 + 2 * dc as u16 + top[0] as u16 + 2) >> 2) as u8;
    }
}

// ============================================================================
// Quantization
// ============================================================================

/// Forward quantization, eight coefficients per step.
///
/// Exact in 32 bits: `|src| <= 0x8000`, `scale < 0x8000` and the scaled
/// offset is below `1 << 26`, so the product plus offset stays below
/// `1 << 31`.
pub fn quantize(dst: &mut [i16], src: &[i16], params: QuantizeParams) -> bool {
    assert_eq!(dst.len(), src.len(), "quantize buffers differ in length");

    let scale = i32x8::splat(params.scale());
    let offset = i32x8::splat(params.scaled_offset());
    let shift = params.shift();

    let mut nonzero = i32x8::splat(0);
    let mut src_chunks = src.chunks_exact(8);
    let mut dst_chunks = dst.chunks_exact_mut(8);

    for (d, s) in (&mut dst_chunks).zip(&mut src_chunks) {
        let x = load_i16x8(s);
        let magnitude = (x.abs() * scale + offset) >> shift;
        let sign = (x >> 31) | i32x8::splat(1);
        let q = magnitude * sign;
        nonzero = nonzero | q;
        store_i16x8(q, d);
    }

    let mut cbf = nonzero.to_array().iter().any(|&v| v != 0);
    cbf |= scalar::quantize(dst_chunks.into_remainder(), src_chunks.remainder(), params);
    cbf
}

/// Inverse quantization, eight levels per step.
pub fn quantize_inverse(dst: &mut [i16], src: &[i16], params: DequantizeParams) {
    assert_eq!(dst.len(), src.len(), "dequantize buffers differ in length");

    let scale = i32x8::splat(params.scale());
    let rounding = i32x8::splat(params.rounding());
    let shift = params.shift();

    let mut src_chunks = src.chunks_exact(8);
    let mut dst_chunks = dst.chunks_exact_mut(8);

    for (d, s) in (&mut dst_chunks).zip(&mut src_chunks) {
        let v = (load_i16x8(s) * scale + rounding) >> shift;
        store_i16x8(v, d);
    }

    scalar::quantize_inverse(dst_chunks.into_remainder(), src_chunks.remainder(), params);
}

// ============================================================================
// Reconstruction
// ============================================================================

/// `dst = clip(pred + residual)`, row at a time.
#[multiversion(targets(
    "x86_64+avx2",
    "x86_64+sse4.1",
    "x86+avx2",
    "x86+sse4.1",
    "aarch64+neon",
))]
pub fn reconstruct(
    dst: &mut [u8],
    dst_stride: usize,
    pred: &[u8],
    pred_stride: usize,
    residual: &[i16],
    n: usize,
) {
    for y in 0..n {
        let d = &mut dst[y * dst_stride..y * dst_stride + n];
        let p = &pred[y * pred_stride..y * pred_stride + n];
        let r = &residual[y * n..y * n + n];
        for ((d, &p), &r) in d.iter_mut().zip(p).zip(r) {
            *d = (p as i32 + r as i32).clamp(0, MAX_SAMPLE_VALUE) as u8;
        }
    }
}

// ============================================================================
// Inverse transform
// ============================================================================

/// One inverse stage as a matrix product. Row `r` of the `n`-point basis is
/// `basis[r * step]`. Column `j` of `src` lands in row `j` of `dst`.
#[multiversion(targets(
    "x86_64+avx2",
    "x86_64+sse4.1",
    "x86+avx2",
    "x86+sse4.1",
    "aarch64+neon",
))]
fn inverse_pass(
    dst: &mut [i16],
    src: &[i16],
    basis: &[[i16; MAX_BLOCK_SIZE]],
    step: usize,
    n: usize,
    shift: i32,
) {
    let add = 1 << (shift - 1);
    let mut acc = [0i32; MAX_BLOCK_SIZE];

    for j in 0..n {
        let acc = &mut acc[..n];
        acc.fill(add);
        for r in 0..n {
            let c = src[r * n + j] as i32;
            if c == 0 {
                continue;
            }
            for (a, &b) in acc.iter_mut().zip(&basis[r * step][..n]) {
                *a += b as i32 * c;
            }
        }
        for (d, &a) in dst[j * n..(j + 1) * n].iter_mut().zip(acc.iter()) {
            *d = (a >> shift).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        }
    }
}

#[inline(always)]
fn transform_add(
    dst: &mut [u8],
    dst_stride: usize,
    pred: &[u8],
    pred_stride: usize,
    coeffs: &[i16],
    basis: &[[i16; MAX_BLOCK_SIZE]],
    n: usize,
) {
    assert_eq!(coeffs.len(), n * n, "coefficient block size mismatch");
    let step = basis.len() / n;

    let mut first = [0i16; MAX_BLOCK_SAMPLES];
    let mut second = [0i16; MAX_BLOCK_SAMPLES];
    inverse_pass(&mut first, coeffs, basis, step, n, FIRST_PASS_SHIFT);
    inverse_pass(&mut second, &first, basis, step, n, SECOND_PASS_SHIFT);
    reconstruct(dst, dst_stride, pred, pred_stride, &second[..n * n], n);
}

/// 4x4 inverse DCT plus add-residual.
pub fn inverse_transform_add_4x4(d: &mut [u8], ds: usize, p: &[u8], ps: usize, c: &[i16]) {
    transform_add(d, ds, p, ps, c, &DCT_MATRIX_32, 4);
}

/// 8x8 inverse DCT plus add-residual.
pub fn inverse_transform_add_8x8(d: &mut [u8], ds: usize, p: &[u8], ps: usize, c: &[i16]) {
    transform_add(d, ds, p, ps, c, &DCT_MATRIX_32, 8);
}

/// 16x16 inverse DCT plus add-residual.
pub fn inverse_transform_add_16x16(d: &mut [u8], ds: usize, p: &[u8], ps: usize, c: &[i16]) {
    transform_add(d, ds, p, ps, c, &DCT_MATRIX_32, 16);
}

/// 32x32 inverse DCT plus add-residual.
pub fn inverse_transform_add_32x32(d: &mut [u8], ds: usize, p: &[u8], ps: usize, c: &[i16]) {
    transform_add(d, ds, p, ps, c, &DCT_MATRIX_32, 32);
}

/// 4x4 inverse DST plus add-residual.
pub fn inverse_dst_add(d: &mut [u8], ds: usize, p: &[u8], ps: usize, c: &[i16]) {
    transform_add(d, ds, p, ps, c, &DST_BASIS, 4);
}

/// Inverse DCT kernels indexed by `log2_size - 2`.
pub const INVERSE_TRANSFORM_ADD: [InverseTransformAddFn; 4] = [
    inverse_transform_add_4x4,
    inverse_transform_add_8x8,
    inverse_transform_add_16x16,
    inverse_transform_add_32x32,
];

// ============================================================================
// Provider
// ============================================================================

/// Installs the portable optimized kernels for every key.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimizedProvider;

impl KernelProvider for OptimizedProvider {
    fn tier(&self) -> Tier {
        Tier::Optimized
    }

    fn populate(&self, table: &mut TableBuilder) {
        for k in 2..=5u8 {
            let key = KernelKey::size(k);
            table.set_quantize(key, quantize);
            table.set_quantize_inverse(key, quantize_inverse);
            table.set_reconstruct(key, reconstruct);
            table.set_inverse_transform_add(key, INVERSE_TRANSFORM_ADD[(k - 2) as usize]);
            for channel in [Channel::Luma, Channel::Chroma] {
                table.set_pred_intra_dc(KernelKey::pack(KeyParams::intra(channel, k)), pred_intra_dc);
            }
        }
        table.set_inverse_dst_add(KernelKey::size(2), inverse_dst_add);
    }
}

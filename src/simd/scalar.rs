//! Scalar (non-SIMD) reference implementations.
//!
//! These implementations are:
//! - **Correct**: bit-exact with the arithmetic the HEVC standard specifies
//! - **Portable**: work on any platform without SIMD support
//! - **Testable**: every optimized tier is compared against them
//!
//! All other tiers must produce bit-exact results compared to these.

use crate::consts::{
    DCT_MATRIX_32, DCT_MATRIX_8, DST_MATRIX_4, FIRST_PASS_SHIFT, MAX_BLOCK_SIZE,
    MAX_SAMPLE_VALUE, SECOND_PASS_SHIFT,
};
use crate::key::KernelKey;
use crate::types::{DequantizeParams, Neighbours, QuantizeParams};

#[inline]
fn clip_i16(x: i32) -> i16 {
    x.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

#[inline]
fn clip_pixel(x: i32) -> u8 {
    x.clamp(0, MAX_SAMPLE_VALUE) as u8
}

// ============================================================================
// Intra prediction
// ============================================================================

/// DC value: rounded mean of the `n` samples above and `n` samples left of
/// the block, corner excluded.
#[inline]
pub fn dc_value(neighbours: &Neighbours, log2_size: u8) -> i32 {
    let n = 1usize << log2_size;
    let mut sum = n as i32;
    for i in 0..n {
        sum += neighbours.top(i) as i32 + neighbours.left(i) as i32;
    }
    sum >> (log2_size + 1)
}

/// DC intra prediction with optional edge filtering.
pub fn pred_intra_dc(dst: &mut [u8], neighbours: &Neighbours, key: KernelKey) {
    let n = key.block_size();
    assert!(dst.len() >= n * n, "prediction buffer too small");

    let dc = dc_value(neighbours, key.log2_size());

    let mut start = 0;
    if key.edge_filter() {
        assert!(n < MAX_BLOCK_SIZE, "edge filtering requires a block smaller than 32x32");
        start = 1;

        dst[0] = ((neighbours.left(0) as i32 + 2 * dc + neighbours.top(0) as i32 + 2) >> 2) as u8;
        for x in 1..n {
            dst[x] = ((neighbours.top(x) as i32 + 3 * dc + 2) >> 2) as u8;
        }
        for y in 1..n {
            dst[y * n] = ((neighbours.left(y) as i32 + 3 * dc + 2) >> 2) as u8;
        }
    }

    for y in start..n {
        dst[y * n + start..(y + 1) * n].fill(dc as u8);
    }
}

// ============================================================================
// Quantization
// ============================================================================

/// Forward quantization. Returns true if any output coefficient is nonzero.
pub fn quantize(dst: &mut [i16], src: &[i16], params: QuantizeParams) -> bool {
    assert_eq!(dst.len(), src.len(), "quantize buffers differ in length");

    let scale = params.scale() as i64;
    let shift = params.shift();
    let offset = params.scaled_offset() as i64;

    let mut cbf = false;
    for (d, &s) in dst.iter_mut().zip(src) {
        let x = s as i64;
        let magnitude = (x.abs() * scale + offset) >> shift;
        let value = if x < 0 { -magnitude } else { magnitude };
        let q = value.clamp(i16::MIN as i64, i16::MAX as i64) as i16;
        cbf |= q != 0;
        *d = q;
    }
    cbf
}

/// Inverse quantization (scaling).
///
/// Computed in 64 bits. [`DequantizeParams`] guarantees the same result
/// fits the 32-bit arithmetic of the vector tiers.
pub fn quantize_inverse(dst: &mut [i16], src: &[i16], params: DequantizeParams) {
    assert_eq!(dst.len(), src.len(), "dequantize buffers differ in length");

    let scale = params.scale() as i64;
    let shift = params.shift();
    let rounding = params.rounding() as i64;

    for (d, &s) in dst.iter_mut().zip(src) {
        let v = (s as i64 * scale + rounding) >> shift;
        *d = v.clamp(i16::MIN as i64, i16::MAX as i64) as i16;
    }
}

// ============================================================================
// Reconstruction
// ============================================================================

/// `dst = clip(pred + residual)` over an `n x n` block.
pub fn reconstruct(
    dst: &mut [u8],
    dst_stride: usize,
    pred: &[u8],
    pred_stride: usize,
    residual: &[i16],
    n: usize,
) {
    for y in 0..n {
        for x in 0..n {
            dst[x + y * dst_stride] =
                clip_pixel(pred[x + y * pred_stride] as i32 + residual[x + y * n] as i32);
        }
    }
}

// ============================================================================
// Inverse transform
// ============================================================================

/// One 8-point inverse partial butterfly stage over all eight columns.
///
/// Column `j` of `src` is transformed and written to row `j` of `dst`, so
/// two stages produce a row-major result.
pub fn partial_butterfly_inverse_8(dst: &mut [i16; 64], src: &[i16; 64], shift: i32) {
    let m = &DCT_MATRIX_8;
    let add = 1 << (shift - 1);

    for j in 0..8 {
        let s = |r: usize| src[r * 8 + j] as i32;

        let mut o = [0i32; 4];
        for (k, ok) in o.iter_mut().enumerate() {
            *ok = m[1][k] as i32 * s(1)
                + m[3][k] as i32 * s(3)
                + m[5][k] as i32 * s(5)
                + m[7][k] as i32 * s(7);
        }

        let eo = [
            m[2][0] as i32 * s(2) + m[6][0] as i32 * s(6),
            m[2][1] as i32 * s(2) + m[6][1] as i32 * s(6),
        ];
        let ee = [
            m[0][0] as i32 * s(0) + m[4][0] as i32 * s(4),
            m[0][1] as i32 * s(0) + m[4][1] as i32 * s(4),
        ];

        let e = [ee[0] + eo[0], ee[1] + eo[1], ee[1] - eo[1], ee[0] - eo[0]];

        let row = &mut dst[j * 8..j * 8 + 8];
        for k in 0..4 {
            row[k] = clip_i16((e[k] + o[k] + add) >> shift);
            row[7 - k] = clip_i16((e[k] - o[k] + add) >> shift);
        }
    }
}

/// 1-D inverse transform of `coeffs` (length N, a power of two from 2 to
/// 32) by even/odd decomposition. The even half is the N/2-point inverse
/// of the even coefficients.
fn inverse_butterfly_1d(coeffs: &[i32], out: &mut [i32]) {
    let n = coeffs.len();
    let half = n / 2;
    let step = MAX_BLOCK_SIZE / n;

    let mut even_in = [0i32; MAX_BLOCK_SIZE / 2];
    let mut even_out = [0i32; MAX_BLOCK_SIZE / 2];
    for r in 0..half {
        even_in[r] = coeffs[2 * r];
    }
    if half == 1 {
        even_out[0] = DCT_MATRIX_32[0][0] as i32 * even_in[0];
    } else {
        inverse_butterfly_1d(&even_in[..half], &mut even_out[..half]);
    }

    for k in 0..half {
        let mut odd = 0i32;
        for r in (1..n).step_by(2) {
            odd += DCT_MATRIX_32[r * step][k] as i32 * coeffs[r];
        }
        out[k] = even_out[k] + odd;
        out[n - 1 - k] = even_out[k] - odd;
    }
}

/// One N-point inverse partial butterfly stage over all N columns, with the
/// same transposing output convention as [`partial_butterfly_inverse_8`].
pub fn partial_butterfly_inverse(dst: &mut [i16], src: &[i16], n: usize, shift: i32) {
    assert!(
        n.is_power_of_two() && (4..=MAX_BLOCK_SIZE).contains(&n),
        "unsupported transform size {}",
        n
    );
    assert!(src.len() >= n * n && dst.len() >= n * n, "transform buffer too small");

    let add = 1 << (shift - 1);
    let mut column = [0i32; MAX_BLOCK_SIZE];
    let mut out = [0i32; MAX_BLOCK_SIZE];

    for j in 0..n {
        for r in 0..n {
            column[r] = src[r * n + j] as i32;
        }
        inverse_butterfly_1d(&column[..n], &mut out[..n]);
        for (d, &v) in dst[j * n..(j + 1) * n].iter_mut().zip(&out[..n]) {
            *d = clip_i16((v + add) >> shift);
        }
    }
}

/// One 4-point inverse DST-VII stage, same output convention.
pub fn inverse_dst_4(dst: &mut [i16; 16], src: &[i16; 16], shift: i32) {
    let add = 1 << (shift - 1);
    for j in 0..4 {
        for k in 0..4 {
            let mut sum = 0i32;
            for r in 0..4 {
                sum += DST_MATRIX_4[r][k] as i32 * src[r * 4 + j] as i32;
            }
            dst[j * 4 + k] = clip_i16((sum + add) >> shift);
        }
    }
}

/// Add an `n x n` residual to the prediction, clamping to the sample range.
pub fn add_residual(
    dst: &mut [u8],
    dst_stride: usize,
    pred: &[u8],
    pred_stride: usize,
    residual: &[i16],
    n: usize,
) {
    reconstruct(dst, dst_stride, pred, pred_stride, residual, n);
}

/// Two-stage inverse DCT of an `N x N` coefficient block followed by
/// add-residual.
pub fn inverse_transform_add<const N: usize>(
    dst: &mut [u8],
    dst_stride: usize,
    pred: &[u8],
    pred_stride: usize,
    coeffs: &[i16],
) {
    assert_eq!(coeffs.len(), N * N, "coefficient block size mismatch");

    let mut temp = [[0i16; MAX_BLOCK_SIZE * MAX_BLOCK_SIZE]; 2];
    let (first, second) = temp.split_at_mut(1);
    partial_butterfly_inverse(&mut first[0], coeffs, N, FIRST_PASS_SHIFT);
    partial_butterfly_inverse(&mut second[0], &first[0], N, SECOND_PASS_SHIFT);
    add_residual(dst, dst_stride, pred, pred_stride, &second[0][..N * N], N);
}

/// Two-stage 8x8 inverse DCT followed by add-residual, using the explicit
/// 8-point butterfly.
pub fn inverse_transform_add_8x8(
    dst: &mut [u8],
    dst_stride: usize,
    pred: &[u8],
    pred_stride: usize,
    coeffs: &[i16],
) {
    assert_eq!(coeffs.len(), 64, "coefficient block size mismatch");
    let mut block = [0i16; 64];
    block.copy_from_slice(coeffs);

    let mut temp = [[0i16; 64]; 2];
    partial_butterfly_inverse_8(&mut temp[0], &block, FIRST_PASS_SHIFT);
    let first = temp[0];
    partial_butterfly_inverse_8(&mut temp[1], &first, SECOND_PASS_SHIFT);
    add_residual(dst, dst_stride, pred, pred_stride, &temp[1], 8);
}

/// Two-stage 4x4 inverse DST followed by add-residual.
pub fn inverse_dst_add(
    dst: &mut [u8],
    dst_stride: usize,
    pred: &[u8],
    pred_stride: usize,
    coeffs: &[i16],
) {
    assert_eq!(coeffs.len(), 16, "coefficient block size mismatch");
    let mut block = [0i16; 16];
    block.copy_from_slice(coeffs);

    let mut first = [0i16; 16];
    let mut second = [0i16; 16];
    inverse_dst_4(&mut first, &block, FIRST_PASS_SHIFT);
    inverse_dst_4(&mut second, &first, SECOND_PASS_SHIFT);
    add_residual(dst, dst_stride, pred, pred_stride, &second, 4);
}

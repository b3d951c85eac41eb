//! SSSE3 tier: 8x8 inverse DCT plus add-residual.
//!
//! Each pass computes all eight columns at once. Rows holding the same
//! butterfly term are interleaved so one `pmaddwd` produces two products
//! per 32-bit lane. A pass leaves its output transposed, so an 8x8 i16
//! transpose follows each pass. Prediction rows are widened to i16 with a
//! single `pshufb` before the saturating residual add.

#![allow(unsafe_code)]

use core::arch::x86_64::*;

use crate::consts::{DCT_MATRIX_8, FIRST_PASS_SHIFT, SECOND_PASS_SHIFT};

/// Broadcast an `(a, b)` coefficient pair for `pmaddwd` against rows
/// interleaved as `(row_a, row_b)`.
#[inline(always)]
unsafe fn pair(a: i16, b: i16) -> __m128i {
    _mm_set1_epi32(((b as u16 as i32) << 16) | a as u16 as i32)
}

#[inline(always)]
unsafe fn transpose_8x8(r: &mut [__m128i; 8]) {
    let a0 = _mm_unpacklo_epi16(r[0], r[1]);
    let a1 = _mm_unpackhi_epi16(r[0], r[1]);
    let a2 = _mm_unpacklo_epi16(r[2], r[3]);
    let a3 = _mm_unpackhi_epi16(r[2], r[3]);
    let a4 = _mm_unpacklo_epi16(r[4], r[5]);
    let a5 = _mm_unpackhi_epi16(r[4], r[5]);
    let a6 = _mm_unpacklo_epi16(r[6], r[7]);
    let a7 = _mm_unpackhi_epi16(r[6], r[7]);

    let b0 = _mm_unpacklo_epi32(a0, a2);
    let b1 = _mm_unpackhi_epi32(a0, a2);
    let b2 = _mm_unpacklo_epi32(a1, a3);
    let b3 = _mm_unpackhi_epi32(a1, a3);
    let b4 = _mm_unpacklo_epi32(a4, a6);
    let b5 = _mm_unpackhi_epi32(a4, a6);
    let b6 = _mm_unpacklo_epi32(a5, a7);
    let b7 = _mm_unpackhi_epi32(a5, a7);

    r[0] = _mm_unpacklo_epi64(b0, b4);
    r[1] = _mm_unpackhi_epi64(b0, b4);
    r[2] = _mm_unpacklo_epi64(b1, b5);
    r[3] = _mm_unpackhi_epi64(b1, b5);
    r[4] = _mm_unpacklo_epi64(b2, b6);
    r[5] = _mm_unpackhi_epi64(b2, b6);
    r[6] = _mm_unpacklo_epi64(b3, b7);
    r[7] = _mm_unpackhi_epi64(b3, b7);
}

/// Round, shift and saturate two i32x4 halves to one i16x8.
#[inline(always)]
unsafe fn descale(lo: __m128i, hi: __m128i, round: __m128i, count: __m128i) -> __m128i {
    let lo = _mm_sra_epi32(_mm_add_epi32(lo, round), count);
    let hi = _mm_sra_epi32(_mm_add_epi32(hi, round), count);
    _mm_packs_epi32(lo, hi)
}

/// One partial butterfly pass. Input row `r` holds coefficient `r` of all
/// eight columns; output vector `k` holds sample `k` of all eight columns.
#[inline(always)]
unsafe fn butterfly_pass(rows: &[__m128i; 8], shift: i32) -> [__m128i; 8] {
    let m = &DCT_MATRIX_8;
    let round = _mm_set1_epi32(1 << (shift - 1));
    let count = _mm_cvtsi32_si128(shift);

    let r13 = [_mm_unpacklo_epi16(rows[1], rows[3]), _mm_unpackhi_epi16(rows[1], rows[3])];
    let r57 = [_mm_unpacklo_epi16(rows[5], rows[7]), _mm_unpackhi_epi16(rows[5], rows[7])];
    let r26 = [_mm_unpacklo_epi16(rows[2], rows[6]), _mm_unpackhi_epi16(rows[2], rows[6])];
    let r04 = [_mm_unpacklo_epi16(rows[0], rows[4]), _mm_unpackhi_epi16(rows[0], rows[4])];

    let mut out = [_mm_setzero_si128(); 8];
    // h selects columns 0..4 (0) or 4..8 (1)
    let mut e = [[_mm_setzero_si128(); 2]; 4];
    let mut o = [[_mm_setzero_si128(); 2]; 4];

    for h in 0..2 {
        let eo0 = _mm_madd_epi16(r26[h], pair(m[2][0], m[6][0]));
        let eo1 = _mm_madd_epi16(r26[h], pair(m[2][1], m[6][1]));
        let ee0 = _mm_madd_epi16(r04[h], pair(m[0][0], m[4][0]));
        let ee1 = _mm_madd_epi16(r04[h], pair(m[0][1], m[4][1]));

        e[0][h] = _mm_add_epi32(ee0, eo0);
        e[1][h] = _mm_add_epi32(ee1, eo1);
        e[2][h] = _mm_sub_epi32(ee1, eo1);
        e[3][h] = _mm_sub_epi32(ee0, eo0);

        for k in 0..4 {
            o[k][h] = _mm_add_epi32(
                _mm_madd_epi16(r13[h], pair(m[1][k], m[3][k])),
                _mm_madd_epi16(r57[h], pair(m[5][k], m[7][k])),
            );
        }
    }

    for k in 0..4 {
        out[k] = descale(
            _mm_add_epi32(e[k][0], o[k][0]),
            _mm_add_epi32(e[k][1], o[k][1]),
            round,
            count,
        );
        out[7 - k] = descale(
            _mm_sub_epi32(e[k][0], o[k][0]),
            _mm_sub_epi32(e[k][1], o[k][1]),
            round,
            count,
        );
    }
    out
}

/// # Safety
/// Requires SSSE3. `coeffs` must hold 64 values; `dst` and `pred` must
/// cover eight rows of eight samples at their strides.
#[target_feature(enable = "ssse3")]
unsafe fn inverse_transform_add_8x8_ssse3(
    dst: &mut [u8],
    dst_stride: usize,
    pred: &[u8],
    pred_stride: usize,
    coeffs: &[i16],
) {
    let mut rows = [_mm_setzero_si128(); 8];
    for (r, row) in rows.iter_mut().enumerate() {
        *row = _mm_loadu_si128(coeffs.as_ptr().add(r * 8) as *const __m128i);
    }

    let mut rows = butterfly_pass(&rows, FIRST_PASS_SHIFT);
    transpose_8x8(&mut rows);
    let mut rows = butterfly_pass(&rows, SECOND_PASS_SHIFT);
    transpose_8x8(&mut rows);

    // Byte i of the low half moves to lane i; -1 indices zero the high bytes
    let widen = _mm_setr_epi8(0, -1, 1, -1, 2, -1, 3, -1, 4, -1, 5, -1, 6, -1, 7, -1);
    for (y, &residual) in rows.iter().enumerate() {
        let p = _mm_loadl_epi64(pred.as_ptr().add(y * pred_stride) as *const __m128i);
        let sum = _mm_adds_epi16(_mm_shuffle_epi8(p, widen), residual);
        _mm_storel_epi64(
            dst.as_mut_ptr().add(y * dst_stride) as *mut __m128i,
            _mm_packus_epi16(sum, sum),
        );
    }
}

/// Safe wrapper for the SSSE3 8x8 inverse transform that can be used as a
/// function pointer.
///
/// # Panics
/// If the buffers are too small for an 8x8 block at the given strides.
pub fn inverse_transform_add_8x8(
    dst: &mut [u8],
    dst_stride: usize,
    pred: &[u8],
    pred_stride: usize,
    coeffs: &[i16],
) {
    assert_eq!(coeffs.len(), 64, "coefficient block size mismatch");
    assert!(dst_stride >= 8 && dst.len() >= 7 * dst_stride + 8, "destination too small");
    assert!(pred_stride >= 8 && pred.len() >= 7 * pred_stride + 8, "prediction too small");
    // SAFETY: bounds checked above; the table only installs this entry
    // when the SSSE3 tier is in the mask.
    unsafe { inverse_transform_add_8x8_ssse3(dst, dst_stride, pred, pred_stride, coeffs) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simd::scalar;

    #[test]
    fn test_ssse3_idct_matches_scalar() {
        if !is_x86_feature_detected!("ssse3") {
            return;
        }
        for seed in 0..20i32 {
            let coeffs: Vec<i16> = (0..64)
                .map(|i| ((i * (seed * 37 + 13) + seed * 7) % 512 - 256) as i16)
                .collect();
            let pred: Vec<u8> = (0..32 * 8).map(|i| (i * 7 + seed as usize) as u8).collect();

            let mut expected = vec![0u8; 32 * 8];
            let mut actual = vec![0u8; 32 * 8];
            scalar::inverse_transform_add_8x8(&mut expected, 32, &pred, 32, &coeffs);
            inverse_transform_add_8x8(&mut actual, 32, &pred, 32, &coeffs);

            assert_eq!(expected, actual, "SSSE3 IDCT should match scalar for seed {}", seed);
        }
    }

    #[test]
    fn test_ssse3_zero_block_copies_full_range_prediction() {
        if !is_x86_feature_detected!("ssse3") {
            return;
        }
        // Samples above 127 must widen without sign extension
        let pred: Vec<u8> = (0..16 * 8).map(|i| (i * 2 + 1) as u8).collect();
        let mut dst = [0u8; 64];
        inverse_transform_add_8x8(&mut dst, 8, &pred, 16, &[0i16; 64]);
        for y in 0..8 {
            assert_eq!(&dst[y * 8..][..8], &pred[y * 16..][..8], "row {}", y);
        }
    }

    #[test]
    fn test_ssse3_idct_saturates_like_scalar() {
        if !is_x86_feature_detected!("ssse3") {
            return;
        }
        let coeffs: Vec<i16> = (0..64)
            .map(|i| if i % 3 == 0 { i16::MAX } else { i16::MIN })
            .collect();
        let pred = [128u8; 64];
        let mut expected = [0u8; 64];
        let mut actual = [0u8; 64];
        scalar::inverse_transform_add_8x8(&mut expected, 8, &pred, 8, &coeffs);
        inverse_transform_add_8x8(&mut actual, 8, &pred, 8, &coeffs);
        assert_eq!(expected, actual);
    }
}

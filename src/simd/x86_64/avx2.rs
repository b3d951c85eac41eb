//! AVX2 tier: inverse quantization and DC prediction for 8x8 and 16x16
//! blocks.
//!
//! All functions require AVX2 support and are marked with
//! `#[target_feature(enable = "avx2")]`.

#![allow(unsafe_code)]

use core::arch::x86_64::*;

use crate::key::KernelKey;
use crate::simd::scalar;
use crate::types::{DequantizeParams, Neighbours, NEIGHBOUR_CORNER};

/// Pack 8 i32 values to 8 i16 values with saturation.
#[target_feature(enable = "avx2")]
#[inline]
unsafe fn pack_i32_to_i16(v: __m256i) -> __m128i {
    let lo = _mm256_castsi256_si128(v);
    let hi = _mm256_extracti128_si256::<1>(v);
    _mm_packs_epi32(lo, hi)
}

// ============================================================================
// Inverse quantization
// ============================================================================

/// # Safety
/// Requires AVX2. `dst.len() == src.len()`.
#[target_feature(enable = "avx2")]
unsafe fn quantize_inverse_avx2(dst: &mut [i16], src: &[i16], params: DequantizeParams) {
    let scale = _mm256_set1_epi32(params.scale());
    let rounding = _mm256_set1_epi32(params.rounding());
    let count = _mm_cvtsi32_si128(params.shift());

    let blocks = src.len() / 8;
    for i in 0..blocks {
        let v = _mm256_cvtepi16_epi32(_mm_loadu_si128(src.as_ptr().add(i * 8) as *const __m128i));
        let scaled = _mm256_sra_epi32(_mm256_add_epi32(_mm256_mullo_epi32(v, scale), rounding), count);
        _mm_storeu_si128(dst.as_mut_ptr().add(i * 8) as *mut __m128i, pack_i32_to_i16(scaled));
    }

    let tail = blocks * 8;
    scalar::quantize_inverse(&mut dst[tail..], &src[tail..], params);
}

/// Safe wrapper for AVX2 inverse quantization that can be used as a
/// function pointer.
pub fn quantize_inverse(dst: &mut [i16], src: &[i16], params: DequantizeParams) {
    assert_eq!(dst.len(), src.len(), "dequantize buffers differ in length");
    // SAFETY: lengths checked above; installed only for the AVX2 tier.
    unsafe { quantize_inverse_avx2(dst, src, params) }
}

// ============================================================================
// DC intra prediction
// ============================================================================

/// Apply `(x + bias) >> 2` to 16 u8 lanes.
#[target_feature(enable = "avx2")]
#[inline]
unsafe fn edge_filter_16(samples: __m128i, bias: __m256i) -> [u8; 16] {
    let wide = _mm256_srli_epi16::<2>(_mm256_add_epi16(_mm256_cvtepu8_epi16(samples), bias));
    let packed = _mm_packus_epi16(_mm256_castsi256_si128(wide), _mm256_extracti128_si256::<1>(wide));
    let mut out = [0u8; 16];
    _mm_storeu_si128(out.as_mut_ptr() as *mut __m128i, packed);
    out
}

/// # Safety
/// Requires AVX2. `key.block_size()` is 8 or 16 and `dst` holds at least
/// `n * n` samples.
#[target_feature(enable = "avx2")]
unsafe fn pred_intra_dc_avx2(dst: &mut [u8], neighbours: &Neighbours, key: KernelKey) {
    let n = key.block_size();
    let border = neighbours.as_slice().as_ptr();
    let d = dst.as_mut_ptr();

    // `left` lanes run bottom-up: lane i holds left(n - 1 - i)
    let (top, left) = if n == 8 {
        (
            _mm_loadl_epi64(border.add(NEIGHBOUR_CORNER + 1) as *const __m128i),
            _mm_loadl_epi64(border.add(NEIGHBOUR_CORNER - 8) as *const __m128i),
        )
    } else {
        (
            _mm_loadu_si128(border.add(NEIGHBOUR_CORNER + 1) as *const __m128i),
            _mm_loadu_si128(border.add(NEIGHBOUR_CORNER - 16) as *const __m128i),
        )
    };

    let zero = _mm_setzero_si128();
    let sums = _mm_add_epi64(_mm_sad_epu8(top, zero), _mm_sad_epu8(left, zero));
    let sum = _mm_cvtsi128_si32(_mm_add_epi64(sums, _mm_unpackhi_epi64(sums, sums)));
    let dc = (sum + n as i32) >> (key.log2_size() + 1);

    let fill = _mm_set1_epi8(dc as u8 as i8);
    for y in 0..n {
        if n == 8 {
            _mm_storel_epi64(d.add(y * 8) as *mut __m128i, fill);
        } else {
            _mm_storeu_si128(d.add(y * 16) as *mut __m128i, fill);
        }
    }

    if key.edge_filter() {
        let bias = _mm256_set1_epi16((3 * dc + 2) as i16);
        let top_row = edge_filter_16(top, bias);
        let left_col = edge_filter_16(left, bias);

        dst[1..n].copy_from_slice(&top_row[1..n]);
        for y in 1..n {
            dst[y * n] = left_col[n - 1 - y];
        }
        dst[0] = ((neighbours.left(0) as i32 + 2 * dc + neighbours.top(0) as i32 + 2) >> 2) as u8;
    }
}

/// Safe wrapper for AVX2 DC prediction that can be used as a function
/// pointer.
///
/// # Panics
/// If the block is not 8x8 or 16x16, or `dst` is too small.
pub fn pred_intra_dc(dst: &mut [u8], neighbours: &Neighbours, key: KernelKey) {
    let n = key.block_size();
    assert!(n == 8 || n == 16, "unsupported block size {}", n);
    assert!(dst.len() >= n * n, "prediction buffer too small");
    // SAFETY: geometry checked above; installed only for the AVX2 tier.
    unsafe { pred_intra_dc_avx2(dst, neighbours, key) }
}

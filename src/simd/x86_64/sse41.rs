//! SSE4.1 tier: forward quantization and reconstruction.

#![allow(unsafe_code)]

use core::arch::x86_64::*;

use crate::simd::scalar;
use crate::types::QuantizeParams;

// ============================================================================
// Quantization
// ============================================================================

#[target_feature(enable = "sse4.1")]
#[inline]
unsafe fn quantize_half(x: __m128i, scale: __m128i, offset: __m128i, count: __m128i) -> __m128i {
    let magnitude = _mm_sra_epi32(_mm_add_epi32(_mm_mullo_epi32(_mm_abs_epi32(x), scale), offset), count);
    _mm_sign_epi32(magnitude, x)
}

/// # Safety
/// Requires SSE4.1. `dst.len() == src.len()`.
#[target_feature(enable = "sse4.1")]
unsafe fn quantize_sse41(dst: &mut [i16], src: &[i16], params: QuantizeParams) -> bool {
    let scale = _mm_set1_epi32(params.scale());
    let offset = _mm_set1_epi32(params.scaled_offset());
    let count = _mm_cvtsi32_si128(params.shift());

    let blocks = src.len() / 8;
    let mut nonzero = _mm_setzero_si128();

    for i in 0..blocks {
        let v = _mm_loadu_si128(src.as_ptr().add(i * 8) as *const __m128i);
        let lo = quantize_half(_mm_cvtepi16_epi32(v), scale, offset, count);
        let hi = quantize_half(_mm_cvtepi16_epi32(_mm_srli_si128::<8>(v)), scale, offset, count);
        let q = _mm_packs_epi32(lo, hi);
        nonzero = _mm_or_si128(nonzero, q);
        _mm_storeu_si128(dst.as_mut_ptr().add(i * 8) as *mut __m128i, q);
    }

    let tail = blocks * 8;
    let tail_cbf = scalar::quantize(&mut dst[tail..], &src[tail..], params);
    _mm_testz_si128(nonzero, nonzero) == 0 || tail_cbf
}

/// Safe wrapper for SSE4.1 forward quantization that can be used as a
/// function pointer.
pub fn quantize(dst: &mut [i16], src: &[i16], params: QuantizeParams) -> bool {
    assert_eq!(dst.len(), src.len(), "quantize buffers differ in length");
    // SAFETY: lengths checked above; installed only for the SSE4.1 tier.
    unsafe { quantize_sse41(dst, src, params) }
}

// ============================================================================
// Reconstruction
// ============================================================================

/// # Safety
/// Requires SSE4.1. `n` is 4, 8, 16 or 32 and the buffers cover `n` rows
/// of `n` samples at their strides.
#[target_feature(enable = "sse4.1")]
unsafe fn reconstruct_sse41(
    dst: &mut [u8],
    dst_stride: usize,
    pred: &[u8],
    pred_stride: usize,
    residual: &[i16],
    n: usize,
) {
    let d = dst.as_mut_ptr();
    let p = pred.as_ptr();
    let r = residual.as_ptr();

    if n == 4 {
        for y in 0..4 {
            let pv = _mm_cvtsi32_si128((p.add(y * pred_stride) as *const i32).read_unaligned());
            let rv = _mm_loadl_epi64(r.add(y * 4) as *const __m128i);
            let sum = _mm_adds_epi16(_mm_cvtepu8_epi16(pv), rv);
            let out = _mm_cvtsi128_si32(_mm_packus_epi16(sum, sum));
            (d.add(y * dst_stride) as *mut i32).write_unaligned(out);
        }
        return;
    }

    for y in 0..n {
        for x in (0..n).step_by(8) {
            let pv = _mm_loadl_epi64(p.add(y * pred_stride + x) as *const __m128i);
            let rv = _mm_loadu_si128(r.add(y * n + x) as *const __m128i);
            let sum = _mm_adds_epi16(_mm_cvtepu8_epi16(pv), rv);
            _mm_storel_epi64(
                d.add(y * dst_stride + x) as *mut __m128i,
                _mm_packus_epi16(sum, sum),
            );
        }
    }
}

/// Safe wrapper for SSE4.1 reconstruction that can be used as a function
/// pointer.
///
/// # Panics
/// If `n` is not a supported block size or a buffer is too small.
pub fn reconstruct(
    dst: &mut [u8],
    dst_stride: usize,
    pred: &[u8],
    pred_stride: usize,
    residual: &[i16],
    n: usize,
) {
    assert!(matches!(n, 4 | 8 | 16 | 32), "unsupported block size {}", n);
    assert!(residual.len() >= n * n, "residual too small");
    assert!(dst_stride >= n && dst.len() >= (n - 1) * dst_stride + n, "destination too small");
    assert!(pred_stride >= n && pred.len() >= (n - 1) * pred_stride + n, "prediction too small");
    // SAFETY: bounds checked above; installed only for the SSE4.1 tier.
    unsafe { reconstruct_sse41(dst, dst_stride, pred, pred_stride, residual, n) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_sse41_quantize_matches_scalar() {
        if !is_x86_feature_detected!("sse4.1") {
            return;
        }
        let mut rng = StdRng::seed_from_u64(41);
        for &(scale, shift, offset) in &[(51, 20, 14), (0x7fff, 16, 0x7fff), (1, 27, 0)] {
            let params = QuantizeParams::new(scale, shift, offset);
            for len in [16usize, 64, 256, 1024, 21] {
                let mut src: Vec<i16> = (0..len).map(|_| rng.gen()).collect();
                src[0] = i16::MIN;
                let mut expected = vec![0i16; len];
                let mut actual = vec![0i16; len];
                let cbf_expected = scalar::quantize(&mut expected, &src, params);
                let cbf_actual = quantize(&mut actual, &src, params);
                assert_eq!(expected, actual, "len {}", len);
                assert_eq!(cbf_expected, cbf_actual, "len {}", len);
            }
        }
    }

    #[test]
    fn test_sse41_quantize_zero_block() {
        if !is_x86_feature_detected!("sse4.1") {
            return;
        }
        let mut dst = [5i16; 64];
        assert!(!quantize(&mut dst, &[0i16; 64], QuantizeParams::new(51, 20, 14)));
        assert_eq!(dst, [0i16; 64]);
    }

    #[test]
    fn test_sse41_reconstruct_matches_scalar() {
        if !is_x86_feature_detected!("sse4.1") {
            return;
        }
        let mut rng = StdRng::seed_from_u64(42);
        for n in [4usize, 8, 16, 32] {
            let pred: Vec<u8> = (0..32 * n).map(|_| rng.gen()).collect();
            let residual: Vec<i16> = (0..n * n).map(|_| rng.gen_range(-256..256)).collect();
            let mut expected = vec![0x55u8; 32 * n];
            let mut actual = vec![0x55u8; 32 * n];
            scalar::reconstruct(&mut expected, 32, &pred, 32, &residual, n);
            reconstruct(&mut actual, 32, &pred, 32, &residual, n);
            assert_eq!(expected, actual, "n={}", n);
        }
    }

    #[test]
    fn test_sse41_reconstruct_extreme_residuals() {
        if !is_x86_feature_detected!("sse4.1") {
            return;
        }
        let pred = [200u8; 64];
        let residual: Vec<i16> = (0..64)
            .map(|i| if i % 2 == 0 { i16::MAX } else { i16::MIN })
            .collect();
        let mut expected = [0u8; 64];
        let mut actual = [0u8; 64];
        scalar::reconstruct(&mut expected, 8, &pred, 8, &residual, 8);
        reconstruct(&mut actual, 8, &pred, 8, &residual, 8);
        assert_eq!(expected, actual);
    }
}

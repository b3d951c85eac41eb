//! Core parameter types shared by the kernels, the dispatch table and the
//! harness.

use crate::consts::{
    DEQUANT_LEVEL_REACH, DEQUANT_SHIFT_MIN, MAX_BLOCK_SIZE, QUANT_PARAM_LIMIT, QUANT_SHIFT_MAX,
    QUANT_SHIFT_MIN,
};

// =============================================================================
// Channels
// =============================================================================

/// Colour channel a kernel operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Channel {
    /// Luma (Y)
    #[default]
    Luma = 0,
    /// Either chroma plane (Cb or Cr)
    Chroma = 1,
}

impl Channel {
    /// Short lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            Channel::Luma => "luma",
            Channel::Chroma => "chroma",
        }
    }
}

// =============================================================================
// Intra prediction neighbours
// =============================================================================

/// Samples stored on each arm of the border: the block side plus the
/// above-right / below-left extension.
pub const NEIGHBOUR_ARM: usize = 2 * MAX_BLOCK_SIZE;

/// Total border length: both arms plus the shared corner.
pub const NEIGHBOUR_LEN: usize = 2 * NEIGHBOUR_ARM + 1;

/// Index of the corner sample within [`Neighbours::as_slice`].
pub const NEIGHBOUR_CORNER: usize = NEIGHBOUR_ARM;

/// The L-shaped border of reconstructed samples around an intra block.
///
/// Stored as one contiguous run: the left column bottom-up, then the corner,
/// then the top row left-to-right. `left(y)` is at `CORNER - 1 - y`, `top(x)`
/// at `CORNER + 1 + x`, so the two arms share exactly one corner sample and
/// each arm is contiguous in memory.
#[repr(C, align(32))]
#[derive(Clone, PartialEq, Eq)]
pub struct Neighbours {
    samples: [u8; NEIGHBOUR_LEN],
}

impl Neighbours {
    /// Border with every sample set to `value`.
    pub const fn filled(value: u8) -> Self {
        Self {
            samples: [value; NEIGHBOUR_LEN],
        }
    }

    /// Border with the top arm, left arm and corner set independently.
    pub fn from_fn(
        mut top: impl FnMut(usize) -> u8,
        mut left: impl FnMut(usize) -> u8,
        corner: u8,
    ) -> Self {
        let mut n = Self::filled(0);
        for i in 0..NEIGHBOUR_ARM {
            n.samples[NEIGHBOUR_CORNER + 1 + i] = top(i);
            n.samples[NEIGHBOUR_CORNER - 1 - i] = left(i);
        }
        n.samples[NEIGHBOUR_CORNER] = corner;
        n
    }

    /// Sample at `(x, -1)`.
    #[inline]
    pub fn top(&self, x: usize) -> u8 {
        self.samples[NEIGHBOUR_CORNER + 1 + x]
    }

    /// Sample at `(-1, y)`.
    #[inline]
    pub fn left(&self, y: usize) -> u8 {
        self.samples[NEIGHBOUR_CORNER - 1 - y]
    }

    /// Sample at `(-1, -1)`.
    #[inline]
    pub fn corner(&self) -> u8 {
        self.samples[NEIGHBOUR_CORNER]
    }

    /// Raw border, for vectorized kernels.
    #[inline]
    pub fn as_slice(&self) -> &[u8; NEIGHBOUR_LEN] {
        &self.samples
    }

    /// Mutable raw border.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8; NEIGHBOUR_LEN] {
        &mut self.samples
    }
}

impl std::fmt::Debug for Neighbours {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neighbours")
            .field("corner", &self.corner())
            .field("top", &&self.samples[NEIGHBOUR_CORNER + 1..][..8])
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Quantization parameters
// =============================================================================

/// Forward quantization parameters.
///
/// Construction enforces the kernel contract, so every kernel receiving a
/// `QuantizeParams` may rely on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantizeParams {
    scale: i32,
    shift: i32,
    offset: i32,
}

impl QuantizeParams {
    /// # Panics
    ///
    /// Unless `0 <= scale < 0x8000`, `0 <= offset < 0x8000` and
    /// `16 <= shift <= 27`.
    pub fn new(scale: i32, shift: i32, offset: i32) -> Self {
        assert!(
            (0..QUANT_PARAM_LIMIT).contains(&scale),
            "quantize scale {} must be below 0x8000",
            scale
        );
        assert!(
            (0..QUANT_PARAM_LIMIT).contains(&offset),
            "quantize offset {} must be below 0x8000",
            offset
        );
        assert!(
            (QUANT_SHIFT_MIN..=QUANT_SHIFT_MAX).contains(&shift),
            "quantize shift {} must be within [16, 27]",
            shift
        );
        Self {
            scale,
            shift,
            offset,
        }
    }

    /// Multiplier applied to each coefficient magnitude.
    #[inline]
    pub const fn scale(&self) -> i32 {
        self.scale
    }

    /// Right shift applied after scaling.
    #[inline]
    pub const fn shift(&self) -> i32 {
        self.shift
    }

    /// Rounding offset in 16-bit precision.
    #[inline]
    pub const fn offset(&self) -> i32 {
        self.offset
    }

    /// Rounding offset aligned to `shift`: `offset << (shift - 16)`.
    /// Always below `1 << 26`.
    #[inline]
    pub const fn scaled_offset(&self) -> i32 {
        self.offset << (self.shift - QUANT_SHIFT_MIN)
    }
}

/// Inverse quantization ("scaling") parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DequantizeParams {
    scale: i32,
    shift: i32,
}

impl DequantizeParams {
    /// # Panics
    ///
    /// If `shift < 1`, or if `32768 * |scale| + (1 << (shift - 1))` does not
    /// fit in an `i32`. See [`try_new`](Self::try_new).
    pub fn new(scale: i32, shift: i32) -> Self {
        assert!(
            shift >= DEQUANT_SHIFT_MIN,
            "dequantize shift {} must be at least 1",
            shift
        );
        match Self::try_new(scale, shift) {
            Some(params) => params,
            None => panic!(
                "dequantize scale {} with shift {} overflows 32-bit arithmetic",
                scale, shift
            ),
        }
    }

    /// Parameters for which `src * scale + (1 << (shift - 1))` fits in 32
    /// bits for every 16-bit `src`, or `None`.
    pub fn try_new(scale: i32, shift: i32) -> Option<Self> {
        // Any shift above 31 puts the rounding term alone past i32::MAX
        if !(DEQUANT_SHIFT_MIN..=31).contains(&shift) {
            return None;
        }
        let reach = DEQUANT_LEVEL_REACH * (scale as i64).abs() + (1i64 << (shift - 1));
        if reach > i32::MAX as i64 {
            return None;
        }
        Some(Self { scale, shift })
    }

    /// Multiplier applied to each level.
    #[inline]
    pub const fn scale(&self) -> i32 {
        self.scale
    }

    /// Right shift applied after scaling.
    #[inline]
    pub const fn shift(&self) -> i32 {
        self.shift
    }

    /// `1 << (shift - 1)`.
    #[inline]
    pub const fn rounding(&self) -> i32 {
        1 << (self.shift - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbour_geometry() {
        let n = Neighbours::from_fn(|x| x as u8, |y| 100 + y as u8, 255);
        assert_eq!(n.corner(), 255);
        assert_eq!(n.top(0), 0);
        assert_eq!(n.top(63), 63);
        assert_eq!(n.left(0), 100);
        assert_eq!(n.left(63), 163);

        // Both arms are contiguous and meet at the corner.
        let s = n.as_slice();
        assert_eq!(s[NEIGHBOUR_CORNER - 1], n.left(0));
        assert_eq!(s[NEIGHBOUR_CORNER + 1], n.top(0));
        assert_eq!(s[0], n.left(NEIGHBOUR_ARM - 1));
        assert_eq!(s[NEIGHBOUR_LEN - 1], n.top(NEIGHBOUR_ARM - 1));
    }

    #[test]
    fn test_neighbours_aligned() {
        let n = Box::new(Neighbours::filled(0));
        assert_eq!(n.as_slice().as_ptr() as usize % 32, 0);
    }

    #[test]
    fn test_scaled_offset() {
        let p = QuantizeParams::new(51, 20, 14);
        assert_eq!(p.scaled_offset(), 14 << 4);
        let p = QuantizeParams::new(0x7fff, 27, 0x7fff);
        assert!(p.scaled_offset() < 1 << 26);
    }

    #[test]
    #[should_panic(expected = "scale")]
    fn test_quantize_rejects_large_scale() {
        QuantizeParams::new(0x8000, 20, 0);
    }

    #[test]
    #[should_panic(expected = "shift")]
    fn test_quantize_rejects_small_shift() {
        QuantizeParams::new(51, 15, 0);
    }

    #[test]
    #[should_panic(expected = "shift")]
    fn test_quantize_rejects_large_shift() {
        QuantizeParams::new(51, 28, 0);
    }

    #[test]
    #[should_panic(expected = "offset")]
    fn test_quantize_rejects_large_offset() {
        QuantizeParams::new(51, 20, 0x8000);
    }

    #[test]
    fn test_dequantize_rounding() {
        assert_eq!(DequantizeParams::new(51, 14).rounding(), 8192);
    }

    #[test]
    fn test_dequantize_accepts_scaling_list_range() {
        // Scaling-list scales exceed 0x7fff; shifts beyond 24 still fit
        let p = DequantizeParams::new(36864, 14);
        assert_eq!(p.scale(), 36864);
        assert_eq!(DequantizeParams::new(51, 25).rounding(), 1 << 24);
        assert!(DequantizeParams::try_new(-0xffff, 1).is_some());
        assert!(DequantizeParams::try_new(0, 31).is_some());
    }

    #[test]
    fn test_dequantize_overflow_bound() {
        // 32768 * 0xffff leaves room for a rounding term up to 1 << 14
        assert!(DequantizeParams::try_new(0xffff, 1).is_some());
        assert!(DequantizeParams::try_new(0xffff, 15).is_some());
        assert!(DequantizeParams::try_new(0xffff, 16).is_none());
        assert!(DequantizeParams::try_new(0x1_0000, 1).is_none());
        assert!(DequantizeParams::try_new(0, 32).is_none());
        assert!(DequantizeParams::try_new(51, 0).is_none());
        assert!(DequantizeParams::try_new(51, i32::MAX).is_none());
    }

    #[test]
    #[should_panic(expected = "at least 1")]
    fn test_dequantize_rejects_zero_shift() {
        DequantizeParams::new(51, 0);
    }

    #[test]
    #[should_panic(expected = "overflows")]
    fn test_dequantize_rejects_overflowing_scale() {
        DequantizeParams::new(0x1_0000, 14);
    }
}

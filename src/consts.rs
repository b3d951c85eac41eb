//! Constants shared by the reference kernels and the optimized tiers.

/// Smallest transform/prediction block: 4x4.
pub const MIN_LOG2_SIZE: u8 = 2;

/// Largest transform/prediction block: 32x32.
pub const MAX_LOG2_SIZE: u8 = 5;

/// Side of the largest block.
pub const MAX_BLOCK_SIZE: usize = 1 << MAX_LOG2_SIZE;

/// Samples in the largest block.
pub const MAX_BLOCK_SAMPLES: usize = MAX_BLOCK_SIZE * MAX_BLOCK_SIZE;

/// Alignment in bytes that optimized kernels may assume for scenario buffers.
pub const BUFFER_ALIGNMENT: usize = 32;

/// Reconstructed sample bit depth.
pub const BIT_DEPTH: u32 = 8;

/// Largest reconstructed sample value.
pub const MAX_SAMPLE_VALUE: i32 = (1 << BIT_DEPTH) - 1;

/// Right shift after the first (vertical) inverse transform stage.
pub const FIRST_PASS_SHIFT: i32 = 7;

/// Right shift after the second (horizontal) inverse transform stage.
pub const SECOND_PASS_SHIFT: i32 = 20 - BIT_DEPTH as i32;

/// Valid forward quantization shifts.
pub const QUANT_SHIFT_MIN: i32 = 16;
/// Valid forward quantization shifts.
pub const QUANT_SHIFT_MAX: i32 = 27;

/// Exclusive bound on forward quantization scale and offset.
pub const QUANT_PARAM_LIMIT: i32 = 0x8000;

/// Smallest inverse quantization shift.
pub const DEQUANT_SHIFT_MIN: i32 = 1;

/// Largest level magnitude seen by inverse quantization, `|i16::MIN|`.
pub const DEQUANT_LEVEL_REACH: i64 = 1 << 15;

// Magnitudes of the odd basis rows of each transform size, in column order.
// Together they determine every entry of the 32-point matrix.
const ODD_32: [i16; 16] = [90, 90, 88, 85, 82, 78, 73, 67, 61, 54, 46, 38, 31, 22, 13, 4];
const ODD_16: [i16; 8] = [90, 87, 80, 70, 57, 43, 25, 9];
const ODD_8: [i16; 4] = [89, 75, 50, 18];
const ODD_4: [i16; 2] = [83, 36];

/// Magnitude of `64 * sqrt(2) * cos(p * pi / 64)` as fixed by the standard,
/// for `p` in `0..=32`.
const fn cos_magnitude(p: usize) -> i16 {
    if p == 0 || p == 16 {
        64
    } else if p == 32 {
        0
    } else if p % 2 == 1 {
        ODD_32[(p - 1) / 2]
    } else if p % 4 == 2 {
        ODD_16[(p - 2) / 4]
    } else if p % 8 == 4 {
        ODD_8[(p - 4) / 8]
    } else {
        ODD_4[(p - 8) / 16]
    }
}

const fn basis_entry(row: usize, col: usize) -> i16 {
    if row == 0 {
        return 64;
    }
    let p = ((2 * col + 1) * row) % 128;
    if p <= 32 {
        cos_magnitude(p)
    } else if p <= 64 {
        -cos_magnitude(64 - p)
    } else if p <= 96 {
        -cos_magnitude(p - 64)
    } else {
        cos_magnitude(128 - p)
    }
}

const fn build_dct_matrix() -> [[i16; MAX_BLOCK_SIZE]; MAX_BLOCK_SIZE] {
    let mut m = [[0i16; MAX_BLOCK_SIZE]; MAX_BLOCK_SIZE];
    let mut row = 0;
    while row < MAX_BLOCK_SIZE {
        let mut col = 0;
        while col < MAX_BLOCK_SIZE {
            m[row][col] = basis_entry(row, col);
            col += 1;
        }
        row += 1;
    }
    m
}

/// The 32-point integer DCT basis. Row `r` of the N-point basis is row
/// `r * 32 / N` of this matrix, truncated to its first N columns.
pub const DCT_MATRIX_32: [[i16; MAX_BLOCK_SIZE]; MAX_BLOCK_SIZE] = build_dct_matrix();

/// The 8-point integer DCT basis.
pub const DCT_MATRIX_8: [[i16; 8]; 8] = [
    [64, 64, 64, 64, 64, 64, 64, 64],
    [89, 75, 50, 18, -18, -50, -75, -89],
    [83, 36, -36, -83, -83, -36, 36, 83],
    [75, -18, -89, -50, 50, 89, 18, -75],
    [64, -64, -64, 64, 64, -64, -64, 64],
    [50, -89, 18, 75, -75, -18, 89, -50],
    [36, -83, 83, -36, -36, 83, -83, 36],
    [18, -50, 75, -89, 89, -75, 50, -18],
];

/// The 4-point integer DST-VII basis used for 4x4 intra luma residuals.
pub const DST_MATRIX_4: [[i16; 4]; 4] = [
    [29, 55, 74, 84],
    [74, 74, 0, -74],
    [84, -29, -74, 55],
    [55, -84, 74, -29],
];

/// Row `row` of the N-point DCT basis, column `col`.
#[inline]
pub const fn dct_coefficient(size: usize, row: usize, col: usize) -> i16 {
    DCT_MATRIX_32[row * (MAX_BLOCK_SIZE / size)][col]
}

//! Capability keys.
//!
//! A [`KernelKey`] packs the shape parameters that select a kernel variant
//! (block size, edge filtering, colour channel) into one small integer that
//! indexes the dispatch table directly.
//!
//! ```text
//!  bit  4 3 2   1         0
//!      [k - 2] [channel] [edge filter]
//! ```
//!
//! Packing out-of-domain parameters is a programming error and panics.

use crate::consts::{MAX_LOG2_SIZE, MIN_LOG2_SIZE};
use crate::types::Channel;

/// Number of distinct key slots.
pub const KEY_SPACE: usize = ((MAX_LOG2_SIZE - MIN_LOG2_SIZE + 1) as usize) << 2;

const EDGE_FILTER_BIT: u8 = 1 << 0;
const CHANNEL_BIT: u8 = 1 << 1;
const SIZE_SHIFT: u8 = 2;

/// Unpacked kernel shape parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyParams {
    /// Block side is `1 << log2_size`; valid range is 2..=5.
    pub log2_size: u8,
    /// Apply DC edge filtering to the first row and column.
    pub edge_filter: bool,
    /// Colour channel the kernel operates on.
    pub channel: Channel,
}

impl KeyParams {
    /// Parameters for kernels selected by block size alone.
    pub const fn size(log2_size: u8) -> Self {
        Self {
            log2_size,
            edge_filter: false,
            channel: Channel::Luma,
        }
    }

    /// Parameters for an intra prediction kernel. Edge filtering applies to
    /// luma blocks smaller than 32x32 only.
    pub const fn intra(channel: Channel, log2_size: u8) -> Self {
        Self {
            log2_size,
            edge_filter: matches!(channel, Channel::Luma) && log2_size < MAX_LOG2_SIZE,
            channel,
        }
    }

    /// True if these parameters can be packed.
    pub const fn is_valid(&self) -> bool {
        self.log2_size >= MIN_LOG2_SIZE
            && self.log2_size <= MAX_LOG2_SIZE
            && !(self.edge_filter && self.log2_size >= MAX_LOG2_SIZE)
    }
}

/// Packed kernel shape, usable as a dispatch table index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KernelKey(u8);

impl KernelKey {
    /// Pack shape parameters.
    ///
    /// # Panics
    ///
    /// If `log2_size` is outside 2..=5, or if edge filtering is requested
    /// for a 32x32 block.
    pub const fn pack(params: KeyParams) -> Self {
        assert!(
            params.log2_size >= MIN_LOG2_SIZE && params.log2_size <= MAX_LOG2_SIZE,
            "block size out of range"
        );
        assert!(
            !(params.edge_filter && params.log2_size >= MAX_LOG2_SIZE),
            "edge filtering requires a block smaller than 32x32"
        );

        let mut bits = (params.log2_size - MIN_LOG2_SIZE) << SIZE_SHIFT;
        if params.edge_filter {
            bits |= EDGE_FILTER_BIT;
        }
        if let Channel::Chroma = params.channel {
            bits |= CHANNEL_BIT;
        }
        Self(bits)
    }

    /// Recover the shape parameters.
    pub const fn unpack(self) -> KeyParams {
        KeyParams {
            log2_size: self.log2_size(),
            edge_filter: self.edge_filter(),
            channel: self.channel(),
        }
    }

    /// Shorthand for `pack(KeyParams::size(log2_size))`.
    pub const fn size(log2_size: u8) -> Self {
        Self::pack(KeyParams::size(log2_size))
    }

    /// Shorthand for `pack(KeyParams::intra(channel, log2_size))`.
    pub const fn intra(channel: Channel, log2_size: u8) -> Self {
        Self::pack(KeyParams::intra(channel, log2_size))
    }

    /// Dense slot index in `0..KEY_SPACE`.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Inverse of [`index`](Self::index). Returns `None` for indices that
    /// do not decode to an in-domain key.
    pub const fn from_index(index: usize) -> Option<Self> {
        if index >= KEY_SPACE {
            return None;
        }
        let key = Self(index as u8);
        if key.edge_filter() && key.log2_size() >= MAX_LOG2_SIZE {
            return None;
        }
        Some(key)
    }

    /// Every in-domain key, in index order.
    pub fn all() -> impl Iterator<Item = KernelKey> {
        (0..KEY_SPACE).filter_map(Self::from_index)
    }

    /// Base-2 logarithm of the block side.
    #[inline]
    pub const fn log2_size(self) -> u8 {
        (self.0 >> SIZE_SHIFT) + MIN_LOG2_SIZE
    }

    /// Block side in samples.
    #[inline]
    pub const fn block_size(self) -> usize {
        1 << self.log2_size()
    }

    /// Whether DC edge filtering is requested.
    #[inline]
    pub const fn edge_filter(self) -> bool {
        self.0 & EDGE_FILTER_BIT != 0
    }

    /// Colour channel.
    #[inline]
    pub const fn channel(self) -> Channel {
        if self.0 & CHANNEL_BIT != 0 {
            Channel::Chroma
        } else {
            Channel::Luma
        }
    }
}

impl std::fmt::Display for KernelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let n = self.block_size();
        write!(f, "{}x{} {}", n, n, self.channel().name())?;
        if self.edge_filter() {
            write!(f, " edge")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_all_in_domain() {
        for log2_size in MIN_LOG2_SIZE..=MAX_LOG2_SIZE {
            for channel in [Channel::Luma, Channel::Chroma] {
                for edge_filter in [false, true] {
                    let params = KeyParams {
                        log2_size,
                        edge_filter,
                        channel,
                    };
                    if !params.is_valid() {
                        continue;
                    }
                    assert_eq!(KernelKey::pack(params).unpack(), params);
                }
            }
        }
    }

    #[test]
    fn test_all_keys_are_distinct_and_dense() {
        let keys: Vec<_> = KernelKey::all().collect();
        // 4 sizes x 2 channels x 2 filter states, minus the two 32x32 edge variants
        assert_eq!(keys.len(), KEY_SPACE - 2);
        for key in &keys {
            assert_eq!(KernelKey::from_index(key.index()), Some(*key));
        }
    }

    #[test]
    fn test_intra_edge_rule() {
        assert!(KeyParams::intra(Channel::Luma, 2).edge_filter);
        assert!(KeyParams::intra(Channel::Luma, 4).edge_filter);
        assert!(!KeyParams::intra(Channel::Luma, 5).edge_filter);
        assert!(!KeyParams::intra(Channel::Chroma, 3).edge_filter);
    }

    #[test]
    fn test_display() {
        assert_eq!(KernelKey::intra(Channel::Luma, 3).to_string(), "8x8 luma edge");
        assert_eq!(KernelKey::intra(Channel::Chroma, 5).to_string(), "32x32 chroma");
    }

    #[test]
    #[should_panic(expected = "edge filtering")]
    fn test_edge_filter_on_32x32_panics() {
        KernelKey::pack(KeyParams {
            log2_size: 5,
            edge_filter: true,
            channel: Channel::Luma,
        });
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_size_out_of_range_panics() {
        KernelKey::size(6);
    }

    #[test]
    fn test_from_index_rejects_out_of_domain() {
        assert_eq!(KernelKey::from_index(KEY_SPACE), None);
        // k = 5 with the edge bit set
        assert_eq!(KernelKey::from_index((3 << 2) | 1), None);
    }
}

//! Property tests for the capability key codec and quantizer contracts.

use hevc_dsp::simd::scalar;
use hevc_dsp::{Channel, KernelKey, KeyParams, QuantizeParams, KEY_SPACE};
use proptest::prelude::*;

fn channel() -> impl Strategy<Value = Channel> {
    prop_oneof![Just(Channel::Luma), Just(Channel::Chroma)]
}

proptest! {
    #[test]
    fn prop_pack_unpack_roundtrip(
        log2_size in 2u8..=5,
        edge_filter in any::<bool>(),
        channel in channel(),
    ) {
        let params = KeyParams { log2_size, edge_filter, channel };
        prop_assume!(params.is_valid());
        let key = KernelKey::pack(params);
        prop_assert_eq!(key.unpack(), params);
        prop_assert!(key.index() < KEY_SPACE);
        prop_assert_eq!(KernelKey::from_index(key.index()), Some(key));
    }

    #[test]
    fn prop_intra_filter_only_below_32(log2_size in 2u8..=5, channel in channel()) {
        let key = KernelKey::intra(channel, log2_size);
        prop_assert_eq!(
            key.edge_filter(),
            channel == Channel::Luma && key.block_size() < 32
        );
    }

    #[test]
    fn prop_from_index_inverts_index(index in 0usize..KEY_SPACE + 4) {
        if let Some(key) = KernelKey::from_index(index) {
            prop_assert_eq!(key.index(), index);
            prop_assert!(key.unpack().is_valid());
        }
    }

    #[test]
    fn prop_quantize_cbf_matches_output(
        src in proptest::collection::vec(any::<i16>(), 16),
        scale in 0i32..0x8000,
        shift in 16i32..=27,
        offset in 0i32..0x8000,
    ) {
        let params = QuantizeParams::new(scale, shift, offset);
        let mut dst = vec![0i16; 16];
        let cbf = scalar::quantize(&mut dst, &src, params);
        prop_assert_eq!(cbf, dst.iter().any(|&q| q != 0));
    }

    #[test]
    fn prop_quantize_is_odd(
        src in proptest::collection::vec(-32767i16..=32767, 16),
        scale in 0i32..0x8000,
        shift in 16i32..=27,
        offset in 0i32..0x8000,
    ) {
        let params = QuantizeParams::new(scale, shift, offset);
        let negated: Vec<i16> = src.iter().map(|&v| -v).collect();
        let mut a = vec![0i16; 16];
        let mut b = vec![0i16; 16];
        scalar::quantize(&mut a, &src, params);
        scalar::quantize(&mut b, &negated, params);
        for (x, y) in a.iter().zip(&b) {
            prop_assert_eq!(*x, -*y);
        }
    }
}

#[test]
#[should_panic(expected = "scale")]
fn quantize_rejects_scale_at_limit() {
    QuantizeParams::new(0x8000, 20, 14);
}

#[test]
#[should_panic(expected = "shift")]
fn quantize_rejects_shift_below_16() {
    QuantizeParams::new(51, 15, 14);
}

#[test]
#[should_panic(expected = "edge filtering")]
fn edge_filter_rejected_at_32x32() {
    KernelKey::pack(KeyParams {
        log2_size: 5,
        edge_filter: true,
        channel: Channel::Luma,
    });
}

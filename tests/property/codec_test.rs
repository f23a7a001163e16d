// tests/property/codec_test.rs

//! Property-based tests for line framing
//! Tests that lines survive arbitrary read boundaries intact and in order

use bytes::BytesMut;
use chatrelay::core::protocol::LineCodec;
use proptest::prelude::*;
use tokio_util::codec::{Decoder, Encoder};

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_lines_survive_any_chunking(
        lines in prop::collection::vec("[ -~]{1,80}", 1..20),
        chunk in 1usize..64,
    ) {
        let mut wire = BytesMut::new();
        let mut encoder = LineCodec::new();
        for line in &lines {
            encoder.encode(line.clone(), &mut wire).unwrap();
        }

        let mut decoder = LineCodec::new();
        let mut buf = BytesMut::new();
        let mut decoded = Vec::new();
        for piece in wire.chunks(chunk) {
            buf.extend_from_slice(piece);
            while let Some(line) = decoder.decode(&mut buf).unwrap() {
                decoded.push(line);
            }
        }

        prop_assert!(buf.is_empty());
        prop_assert_eq!(decoded, lines);
    }

    #[test]
    fn test_decoded_lines_never_contain_terminators(raw in prop::collection::vec(any::<u8>(), 0..512)) {
        let mut decoder = LineCodec::new();
        let mut buf = BytesMut::from(&raw[..]);
        while let Ok(Some(line)) = decoder.decode_eof(&mut buf) {
            prop_assert!(!line.is_empty());
            prop_assert!(!line.contains('\n'));
        }
    }
}

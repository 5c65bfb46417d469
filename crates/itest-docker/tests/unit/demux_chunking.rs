//! The demultiplexer must not care how the transport slices the stream.

use itest_docker::demux::{StreamKind, demux_reader, encode_frame};
use proptest::prelude::*;

fn wire(frames: &[(bool, Vec<u8>)]) -> Vec<u8> {
    frames
        .iter()
        .flat_map(|(is_err, payload)| {
            let kind = if *is_err {
                StreamKind::Stderr
            } else {
                StreamKind::Stdout
            };
            encode_frame(kind, payload).to_vec()
        })
        .collect()
}

fn expected(frames: &[(bool, Vec<u8>)], want_err: bool) -> Vec<u8> {
    frames
        .iter()
        .filter(|(is_err, _)| *is_err == want_err)
        .flat_map(|(_, p)| p.clone())
        .collect()
}

fn demux_chunked(raw: &[u8], chunk: usize) -> (Vec<u8>, Vec<u8>) {
    let mut builder = tokio_test::io::Builder::new();
    for piece in raw.chunks(chunk.max(1)) {
        builder.read(piece);
    }
    let reader = builder.build();

    let mut out = Vec::new();
    let mut err = Vec::new();
    tokio_test::block_on(demux_reader(reader, &mut out, &mut err)).unwrap();
    (out, err)
}

proptest! {
    #[test]
    fn prop_chunking_does_not_change_output(
        frames in prop::collection::vec((any::<bool>(), prop::collection::vec(any::<u8>(), 0..64)), 0..12),
        chunk in 1usize..40,
    ) {
        let raw = wire(&frames);
        let (out, err) = demux_chunked(&raw, chunk);
        prop_assert_eq!(out, expected(&frames, false));
        prop_assert_eq!(err, expected(&frames, true));
    }
}

#[test]
fn test_one_byte_reads() {
    let frames = vec![
        (false, b"first line\n".to_vec()),
        (true, b"warning\n".to_vec()),
        (false, b"second line\n".to_vec()),
    ];
    let (out, err) = demux_chunked(&wire(&frames), 1);
    assert_eq!(out, b"first line\nsecond line\n");
    assert_eq!(err, b"warning\n");
}

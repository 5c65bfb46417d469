//! Line splitting is independent of how the output was chunked.

use std::io::Write;

use itest_core::LineWriter;
use proptest::prelude::*;

fn collect(chunks: &[Vec<u8>]) -> Vec<String> {
    let mut lines = Vec::new();
    {
        let mut writer = LineWriter::new(|line: &str| lines.push(line.to_string()));
        for chunk in chunks {
            writer.write_all(chunk).unwrap();
        }
        writer.finish();
    }
    lines
}

proptest! {
    #[test]
    fn prop_chunking_does_not_change_lines(
        text in "[a-z \n]{0,200}",
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..10),
    ) {
        let bytes = text.as_bytes();
        let mut positions: Vec<usize> = cuts.iter().map(|i| i.index(bytes.len() + 1)).collect();
        positions.sort_unstable();
        positions.dedup();

        let mut chunks = Vec::new();
        let mut start = 0;
        for pos in positions {
            chunks.push(bytes[start..pos].to_vec());
            start = pos;
        }
        chunks.push(bytes[start..].to_vec());

        prop_assert_eq!(collect(&chunks), collect(&[bytes.to_vec()]));
    }

    #[test]
    fn prop_every_newline_ends_a_line(lines in prop::collection::vec("[a-z]{0,12}", 0..12)) {
        let text: String = lines.iter().map(|l| format!("{l}\n")).collect();
        prop_assert_eq!(collect(&[text.into_bytes()]), lines);
    }
}

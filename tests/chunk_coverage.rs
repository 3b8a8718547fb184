//! Property tests for chunk partitioning.
//!
//! The chunker's contract is purely structural, so it is a good proptest
//! target: for any byte soup and any chunk count, the ranges must be
//! contiguous, cover the buffer exactly, and end non-last chunks on a
//! newline.

use klogmatch::chunk_ranges;
use proptest::prelude::*;

proptest! {
    #[test]
    fn ranges_cover_buffer_exactly(
        buf in proptest::collection::vec(any::<u8>(), 0..4096),
        chunks in 1usize..16,
    ) {
        let ranges = chunk_ranges(&buf, chunks);
        prop_assert_eq!(ranges.len(), chunks);

        let mut pos = 0;
        for r in &ranges {
            prop_assert_eq!(r.start, pos);
            prop_assert!(r.end >= r.start);
            pos = r.end;
        }
        prop_assert_eq!(pos, buf.len());
    }

    #[test]
    fn non_last_chunks_end_on_newline(
        // Bias toward newline-rich buffers so the snapping logic is hit.
        buf in proptest::collection::vec(
            prop_oneof![4 => any::<u8>(), 1 => Just(b'\n')],
            0..4096,
        ),
        chunks in 1usize..16,
    ) {
        let ranges = chunk_ranges(&buf, chunks);
        for r in &ranges[..chunks - 1] {
            if !r.is_empty() {
                prop_assert_eq!(buf[r.end - 1], b'\n');
            }
        }
    }

    #[test]
    fn concatenated_chunks_reproduce_the_buffer(
        buf in proptest::collection::vec(any::<u8>(), 0..2048),
        chunks in 1usize..8,
    ) {
        let ranges = chunk_ranges(&buf, chunks);
        let mut rebuilt = Vec::with_capacity(buf.len());
        for r in &ranges {
            rebuilt.extend_from_slice(&buf[r.clone()]);
        }
        prop_assert_eq!(rebuilt, buf);
    }
}

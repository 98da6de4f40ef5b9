//! Fragment highlighter property harness.
//!
//! The load-bearing invariant: for ANY line and ANY span list — empty,
//! unsorted, out-of-range, overlapping, mid-codepoint — concatenating the
//! produced fragments reproduces the line byte for byte, and the emphasis
//! partition stays well-formed (no empty fragments, no adjacent fragments
//! with the same flag).

use flare_core::highlight::build_fragments;
use flare_core::{Fragment, Span};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn concat(fragments: &[Fragment]) -> String {
    fragments.iter().map(|f| f.text.as_str()).collect()
}

proptest! {
    #[test]
    fn concatenation_is_lossless(
        line in ".{0,60}",
        raw in prop::collection::vec((0usize..80, 0usize..80), 0..10),
    ) {
        let spans: Vec<Span> = raw.iter().map(|&(a, b)| Span::new(a, b)).collect();
        let fragments = build_fragments(&line, &spans);
        prop_assert_eq!(concat(&fragments), line);
    }

    #[test]
    fn partition_is_well_formed(
        line in ".{0,60}",
        raw in prop::collection::vec((0usize..80, 0usize..80), 0..10),
    ) {
        let spans: Vec<Span> = raw.iter().map(|&(a, b)| Span::new(a, b)).collect();
        let fragments = build_fragments(&line, &spans);
        for fragment in &fragments {
            prop_assert!(!fragment.text.is_empty() || line.is_empty());
        }
        for pair in fragments.windows(2) {
            prop_assert_ne!(pair[0].emphasized, pair[1].emphasized);
        }
    }

    #[test]
    fn emphasis_never_exceeds_requested_coverage(
        line in "[a-z]{1,40}",
        raw in prop::collection::vec((0usize..50, 0usize..50), 1..6),
    ) {
        let spans: Vec<Span> = raw.iter().map(|&(a, b)| Span::new(a, b)).collect();
        let fragments = build_fragments(&line, &spans);
        let emphasized: usize = fragments
            .iter()
            .filter(|f| f.emphasized)
            .map(|f| f.text.len())
            .sum();
        let requested: usize = spans
            .iter()
            .map(|s| s.end.min(line.len()).saturating_sub(s.start.min(line.len())))
            .sum();
        // Overlap truncation can only shrink coverage, never grow it.
        prop_assert!(emphasized <= requested.min(line.len()));
    }
}

// ---------------------------------------------------------------------------
// Pinned examples
// ---------------------------------------------------------------------------

#[test]
fn no_spans_is_one_plain_fragment() {
    assert_eq!(
        build_fragments("whole line", &[]),
        vec![Fragment::plain("whole line")]
    );
}

#[test]
fn gap_span_gap_layout() {
    let fragments = build_fragments("error: disk full", &[Span::new(0, 5)]);
    assert_eq!(
        fragments,
        vec![
            Fragment::emphasized("error"),
            Fragment::plain(": disk full"),
        ]
    );
}

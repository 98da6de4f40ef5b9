//! Span-to-fragment conversion.
//!
//! [`build_fragments`] turns an arbitrary list of highlight spans into a
//! gap-filling, emphasis-tagged partition of the line. Callers may hand in
//! unordered, out-of-range, or overlapping spans; the output is always a
//! lossless partition — concatenating every fragment's text reproduces the
//! line exactly.

use crate::types::{Fragment, Span};

/// Split `line` into plain and emphasized fragments according to `spans`.
///
/// Spans are clamped into `[0, line.len()]`, sorted by start, and applied
/// left to right with a cursor. A span that begins before the cursor
/// contributes only its portion from the cursor onward, so overlaps are
/// truncated rather than double-emphasized. Adjacent fragments with the same
/// emphasis flag are merged. No spans yields a single plain fragment equal
/// to the whole line.
///
/// Clamped offsets are additionally snapped down to UTF-8 character
/// boundaries; spans produced by the rule engine are always already aligned,
/// so snapping only affects hand-built span lists.
pub fn build_fragments(line: &str, spans: &[Span]) -> Vec<Fragment> {
    if spans.is_empty() {
        return vec![Fragment::plain(line)];
    }

    let mut spans = spans.to_vec();
    spans.sort_by_key(|s| s.start);

    let mut fragments: Vec<Fragment> = Vec::with_capacity(spans.len() * 2 + 1);
    let mut cursor = 0usize;
    for span in spans {
        let start = snap(line, span.start.min(line.len()));
        let end = snap(line, span.end.min(line.len()));
        if start > cursor {
            push_merged(&mut fragments, Fragment::plain(&line[cursor..start]));
        }
        // Overlap with an earlier span: keep only the part past the cursor.
        let start = start.max(cursor);
        if end > start {
            push_merged(&mut fragments, Fragment::emphasized(&line[start..end]));
        }
        cursor = cursor.max(end);
    }
    if cursor < line.len() {
        push_merged(&mut fragments, Fragment::plain(&line[cursor..]));
    }
    fragments
}

/// Largest index `<= at` that is a character boundary of `line`.
fn snap(line: &str, mut at: usize) -> usize {
    while !line.is_char_boundary(at) {
        at -= 1;
    }
    at
}

fn push_merged(fragments: &mut Vec<Fragment>, frag: Fragment) {
    if frag.text.is_empty() {
        return;
    }
    if let Some(last) = fragments.last_mut() {
        if last.emphasized == frag.emphasized {
            last.text.push_str(&frag.text);
            return;
        }
    }
    fragments.push(frag);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn concat(fragments: &[Fragment]) -> String {
        fragments.iter().map(|f| f.text.as_str()).collect()
    }

    #[test]
    fn no_spans_yields_single_plain_fragment() {
        let frags = build_fragments("hello", &[]);
        assert_eq!(frags, vec![Fragment::plain("hello")]);
    }

    #[test]
    fn single_span_splits_into_three() {
        let frags = build_fragments("abcdef", &[Span::new(2, 4)]);
        assert_eq!(
            frags,
            vec![
                Fragment::plain("ab"),
                Fragment::emphasized("cd"),
                Fragment::plain("ef"),
            ]
        );
    }

    #[test]
    fn span_at_line_start_and_end() {
        let frags = build_fragments("abc", &[Span::new(0, 1), Span::new(2, 3)]);
        assert_eq!(
            frags,
            vec![
                Fragment::emphasized("a"),
                Fragment::plain("b"),
                Fragment::emphasized("c"),
            ]
        );
    }

    #[test]
    fn unsorted_spans_are_sorted_first() {
        let frags = build_fragments("abcdef", &[Span::new(4, 5), Span::new(0, 1)]);
        assert_eq!(concat(&frags), "abcdef");
        assert_eq!(
            frags,
            vec![
                Fragment::emphasized("a"),
                Fragment::plain("bcd"),
                Fragment::emphasized("e"),
                Fragment::plain("f"),
            ]
        );
    }

    #[test]
    fn out_of_range_spans_are_clamped() {
        let frags = build_fragments("abc", &[Span::new(1, 99)]);
        assert_eq!(
            frags,
            vec![Fragment::plain("a"), Fragment::emphasized("bc")]
        );
    }

    #[test]
    fn overlap_is_truncated_not_double_emphasized() {
        // [0,4) then [2,6): the second span contributes only [4,6)
        let frags = build_fragments("abcdef", &[Span::new(0, 4), Span::new(2, 6)]);
        assert_eq!(frags, vec![Fragment::emphasized("abcdef")]);
    }

    #[test]
    fn contained_span_does_not_rewind_cursor() {
        // [0,6) swallows [2,3); without max(cursor, end) the trailing "f"
        // would be emitted twice
        let frags = build_fragments("abcdef", &[Span::new(0, 6), Span::new(2, 3)]);
        assert_eq!(frags, vec![Fragment::emphasized("abcdef")]);
        assert_eq!(concat(&frags), "abcdef");
    }

    #[test]
    fn adjacent_same_emphasis_fragments_merge() {
        let frags = build_fragments("abcd", &[Span::new(0, 2), Span::new(2, 4)]);
        assert_eq!(frags, vec![Fragment::emphasized("abcd")]);
    }

    #[test]
    fn empty_span_contributes_nothing() {
        let frags = build_fragments("abc", &[Span::new(1, 1)]);
        assert_eq!(frags, vec![Fragment::plain("abc")]);
    }

    #[test]
    fn mid_codepoint_span_snaps_to_boundary() {
        // 'é' is two bytes (1..3); a span ending inside it must not panic
        let line = "aébc";
        let frags = build_fragments(line, &[Span::new(0, 2)]);
        assert_eq!(concat(&frags), line);
    }

    #[test]
    fn empty_line_with_spans() {
        let frags = build_fragments("", &[Span::new(0, 5)]);
        assert!(frags.is_empty());
    }
}

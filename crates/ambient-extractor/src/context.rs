//! Span context extraction
//!
//! Produces the bounded, ellipsis-marked text window shown next to an
//! extracted entity for human review. Offsets and lengths count characters
//! (Unicode scalar values), the unit the terminology service reports spans in.

/// Marker added where the window was cut short of the text boundary
pub const ELLIPSIS: &str = "...";

/// Extract up to `window` characters of context on each side of a span.
///
/// The span may come from a different but length-aligned rendering of the
/// text, so both ends are clamped to the text rather than validated. The
/// window body is trimmed of surrounding whitespace, then prefixed with
/// [`ELLIPSIS`] when it starts after the first character and suffixed with
/// it when it stops before the last.
pub fn extract_context(text: &str, offset: i64, length: i64, window: usize) -> String {
    if text.is_empty() {
        return String::new();
    }

    let total = text.chars().count() as i64;
    let window = i64::try_from(window).unwrap_or(i64::MAX);

    let start = offset.saturating_sub(window).max(0);
    let end = offset
        .saturating_add(length)
        .saturating_add(window)
        .min(total);

    let body = if start < end {
        char_slice(text, start as usize, end as usize)
    } else {
        ""
    };

    let mut context = String::with_capacity(body.len() + 2 * ELLIPSIS.len());
    if start > 0 {
        context.push_str(ELLIPSIS);
    }
    context.push_str(body.trim());
    if end < total {
        context.push_str(ELLIPSIS);
    }
    context
}

/// Slice by character positions `[start, end)`
fn char_slice(text: &str, start: usize, end: usize) -> &str {
    let byte_at = |n: usize| {
        text.char_indices()
            .nth(n)
            .map(|(i, _)| i)
            .unwrap_or(text.len())
    };
    &text[byte_at(start)..byte_at(end)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_text() {
        assert_eq!(extract_context("", 0, 5, 200), "");
    }

    #[test]
    fn test_window_inside_text() {
        let text = "0123456789abcdefghij";
        // span "ab" at 10..12, window 3 -> chars 7..15
        assert_eq!(extract_context(text, 10, 2, 3), "...789abcde...");
    }

    #[test]
    fn test_whole_text_has_no_markers() {
        let text = "  Patient reports chest pain.  ";
        assert_eq!(
            extract_context(text, 0, text.chars().count() as i64, 10),
            "Patient reports chest pain."
        );
    }

    #[test]
    fn test_trim_happens_before_markers() {
        let text = "alpha   beta   gamma";
        // window covers "   beta   " exactly
        assert_eq!(extract_context(text, 8, 4, 3), "...beta...");
    }

    #[test]
    fn test_span_past_end_is_clamped() {
        let text = "short note";
        assert_eq!(extract_context(text, 6, 100, 2), "...t note");
        assert_eq!(extract_context(text, 50, 4, 2), "...");
    }

    #[test]
    fn test_negative_offset_is_clamped() {
        let text = "short note";
        assert_eq!(extract_context(text, -3, 4, 0), "s...");
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let text = "Température élevée à 39°C ce matin";
        // "élevée" starts at char 12
        assert_eq!(extract_context(text, 12, 6, 0), "...élevée...");
    }

    proptest! {
        #[test]
        fn prop_length_bound_and_substring(
            text in "[a-zA-Z ]{1,400}",
            offset_seed in 0usize..400,
            length_seed in 0usize..400,
            window in 0usize..300,
        ) {
            let len = text.chars().count();
            let offset = offset_seed % (len + 1);
            let length = length_seed % (len - offset + 1);

            let context = extract_context(&text, offset as i64, length as i64, window);

            prop_assert!(
                context.chars().count() <= length + 2 * window + 2 * ELLIPSIS.len()
            );

            let core = context.strip_prefix(ELLIPSIS).unwrap_or(&context);
            let core = core.strip_suffix(ELLIPSIS).unwrap_or(core);
            prop_assert!(text.contains(core));
        }

        #[test]
        fn prop_full_span_has_no_ellipsis(text in "[a-zA-Z ]{1,400}", window in 0usize..50) {
            let len = text.chars().count() as i64;
            let context = extract_context(&text, 0, len, window);
            prop_assert!(!context.starts_with(ELLIPSIS));
            prop_assert!(!context.ends_with(ELLIPSIS));
        }

        #[test]
        fn prop_span_touching_end_has_no_trailing_ellipsis(
            text in "[a-zA-Z ]{1,400}",
            start_seed in 0usize..400,
        ) {
            let len = text.chars().count();
            let offset = start_seed % len;
            let context = extract_context(&text, offset as i64, (len - offset) as i64, 0);
            prop_assert!(!context.ends_with(ELLIPSIS));
        }
    }
}

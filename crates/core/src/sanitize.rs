//! Text sanitization for everything that crosses the completion-service
//! boundary or ends up in an exported result table.
//!
//! Characters above U+00FF become a space; control characters are dropped.
//! Both the request channel and the delimited export assume single-byte text.

/// Sanitize a string: replace chars outside `0..=255` with a space and remove
/// control characters (C0, DEL and C1).
///
/// Idempotent: `sanitize(&sanitize(s)) == sanitize(s)`.
pub fn sanitize(text: &str) -> String {
    if is_clean(text) {
        return text.to_string();
    }
    text.chars()
        .filter_map(|c| {
            if u32::from(c) > 0xFF {
                Some(' ')
            } else if c.is_control() {
                None
            } else {
                Some(c)
            }
        })
        .collect()
}

/// Whether `sanitize` would leave `text` untouched.
fn is_clean(text: &str) -> bool {
    text.chars().all(|c| u32::from(c) <= 0xFF && !c.is_control())
}

/// Cut `text` to at most `max_chars` characters, appending `marker` when cut.
///
/// Counts chars, not bytes, so multi-byte input never splits a code point.
pub fn truncate_with_marker(text: &str, max_chars: usize, marker: &str) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{marker}", &text[..byte_idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_chars_become_spaces() {
        assert_eq!(sanitize("caf\u{e9} \u{1F600}ok"), "caf\u{e9}  ok");
        assert_eq!(sanitize("\u{201C}quoted\u{201D}"), " quoted ");
    }

    #[test]
    fn control_chars_are_removed() {
        assert_eq!(sanitize("a\tb\nc\r\u{0}d\u{7f}e\u{85}f"), "abcdef");
    }

    #[test]
    fn latin1_text_is_untouched() {
        let text = "Grüße, señor! ¿Qué tal? 100% ©";
        assert!(is_clean(text));
        assert_eq!(sanitize(text), text);
    }

    #[test]
    fn sanitize_is_idempotent() {
        let inputs = [
            "",
            "plain ascii",
            "mixed \u{2603} snow\u{0007}man\n",
            "\u{feff}bom and \u{200b}zero width",
            "日本語のテキスト",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert!(is_clean(&once));
            assert_eq!(sanitize(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn truncate_only_when_longer() {
        assert_eq!(truncate_with_marker("short", 10, "..."), "short");
        assert_eq!(truncate_with_marker("exactly10!", 10, "..."), "exactly10!");
        assert_eq!(truncate_with_marker("0123456789abc", 10, "..."), "0123456789...");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_with_marker("ééééé", 2, "|"), "éé|");
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! File name sanitization.
//!
//! Underscore is forbidden alongside the characters Windows, Linux and macOS
//! reject, so that `_` stays free for use as the field separator in labels.

/// Returned when the sanitized text would otherwise be empty.
///
/// It contains the forbidden `_`, so it is passed through unchanged when
/// sanitized again.
pub const FALLBACK_FILENAME: &str = "default_filename";

/// Replacement used by [`sanitize`].
pub const DEFAULT_REPLACEMENT: char = ' ';

/// The replacement character is itself forbidden, so the output would not be
/// safe and re-sanitizing would change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("replacement character {0:?} is itself forbidden in file names")]
pub struct InvalidReplacement(pub char);

/// Whether `c` may not appear in a sanitized file name component.
pub fn is_forbidden(c: char) -> bool {
    matches!(c, '_' | '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
        || ('\u{00}'..='\u{1F}').contains(&c)
}

/// Sanitize `text` replacing forbidden characters with a space.
///
/// Idempotent: `sanitize(&sanitize(s)) == sanitize(s)`.
pub fn sanitize(text: &str) -> String {
    replace_and_trim(text, DEFAULT_REPLACEMENT)
}

/// Sanitize `text` with a custom replacement character.
pub fn sanitize_with(text: &str, replacement: char) -> Result<String, InvalidReplacement> {
    if is_forbidden(replacement) {
        return Err(InvalidReplacement(replacement));
    }
    Ok(replace_and_trim(text, replacement))
}

/// Keep only ASCII letters and digits.
pub fn alphanumeric_only(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

fn replace_and_trim(text: &str, replacement: char) -> String {
    if text == FALLBACK_FILENAME {
        return text.to_string();
    }

    let replaced: String = text
        .chars()
        .map(|c| if is_forbidden(c) { replacement } else { c })
        .collect();

    let trimmed = replaced.trim();
    if trimmed.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORBIDDEN: &str = "_<>:\"/\\|?*";

    #[test]
    fn test_replaces_forbidden_characters() {
        assert_eq!(sanitize("Hill_Loop: part 1/2"), "Hill Loop  part 1 2");
        assert_eq!(sanitize("a\tb\nc"), "a b c");
    }

    #[test]
    fn test_output_contains_no_forbidden_characters() {
        let inputs = [
            "plain",
            "with_underscore",
            "C:\\Users\\me\\tour?.gpx",
            "pipes|and*stars",
            "\u{0}\u{1}nul\u{1F}",
            "<<\"quoted\">>",
        ];
        for input in inputs {
            let out = sanitize(input);
            assert!(
                !out.chars().any(is_forbidden),
                "{input:?} sanitized to {out:?}"
            );
        }
    }

    #[test]
    fn test_all_forbidden_input_yields_fallback() {
        assert_eq!(sanitize(FORBIDDEN), FALLBACK_FILENAME);
        assert_eq!(sanitize("\u{1}\u{2}\u{3}"), FALLBACK_FILENAME);
        assert_eq!(sanitize(""), FALLBACK_FILENAME);
        assert_eq!(sanitize("   "), FALLBACK_FILENAME);
    }

    #[test]
    fn test_trims_whitespace() {
        assert_eq!(sanitize("  _Ride_  "), "Ride");
    }

    #[test]
    fn test_idempotent_with_default_replacement() {
        for input in ["_a_b_", "x/y\\z", "Tour: \"Best\" <2025>", "ok"] {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once);
        }
    }

    #[test]
    fn test_fallback_is_stable_when_sanitized_again() {
        for input in [FORBIDDEN, "", " \t ", "___"] {
            let once = sanitize(input);
            assert_eq!(once, FALLBACK_FILENAME);
            assert_eq!(sanitize(&once), FALLBACK_FILENAME);
            assert_eq!(sanitize_with(&once, '-').unwrap(), FALLBACK_FILENAME);
        }
    }

    #[test]
    fn test_custom_replacement() {
        assert_eq!(sanitize_with("a/b", '-').unwrap(), "a-b");
    }

    #[test]
    fn test_forbidden_replacement_is_rejected() {
        assert_eq!(sanitize_with("a/b", '_'), Err(InvalidReplacement('_')));
        assert!(sanitize_with("a/b", '\u{7}').is_err());
    }

    #[test]
    fn test_non_ascii_is_preserved() {
        assert_eq!(sanitize("Zugspitze über Höllental"), "Zugspitze über Höllental");
    }

    #[test]
    fn test_alphanumeric_only() {
        assert_eq!(alphanumeric_only("jane.doe+komoot"), "janedoekomoot");
        assert_eq!(alphanumeric_only("äöü"), "");
    }
}

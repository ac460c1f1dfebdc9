//! Extraction of the live input from the cursor prefix.

/// Returns the live input of a session: the bytes of `pretext` from offset
/// `col` onward, decoded as UTF-8 (lossily, since a byte column may fall
/// inside a multi-byte character while the editor is mid-edit).
///
/// Returns `None` when the pretext is shorter than the session's start
/// column (the cursor moved before the word) or when the decoded input is
/// blacklisted.
pub fn resume_input(pretext: &str, col: usize, blacklist: &[String]) -> Option<String> {
    let bytes = pretext.as_bytes();
    if bytes.len() < col {
        return None;
    }
    let input = String::from_utf8_lossy(&bytes[col..]).into_owned();
    if blacklist.iter().any(|entry| *entry == input) {
        return None;
    }
    Some(input)
}

#[cfg(test)]
mod tests {
    use quickcheck::{QuickCheck, TestResult};

    use super::*;

    #[test]
    fn suffix_from_byte_column() {
        assert_eq!(resume_input("let fo", 4, &[]).as_deref(), Some("fo"));
        assert_eq!(resume_input("let fo", 6, &[]).as_deref(), Some(""));
        assert_eq!(resume_input("let fo", 7, &[]), None);
    }

    #[test]
    fn blacklisted_input_is_rejected() {
        let blacklist = vec!["end".to_string()];
        assert_eq!(resume_input("  end", 2, &blacklist), None);
        assert_eq!(resume_input("  en", 2, &blacklist).as_deref(), Some("en"));
    }

    #[test]
    fn split_inside_multibyte_char_stays_valid_utf8() {
        // 'é' is two bytes; col 1 lands inside it
        let input = resume_input("ému", 1, &[]).unwrap();
        assert!(input.chars().all(|ch| ch == char::REPLACEMENT_CHARACTER || ch.is_alphanumeric()));
        assert_eq!(resume_input("ému", 2, &[]).as_deref(), Some("mu"));
    }

    #[test]
    fn pure_and_total_over_arbitrary_input() {
        fn prop(pretext: String, col: usize) -> TestResult {
            let col = col % (pretext.len() + 2);
            let first = resume_input(&pretext, col, &[]);
            let second = resume_input(&pretext, col, &[]);
            // deterministic
            assert_eq!(first, second);
            match first {
                // defined exactly when the pretext is long enough; the
                // output is valid utf-8 by construction and lossy decoding
                // never drops bytes
                Some(input) => {
                    assert!(pretext.len() >= col);
                    assert!(input.len() + col >= pretext.len());
                }
                None => assert!(pretext.len() < col),
            }
            TestResult::passed()
        }
        QuickCheck::new()
            .tests(500)
            .quickcheck(prop as fn(String, usize) -> TestResult);
    }
}

//! Word-character classification driven by the buffer's own keyword table.
//!
//! Which characters extend the word under the cursor is not a fixed class:
//! it follows the buffer's `iskeyword` option, so `-` is a word character
//! in css buffers but not in rust ones. The table is parsed once per buffer
//! and consulted on every keystroke, so lookups stay allocation free.

/// A parsed `iskeyword`-style character table.
///
/// The option value is a comma separated list of specs. Each spec is a
/// single character, a decimal code point (`48`), an inclusive range of
/// code points or characters (`48-57`, `a-z`), or `@` for all alphabetic
/// characters. A leading `^` excludes the spec instead of including it, and
/// `@-@` denotes the literal `@` character.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeywordClass {
    include: Vec<(u32, u32)>,
    exclude: Vec<(u32, u32)>,
    alpha: bool,
}

impl KeywordClass {
    /// The common default table: alphabetic characters, digits, `_` and the
    /// latin-1 supplement.
    pub fn standard() -> KeywordClass {
        KeywordClass::parse("@,48-57,_,192-255")
    }

    pub fn parse(option: &str) -> KeywordClass {
        let mut class = KeywordClass::default();
        for spec in option.split(',').filter(|spec| !spec.is_empty()) {
            let (spec, exclude) = match spec.strip_prefix('^') {
                // a bare `^` includes the caret itself
                Some("") => ("^", false),
                Some(rest) => (rest, true),
                None => (spec, false),
            };
            let Some(range) = parse_spec(spec) else {
                log::debug!("ignoring malformed iskeyword spec {spec:?}");
                continue;
            };
            match range {
                Spec::Alpha if !exclude => class.alpha = true,
                Spec::Alpha => (),
                Spec::Range(lo, hi) if exclude => class.exclude.push((lo, hi)),
                Spec::Range(lo, hi) => class.include.push((lo, hi)),
            }
        }
        class
    }

    /// Whether `ch` is a word character under this table.
    ///
    /// Code points above latin-1 always count as word characters; the table
    /// syntax cannot address them and completion should not break inside
    /// multi-byte words.
    pub fn is_word(&self, ch: char) -> bool {
        let code = ch as u32;
        if code > 255 {
            return true;
        }
        if self.exclude.iter().any(|&(lo, hi)| lo <= code && code <= hi) {
            return false;
        }
        if self.alpha && ch.is_alphabetic() {
            return true;
        }
        self.include.iter().any(|&(lo, hi)| lo <= code && code <= hi)
    }

    /// The longest suffix of `text` consisting entirely of word characters.
    pub fn word_suffix<'a>(&self, text: &'a str) -> &'a str {
        let start = text
            .char_indices()
            .rev()
            .take_while(|&(_, ch)| self.is_word(ch))
            .last()
            .map_or(text.len(), |(idx, _)| idx);
        &text[start..]
    }
}

enum Spec {
    Alpha,
    Range(u32, u32),
}

fn parse_spec(spec: &str) -> Option<Spec> {
    if spec == "@" {
        return Some(Spec::Alpha);
    }
    if spec == "@-@" {
        return Some(Spec::Range('@' as u32, '@' as u32));
    }
    if let Some((lo, hi)) = spec.split_once('-') {
        if !lo.is_empty() && !hi.is_empty() {
            let lo = parse_endpoint(lo)?;
            let hi = parse_endpoint(hi)?;
            return (lo <= hi).then_some(Spec::Range(lo, hi));
        }
    }
    let code = parse_endpoint(spec)?;
    Some(Spec::Range(code, code))
}

fn parse_endpoint(s: &str) -> Option<u32> {
    if let Ok(code) = s.parse::<u32>() {
        return (code <= 255).then_some(code);
    }
    let mut chars = s.chars();
    let ch = chars.next()?;
    chars.next().is_none().then_some(ch as u32)
}

/// The leading whitespace of a line, used to detect indent changes that
/// invalidate a completion position.
pub fn leading_whitespace(line: &str) -> &str {
    let end = line
        .char_indices()
        .find(|&(_, ch)| !ch.is_whitespace())
        .map_or(line.len(), |(idx, _)| idx);
    &line[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_class() -> KeywordClass {
        KeywordClass::parse("@,48-57,_,192-255")
    }

    #[test]
    fn word_chars() {
        let class = default_class();
        assert!(class.is_word('a'));
        assert!(class.is_word('Z'));
        assert!(class.is_word('0'));
        assert!(class.is_word('_'));
        assert!(class.is_word('é'));
        assert!(!class.is_word('-'));
        assert!(!class.is_word(' '));
        assert!(!class.is_word('.'));
    }

    #[test]
    fn multibyte_is_always_word() {
        let class = KeywordClass::parse("48-57");
        assert!(class.is_word('中'));
        // latin-1 characters still go through the table
        assert!(!class.is_word('é'));
        assert!(!class.is_word('a'));
    }

    #[test]
    fn dash_in_css_like_table() {
        let class = KeywordClass::parse("@,48-57,_,-,192-255");
        assert!(class.is_word('-'));
        assert_eq!(class.word_suffix("color: border-w"), "border-w");
    }

    #[test]
    fn excluded_range() {
        let class = KeywordClass::parse("@,48-57,^97-99");
        assert!(!class.is_word('a'));
        assert!(!class.is_word('c'));
        assert!(class.is_word('d'));
    }

    #[test]
    fn literal_at_spec() {
        let class = KeywordClass::parse("@-@");
        assert!(class.is_word('@'));
        assert!(!class.is_word('a'));
    }

    #[test]
    fn word_suffix_basics() {
        let class = default_class();
        assert_eq!(class.word_suffix("let foo"), "foo");
        assert_eq!(class.word_suffix("foo("), "");
        assert_eq!(class.word_suffix(""), "");
        assert_eq!(class.word_suffix("f"), "f");
        assert_eq!(class.word_suffix("a.b_c1"), "b_c1");
    }

    #[test]
    fn malformed_specs_are_ignored() {
        let class = KeywordClass::parse("@,999,x-,-,48-57");
        assert!(class.is_word('5'));
        assert!(class.is_word('-'));
        assert!(!class.is_word('!'));
    }

    #[test]
    fn leading_whitespace_slices() {
        assert_eq!(leading_whitespace("  foo"), "  ");
        assert_eq!(leading_whitespace("\t\tbar"), "\t\t");
        assert_eq!(leading_whitespace("foo"), "");
        assert_eq!(leading_whitespace("   "), "   ");
    }
}

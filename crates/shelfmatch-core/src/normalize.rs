//! Text normalization for catalog records.
//!
//! Every function here is pure: the same input always yields the same output,
//! and malformed input degrades to an empty value instead of an error. The one
//! fallible entry point, [`try_parse_tag_list`], exists so that malformed tag
//! encodings stay visible to callers and tests; [`parse_tag_list`] is the
//! recovering wrapper used by the catalog pipeline.

use thiserror::Error;
use tracing::debug;

/// Maximum number of tags appended to a record's searchable text.
pub const MAX_SEARCHABLE_TAGS: usize = 5;

/// Tags at or below this many characters carry no signal.
pub const MIN_TAG_CHARS: usize = 2;

/// Generic tags excluded from searchable text.
pub const TAG_STOPLIST: [&str; 3] = ["brand", "type", "category"];

/// Collapse whitespace, drop everything except ASCII letters, digits, spaces
/// and hyphens, lowercase, and trim.
///
/// ```
/// use shelfmatch_core::normalize::clean_text;
///
/// assert_eq!(clean_text("Dog-Food #1!! "), "dog-food 1");
/// assert_eq!(clean_text(""), "");
/// ```
#[must_use]
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_whitespace = false;

    for ch in text.chars() {
        if ch.is_whitespace() {
            // Runs collapse before the strip, so "a # b" keeps two spaces.
            if !prev_whitespace {
                out.push(' ');
            }
            prev_whitespace = true;
            continue;
        }
        prev_whitespace = false;

        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch.to_ascii_lowercase());
        }
    }

    out.trim().to_string()
}

/// Why a tag-list encoding could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagParseError {
    #[error("tag list must start with '[' (found {found:?})")]
    NotAList { found: Option<char> },

    #[error("unterminated string literal starting at byte {start}")]
    UnterminatedString { start: usize },

    #[error("unexpected {found:?} at byte {position}")]
    UnexpectedChar { found: char, position: usize },

    #[error("invalid number literal at byte {start}")]
    InvalidNumber { start: usize },

    #[error("unexpected end of tag list")]
    UnexpectedEnd,

    #[error("trailing input after tag list at byte {position}")]
    TrailingInput { position: usize },
}

/// Parse a string-encoded tag list such as `['Dog', "Cat Toys"]`.
///
/// Accepts single- or double-quoted string elements with backslash escapes,
/// numeric elements (kept as their canonical text, zero skipped), `None`
/// elements (skipped), and a trailing comma. Each non-empty element is
/// passed through [`clean_text`]. A blank input is an empty list.
///
/// # Errors
///
/// Returns [`TagParseError`] when the input is not a list of string literals.
pub fn try_parse_tag_list(raw: &str) -> Result<Vec<String>, TagParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let mut parser = TagListParser::new(trimmed);
    let tags = parser.parse_list()?;
    Ok(tags
        .into_iter()
        .flatten()
        .filter(|tag| !tag.is_empty())
        .map(|tag| clean_text(&tag))
        .collect())
}

/// Recovering form of [`try_parse_tag_list`]: malformed input yields no tags.
#[must_use]
pub fn parse_tag_list(raw: &str) -> Vec<String> {
    match try_parse_tag_list(raw) {
        Ok(tags) => tags,
        Err(err) => {
            debug!("treating malformed tag list as empty: {err}");
            Vec::new()
        }
    }
}

/// Derive the canonical searchable string for one record.
///
/// Title, vendor and category are used verbatim, each only when present and
/// non-blank. They are followed by at most [`MAX_SEARCHABLE_TAGS`] tags that
/// are longer than [`MIN_TAG_CHARS`] and not in [`TAG_STOPLIST`]. Components
/// are joined with single spaces.
#[must_use]
pub fn build_searchable_text(
    title: Option<&str>,
    vendor: Option<&str>,
    category: Option<&str>,
    tags: &[String],
) -> String {
    let mut components: Vec<&str> = [title, vendor, category]
        .into_iter()
        .flatten()
        .filter(|field| !field.trim().is_empty())
        .collect();

    let kept_tags: Vec<&str> = tags
        .iter()
        .map(String::as_str)
        .filter(|tag| tag.chars().count() > MIN_TAG_CHARS && !TAG_STOPLIST.contains(tag))
        .take(MAX_SEARCHABLE_TAGS)
        .collect();
    let joined_tags = kept_tags.join(" ");
    if !joined_tags.is_empty() {
        components.push(&joined_tags);
    }

    components.join(" ")
}

struct TagListParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> TagListParser<'a> {
    const fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn parse_list(&mut self) -> Result<Vec<Option<String>>, TagParseError> {
        match self.bump() {
            Some('[') => {}
            found => return Err(TagParseError::NotAList { found }),
        }

        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(']') => {
                    self.bump();
                    break;
                }
                Some(_) => items.push(self.parse_element()?),
                None => return Err(TagParseError::UnexpectedEnd),
            }

            self.skip_whitespace();
            match self.bump() {
                Some(',') => {}
                Some(']') => break,
                Some(found) => {
                    return Err(TagParseError::UnexpectedChar {
                        found,
                        position: self.pos - found.len_utf8(),
                    });
                }
                None => return Err(TagParseError::UnexpectedEnd),
            }
        }

        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(TagParseError::TrailingInput { position: self.pos });
        }
        Ok(items)
    }

    fn parse_element(&mut self) -> Result<Option<String>, TagParseError> {
        let start = self.pos;
        match self.peek() {
            Some(quote @ ('\'' | '"')) => {
                self.bump();
                self.parse_string(quote, start).map(Some)
            }
            Some('N') if self.input[self.pos..].starts_with("None") => {
                self.pos += "None".len();
                Ok(None)
            }
            Some(ch) if ch.is_ascii_digit() || matches!(ch, '-' | '+' | '.') => {
                self.parse_number(start)
            }
            Some(found) => Err(TagParseError::UnexpectedChar {
                found,
                position: start,
            }),
            None => Err(TagParseError::UnexpectedEnd),
        }
    }

    /// A bare int or float literal. Zero is falsy and yields `None`.
    fn parse_number(&mut self, start: usize) -> Result<Option<String>, TagParseError> {
        while self
            .peek()
            .is_some_and(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '+' | '.' | '_'))
        {
            self.bump();
        }
        let literal = self.input[start..self.pos].replace('_', "");

        if let Ok(int) = literal.parse::<i64>() {
            return Ok((int != 0).then(|| int.to_string()));
        }
        let float = literal
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or(TagParseError::InvalidNumber { start })?;
        if float == 0.0 {
            return Ok(None);
        }
        if float.fract() == 0.0 && float.abs() < 1e16 {
            Ok(Some(format!("{float:.1}")))
        } else {
            Ok(Some(float.to_string()))
        }
    }

    fn parse_string(&mut self, quote: char, start: usize) -> Result<String, TagParseError> {
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(TagParseError::UnterminatedString { start }),
                Some(ch) if ch == quote => return Ok(value),
                Some('\\') => match self.bump() {
                    None => return Err(TagParseError::UnterminatedString { start }),
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(escaped) => value.push(escaped),
                },
                Some(ch) => value.push(ch),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_string()).collect()
    }

    // -----------------------------------------------------------------------
    // clean_text
    // -----------------------------------------------------------------------

    #[test]
    fn clean_text_strips_punctuation_and_lowercases() {
        assert_eq!(clean_text("Dog-Food #1!! "), "dog-food 1");
    }

    #[test]
    fn clean_text_collapses_whitespace_runs() {
        assert_eq!(clean_text("  Chew\t\tToy \n Large "), "chew toy large");
    }

    #[test]
    fn clean_text_keeps_gap_left_by_removed_symbol() {
        assert_eq!(clean_text("cat & dog"), "cat  dog");
    }

    #[test]
    fn clean_text_drops_non_ascii_letters() {
        assert_eq!(clean_text("Crème Brûlée"), "crme brle");
    }

    #[test]
    fn clean_text_empty_input_is_empty() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("   "), "");
        assert_eq!(clean_text("!!!"), "");
    }

    // -----------------------------------------------------------------------
    // tag parsing
    // -----------------------------------------------------------------------

    #[test]
    fn parses_quoted_list_literal() {
        assert_eq!(
            parse_tag_list("['Dog Food', \"Grain-Free\", 'Large Breed']"),
            tags(&["dog food", "grain-free", "large breed"])
        );
    }

    #[test]
    fn parses_escapes_and_trailing_comma() {
        assert_eq!(
            try_parse_tag_list(r"['Owner\'s Pick', 'Toys',]").expect("valid list"),
            tags(&["owners pick", "toys"])
        );
    }

    #[test]
    fn skips_none_and_empty_elements() {
        assert_eq!(
            try_parse_tag_list("[None, '', 'Leash']").expect("valid list"),
            tags(&["leash"])
        );
    }

    #[test]
    fn numeric_elements_are_kept_as_text() {
        assert_eq!(
            try_parse_tag_list("[1, 'Dog', 2.5, 0, -3, 4.0]").expect("valid list"),
            tags(&["1", "dog", "25", "-3", "40"])
        );
        assert!(matches!(
            try_parse_tag_list("[12abc]"),
            Err(TagParseError::InvalidNumber { start: 1 })
        ));
    }

    #[test]
    fn empty_list_and_blank_input_are_empty() {
        assert!(try_parse_tag_list("[]").expect("valid").is_empty());
        assert!(try_parse_tag_list("  ").expect("valid").is_empty());
    }

    #[test]
    fn malformed_lists_are_reported() {
        assert!(matches!(
            try_parse_tag_list("Dog, Cat"),
            Err(TagParseError::NotAList { found: Some('D') })
        ));
        assert!(matches!(
            try_parse_tag_list("['Dog"),
            Err(TagParseError::UnterminatedString { start: 1 })
        ));
        assert!(matches!(
            try_parse_tag_list("['Dog' 'Cat']"),
            Err(TagParseError::UnexpectedChar { found: '\'', .. })
        ));
        assert!(matches!(
            try_parse_tag_list("[{'Dog'}]"),
            Err(TagParseError::UnexpectedChar { found: '{', .. })
        ));
        assert!(matches!(
            try_parse_tag_list("['Dog'] extra"),
            Err(TagParseError::TrailingInput { .. })
        ));
        assert!(matches!(
            try_parse_tag_list("['Dog',"),
            Err(TagParseError::UnexpectedEnd)
        ));
    }

    #[test]
    fn parse_tag_list_recovers_to_empty() {
        assert!(parse_tag_list("{'not': 'a list'}").is_empty());
        assert!(parse_tag_list("['broken").is_empty());
    }

    // -----------------------------------------------------------------------
    // build_searchable_text
    // -----------------------------------------------------------------------

    #[test]
    fn searchable_text_joins_fields_in_order() {
        let text = build_searchable_text(
            Some("Rope Tug Toy"),
            Some("Kong"),
            Some("Animals & Pet Supplies"),
            &tags(&["durable", "dog"]),
        );
        assert_eq!(text, "Rope Tug Toy Kong Animals & Pet Supplies durable dog");
    }

    #[test]
    fn searchable_text_omits_absent_and_blank_fields() {
        let text = build_searchable_text(None, Some("Kong"), Some("  "), &[]);
        assert_eq!(text, "Kong");
    }

    #[test]
    fn searchable_text_filters_short_and_stoplisted_tags() {
        let text = build_searchable_text(
            Some("Leash"),
            None,
            None,
            &tags(&["xl", "brand", "type", "category", "nylon"]),
        );
        assert_eq!(text, "Leash nylon");
    }

    #[test]
    fn searchable_text_caps_tags_at_five() {
        let text = build_searchable_text(
            None,
            None,
            None,
            &tags(&["one", "two", "three", "four", "five", "six", "seven"]),
        );
        assert_eq!(text, "one two three four five");
    }

    #[test]
    fn searchable_text_of_empty_record_is_empty() {
        assert_eq!(build_searchable_text(None, None, None, &[]), "");
    }

    proptest! {
        #[test]
        fn clean_text_output_alphabet_is_restricted(input in ".{0,64}") {
            let cleaned = clean_text(&input);
            prop_assert!(cleaned
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == ' ' || c == '-'));
            prop_assert_eq!(cleaned.trim(), cleaned.as_str());
        }

        #[test]
        fn clean_text_is_idempotent_on_single_spaced_output(input in "[a-zA-Z0-9 -]{0,48}") {
            let once = clean_text(&input);
            prop_assert_eq!(clean_text(&once), once.clone());
        }

        #[test]
        fn parse_tag_list_never_panics(input in ".{0,64}") {
            let _ = parse_tag_list(&input);
        }
    }
}

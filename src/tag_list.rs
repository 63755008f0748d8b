//! Parsing of RFC 6376 tag=value lists.
//!
//! Both the *DKIM-Signature* header and the DNS key record use the tag-list
//! syntax of RFC 6376, section 3.2.

use base64ct::{Base64, Encoding};
use std::collections::HashSet;

/// A single tag and its value, as slices into the original input.
#[derive(Debug, PartialEq, Eq)]
pub struct TagSpec<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TagListParseError {
    DuplicateTag,
    Syntax,
}

/// A well-formed tag-list. Tag names are unique, values may be empty.
#[derive(Debug, PartialEq, Eq)]
pub struct TagList<'a>(Vec<TagSpec<'a>>);

impl<'a> AsRef<[TagSpec<'a>]> for TagList<'a> {
    fn as_ref(&self) -> &[TagSpec<'a>] {
        &self.0
    }
}

impl<'a> TagList<'a> {
    pub fn from_str(value: &'a str) -> Result<Self, TagListParseError> {
        let mut tags = vec![];
        let mut names_seen = HashSet::new();

        let mut s = value;
        loop {
            let (rest, tag) = parse_tag_spec(s).ok_or(TagListParseError::Syntax)?;

            // §3.2: ‘Tags with duplicate names MUST NOT occur within a single
            // tag-list; if a tag name does occur more than once, the entire
            // tag-list is invalid.’
            if !names_seen.insert(tag.name) {
                return Err(TagListParseError::DuplicateTag);
            }

            tags.push(tag);

            match rest.strip_prefix(';') {
                Some(rest) => {
                    // a trailing ; after the final tag is allowed
                    if strip_fws(rest).unwrap_or(rest).is_empty() {
                        break;
                    }
                    s = rest;
                }
                None => {
                    if !rest.is_empty() {
                        return Err(TagListParseError::Syntax);
                    }
                    break;
                }
            }
        }

        Ok(Self(tags))
    }
}

fn parse_tag_spec(input: &str) -> Option<(&str, TagSpec<'_>)> {
    let s = strip_fws(input).unwrap_or(input);

    let (s, name) = parse_tag_name(s)?;

    let s = strip_fws(s).unwrap_or(s);
    let s = s.strip_prefix('=')?;
    let s = strip_fws(s).unwrap_or(s);

    let (s, value) = match parse_tag_value(s) {
        Some((s, value)) => (strip_fws(s).unwrap_or(s), value),
        None => (s, Default::default()),
    };

    Some((s, TagSpec { name, value }))
}

fn parse_tag_name(input: &str) -> Option<(&str, &str)> {
    let rest = input
        .strip_prefix(|c: char| c.is_ascii_alphabetic())?
        .trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '_');
    Some((rest, &input[..(input.len() - rest.len())]))
}

// tag-value may contain internal FWS, but not trailing FWS (erratum 5070)
fn parse_tag_value(input: &str) -> Option<(&str, &str)> {
    fn strip_tval(s: &str) -> Option<&str> {
        s.strip_prefix(is_tval_char)
            .map(|s| s.trim_start_matches(is_tval_char))
    }

    let mut s = strip_tval(input)?;

    while let Some(rest) = strip_fws(s).and_then(strip_tval) {
        s = rest;
    }

    Some((s, &input[..(input.len() - s.len())]))
}

fn is_tval_char(c: char) -> bool {
    // printable ASCII except ; or non-ASCII UTF-8
    matches!(c, '!'..=':' | '<'..='~') || !c.is_ascii()
}

// FWS = ([*WSP CRLF] 1*WSP), see RFC 5322
pub fn strip_fws(input: &str) -> Option<&str> {
    fn strip_wsp(s: &str) -> Option<&str> {
        s.strip_prefix(is_wsp).map(|s| s.trim_start_matches(is_wsp))
    }

    fn is_wsp(c: char) -> bool {
        matches!(c, ' ' | '\t')
    }

    if let Some(s) = strip_wsp(input) {
        s.strip_prefix("\r\n").and_then(strip_wsp).or(Some(s))
    } else {
        input.strip_prefix("\r\n").and_then(strip_wsp)
    }
}

/// Removes all folding whitespace from a tag value.
pub fn strip_fws_from_tag_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ' ' | '\t' | '\r' | '\n'))
        .collect()
}

/// Decodes a tag value holding Base64 data, which may be interrupted by FWS.
pub fn parse_base64_tag_value(value: &str) -> Result<Vec<u8>, TagListParseError> {
    let value = strip_fws_from_tag_value(value);
    Base64::decode_vec(&value).map_err(|_| TagListParseError::Syntax)
}

/// Splits a colon-separated tag value into its elements, with surrounding
/// folding whitespace trimmed from each element.
pub fn parse_colon_separated_tag_value(value: &str) -> Vec<&str> {
    value
        .split(':')
        .map(|s| s.trim_matches(|c| matches!(c, ' ' | '\t' | '\r' | '\n')))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_list_basic() {
        let tags = TagList::from_str("v=1; a = rsa-sha256 ;d=example.com;").unwrap();

        assert_eq!(
            tags.as_ref(),
            [
                TagSpec { name: "v", value: "1" },
                TagSpec { name: "a", value: "rsa-sha256" },
                TagSpec { name: "d", value: "example.com" },
            ]
        );
    }

    #[test]
    fn tag_list_folded() {
        let example = " v = 1 ; a=rsa-sha256;d=example.net; s=brisbane;
  c=simple; q=dns/txt;
  h=from:to:subject:date;
  bh=MTIzNDU2Nzg5MDEyMzQ1Njc4OTAxMjM0NTY3ODkwMTI=;
  b=dzdVyOfAKCdLXdJOc9G2q8LoXSlEniSbav+yuU4zGeeruD00lszZVoG4ZHRNiYzR";
        let example = example.replace('\n', "\r\n");

        let tags = TagList::from_str(&example).unwrap();

        assert_eq!(tags.as_ref().len(), 9);
        assert_eq!(tags.as_ref()[3].value, "brisbane");
    }

    #[test]
    fn tag_list_empty_value() {
        let tags = TagList::from_str("v=DKIM1; p=").unwrap();

        assert_eq!(tags.as_ref()[1], TagSpec { name: "p", value: "" });
    }

    #[test]
    fn tag_list_duplicate() {
        assert_eq!(
            TagList::from_str("v=1; v=2"),
            Err(TagListParseError::DuplicateTag)
        );
    }

    #[test]
    fn tag_list_syntax_error() {
        assert!(TagList::from_str("").is_err());
        assert!(TagList::from_str("=1").is_err());
        assert!(TagList::from_str("1v=1").is_err());
    }

    #[test]
    fn colon_separated_value() {
        assert_eq!(
            parse_colon_separated_tag_value("ab:\r\n\tc\r\n\td:e"),
            ["ab", "c\r\n\td", "e"]
        );
        assert_eq!(parse_colon_separated_tag_value(""), [""]);
    }

    #[test]
    fn base64_value_with_fws() {
        assert_eq!(parse_base64_tag_value("YW\r\n\t Jj").unwrap(), b"abc");
        assert!(parse_base64_tag_value("Y(Jj").is_err());
    }
}

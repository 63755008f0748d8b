//! Representation and parsing of raw email messages.

use bstr::ByteSlice;
use std::{
    error::Error,
    fmt::{self, Debug, Display, Formatter},
    hash::{Hash, Hasher},
    str,
};

/// An error produced when a raw message cannot be split into header block and
/// body, or when a header line is not usable for DKIM processing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MessageParseError;

impl Display for MessageParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "malformed message")
    }
}

impl Error for MessageParseError {}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HeaderFieldError;

impl Display for HeaderFieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "invalid header field")
    }
}

impl Error for HeaderFieldError {}

/// A header field name.
///
/// Comparison is case-insensitive, as header field names are not case-sensitive
/// in RFC 5322.
#[derive(Clone, Eq)]
pub struct FieldName(Box<str>);

impl FieldName {
    pub fn new(value: impl Into<Box<str>>) -> Result<Self, HeaderFieldError> {
        let value = value.into();
        if value.is_empty() || !value.chars().all(|c| c.is_ascii_graphic() && c != ':') {
            return Err(HeaderFieldError);
        }
        Ok(Self(value))
    }
}

impl AsRef<str> for FieldName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Debug for FieldName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for FieldName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq for FieldName {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl PartialEq<&str> for FieldName {
    fn eq(&self, other: &&str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl Hash for FieldName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_ascii_lowercase().hash(state);
    }
}

/// A header field body: the raw bytes following the colon, with folded
/// continuation lines retained as `CRLF WSP` sequences.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct FieldBody(Box<[u8]>);

impl FieldBody {
    pub fn new(value: impl Into<Box<[u8]>>) -> Result<Self, HeaderFieldError> {
        let value = value.into();
        let mut lines = value.split_str("\r\n");
        let first = lines.next().unwrap_or_default();
        if first.contains(&b'\r') || first.contains(&b'\n') {
            return Err(HeaderFieldError);
        }
        for line in lines {
            // continuation lines must be folded under WSP and not be blank
            if !line.starts_with(b" ") && !line.starts_with(b"\t") {
                return Err(HeaderFieldError);
            }
            if line.trim_with(|c| c == ' ' || c == '\t').is_empty() {
                return Err(HeaderFieldError);
            }
            if line.contains(&b'\r') || line.contains(&b'\n') {
                return Err(HeaderFieldError);
            }
        }
        Ok(Self(value))
    }
}

impl AsRef<[u8]> for FieldBody {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for FieldBody {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FieldBody").field(&self.0.as_bstr()).finish()
    }
}

pub type HeaderField = (FieldName, FieldBody);

/// The ordered header fields of a message.
///
/// Order is significant for canonicalization and is preserved exactly as
/// received, including duplicate names.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HeaderFields(Box<[HeaderField]>);

impl HeaderFields {
    pub fn new(value: impl Into<Box<[HeaderField]>>) -> Result<Self, HeaderFieldError> {
        let value = value.into();
        if value.is_empty() {
            return Err(HeaderFieldError);
        }
        Ok(Self(value))
    }

    pub fn from_vec(value: Vec<(String, Vec<u8>)>) -> Result<Self, HeaderFieldError> {
        let value: Vec<_> = value
            .into_iter()
            .map(|(name, body)| {
                let name = FieldName::new(name)?;
                let body = FieldBody::new(body)?;
                Ok((name, body))
            })
            .collect::<Result<_, _>>()?;
        Self::new(value)
    }
}

impl AsRef<[HeaderField]> for HeaderFields {
    fn as_ref(&self) -> &[HeaderField] {
        &self.0
    }
}

/// Splits a raw message into header fields and body.
///
/// The split happens at the first empty line. Both CRLF and bare LF line
/// endings are accepted on input; the returned body has its line endings
/// normalized to CRLF, since DKIM canonicalization recognizes only CRLF.
///
/// Folded header lines are retained in the field body, so that the
/// canonicalization algorithms see the original folding.
pub fn parse_message(input: &[u8]) -> Result<(HeaderFields, Vec<u8>), MessageParseError> {
    let mut fields: Vec<(String, Vec<u8>)> = vec![];
    let mut rest = input;

    let body = loop {
        let i = rest.find_byte(b'\n').ok_or(MessageParseError)?;

        let line = match rest[..i].strip_suffix(b"\r") {
            Some(line) => line,
            None => &rest[..i],
        };
        rest = &rest[(i + 1)..];

        if line.is_empty() {
            break rest;
        }

        if line.starts_with(b" ") || line.starts_with(b"\t") {
            let (_, value) = fields.last_mut().ok_or(MessageParseError)?;
            value.extend_from_slice(b"\r\n");
            value.extend_from_slice(line);
        } else {
            let i = line.find_byte(b':').ok_or(MessageParseError)?;
            let name = str::from_utf8(&line[..i]).map_err(|_| MessageParseError)?;
            let name = name.trim_end_matches(|c| c == ' ' || c == '\t');
            fields.push((name.into(), line[(i + 1)..].to_vec()));
        }
    };

    let headers = HeaderFields::from_vec(fields).map_err(|_| MessageParseError)?;

    Ok((headers, normalize_line_endings(body)))
}

fn normalize_line_endings(input: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let mut iter = input.iter().peekable();
    while let Some(&b) = iter.next() {
        match b {
            b'\r' if iter.peek() == Some(&&b'\n') => {}
            b'\n' => result.extend(*b"\r\n"),
            b => result.push(b),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_name_ok() {
        assert!(FieldName::new("Subject").is_ok());

        assert!(FieldName::new("").is_err());
        assert!(FieldName::new("Subject ").is_err());
        assert!(FieldName::new("Sub:ject").is_err());
    }

    #[test]
    fn field_name_debug_output() {
        let name = FieldName::new("Subject").unwrap();
        assert_eq!(format!("{name:?}"), "\"Subject\"");
    }

    #[test]
    fn field_body_ok() {
        assert!(FieldBody::new(*b" ab\r\n\tcd").is_ok());
        assert!(FieldBody::new(*b"  ").is_ok());

        assert!(FieldBody::new(*b" ab\r\ncd").is_err());
        assert!(FieldBody::new(*b" ab\r\n \r\n cd").is_err());
        assert!(FieldBody::new(*b" ab\ncd").is_err());
    }

    #[test]
    fn parse_message_crlf() {
        let msg = b"From: me@example.com\r\nTo: you@example.org\r\n\r\nHello\r\n";

        let (headers, body) = parse_message(msg).unwrap();

        let fields = headers.as_ref();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].0, "from");
        assert_eq!(fields[0].1.as_ref(), b" me@example.com");
        assert_eq!(body, b"Hello\r\n");
    }

    #[test]
    fn parse_message_bare_lf() {
        let msg = b"From: me@example.com\nSubject: hi\n there\n\nline one\nline two\n";

        let (headers, body) = parse_message(msg).unwrap();

        let fields = headers.as_ref();
        assert_eq!(fields[1].1.as_ref(), b" hi\r\n there");
        assert_eq!(body, b"line one\r\nline two\r\n");
    }

    #[test]
    fn parse_message_duplicate_names_preserved() {
        let msg = b"Received: one\r\nReceived: two\r\n\r\n";

        let (headers, _) = parse_message(msg).unwrap();

        let received: Vec<_> = headers
            .as_ref()
            .iter()
            .filter(|(name, _)| *name == "received")
            .collect();
        assert_eq!(received.len(), 2);
    }

    #[test]
    fn parse_message_without_boundary() {
        assert_eq!(
            parse_message(b"From: me@example.com\r\nTo: you@example.org\r\n"),
            Err(MessageParseError)
        );
        assert_eq!(parse_message(b""), Err(MessageParseError));
    }

    #[test]
    fn parse_message_continuation_without_header() {
        assert_eq!(parse_message(b" folded\r\n\r\n"), Err(MessageParseError));
    }
}

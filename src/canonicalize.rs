//! The *simple* and *relaxed* canonicalization algorithms of RFC 6376,
//! section 3.4.
//!
//! Header and body canonicalization are selected independently by the two
//! halves of the c= tag. Body canonicalization is a pure, idempotent transform
//! of the whole message body.

use crate::{
    message::{FieldName, HeaderFields},
    signature::CanonicalizationAlgorithm,
};
use bstr::ByteSlice;
use std::{borrow::Cow, collections::HashSet};

const CRLF: &[u8] = b"\r\n";

/// Canonicalizes a message body.
///
/// Only CRLF is recognized as a line terminator; stray CR and LF bytes are
/// treated like any other byte.
pub fn canonicalize_body(algorithm: CanonicalizationAlgorithm, body: &[u8]) -> Vec<u8> {
    match algorithm {
        CanonicalizationAlgorithm::Simple => {
            // an empty body is canonicalized as a single CRLF
            if body.is_empty() {
                return CRLF.to_vec();
            }

            let mut result = body.to_vec();
            while result.ends_with(b"\r\n\r\n") {
                result.truncate(result.len() - 2);
            }
            if !result.ends_with(CRLF) {
                result.extend(CRLF);
            }
            result
        }
        CanonicalizationAlgorithm::Relaxed => {
            let mut lines: Vec<Vec<u8>> =
                body.split_str(CRLF).map(reduce_line_whitespace).collect();

            while lines.last().is_some_and(|line| line.is_empty()) {
                lines.pop();
            }

            let mut result = Vec::with_capacity(body.len());
            for line in lines {
                result.extend(line);
                result.extend(CRLF);
            }
            result
        }
    }
}

// trim trailing WSP, reduce inner WSP runs to a single SP
fn reduce_line_whitespace(line: &[u8]) -> Vec<u8> {
    fn is_wsp(b: u8) -> bool {
        b == b' ' || b == b'\t'
    }

    let line = line.trim_end_with(|c| c == ' ' || c == '\t');

    let mut result = Vec::with_capacity(line.len());
    let mut in_wsp = false;
    for &b in line {
        if is_wsp(b) {
            in_wsp = true;
        } else {
            if in_wsp {
                result.push(b' ');
                in_wsp = false;
            }
            result.push(b);
        }
    }
    result
}

/// Produces the canonical form of the header fields selected by the
/// signature's h= tag.
///
/// For each listed name the last not-yet-consumed instance of that header is
/// selected, so repeated names in `selected_headers` walk up a stack of
/// duplicate headers. Names that match no remaining header contribute nothing.
pub fn canonicalize_headers(
    algorithm: CanonicalizationAlgorithm,
    headers: &HeaderFields,
    selected_headers: &[FieldName],
) -> Vec<u8> {
    let mut result = vec![];
    let mut consumed = HashSet::with_capacity(selected_headers.len());

    for selected in selected_headers {
        let found = headers
            .as_ref()
            .iter()
            .enumerate()
            .rev()
            .find(|(i, (name, _))| name == selected && !consumed.contains(i));

        if let Some((i, (name, value))) = found {
            canonicalize_header(&mut result, algorithm, name.as_ref(), value.as_ref());
            result.extend(CRLF);
            consumed.insert(i);
        }
    }

    result
}

/// Appends a single canonicalized header field, without trailing CRLF.
pub fn canonicalize_header(
    result: &mut Vec<u8>,
    algorithm: CanonicalizationAlgorithm,
    name: &str,
    value: &[u8],
) {
    match algorithm {
        CanonicalizationAlgorithm::Simple => {
            result.extend(name.bytes());
            result.push(b':');
            result.extend(value);
        }
        CanonicalizationAlgorithm::Relaxed => {
            result.extend(name.to_ascii_lowercase().bytes());
            result.push(b':');
            let value = value.trim_with(|c| matches!(c, ' ' | '\t' | '\r' | '\n'));
            result.extend(reduce_header_whitespace(value));
        }
    }
}

// like body relaxed, but CR and LF of unfolded continuation lines count as
// whitespace too
fn reduce_header_whitespace(value: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(value.len());
    let mut in_wsp = false;
    for &b in value {
        if matches!(b, b' ' | b'\t' | b'\r' | b'\n') {
            in_wsp = true;
        } else {
            if in_wsp {
                result.push(b' ');
                in_wsp = false;
            }
            result.push(b);
        }
    }
    result
}

/// Builds the input over which the data hash of a DKIM signature is computed:
/// the canonicalized selected headers, each followed by CRLF, then the
/// canonicalized *DKIM-Signature* header itself with an emptied b= value and
/// no trailing CRLF.
pub fn signing_input(
    algorithm: CanonicalizationAlgorithm,
    headers: &HeaderFields,
    selected_headers: &[FieldName],
    dkim_sig_name: &str,
    dkim_sig_value: &str,
) -> Vec<u8> {
    let mut result = canonicalize_headers(algorithm, headers, selected_headers);

    let value = strip_signature_data(dkim_sig_value);
    canonicalize_header(&mut result, algorithm, dkim_sig_name, value.as_bytes());

    result
}

/// Returns the header value with the b= tag's value removed, all other bytes
/// untouched.
pub fn strip_signature_data(value: &str) -> Cow<'_, str> {
    fn is_fws(c: char) -> bool {
        matches!(c, ' ' | '\t' | '\r' | '\n')
    }

    let mut pos = 0;

    loop {
        let end = value[pos..]
            .find(';')
            .map(|i| pos + i)
            .unwrap_or(value.len());

        let segment = &value[pos..end];
        let name = segment.trim_start_matches(is_fws);

        if let Some(after) = name.strip_prefix('b') {
            let after = after.trim_start_matches(is_fws);
            if let Some(tag_value) = after.strip_prefix('=') {
                let cut = end - tag_value.len();
                return if end == value.len() {
                    Cow::from(&value[..cut])
                } else {
                    Cow::from(format!("{}{}", &value[..cut], &value[end..]))
                };
            }
        }

        if end == value.len() {
            return Cow::from(value);
        }
        pos = end + 1;
    }
}

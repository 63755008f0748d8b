//! The parsed form of a *DKIM-Signature* header field.

use crate::{
    crypto::{HashAlgorithm, KeyType},
    message::FieldName,
    tag_list::{parse_base64_tag_value, parse_colon_separated_tag_value, TagList, TagSpec},
};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

pub const DKIM_SIGNATURE_NAME: &str = "DKIM-Signature";

/// A signature algorithm, as given in the a= tag.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SignatureAlgorithm {
    /// The *rsa-sha256* signature algorithm.
    RsaSha256,
    /// The *ed25519-sha256* signature algorithm (RFC 8463).
    Ed25519Sha256,
}

impl SignatureAlgorithm {
    pub fn key_type(self) -> KeyType {
        match self {
            Self::RsaSha256 => KeyType::Rsa,
            Self::Ed25519Sha256 => KeyType::Ed25519,
        }
    }

    pub fn hash_algorithm(self) -> HashAlgorithm {
        match self {
            Self::RsaSha256 | Self::Ed25519Sha256 => HashAlgorithm::Sha256,
        }
    }

    pub fn canonical_str(self) -> &'static str {
        match self {
            Self::RsaSha256 => "rsa-sha256",
            Self::Ed25519Sha256 => "ed25519-sha256",
        }
    }
}

impl Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_str())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("rsa-sha256") {
            Ok(Self::RsaSha256)
        } else if s.eq_ignore_ascii_case("ed25519-sha256") {
            Ok(Self::Ed25519Sha256)
        } else {
            Err("unknown signature algorithm")
        }
    }
}

/// A canonicalization algorithm.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum CanonicalizationAlgorithm {
    /// The *simple* canonicalization algorithm.
    #[default]
    Simple,
    /// The *relaxed* canonicalization algorithm.
    Relaxed,
}

impl CanonicalizationAlgorithm {
    pub fn canonical_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Relaxed => "relaxed",
        }
    }
}

impl FromStr for CanonicalizationAlgorithm {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("simple") {
            Ok(Self::Simple)
        } else if s.eq_ignore_ascii_case("relaxed") {
            Ok(Self::Relaxed)
        } else {
            Err("unknown canonicalization algorithm")
        }
    }
}

/// The header/body canonicalization pair from the c= tag.
///
/// The default is `simple/simple`; a single value `x` is short for `x/simple`.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Canonicalization {
    pub header: CanonicalizationAlgorithm,
    pub body: CanonicalizationAlgorithm,
}

impl Display for Canonicalization {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.header.canonical_str(),
            self.body.canonical_str()
        )
    }
}

impl FromStr for Canonicalization {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.split_once('/') {
            Some((header, body)) => Self {
                header: header.parse()?,
                body: body.parse()?,
            },
            None => Self {
                header: s.parse()?,
                body: Default::default(),
            },
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseDomainError;

impl Display for ParseDomainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "could not parse domain name")
    }
}

impl Error for ParseDomainError {}

/// A signing domain, as used in the d= tag.
///
/// Comparison is case-insensitive. Internationalized domain names are accepted
/// in U-label form and converted to A-label form for the DNS query.
#[derive(Clone, Eq)]
pub struct DomainName(Box<str>);

impl DomainName {
    pub fn new(s: &str) -> Result<Self, ParseDomainError> {
        if s.ends_with('.') || !s.contains('.') {
            return Err(ParseDomainError);
        }

        let ascii = idna::domain_to_ascii(s).map_err(|_| ParseDomainError)?;

        if ascii.is_empty() || ascii.split('.').any(|label| label.is_empty()) {
            return Err(ParseDomainError);
        }

        Ok(Self(s.into()))
    }

    /// Returns the domain in its A-label (ASCII) form.
    pub fn to_ascii(&self) -> String {
        idna::domain_to_ascii(&self.0).unwrap_or_else(|_| self.0.to_ascii_lowercase())
    }
}

impl AsRef<str> for DomainName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DomainName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl Display for DomainName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq for DomainName {
    fn eq(&self, other: &Self) -> bool {
        self.to_ascii() == other.to_ascii()
    }
}

/// A selector, as used in the s= tag.
#[derive(Clone, Eq)]
pub struct Selector(Box<str>);

impl Selector {
    pub fn new(s: &str) -> Result<Self, ParseDomainError> {
        if s.is_empty() || s.starts_with('.') || s.ends_with('.') {
            return Err(ParseDomainError);
        }

        let ascii = idna::domain_to_ascii(s).map_err(|_| ParseDomainError)?;

        if ascii.is_empty() || ascii.split('.').any(|label| label.is_empty()) {
            return Err(ParseDomainError);
        }

        Ok(Self(s.into()))
    }

    pub fn to_ascii(&self) -> String {
        idna::domain_to_ascii(&self.0).unwrap_or_else(|_| self.0.to_ascii_lowercase())
    }
}

impl AsRef<str> for Selector {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq for Selector {
    fn eq(&self, other: &Self) -> bool {
        self.to_ascii() == other.to_ascii()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DkimSignatureErrorKind {
    InvalidTagList,
    MissingVersionTag,
    UnsupportedVersion,
    MissingAlgorithmTag,
    HistoricAlgorithm,
    UnsupportedAlgorithm,
    MissingSignatureTag,
    MissingBodyHashTag,
    UnsupportedCanonicalization,
    MissingDomainTag,
    InvalidDomain,
    MissingSignedHeadersTag,
    SignedHeadersEmpty,
    FromHeaderNotSigned,
    MissingSelectorTag,
    InvalidSelector,
    InvalidBodyLength,
    InvalidTimestamp,
    InvalidExpiration,
    InvalidUserId,
    QueryMethodsNotSupported,
    Utf8Encoding,
    ValueSyntax,
}

impl Display for DkimSignatureErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTagList => write!(f, "invalid tag-list"),
            Self::MissingVersionTag => write!(f, "v= tag missing"),
            Self::UnsupportedVersion => write!(f, "unsupported version"),
            Self::MissingAlgorithmTag => write!(f, "a= tag missing"),
            Self::HistoricAlgorithm => write!(f, "historic signature algorithm"),
            Self::UnsupportedAlgorithm => write!(f, "unsupported algorithm"),
            Self::MissingSignatureTag => write!(f, "b= tag missing"),
            Self::MissingBodyHashTag => write!(f, "bh= tag missing"),
            Self::UnsupportedCanonicalization => write!(f, "unsupported canonicalization"),
            Self::MissingDomainTag => write!(f, "d= tag missing"),
            Self::InvalidDomain => write!(f, "invalid domain"),
            Self::MissingSignedHeadersTag => write!(f, "h= tag missing"),
            Self::SignedHeadersEmpty => write!(f, "no signed headers"),
            Self::FromHeaderNotSigned => write!(f, "From header not signed"),
            Self::MissingSelectorTag => write!(f, "s= tag missing"),
            Self::InvalidSelector => write!(f, "invalid selector"),
            Self::InvalidBodyLength => write!(f, "invalid body length"),
            Self::InvalidTimestamp => write!(f, "invalid timestamp"),
            Self::InvalidExpiration => write!(f, "invalid expiration"),
            Self::InvalidUserId => write!(f, "invalid user identity"),
            Self::QueryMethodsNotSupported => write!(f, "query method not supported"),
            Self::Utf8Encoding => write!(f, "header value not UTF-8 encoded"),
            Self::ValueSyntax => write!(f, "syntax error"),
        }
    }
}

impl Error for DkimSignatureErrorKind {}

/// A DKIM signature, parsed from the value of a *DKIM-Signature* header field.
///
/// Unknown tags are ignored; required tags are validated eagerly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DkimSignature {
    pub algorithm: SignatureAlgorithm,
    pub signature_data: Box<[u8]>,
    pub body_hash: Box<[u8]>,
    pub canonicalization: Canonicalization,
    pub domain: DomainName,
    pub signed_headers: Box<[FieldName]>,
    pub selector: Selector,
    pub body_length: Option<u64>,
    pub timestamp: Option<u64>,
    pub expiration: Option<u64>,
    pub user_id: Option<Box<str>>,
}

impl DkimSignature {
    fn from_tag_list(tag_list: &TagList<'_>) -> Result<Self, DkimSignatureErrorKind> {
        let mut version_seen = false;
        let mut algorithm = None;
        let mut signature_data = None;
        let mut body_hash = None;
        let mut canonicalization = None;
        let mut domain = None;
        let mut signed_headers = None;
        let mut selector = None;
        let mut body_length = None;
        let mut timestamp = None;
        let mut expiration = None;
        let mut user_id = None;

        for &TagSpec { name, value } in tag_list.as_ref() {
            match name {
                "v" => {
                    if value != "1" {
                        return Err(DkimSignatureErrorKind::UnsupportedVersion);
                    }
                    version_seen = true;
                }
                "a" => {
                    let value = value.parse().map_err(|_| {
                        if value.eq_ignore_ascii_case("rsa-sha1") {
                            // recognized, but no longer supported (RFC 8301)
                            DkimSignatureErrorKind::HistoricAlgorithm
                        } else {
                            DkimSignatureErrorKind::UnsupportedAlgorithm
                        }
                    })?;
                    algorithm = Some(value);
                }
                "b" => {
                    let value = parse_base64_tag_value(value)
                        .map_err(|_| DkimSignatureErrorKind::ValueSyntax)?;
                    signature_data = Some(value.into());
                }
                "bh" => {
                    let value = parse_base64_tag_value(value)
                        .map_err(|_| DkimSignatureErrorKind::ValueSyntax)?;
                    body_hash = Some(value.into());
                }
                "c" => {
                    let value = value
                        .parse()
                        .map_err(|_| DkimSignatureErrorKind::UnsupportedCanonicalization)?;
                    canonicalization = Some(value);
                }
                "d" => {
                    let value = DomainName::new(value)
                        .map_err(|_| DkimSignatureErrorKind::InvalidDomain)?;
                    domain = Some(value);
                }
                "h" => {
                    let mut names = vec![];
                    for v in parse_colon_separated_tag_value(value) {
                        let name = FieldName::new(v)
                            .map_err(|_| DkimSignatureErrorKind::ValueSyntax)?;
                        names.push(name);
                    }
                    if names.is_empty() {
                        return Err(DkimSignatureErrorKind::SignedHeadersEmpty);
                    }
                    // §3.5: the From header must always be signed
                    if !names.iter().any(|n| *n == "From") {
                        return Err(DkimSignatureErrorKind::FromHeaderNotSigned);
                    }
                    signed_headers = Some(names.into());
                }
                "i" => {
                    match value.rsplit_once('@') {
                        Some((_, domain)) if DomainName::new(domain).is_ok() => {
                            user_id = Some(value.into());
                        }
                        _ => return Err(DkimSignatureErrorKind::InvalidUserId),
                    }
                }
                "l" => {
                    let value = value
                        .parse()
                        .map_err(|_| DkimSignatureErrorKind::InvalidBodyLength)?;
                    body_length = Some(value);
                }
                "q" => {
                    let methods = parse_colon_separated_tag_value(value);
                    if !methods.iter().any(|v| v.eq_ignore_ascii_case("dns/txt")) {
                        return Err(DkimSignatureErrorKind::QueryMethodsNotSupported);
                    }
                }
                "s" => {
                    let value = Selector::new(value)
                        .map_err(|_| DkimSignatureErrorKind::InvalidSelector)?;
                    selector = Some(value);
                }
                "t" => {
                    let value = value
                        .parse()
                        .map_err(|_| DkimSignatureErrorKind::InvalidTimestamp)?;
                    timestamp = Some(value);
                }
                "x" => {
                    let value = value
                        .parse()
                        .map_err(|_| DkimSignatureErrorKind::InvalidExpiration)?;
                    expiration = Some(value);
                }
                // §3.5: unknown tags MUST be ignored
                _ => {}
            }
        }

        if !version_seen {
            return Err(DkimSignatureErrorKind::MissingVersionTag);
        }

        Ok(Self {
            algorithm: algorithm.ok_or(DkimSignatureErrorKind::MissingAlgorithmTag)?,
            signature_data: signature_data.ok_or(DkimSignatureErrorKind::MissingSignatureTag)?,
            body_hash: body_hash.ok_or(DkimSignatureErrorKind::MissingBodyHashTag)?,
            canonicalization: canonicalization.unwrap_or_default(),
            domain: domain.ok_or(DkimSignatureErrorKind::MissingDomainTag)?,
            signed_headers: signed_headers
                .ok_or(DkimSignatureErrorKind::MissingSignedHeadersTag)?,
            selector: selector.ok_or(DkimSignatureErrorKind::MissingSelectorTag)?,
            body_length,
            timestamp,
            expiration,
            user_id,
        })
    }
}

impl FromStr for DkimSignature {
    type Err = DkimSignatureErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag_list =
            TagList::from_str(s).map_err(|_| DkimSignatureErrorKind::InvalidTagList)?;

        Self::from_tag_list(&tag_list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = " v=1; a=rsa-sha256; d=example.net; s=brisbane;\r\n\
        \tc=relaxed/simple; t=1117574938; x=1118006938;\r\n\
        \th=from:to:subject:date;\r\n\
        \tbh=MTIzNDU2Nzg5MDEyMzQ1Njc4OTAxMjM0NTY3ODkwMTI=;\r\n\
        \tb=dzdVyOfAKCdLXdJOc9G2q8LoXSlEniSbav+yuU4zGeeruD00lszZVoG4ZHRNiYzR";

    #[test]
    fn parse_sample_signature() {
        let sig = DkimSignature::from_str(SAMPLE).unwrap();

        assert_eq!(sig.algorithm, SignatureAlgorithm::RsaSha256);
        assert_eq!(sig.domain, DomainName::new("Example.NET").unwrap());
        assert_eq!(sig.selector.as_ref(), "brisbane");
        assert_eq!(
            sig.canonicalization,
            Canonicalization {
                header: CanonicalizationAlgorithm::Relaxed,
                body: CanonicalizationAlgorithm::Simple,
            }
        );
        assert_eq!(sig.signed_headers.len(), 4);
        assert_eq!(sig.body_hash.as_ref(), b"12345678901234567890123456789012");
        assert_eq!(sig.timestamp, Some(1117574938));
        assert_eq!(sig.body_length, None);
    }

    #[test]
    fn canonicalization_defaults() {
        let c: Canonicalization = "relaxed".parse().unwrap();
        assert_eq!(c.header, CanonicalizationAlgorithm::Relaxed);
        assert_eq!(c.body, CanonicalizationAlgorithm::Simple);

        let sig = DkimSignature::from_str(
            "v=1; a=rsa-sha256; d=example.com; s=sel; h=From; bh=MTI=; b=MTI=",
        )
        .unwrap();
        assert_eq!(sig.canonicalization, Canonicalization::default());
    }

    #[test]
    fn missing_version_is_detected() {
        let s = "a=rsa-sha256; d=example.com; s=sel; h=From; bh=MTI=; b=MTI=";
        assert_eq!(
            DkimSignature::from_str(s),
            Err(DkimSignatureErrorKind::MissingVersionTag)
        );
    }

    #[test]
    fn version_must_be_one() {
        let s = "v=2; a=rsa-sha256; d=example.com; s=sel; h=From; bh=MTI=; b=MTI=";
        assert_eq!(
            DkimSignature::from_str(s),
            Err(DkimSignatureErrorKind::UnsupportedVersion)
        );
    }

    #[test]
    fn historic_algorithm_rejected() {
        let s = "v=1; a=rsa-sha1; d=example.com; s=sel; h=From; bh=MTI=; b=MTI=";
        assert_eq!(
            DkimSignature::from_str(s),
            Err(DkimSignatureErrorKind::HistoricAlgorithm)
        );
    }

    #[test]
    fn from_header_must_be_signed() {
        let s = "v=1; a=rsa-sha256; d=example.com; s=sel; h=To:Subject; bh=MTI=; b=MTI=";
        assert_eq!(
            DkimSignature::from_str(s),
            Err(DkimSignatureErrorKind::FromHeaderNotSigned)
        );
    }

    #[test]
    fn domain_and_selector_debug_output() {
        let domain = DomainName::new("example.com").unwrap();
        assert_eq!(format!("{domain:?}"), "\"example.com\"");

        let selector = Selector::new("brisbane").unwrap();
        assert_eq!(format!("{selector:?}"), "\"brisbane\"");
    }

    #[test]
    fn domain_name_validation() {
        assert!(DomainName::new("example.com").is_ok());
        assert!(DomainName::new("mail.example.co.uk").is_ok());

        assert!(DomainName::new("").is_err());
        assert!(DomainName::new("example").is_err());
        assert!(DomainName::new("example.com.").is_err());
    }
}

//! The DKIM public key record, published as a DNS TXT record under
//! `<selector>._domainkey.<domain>`.

use crate::{
    crypto::{HashAlgorithm, KeyType},
    tag_list::{parse_base64_tag_value, parse_colon_separated_tag_value, TagList, TagSpec},
};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

#[derive(Debug, PartialEq, Eq)]
pub enum ServiceType {
    Any,
    Email,
    Other(Box<str>),
}

#[derive(Debug, PartialEq, Eq)]
pub enum KeyRecordFlag {
    Testing,
    NoSubdomains,
    Other(Box<str>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DkimKeyRecordParseError {
    RecordSyntax,
    TagListSyntax,
    UnsupportedVersion,
    MisplacedVersionTag,
    UnsupportedKeyType,
    NoSupportedHashAlgorithms,
    RevokedKey,
    MissingKeyTag,
    InvalidBase64,
    ServiceTypesEmpty,
}

impl Display for DkimKeyRecordParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecordSyntax => write!(f, "ill-formed key record"),
            Self::TagListSyntax => write!(f, "invalid tag-list"),
            Self::UnsupportedVersion => write!(f, "unsupported version"),
            Self::MisplacedVersionTag => write!(f, "v= tag not initial"),
            Self::UnsupportedKeyType => write!(f, "unsupported key type"),
            Self::NoSupportedHashAlgorithms => write!(f, "no supported hash algorithms"),
            Self::RevokedKey => write!(f, "key revoked"),
            Self::MissingKeyTag => write!(f, "p= tag missing"),
            Self::InvalidBase64 => write!(f, "invalid Base64 string"),
            Self::ServiceTypesEmpty => write!(f, "service types empty"),
        }
    }
}

impl Error for DkimKeyRecordParseError {}

/// A parsed DKIM public key record.
///
/// An empty p= tag means the key has been revoked; this parses as the
/// dedicated error [`DkimKeyRecordParseError::RevokedKey`]. Unknown tags are
/// ignored.
#[derive(Debug, PartialEq, Eq)]
pub struct DkimKeyRecord {
    pub key_type: KeyType,
    pub hash_algorithms: Box<[HashAlgorithm]>,
    pub key_data: Box<[u8]>,
    pub service_types: Box<[ServiceType]>,
    pub flags: Box<[KeyRecordFlag]>,
}

impl DkimKeyRecord {
    fn from_tag_list(tag_list: &TagList<'_>) -> Result<Self, DkimKeyRecordParseError> {
        let mut key_type = KeyType::Rsa;
        let mut hash_algorithms = HashAlgorithm::all();
        let mut key_data = None;
        let mut service_types = vec![ServiceType::Any];
        let mut flags = vec![];

        for (i, &TagSpec { name, value }) in tag_list.as_ref().iter().enumerate() {
            match name {
                "v" => {
                    // §3.6.1: if present, v= must be the first tag
                    if i != 0 {
                        return Err(DkimKeyRecordParseError::MisplacedVersionTag);
                    }
                    if value != "DKIM1" {
                        return Err(DkimKeyRecordParseError::UnsupportedVersion);
                    }
                }
                "h" => {
                    let mut algs = vec![];
                    for s in parse_colon_separated_tag_value(value) {
                        if s.eq_ignore_ascii_case("sha256") {
                            algs.push(HashAlgorithm::Sha256);
                        }
                    }
                    if algs.is_empty() {
                        return Err(DkimKeyRecordParseError::NoSupportedHashAlgorithms);
                    }
                    hash_algorithms = algs;
                }
                "k" => {
                    if value.eq_ignore_ascii_case("ed25519") {
                        key_type = KeyType::Ed25519;
                    } else if !value.eq_ignore_ascii_case("rsa") {
                        return Err(DkimKeyRecordParseError::UnsupportedKeyType);
                    }
                }
                "p" => {
                    if value.is_empty() {
                        return Err(DkimKeyRecordParseError::RevokedKey);
                    }

                    let data = parse_base64_tag_value(value)
                        .map_err(|_| DkimKeyRecordParseError::InvalidBase64)?;

                    key_data = Some(data.into());
                }
                "s" => {
                    let mut st = vec![];
                    for s in parse_colon_separated_tag_value(value) {
                        if s == "*" {
                            st.push(ServiceType::Any);
                        } else if s.eq_ignore_ascii_case("email") {
                            st.push(ServiceType::Email);
                        } else {
                            st.push(ServiceType::Other(s.into()));
                        }
                    }
                    if st.is_empty() {
                        return Err(DkimKeyRecordParseError::ServiceTypesEmpty);
                    }
                    service_types = st;
                }
                "t" => {
                    let mut fs = vec![];
                    for s in parse_colon_separated_tag_value(value) {
                        if s.eq_ignore_ascii_case("y") {
                            fs.push(KeyRecordFlag::Testing);
                        } else if s.eq_ignore_ascii_case("s") {
                            fs.push(KeyRecordFlag::NoSubdomains);
                        } else {
                            fs.push(KeyRecordFlag::Other(s.into()));
                        }
                    }
                    flags = fs;
                }
                // §3.6.1: unknown tags MUST be ignored
                _ => {}
            }
        }

        let key_data = key_data.ok_or(DkimKeyRecordParseError::MissingKeyTag)?;

        Ok(Self {
            key_type,
            hash_algorithms: hash_algorithms.into(),
            key_data,
            service_types: service_types.into(),
            flags: flags.into(),
        })
    }

    /// Whether this record's service types permit use with email.
    pub fn allows_email(&self) -> bool {
        self.service_types.contains(&ServiceType::Any)
            || self.service_types.contains(&ServiceType::Email)
    }
}

impl FromStr for DkimKeyRecord {
    type Err = DkimKeyRecordParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag_list =
            TagList::from_str(s).map_err(|_| DkimKeyRecordParseError::TagListSyntax)?;

        Self::from_tag_list(&tag_list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_record_basic() {
        let rec = DkimKeyRecord::from_str("v=DKIM1; k=rsa; s=email; p=YWJj").unwrap();

        assert_eq!(
            rec,
            DkimKeyRecord {
                key_type: KeyType::Rsa,
                hash_algorithms: [HashAlgorithm::Sha256].into(),
                key_data: b"abc".to_vec().into(),
                service_types: [ServiceType::Email].into(),
                flags: [].into(),
            }
        );
        assert!(rec.allows_email());
    }

    #[test]
    fn key_record_defaults() {
        let rec = DkimKeyRecord::from_str("p=YWJj").unwrap();

        assert_eq!(rec.key_type, KeyType::Rsa);
        assert_eq!(rec.service_types.as_ref(), [ServiceType::Any]);
    }

    #[test]
    fn key_record_service_type_other() {
        let rec = DkimKeyRecord::from_str("v=DKIM1; s=web; p=YWJj").unwrap();
        assert!(!rec.allows_email());
    }

    #[test]
    fn key_record_revoked() {
        assert_eq!(
            DkimKeyRecord::from_str("v=DKIM1; p="),
            Err(DkimKeyRecordParseError::RevokedKey)
        );
    }

    #[test]
    fn key_record_missing_key() {
        assert_eq!(
            DkimKeyRecord::from_str("v=DKIM1; k=rsa"),
            Err(DkimKeyRecordParseError::MissingKeyTag)
        );
    }

    #[test]
    fn key_record_version_must_be_first() {
        assert_eq!(
            DkimKeyRecord::from_str("k=rsa; v=DKIM1; p=YWJj"),
            Err(DkimKeyRecordParseError::MisplacedVersionTag)
        );
    }

    #[test]
    fn key_record_sha1_only_not_usable() {
        assert_eq!(
            DkimKeyRecord::from_str("v=DKIM1; h=sha1; p=YWJj"),
            Err(DkimKeyRecordParseError::NoSupportedHashAlgorithms)
        );
    }

    #[test]
    fn key_record_ill_formed() {
        // LF instead of CRLF in folding whitespace is not valid tag-list syntax
        let s = "v=DKIM1; h=sha256; k=rsa; \n\t p=YWJj";
        assert_eq!(
            DkimKeyRecord::from_str(s),
            Err(DkimKeyRecordParseError::TagListSyntax)
        );
    }
}

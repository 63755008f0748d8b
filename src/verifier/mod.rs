// dkimcheck – DKIM signature verification
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.

//! Verification of a single DKIM signature.
//!
//! [`verify_signature`] takes the value of one *DKIM-Signature* header field
//! and performs the steps of RFC 6376, section 6: parse the signature, compare
//! the body hash, obtain the public key from DNS, and verify the signature
//! data over the canonicalized header input.

mod lookup;
mod query;

pub use lookup::LookupTxt;

use crate::{
    canonicalize::{canonicalize_body, signing_input},
    crypto::{self, CryptoError, VerifyingKey},
    message::HeaderFields,
    record::{DkimKeyRecord, DkimKeyRecordParseError},
    signature::{DkimSignature, DkimSignatureErrorKind},
};
use std::{
    fmt::{self, Display, Formatter},
    time::Duration,
};
use tracing::trace;

/// Configuration of the verification process.
#[derive(Clone, Debug)]
pub struct Config {
    /// The time budget for a single DNS key record query. The default is
    /// eight seconds.
    pub lookup_timeout: Duration,

    /// The maximum number of *DKIM-Signature* headers processed per message.
    /// Further signature headers are ignored. The default is ten.
    pub max_signatures: usize,

    /// The header field names (lowercase) that a signature must cover to be
    /// reported as fully covering the message. The default is `from`, `to`,
    /// `date`, and `subject`.
    pub coverage_headers: Vec<Box<str>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lookup_timeout: Duration::from_secs(8),
            max_signatures: 10,
            coverage_headers: vec!["from".into(), "to".into(), "date".into(), "subject".into()],
        }
    }
}

/// The coarse outcome of verifying a signature.
///
/// `KeyUnavailable` covers every condition where no usable public key could be
/// obtained, and is kept apart from `SignatureInvalid`: an unavailable key
/// says nothing about message integrity.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VerificationOutcome {
    SignatureValid,
    SignatureInvalid,
    KeyUnavailable,
}

/// A precise verification failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VerifierError {
    SignatureFormat(DkimSignatureErrorKind),
    BodyHashMismatch,
    InsufficientBodyLength,
    NoKeyFound,
    InvalidKeyDomain,
    KeyLookupTimeout,
    KeyLookup,
    KeyRecordFormat(DkimKeyRecordParseError),
    KeyRevoked,
    WrongKeyType,
    DisallowedHashAlgorithm,
    DisallowedServiceType,
    UnusableKey(CryptoError),
    VerificationFailure,
}

impl VerifierError {
    /// Maps this error to the outcome it implies.
    pub fn outcome(self) -> VerificationOutcome {
        match self {
            Self::SignatureFormat(_)
            | Self::BodyHashMismatch
            | Self::InsufficientBodyLength
            | Self::VerificationFailure => VerificationOutcome::SignatureInvalid,
            Self::NoKeyFound
            | Self::InvalidKeyDomain
            | Self::KeyLookupTimeout
            | Self::KeyLookup
            | Self::KeyRecordFormat(_)
            | Self::KeyRevoked
            | Self::WrongKeyType
            | Self::DisallowedHashAlgorithm
            | Self::DisallowedServiceType
            | Self::UnusableKey(_) => VerificationOutcome::KeyUnavailable,
        }
    }
}

impl Display for VerifierError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignatureFormat(kind) => write!(f, "unusable DKIM-Signature header: {kind}"),
            Self::BodyHashMismatch => write!(f, "body hash did not verify"),
            Self::InsufficientBodyLength => write!(f, "body shorter than declared length"),
            Self::NoKeyFound => write!(f, "no key record found"),
            Self::InvalidKeyDomain => write!(f, "invalid key record domain"),
            Self::KeyLookupTimeout => write!(f, "key record lookup timed out"),
            Self::KeyLookup => write!(f, "key record lookup failed"),
            Self::KeyRecordFormat(e) => write!(f, "unusable key record: {e}"),
            Self::KeyRevoked => write!(f, "key revoked"),
            Self::WrongKeyType => write!(f, "wrong key type in key record"),
            Self::DisallowedHashAlgorithm => {
                write!(f, "hash algorithm not allowed by key record")
            }
            Self::DisallowedServiceType => {
                write!(f, "key record not usable with email")
            }
            Self::UnusableKey(e) => write!(f, "unusable public key: {e}"),
            Self::VerificationFailure => write!(f, "signature did not verify"),
        }
    }
}

impl std::error::Error for VerifierError {}

/// The status resulting from processing a single signature.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VerificationStatus {
    Valid,
    Failure(VerifierError),
}

/// The result of processing a single *DKIM-Signature* header.
#[derive(Debug)]
pub struct SignatureVerification {
    /// The position of the header among the message's *DKIM-Signature*
    /// headers, starting from zero.
    pub index: usize,

    /// The parsed signature, where the header could be parsed at all.
    pub signature: Option<DkimSignature>,

    pub status: VerificationStatus,
}

impl SignatureVerification {
    pub fn outcome(&self) -> VerificationOutcome {
        match &self.status {
            VerificationStatus::Valid => VerificationOutcome::SignatureValid,
            VerificationStatus::Failure(e) => e.outcome(),
        }
    }

    fn failure(index: usize, signature: Option<DkimSignature>, error: VerifierError) -> Self {
        Self {
            index,
            signature,
            status: VerificationStatus::Failure(error),
        }
    }
}

/// Verifies a single *DKIM-Signature* header field.
///
/// `name` and `value` are the header's name as written and its raw value; the
/// name is needed because with *simple* canonicalization its original spelling
/// is part of the signed data.
///
/// The body hash is compared before any DNS query is made, so that a modified
/// body is diagnosed as such even when the key is no longer available.
pub async fn verify_signature<T: LookupTxt + ?Sized>(
    resolver: &T,
    config: &Config,
    headers: &HeaderFields,
    body: &[u8],
    index: usize,
    name: &str,
    value: &str,
) -> SignatureVerification {
    let sig = match value.parse::<DkimSignature>() {
        Ok(sig) => sig,
        Err(kind) => {
            trace!(index, %kind, "unusable DKIM-Signature header");
            return SignatureVerification::failure(
                index,
                None,
                VerifierError::SignatureFormat(kind),
            );
        }
    };

    let hash_alg = sig.algorithm.hash_algorithm();

    let canonical_body = canonicalize_body(sig.canonicalization.body, body);

    let truncated = match sig.body_length {
        Some(len) => match usize::try_from(len) {
            Ok(len) if len <= canonical_body.len() => &canonical_body[..len],
            _ => {
                return SignatureVerification::failure(
                    index,
                    Some(sig),
                    VerifierError::InsufficientBodyLength,
                );
            }
        },
        None => &canonical_body[..],
    };

    let body_hash = crypto::digest(hash_alg, truncated);
    if body_hash.as_ref() != sig.body_hash.as_ref() {
        trace!(index, "body hash mismatch");
        return SignatureVerification::failure(index, Some(sig), VerifierError::BodyHashMismatch);
    }

    let records = match query::look_up_key_records(
        resolver,
        config.lookup_timeout,
        &sig.domain,
        &sig.selector,
    )
    .await
    {
        Ok(records) => records,
        Err(e) => return SignatureVerification::failure(index, Some(sig), e),
    };

    let data = signing_input(
        sig.canonicalization.header,
        headers,
        &sig.signed_headers,
        name,
        value,
    );
    let data_hash = crypto::digest(hash_alg, &data);

    // several key records may be published; the first one that verifies the
    // signature wins, otherwise the last failure is reported
    let mut last_error = VerifierError::NoKeyFound;

    for record in &records {
        let record = match record {
            Ok(s) => match s.parse::<DkimKeyRecord>() {
                Ok(record) => record,
                Err(DkimKeyRecordParseError::RevokedKey) => {
                    last_error = VerifierError::KeyRevoked;
                    continue;
                }
                Err(e) => {
                    last_error = VerifierError::KeyRecordFormat(e);
                    continue;
                }
            },
            Err(_) => {
                last_error =
                    VerifierError::KeyRecordFormat(DkimKeyRecordParseError::RecordSyntax);
                continue;
            }
        };

        if record.key_type != sig.algorithm.key_type() {
            last_error = VerifierError::WrongKeyType;
            continue;
        }
        if !record.hash_algorithms.contains(&hash_alg) {
            last_error = VerifierError::DisallowedHashAlgorithm;
            continue;
        }
        if !record.allows_email() {
            last_error = VerifierError::DisallowedServiceType;
            continue;
        }

        let key = match VerifyingKey::from_key_data(record.key_type, &record.key_data) {
            Ok(key) => key,
            Err(e) => {
                last_error = VerifierError::UnusableKey(e);
                continue;
            }
        };

        match key.verify(hash_alg, &data_hash, &sig.signature_data) {
            Ok(()) => {
                trace!(index, domain = %sig.domain, "signature verified");
                return SignatureVerification {
                    index,
                    signature: Some(sig),
                    status: VerificationStatus::Valid,
                };
            }
            Err(e) => {
                trace!(index, %e, "signature did not verify");
                last_error = VerifierError::VerificationFailure;
            }
        }
    }

    SignatureVerification::failure(index, Some(sig), last_error)
}

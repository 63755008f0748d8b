//! Classification of how well a verified signature covers the message
//! headers a reader actually sees.
//!
//! A DKIM signature only protects the header fields listed in its h= tag. A
//! signature that validates but leaves, say, *Subject* unsigned does not
//! guarantee the subject was not altered in transit; such a result is
//! reported as a partial pass.

use crate::{message::FieldName, verifier::VerificationOutcome};
use std::fmt::{self, Display, Formatter};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CoverageStatus {
    Pass,
    Partial,
    Fail,
}

impl Display for CoverageStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Partial => write!(f, "PARTIAL PASS"),
            Self::Fail => write!(f, "FAIL"),
        }
    }
}

/// The coverage classification of a verification result.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CoverageResult {
    pub status: CoverageStatus,

    /// The checked header names not covered by the signature, in uppercase
    /// and sorted. Empty unless the status is `Partial`.
    pub missing: Vec<Box<str>>,
}

/// Classifies a verification outcome against the set of headers the
/// signature was required to cover.
///
/// Only a valid signature can pass; an invalid signature or an unavailable
/// key is a failure no matter which headers were signed.
pub fn classify(
    outcome: VerificationOutcome,
    signed_headers: &[FieldName],
    required: &[Box<str>],
) -> CoverageResult {
    if outcome != VerificationOutcome::SignatureValid {
        return CoverageResult {
            status: CoverageStatus::Fail,
            missing: vec![],
        };
    }

    let mut missing: Vec<Box<str>> = required
        .iter()
        .filter(|r| !signed_headers.iter().any(|n| *n == &***r))
        .map(|r| r.to_uppercase().into())
        .collect();
    missing.sort();

    if missing.is_empty() {
        CoverageResult {
            status: CoverageStatus::Pass,
            missing,
        }
    } else {
        CoverageResult {
            status: CoverageStatus::Partial,
            missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required() -> Vec<Box<str>> {
        vec!["from".into(), "to".into(), "date".into(), "subject".into()]
    }

    fn names(names: &[&str]) -> Vec<FieldName> {
        names.iter().map(|n| FieldName::new(*n).unwrap()).collect()
    }

    #[test]
    fn all_required_headers_signed() {
        let signed = names(&["From", "To", "Date", "Subject", "MIME-Version"]);

        let result = classify(VerificationOutcome::SignatureValid, &signed, &required());

        assert_eq!(result.status, CoverageStatus::Pass);
        assert!(result.missing.is_empty());
    }

    #[test]
    fn unsigned_headers_reported_uppercase_sorted() {
        let signed = names(&["from", "subject"]);

        let result = classify(VerificationOutcome::SignatureValid, &signed, &required());

        assert_eq!(result.status, CoverageStatus::Partial);
        assert_eq!(result.missing, ["DATE".into(), "TO".into()]);
    }

    #[test]
    fn comparison_is_case_insensitive() {
        let signed = names(&["FROM", "tO", "dAtE", "SUBJECT"]);

        let result = classify(VerificationOutcome::SignatureValid, &signed, &required());

        assert_eq!(result.status, CoverageStatus::Pass);
    }

    #[test]
    fn invalid_signature_fails_regardless_of_headers() {
        let signed = names(&["From", "To", "Date", "Subject"]);

        for outcome in [
            VerificationOutcome::SignatureInvalid,
            VerificationOutcome::KeyUnavailable,
        ] {
            let result = classify(outcome, &signed, &required());
            assert_eq!(result.status, CoverageStatus::Fail);
            assert!(result.missing.is_empty());
        }
    }

    #[test]
    fn status_display() {
        assert_eq!(CoverageStatus::Pass.to_string(), "PASS");
        assert_eq!(CoverageStatus::Partial.to_string(), "PARTIAL PASS");
        assert_eq!(CoverageStatus::Fail.to_string(), "FAIL");
    }
}

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

//! The whole-message check: parse, verify each signature, classify coverage.

use crate::{
    coverage::{self, CoverageResult, CoverageStatus},
    message::{parse_message, HeaderFields, MessageParseError},
    signature::{DkimSignature, DkimSignatureErrorKind, DKIM_SIGNATURE_NAME},
    verifier::{
        verify_signature, Config, LookupTxt, SignatureVerification, VerificationOutcome,
        VerificationStatus, VerifierError,
    },
};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    str,
};

/// An error that terminates the check before any signature could be
/// processed.
///
/// A message without a *DKIM-Signature* header yields `NoDkimSignature`;
/// there is no signature whose validity could be judged, so this is kept
/// apart from any pass or fail classification.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CheckError {
    MalformedMessage,
    NoDkimSignature,
}

impl Display for CheckError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedMessage => write!(f, "malformed message"),
            Self::NoDkimSignature => write!(f, "no DKIM signature header found"),
        }
    }
}

impl Error for CheckError {}

impl From<MessageParseError> for CheckError {
    fn from(_: MessageParseError) -> Self {
        Self::MalformedMessage
    }
}

/// The result of checking a message.
///
/// When the message carries several signatures this reports the first one
/// that verified, or else the last one processed.
#[derive(Debug)]
pub struct CheckResult {
    pub coverage: CoverageResult,
    pub outcome: VerificationOutcome,

    /// The reported signature in parsed form, where it could be parsed.
    pub signature: Option<DkimSignature>,

    /// The position of the reported signature among the message's
    /// *DKIM-Signature* headers, starting from zero.
    pub index: usize,

    /// The precise failure, when the outcome is not `SignatureValid`.
    pub error: Option<VerifierError>,
}

impl CheckResult {
    /// A one-paragraph explanation of the result, suitable for showing to
    /// the person reading the email.
    pub fn summary(&self) -> String {
        match self.coverage.status {
            CoverageStatus::Pass => {
                "The DKIM signature is valid and the contents were not altered after \
                 the email was sent."
                    .into()
            }
            CoverageStatus::Partial => {
                let missing = self.coverage.missing.join(", ");
                format!(
                    "The DKIM signature is valid, but the following headers were not \
                     signed: {missing}. It is unknown if these specific fields were \
                     altered."
                )
            }
            CoverageStatus::Fail => match self.outcome {
                VerificationOutcome::KeyUnavailable => match &self.error {
                    Some(e) => {
                        format!("The DKIM signature could not be verified: {e}.")
                    }
                    None => "The DKIM signature could not be verified.".into(),
                },
                _ => "The DKIM signature is either invalid or the message has been \
                      modified."
                    .into(),
            },
        }
    }
}

/// Checks the DKIM signatures of a raw message.
pub async fn check_message<T: LookupTxt + ?Sized>(
    resolver: &T,
    config: &Config,
    message: &[u8],
) -> Result<CheckResult, CheckError> {
    let (headers, body) = parse_message(message)?;

    check_parsed_message(resolver, config, &headers, &body).await
}

/// Checks the DKIM signatures of an already parsed message.
///
/// Signatures are processed in header order. The first valid signature
/// decides the result; when none verifies, the last failure does.
pub async fn check_parsed_message<T: LookupTxt + ?Sized>(
    resolver: &T,
    config: &Config,
    headers: &HeaderFields,
    body: &[u8],
) -> Result<CheckResult, CheckError> {
    let mut reported: Option<SignatureVerification> = None;

    let sig_headers = headers
        .as_ref()
        .iter()
        .filter(|(name, _)| *name == DKIM_SIGNATURE_NAME)
        .take(config.max_signatures)
        .enumerate();

    for (index, (name, value)) in sig_headers {
        let verification = match str::from_utf8(value.as_ref()) {
            Ok(value) => {
                verify_signature(resolver, config, headers, body, index, name.as_ref(), value)
                    .await
            }
            Err(_) => SignatureVerification {
                index,
                signature: None,
                status: VerificationStatus::Failure(VerifierError::SignatureFormat(
                    DkimSignatureErrorKind::Utf8Encoding,
                )),
            },
        };

        let valid = verification.status == VerificationStatus::Valid;
        reported = Some(verification);
        if valid {
            break;
        }
    }

    let Some(verification) = reported else {
        return Err(CheckError::NoDkimSignature);
    };

    let outcome = verification.outcome();

    let signed_headers = verification
        .signature
        .as_ref()
        .map(|sig| &sig.signed_headers[..])
        .unwrap_or_default();
    let coverage = coverage::classify(outcome, signed_headers, &config.coverage_headers);

    let error = match verification.status {
        VerificationStatus::Valid => None,
        VerificationStatus::Failure(e) => Some(e),
    };

    Ok(CheckResult {
        coverage,
        outcome,
        signature: verification.signature,
        index: verification.index,
        error,
    })
}

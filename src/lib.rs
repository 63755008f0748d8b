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

//! **dkimcheck** verifies the DKIM signatures of an email message (RFC 6376)
//! and reports how well the valid signature covers the headers a reader
//! actually sees.
//!
//! The main entry point is [`check_message`]: it splits a raw message into
//! header and body, verifies each *DKIM-Signature* header in order until one
//! validates, and classifies the result as a full pass, a partial pass with
//! the unsigned headers listed, or a failure. Verification requires a DNS
//! resolver implementing the [`LookupTxt`] trait; with the
//! `hickory-resolver` feature enabled, the Hickory DNS `TokioAsyncResolver`
//! can be used out of the box.
//!
//! # Example
//!
//! ```ignore
//! use dkimcheck::{check_message, Config};
//! use hickory_resolver::TokioAsyncResolver;
//!
//! let resolver = TokioAsyncResolver::tokio_from_system_conf()?;
//! let config = Config::default();
//!
//! let result = check_message(&resolver, &config, &msg).await?;
//!
//! println!("{}: {}", result.coverage.status, result.summary());
//! ```
//!
//! Supported are the *rsa-sha256* and *ed25519-sha256* signature algorithms
//! and the *simple* and *relaxed* canonicalization algorithms. The historic
//! SHA-1 algorithms are not supported, per RFC 8301.

pub mod canonicalize;
pub mod check;
pub mod coverage;
pub mod crypto;
pub mod message;
pub mod record;
pub mod signature;
mod tag_list;
pub mod verifier;

pub use crate::{
    check::{check_message, check_parsed_message, CheckError, CheckResult},
    coverage::{CoverageResult, CoverageStatus},
    message::{parse_message, HeaderFields},
    signature::DkimSignature,
    verifier::{Config, LookupTxt, VerificationOutcome, VerifierError},
};

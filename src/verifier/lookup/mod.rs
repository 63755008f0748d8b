#[cfg(feature = "hickory-resolver")]
mod hickory_resolver;

use std::{future::Future, io};

/// A trait for looking up DNS TXT records containing DKIM public key records.
///
/// The error type used here is `std::io::Error`. The following error kinds on
/// the query result are recognised and receive special treatment.
///
/// * `ErrorKind::InvalidInput`: the domain argument could not be used
/// * `ErrorKind::NotFound`: NXDOMAIN, no key record found
/// * `ErrorKind::TimedOut`: lookup timed out
///
/// Any other error kind is treated as a transient lookup failure. The inner,
/// per-record `std::io::Error` can be used to signal problems with individual
/// TXT records.
pub trait LookupTxt: Send + Sync {
    /// The answer consisting of the TXT records found. Character strings of a
    /// split TXT record must be returned concatenated.
    type Answer: IntoIterator<Item = io::Result<Vec<u8>>>;
    /// The future resolving to the query's answer.
    type Query<'a>: Future<Output = io::Result<Self::Answer>> + Send + 'a
    where
        Self: 'a;

    /// Looks up the domain's TXT records in DNS.
    ///
    /// The domain is passed in absolute, A-label (ASCII) form, eg
    /// `sel._domainkey.example.com.`.
    fn lookup_txt(&self, domain: &str) -> Self::Query<'_>;
}

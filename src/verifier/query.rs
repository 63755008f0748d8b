use crate::{
    signature::{DomainName, Selector},
    verifier::{LookupTxt, VerifierError},
};
use std::{
    io::{self, ErrorKind},
    time::Duration,
};
use tokio::time;
use tracing::trace;

/// Looks up the DKIM key records published for a selector and domain.
///
/// The TXT query goes to `<selector>._domainkey.<domain>.`, both labels in
/// A-label form. Each attempt is bounded by `lookup_timeout`; a transient
/// lookup failure is retried once.
pub async fn look_up_key_records<T: LookupTxt + ?Sized>(
    resolver: &T,
    lookup_timeout: Duration,
    domain: &DomainName,
    selector: &Selector,
) -> Result<Vec<io::Result<String>>, VerifierError> {
    let dname = format!("{}._domainkey.{}.", selector.to_ascii(), domain.to_ascii());

    trace!(domain = %dname, "looking up DKIM key record");

    match query_key_records(resolver, lookup_timeout, &dname).await {
        Err(VerifierError::KeyLookup) => {
            trace!("retrying lookup after transient failure");
            query_key_records(resolver, lookup_timeout, &dname).await
        }
        result => result,
    }
}

async fn query_key_records<T: LookupTxt + ?Sized>(
    resolver: &T,
    lookup_timeout: Duration,
    dname: &str,
) -> Result<Vec<io::Result<String>>, VerifierError> {
    let answer = time::timeout(lookup_timeout, resolver.lookup_txt(dname))
        .await
        .map_err(|_| VerifierError::KeyLookupTimeout)?
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => VerifierError::NoKeyFound,
            ErrorKind::InvalidInput => VerifierError::InvalidKeyDomain,
            ErrorKind::TimedOut => VerifierError::KeyLookupTimeout,
            _ => VerifierError::KeyLookup,
        })?;

    let records: Vec<_> = answer
        .into_iter()
        .map(|txt| {
            txt.and_then(|bytes| {
                String::from_utf8(bytes).map_err(|_| ErrorKind::InvalidData.into())
            })
        })
        .collect();

    // an empty answer is no more usable than NXDOMAIN
    if records.is_empty() {
        return Err(VerifierError::NoKeyFound);
    }

    Ok(records)
}

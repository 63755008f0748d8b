use dkimcheck::LookupTxt;
use std::{
    future::{self, Future},
    io,
    pin::Pin,
};

type AnswerFn = dyn Fn(&str) -> io::Result<Vec<io::Result<Vec<u8>>>> + Send + Sync;

/// A resolver answering from a closure instead of DNS.
pub struct MockLookup(Box<AnswerFn>);

impl MockLookup {
    pub fn new(
        f: impl Fn(&str) -> io::Result<Vec<io::Result<Vec<u8>>>> + Send + Sync + 'static,
    ) -> Self {
        Self(Box::new(f))
    }
}

impl LookupTxt for MockLookup {
    type Answer = Vec<io::Result<Vec<u8>>>;
    type Query<'a> = Pin<Box<dyn Future<Output = io::Result<Self::Answer>> + Send + 'a>>;

    fn lookup_txt(&self, domain: &str) -> Self::Query<'_> {
        let result = (self.0)(domain);
        Box::pin(future::ready(result))
    }
}

/// A resolver whose queries never complete.
pub struct PendingLookup;

impl LookupTxt for PendingLookup {
    type Answer = Vec<io::Result<Vec<u8>>>;
    type Query<'a> = Pin<Box<dyn Future<Output = io::Result<Self::Answer>> + Send + 'a>>;

    fn lookup_txt(&self, _domain: &str) -> Self::Query<'_> {
        Box::pin(future::pending())
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

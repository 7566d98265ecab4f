//! Testing utilities including mock implementations.
//!
//! These let the pipeline run end to end without network access.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{FetchError, FetchResult};
use crate::traits::http::HttpGet;

pub use crate::fetchers::{MockCall, MockFailure, MockFetcher};

/// Mock plain-HTTP client.
///
/// Unknown URLs answer like a 404 (`Ok(None)`). Clones share state.
#[derive(Default, Clone)]
pub struct MockHttp {
    texts: Arc<RwLock<HashMap<String, String>>>,
    bytes: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    failing: Arc<RwLock<Vec<String>>>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, url: &str, body: &str) -> Self {
        self.texts
            .write()
            .unwrap()
            .insert(url.to_string(), body.to_string());
        self
    }

    pub fn with_bytes(self, url: &str, body: Vec<u8>) -> Self {
        self.bytes.write().unwrap().insert(url.to_string(), body);
        self
    }

    /// Every request to `url` fails with a transport error.
    pub fn with_failure(self, url: &str) -> Self {
        self.failing.write().unwrap().push(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    pub fn requested(&self, url: &str) -> bool {
        self.calls.read().unwrap().iter().any(|c| c == url)
    }

    fn record(&self, url: &str) -> FetchResult<()> {
        self.calls.write().unwrap().push(url.to_string());
        if self.failing.read().unwrap().iter().any(|f| f == url) {
            return Err(FetchError::transport(format!("mock connection refused: {}", url)));
        }
        Ok(())
    }
}

#[async_trait]
impl HttpGet for MockHttp {
    async fn get_text(&self, url: &str) -> FetchResult<Option<String>> {
        self.record(url)?;
        Ok(self.texts.read().unwrap().get(url).cloned())
    }

    async fn get_bytes(&self, url: &str, max_size: u64) -> FetchResult<Option<Vec<u8>>> {
        self.record(url)?;
        let bytes = self.bytes.read().unwrap().get(url).cloned();
        match bytes {
            Some(b) if b.len() as u64 > max_size => Err(FetchError::FileTooLarge {
                url: url.to_string(),
                limit: max_size,
            }),
            other => Ok(other),
        }
    }
}

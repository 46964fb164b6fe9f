//! Constant-store client and its TTL cache.

use crate::error::Error as ClientError;
use arbiter_dsl::constants::{Constant, ConstantStore};
use arbiter_dsl::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// HTTP-backed constant store.
///
/// `GET {base}/constants/{code}` returns one constant (404 = not found);
/// `POST {base}/constants/batch` with `{"codes": [...]}` returns the found
/// subset keyed by code.
pub struct HttpConstantStore {
    client: Client,
    base_url: String,
}

impl HttpConstantStore {
    pub fn new(base_url: impl Into<String>) -> std::result::Result<Self, ClientError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn store_error(err: impl std::fmt::Display) -> Error {
        Error::Internal(format!("constant store: {}", err))
    }
}

#[async_trait]
impl ConstantStore for HttpConstantStore {
    async fn get(&self, code: &str) -> Result<Option<Constant>> {
        let url = format!("{}/constants/{}", self.base_url, code);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::store_error)?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::store_error(format!(
                "status {} for {}",
                response.status(),
                url
            )));
        }

        let constant: Constant = response.json().await.map_err(Self::store_error)?;
        Ok(Some(constant))
    }

    async fn batch_get(&self, codes: &[String]) -> Result<HashMap<String, Constant>> {
        if codes.is_empty() {
            return Ok(HashMap::new());
        }
        let url = format!("{}/constants/batch", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "codes": codes }))
            .send()
            .await
            .map_err(Self::store_error)?;

        if !response.status().is_success() {
            return Err(Self::store_error(format!(
                "status {} for {}",
                response.status(),
                url
            )));
        }

        let found: HashMap<String, Constant> =
            response.json().await.map_err(Self::store_error)?;
        Ok(found)
    }
}

struct CacheEntry {
    fetched_at: Instant,
    constant: Option<Constant>,
}

/// TTL cache in front of any [`ConstantStore`]. Negative results are cached
/// too, so a hot rule referencing a missing constant does not hammer the
/// store. Invalidate on constant mutation.
pub struct CachedConstantStore {
    inner: Arc<dyn ConstantStore>,
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl CachedConstantStore {
    pub fn new(inner: Arc<dyn ConstantStore>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Drop every cached entry.
    pub async fn invalidate_all(&self) {
        self.entries.write().await.clear();
    }

    /// Drop a single code, e.g. after a store mutation.
    pub async fn invalidate(&self, code: &str) {
        self.entries.write().await.remove(code);
    }

    async fn fresh(&self, code: &str) -> Option<Option<Constant>> {
        let entries = self.entries.read().await;
        entries.get(code).and_then(|entry| {
            (entry.fetched_at.elapsed() < self.ttl).then(|| entry.constant.clone())
        })
    }
}

#[async_trait]
impl ConstantStore for CachedConstantStore {
    async fn get(&self, code: &str) -> Result<Option<Constant>> {
        if let Some(cached) = self.fresh(code).await {
            tracing::debug!(code = %code, "constant cache hit");
            return Ok(cached);
        }

        let constant = self.inner.get(code).await?;
        self.entries.write().await.insert(
            code.to_string(),
            CacheEntry {
                fetched_at: Instant::now(),
                constant: constant.clone(),
            },
        );
        Ok(constant)
    }

    async fn batch_get(&self, codes: &[String]) -> Result<HashMap<String, Constant>> {
        let mut found = HashMap::new();
        let mut misses = Vec::new();
        for code in codes {
            match self.fresh(code).await {
                Some(Some(constant)) => {
                    found.insert(code.clone(), constant);
                }
                Some(None) => {}
                None => misses.push(code.clone()),
            }
        }

        if !misses.is_empty() {
            let fetched = self.inner.batch_get(&misses).await?;
            let mut entries = self.entries.write().await;
            for code in &misses {
                let constant = fetched.get(code).cloned();
                entries.insert(
                    code.clone(),
                    CacheEntry {
                        fetched_at: Instant::now(),
                        constant: constant.clone(),
                    },
                );
                if let Some(constant) = constant {
                    found.insert(code.clone(), constant);
                }
            }
        }

        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store that counts how often it is actually hit.
    struct CountingStore {
        hits: AtomicUsize,
    }

    #[async_trait]
    impl ConstantStore for CountingStore {
        async fn get(&self, code: &str) -> Result<Option<Constant>> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            if code == "KNOWN" {
                Ok(Some(Constant {
                    code: code.to_string(),
                    value_type: arbiter_dsl::ConstantValueType::Number,
                    value: serde_json::json!(42),
                }))
            } else {
                Ok(None)
            }
        }
    }

    #[tokio::test]
    async fn test_cache_hit_skips_inner_store() {
        let inner = Arc::new(CountingStore {
            hits: AtomicUsize::new(0),
        });
        let cached = CachedConstantStore::new(inner.clone(), Duration::from_secs(60));

        assert!(cached.get("KNOWN").await.unwrap().is_some());
        assert!(cached.get("KNOWN").await.unwrap().is_some());
        assert_eq!(inner.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_negative_results_are_cached() {
        let inner = Arc::new(CountingStore {
            hits: AtomicUsize::new(0),
        });
        let cached = CachedConstantStore::new(inner.clone(), Duration::from_secs(60));

        assert!(cached.get("MISSING").await.unwrap().is_none());
        assert!(cached.get("MISSING").await.unwrap().is_none());
        assert_eq!(inner.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let inner = Arc::new(CountingStore {
            hits: AtomicUsize::new(0),
        });
        let cached = CachedConstantStore::new(inner.clone(), Duration::from_secs(60));

        cached.get("KNOWN").await.unwrap();
        cached.invalidate("KNOWN").await;
        cached.get("KNOWN").await.unwrap();
        assert_eq!(inner.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_batch_get_uses_cache_per_code() {
        let inner = Arc::new(CountingStore {
            hits: AtomicUsize::new(0),
        });
        let cached = CachedConstantStore::new(inner.clone(), Duration::from_secs(60));

        cached.get("KNOWN").await.unwrap();
        let found = cached
            .batch_get(&["KNOWN".to_string(), "MISSING".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        // KNOWN was cached; only MISSING hit the inner store (via default
        // batch_get, one get call).
        assert_eq!(inner.hits.load(Ordering::SeqCst), 2);
    }
}

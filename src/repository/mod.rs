use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::property::PropertyRecord;
use crate::error::{Error, Result};

pub mod memory;
pub mod qdrant;

/// A stored vector plus its listing payload. `vector` and `payload` are
/// `None` when the caller asked a retrieval to omit them.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorPoint {
    pub id: u64,
    pub vector: Option<Vec<f32>>,
    pub payload: Option<PropertyRecord>,
}

/// A nearest-neighbor hit. Higher score is more similar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredPoint {
    pub id: u64,
    pub score: f32,
}

/// Abstraction over the external vector collection store.
///
/// Each collection holds one vector and one payload per listing id under
/// a cosine metric. Upserting an existing id replaces vector and payload
/// together; writes with a vector of the wrong dimension are rejected.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn collection_exists(&self, collection: &str) -> Result<bool>;

    async fn create_collection(&self, collection: &str, dimension: usize) -> Result<()>;

    /// Replace-or-insert by point id. The point's vector is required.
    async fn upsert(&self, collection: &str, point: VectorPoint) -> Result<()>;

    /// Fetch points by id. Ids absent from the collection are simply
    /// missing from the result, not an error.
    async fn retrieve(
        &self,
        collection: &str,
        ids: &[u64],
        with_vectors: bool,
        with_payload: bool,
    ) -> Result<Vec<VectorPoint>>;

    /// Rank-ordered nearest neighbors for `query`, best first.
    async fn search(&self, collection: &str, query: &[f32], limit: usize)
    -> Result<Vec<ScoredPoint>>;

    /// Page through a whole collection. Pass the returned offset back in to
    /// continue; a `None` offset means the scan is complete.
    async fn scroll(
        &self,
        collection: &str,
        offset: Option<u64>,
        limit: usize,
    ) -> Result<(Vec<VectorPoint>, Option<u64>)>;
}

/// Retry `op` up to `attempts` times with exponential backoff, but only for
/// retryable failures. Validation and not-found errors pass straight
/// through.
pub async fn with_retry<T, F, Fut>(op_name: &str, attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = Duration::from_millis(200);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < attempts => {
                log::warn!("{op_name} failed on attempt {attempt}/{attempts}, retrying: {e}");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

pub(crate) fn unknown_collection(collection: &str) -> Error {
    Error::NotFound(format!("collection '{collection}' does not exist"))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::with_retry;
    use crate::error::Error;

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry("op", 3, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::TransientIo("flaky".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.expect("third attempt should succeed"), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_terminal_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Error> = with_retry("op", 3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::Validation("bad input".into())) }
        })
        .await;

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_last_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Error> = with_retry("op", 2, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::TransientIo("down".into())) }
        })
        .await;

        assert!(matches!(result, Err(Error::TransientIo(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

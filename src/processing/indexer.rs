//! Validates listings, generates their embeddings and writes one point per
//! modality collection.

use std::sync::Arc;

use futures::future;
use tokio::sync::Semaphore;

use crate::domain::property::PropertyRecord;
use crate::domain::search::Modality;
use crate::error::{Error, Result};
use crate::processing::embedding::EmbeddingGenerator;
use crate::repository::{VectorPoint, VectorStore, with_retry};

const UPSERT_ATTEMPTS: u32 = 3;

/// Outcome counters for a batch run, reported in one summary log line.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub indexed: usize,
    pub invalid: usize,
    pub embedding_unavailable: usize,
    pub failed: usize,
}

pub struct PropertyIndexer {
    store: Arc<dyn VectorStore>,
    generator: EmbeddingGenerator,
}

impl PropertyIndexer {
    pub fn new(store: Arc<dyn VectorStore>, generator: EmbeddingGenerator) -> Self {
        Self { store, generator }
    }

    /// Idempotently ensures the three modality collections exist with their
    /// fixed dimension and cosine metric.
    pub async fn initialize_collections(&self) -> Result<()> {
        for modality in Modality::ALL {
            let collection = modality.collection();
            if self.store.collection_exists(collection).await? {
                log::info!("Collection '{collection}' already exists");
                continue;
            }
            self.store
                .create_collection(collection, modality.dimension())
                .await?;
            log::info!("Created collection '{collection}'");
        }
        Ok(())
    }

    fn validate(record: &PropertyRecord) -> Result<()> {
        if record.id == 0 {
            return Err(Error::Validation(
                "identifier must be a positive integer".into(),
            ));
        }
        if record.full_address.trim().is_empty() {
            return Err(Error::Validation(format!(
                "property {}: missing full address",
                record.id
            )));
        }
        if record.association_amenities.is_none() {
            return Err(Error::Validation(format!(
                "property {}: missing amenities list",
                record.id
            )));
        }
        if record.photos.is_none() {
            return Err(Error::Validation(format!(
                "property {}: missing photo list",
                record.id
            )));
        }
        Ok(())
    }

    /// Indexes one listing all-or-nothing: validation or embedding failures
    /// abort before any collection is touched, and every staged vector is
    /// dimension-checked before the first write. The per-collection commit
    /// itself is not transactional — a crash mid-sequence can leave the
    /// collections inconsistent for this id until the next re-index
    /// overwrites them.
    pub async fn index_property(&self, record: &PropertyRecord) -> Result<()> {
        Self::validate(record)?;

        let embeddings = self.generator.embed(record).await?;

        let staged = [
            (Modality::Location, embeddings.location),
            (Modality::Features, embeddings.features),
            (Modality::Visual, embeddings.visual),
        ];
        for (modality, vector) in &staged {
            if vector.len() != modality.dimension() {
                return Err(Error::DimensionMismatch {
                    expected: modality.dimension(),
                    actual: vector.len(),
                });
            }
        }

        for (modality, vector) in staged {
            let collection = modality.collection();
            with_retry(collection, UPSERT_ATTEMPTS, || {
                self.store.upsert(
                    collection,
                    VectorPoint {
                        id: record.id,
                        vector: Some(vector.clone()),
                        payload: Some(record.clone()),
                    },
                )
            })
            .await?;
        }

        log::info!("Successfully indexed property {}", record.id);
        Ok(())
    }

    /// Indexes a batch with bounded concurrency. One property's failure
    /// never aborts the others.
    pub async fn index_batch(&self, records: &[PropertyRecord], concurrency: usize) -> IndexStats {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

        let tasks = records.iter().map(|record| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return Err(Error::TransientIo("indexing pool closed".into()));
                    }
                };
                self.index_property(record).await.inspect_err(|e| {
                    log::error!("Error indexing property {}: {e}", record.id);
                })
            }
        });

        let mut stats = IndexStats::default();
        for outcome in future::join_all(tasks).await {
            match outcome {
                Ok(()) => stats.indexed += 1,
                Err(Error::Validation(_)) => stats.invalid += 1,
                Err(Error::EmbeddingUnavailable(_)) => stats.embedding_unavailable += 1,
                Err(_) => stats.failed += 1,
            }
        }
        stats
    }
}

/// Batch-level wrapper that reports outcome counters in one summary line.
pub async fn process_index_batch(
    indexer: &PropertyIndexer,
    records: &[PropertyRecord],
    concurrency: usize,
) -> IndexStats {
    log::info!("Indexing batch of {} properties", records.len());
    let stats = indexer.index_batch(records, concurrency).await;
    log::info!(
        "Finished indexing batch: indexed={}, invalid={}, embedding_unavailable={}, failed={}",
        stats.indexed,
        stats.invalid,
        stats.embedding_unavailable,
        stats.failed
    );
    if stats.invalid > 0 || stats.embedding_unavailable > 0 || stats.failed > 0 {
        log::warn!(
            "Batch had {} properties that were not indexed",
            records.len() - stats.indexed
        );
    }
    stats
}

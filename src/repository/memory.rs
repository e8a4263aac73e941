//! In-process vector store used by tests and local smoke runs.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::RwLock;

use async_trait::async_trait;
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::domain::property::PropertyRecord;
use crate::error::{Error, Result};
use crate::repository::{ScoredPoint, VectorPoint, VectorStore, unknown_collection};

struct Collection {
    dimension: usize,
    // BTreeMap keeps scroll pages in a deterministic id order.
    points: BTreeMap<u64, (Vec<f32>, Option<PropertyRecord>)>,
}

/// Implements the same contract as the remote store against process memory.
/// Nearest-neighbor search builds a transient cosine index over the current
/// points, which is plenty for test corpora and local experiments.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn knn(
    dimension: usize,
    items: &[(u64, Vec<f32>)],
    query: &[f32],
    limit: usize,
) -> Result<Vec<ScoredPoint>> {
    if items.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    let index = Index::new(&IndexOptions {
        dimensions: dimension,
        metric: MetricKind::Cos,
        quantization: ScalarKind::F32,
        ..Default::default()
    })
    .map_err(|e| Error::TransientIo(format!("vector index: {e}")))?;

    index
        .reserve(items.len())
        .map_err(|e| Error::TransientIo(format!("vector index: {e}")))?;

    for (id, vector) in items {
        index
            .add(*id, vector)
            .map_err(|e| Error::TransientIo(format!("vector index: {e}")))?;
    }

    let neighbors = index
        .search(query, limit)
        .map_err(|e| Error::TransientIo(format!("vector index: {e}")))?;

    Ok(neighbors
        .keys
        .iter()
        .zip(neighbors.distances.iter())
        .map(|(&id, &distance)| ScoredPoint {
            id,
            // usearch reports cosine distance; the store contract is
            // similarity, higher is better.
            score: 1.0 - distance,
        })
        .collect())
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        let collections = self
            .collections
            .read()
            .map_err(|_| Error::TransientIo("store lock poisoned".into()))?;
        Ok(collections.contains_key(collection))
    }

    async fn create_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| Error::TransientIo("store lock poisoned".into()))?;
        collections.entry(collection.to_string()).or_insert(Collection {
            dimension,
            points: BTreeMap::new(),
        });
        Ok(())
    }

    async fn upsert(&self, collection: &str, point: VectorPoint) -> Result<()> {
        let vector = point
            .vector
            .ok_or_else(|| Error::Validation(format!("upsert of point {} without a vector", point.id)))?;

        let mut collections = self
            .collections
            .write()
            .map_err(|_| Error::TransientIo("store lock poisoned".into()))?;
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| unknown_collection(collection))?;

        if vector.len() != entry.dimension {
            return Err(Error::DimensionMismatch {
                expected: entry.dimension,
                actual: vector.len(),
            });
        }

        entry.points.insert(point.id, (vector, point.payload));
        Ok(())
    }

    async fn retrieve(
        &self,
        collection: &str,
        ids: &[u64],
        with_vectors: bool,
        with_payload: bool,
    ) -> Result<Vec<VectorPoint>> {
        let collections = self
            .collections
            .read()
            .map_err(|_| Error::TransientIo("store lock poisoned".into()))?;
        let entry = collections
            .get(collection)
            .ok_or_else(|| unknown_collection(collection))?;

        Ok(ids
            .iter()
            .filter_map(|id| {
                entry.points.get(id).map(|(vector, payload)| VectorPoint {
                    id: *id,
                    vector: with_vectors.then(|| vector.clone()),
                    payload: if with_payload { payload.clone() } else { None },
                })
            })
            .collect())
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let (dimension, items) = {
            let collections = self
                .collections
                .read()
                .map_err(|_| Error::TransientIo("store lock poisoned".into()))?;
            let entry = collections
                .get(collection)
                .ok_or_else(|| unknown_collection(collection))?;
            let items: Vec<(u64, Vec<f32>)> = entry
                .points
                .iter()
                .map(|(id, (vector, _))| (*id, vector.clone()))
                .collect();
            (entry.dimension, items)
        };

        if query.len() != dimension {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        knn(dimension, &items, query, limit)
    }

    async fn scroll(
        &self,
        collection: &str,
        offset: Option<u64>,
        limit: usize,
    ) -> Result<(Vec<VectorPoint>, Option<u64>)> {
        let collections = self
            .collections
            .read()
            .map_err(|_| Error::TransientIo("store lock poisoned".into()))?;
        let entry = collections
            .get(collection)
            .ok_or_else(|| unknown_collection(collection))?;

        let page: Vec<VectorPoint> = entry
            .points
            .range((Bound::Included(offset.unwrap_or(0)), Bound::Unbounded))
            .take(limit)
            .map(|(id, (vector, payload))| VectorPoint {
                id: *id,
                vector: Some(vector.clone()),
                payload: payload.clone(),
            })
            .collect();

        let next_offset = page.last().and_then(|last| {
            entry
                .points
                .range((Bound::Excluded(last.id), Bound::Unbounded))
                .next()
                .map(|(id, _)| *id)
        });

        Ok((page, next_offset))
    }
}

//! Helpers for integration tests.
#![allow(dead_code)]

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;

use propmatch::domain::property::PropertyRecord;
use propmatch::domain::search::Modality;
use propmatch::encoders::{ImageEncoder, TextEncoder};
use propmatch::error::{Error, Result};
use propmatch::processing::embedding::{EmbeddingGenerator, PhotoFetcher};
use propmatch::repository::memory::InMemoryVectorStore;
use propmatch::repository::{VectorPoint, VectorStore};

/// Deterministic stand-in for a sentence encoder: equal text always maps to
/// the same vector, different text almost surely to a different one.
pub struct HashTextEncoder {
    pub dimension: usize,
}

fn seeded_vector(seed: u64, dimension: usize) -> Vec<f32> {
    let mut state = seed;
    (0..dimension)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) as f32 / (1u64 << 31) as f32) - 1.0
        })
        .collect()
}

fn hash_of(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

impl TextEncoder for HashTextEncoder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        Ok(seeded_vector(hash_of(text.as_bytes()), self.dimension))
    }
}

/// Deterministic stand-in for an image encoder keyed on the image bytes.
pub struct ByteImageEncoder {
    pub dimension: usize,
}

impl ImageEncoder for ByteImageEncoder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode(&self, image: &[u8]) -> Result<Vec<f32>> {
        Ok(seeded_vector(hash_of(image), self.dimension))
    }
}

/// Returns each photo URL's own bytes instead of hitting a network.
pub struct EchoFetcher;

#[async_trait]
impl PhotoFetcher for EchoFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        Ok(url.as_bytes().to_vec())
    }
}

/// Simulates an unreachable photo host.
pub struct FailingFetcher;

#[async_trait]
impl PhotoFetcher for FailingFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        Err(Error::TransientIo(format!("unreachable: {url}")))
    }
}

pub fn stub_generator(photos: Arc<dyn PhotoFetcher>) -> EmbeddingGenerator {
    EmbeddingGenerator::new(
        Arc::new(HashTextEncoder {
            dimension: Modality::Location.dimension(),
        }),
        Arc::new(ByteImageEncoder {
            dimension: Modality::Visual.dimension(),
        }),
        photos,
    )
}

/// A listing with every field indexing and filtering depend on.
pub fn sample_property(id: u64) -> PropertyRecord {
    PropertyRecord {
        id,
        listing_id: format!("L{id}"),
        full_address: format!("{id} main st, brooklyn"),
        property_type: Some("CONDO".into()),
        sale_lease: Some("sale".into()),
        list_price: Some(120_000.0),
        bedrooms: Some(3),
        bathrooms: Some(2.0),
        association_amenities: Some(vec!["Gym".into(), "Doorman".into()]),
        interior_features: vec!["Hardwood Floors".into()],
        photos: Some(vec![format!("http://photos.test/{id}/front.jpg")]),
        description: Some("bright unit with parking and a gym".into()),
        city: Some("brooklyn".into()),
        county: Some("kings".into()),
        state: Some("ny".into()),
        country: Some("us".into()),
        ..Default::default()
    }
}

/// Unit vector in the plane of the first two axes, `theta` radians from the
/// first axis. Cosine similarity between two of these is `cos(theta delta)`,
/// which makes neighbor order easy to stage.
pub fn planar_unit_vector(dimension: usize, theta: f32) -> Vec<f32> {
    let mut vector = vec![0.0; dimension];
    vector[0] = theta.cos();
    vector[1] = theta.sin();
    vector
}

pub async fn create_modality_collections(store: &InMemoryVectorStore) {
    for modality in Modality::ALL {
        store
            .create_collection(modality.collection(), modality.dimension())
            .await
            .expect("collection should be created");
    }
}

pub async fn seed_point(
    store: &InMemoryVectorStore,
    modality: Modality,
    id: u64,
    theta: f32,
    payload: PropertyRecord,
) {
    store
        .upsert(
            modality.collection(),
            VectorPoint {
                id,
                vector: Some(planar_unit_vector(modality.dimension(), theta)),
                payload: Some(payload),
            },
        )
        .await
        .expect("seed upsert should succeed");
}

/// Total number of points in a collection, counted through the scroll API.
pub async fn point_count(store: &InMemoryVectorStore, collection: &str) -> usize {
    let mut count = 0;
    let mut offset = None;
    loop {
        let (page, next) = store
            .scroll(collection, offset, 32)
            .await
            .expect("scroll should succeed");
        count += page.len();
        match next {
            Some(_) => offset = next,
            None => break,
        }
    }
    count
}

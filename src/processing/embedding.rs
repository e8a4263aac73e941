//! Embedding generation: modality prompts, photo aggregation, normalization.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future;
use url::Url;

use crate::domain::property::PropertyRecord;
use crate::encoders::{ImageEncoder, TextEncoder};
use crate::error::{Error, Result};

/// At most this many photos contribute to the visual embedding.
pub const DEFAULT_PHOTO_LIMIT: usize = 5;

/// Lowercase and trim. The encoders do their own tokenization beyond this.
pub(crate) fn preprocess(text: &str) -> String {
    text.to_lowercase().trim().to_string()
}

/// Geographic prompt: city, county, state, country, in that order.
pub fn location_prompt(record: &PropertyRecord) -> String {
    preprocess(&format!(
        "{} {} {} {}",
        record.city.as_deref().unwrap_or(""),
        record.county.as_deref().unwrap_or(""),
        record.state.as_deref().unwrap_or(""),
        record.country.as_deref().unwrap_or(""),
    ))
}

/// Amenity/attribute prompt: the structured feature lists plus the labeled
/// scalar attributes, space-joined in a fixed field order.
pub fn features_prompt(record: &PropertyRecord) -> String {
    let mut parts: Vec<String> = Vec::new();
    parts.extend(record.association_amenities.iter().flatten().cloned());
    parts.extend(record.interior_features.iter().cloned());
    parts.extend(record.exterior_features.iter().cloned());
    parts.extend(record.appliances.iter().cloned());
    parts.extend(record.lot_features.iter().cloned());
    parts.push(format!(
        "property_type: {}",
        record.property_type.as_deref().unwrap_or("")
    ));
    parts.push(format!(
        "architectural_style: {}",
        record.architectural_style.as_deref().unwrap_or("")
    ));
    parts.push(format!(
        "sale_lease: {}",
        record.sale_lease.as_deref().unwrap_or("")
    ));
    parts.extend(record.accessibility_features.iter().cloned());
    parts.extend(record.building_features.iter().cloned());
    parts.extend(record.fireplace_features.iter().cloned());
    parts.extend(record.laundry_features.iter().cloned());
    parts.extend(record.parking_features.iter().cloned());
    parts.extend(record.pool_features.iter().cloned());
    parts.extend(record.security_features.iter().cloned());
    parts.extend(record.waterfront_features.iter().cloned());
    preprocess(&parts.join(" "))
}

pub fn description_prompt(record: &PropertyRecord) -> String {
    preprocess(record.description.as_deref().unwrap_or(""))
}

/// Normalize a vector to unit length. Returns the original vector when the
/// norm is zero.
pub(crate) fn normalize(vector: &[f32]) -> Vec<f32> {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        vector.to_vec()
    } else {
        vector.iter().map(|x| x / norm).collect()
    }
}

fn mean_of(vectors: &[Vec<f32>]) -> Vec<f32> {
    let dimension = vectors[0].len();
    let mut mean = vec![0.0f32; dimension];
    for vector in vectors {
        for (slot, value) in mean.iter_mut().zip(vector) {
            *slot += value;
        }
    }
    let count = vectors.len() as f32;
    mean.iter_mut().for_each(|slot| *slot /= count);
    mean
}

/// Downloads listing photos. Abstracted so tests run without a network.
#[async_trait]
pub trait PhotoFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpPhotoFetcher {
    client: reqwest::Client,
}

impl HttpPhotoFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::TransientIo(format!("http client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PhotoFetcher for HttpPhotoFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::TransientIo(format!("photo request: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::TransientIo(format!(
                "photo request {url} returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::TransientIo(format!("photo body: {e}")))?;
        Ok(bytes.to_vec())
    }
}

/// Normalized per-modality vectors for one listing.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyEmbeddings {
    pub location: Vec<f32>,
    pub features: Vec<f32>,
    pub description: Vec<f32>,
    pub visual: Vec<f32>,
}

/// Turns a raw listing into normalized vectors for every modality.
/// Stateless across calls apart from the loaded encoder models.
pub struct EmbeddingGenerator {
    text: Arc<dyn TextEncoder>,
    image: Arc<dyn ImageEncoder>,
    photos: Arc<dyn PhotoFetcher>,
    photo_limit: usize,
}

impl EmbeddingGenerator {
    pub fn new(
        text: Arc<dyn TextEncoder>,
        image: Arc<dyn ImageEncoder>,
        photos: Arc<dyn PhotoFetcher>,
    ) -> Self {
        Self {
            text,
            image,
            photos,
            photo_limit: DEFAULT_PHOTO_LIMIT,
        }
    }

    pub fn with_photo_limit(mut self, photo_limit: usize) -> Self {
        self.photo_limit = photo_limit;
        self
    }

    pub async fn embed(&self, record: &PropertyRecord) -> Result<PropertyEmbeddings> {
        let location = normalize(&self.text.encode(&location_prompt(record))?);
        let features = normalize(&self.text.encode(&features_prompt(record))?);
        let description = normalize(&self.text.encode(&description_prompt(record))?);
        let visual = self
            .visual_embedding(record.photos.as_deref().unwrap_or_default())
            .await?;

        Ok(PropertyEmbeddings {
            location,
            features,
            description,
            visual,
        })
    }

    /// Mean of the per-photo normalized vectors, re-normalized. Individual
    /// photo failures are logged and skipped; zero usable photos fails the
    /// whole visual embedding.
    async fn visual_embedding(&self, photo_urls: &[String]) -> Result<Vec<f32>> {
        let tasks = photo_urls.iter().take(self.photo_limit).map(|url| async move {
            if let Err(e) = Url::parse(url) {
                log::warn!("Skipping malformed photo URL {url}: {e}");
                return None;
            }
            let bytes = match self.photos.fetch(url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("Error fetching photo {url}: {e}");
                    return None;
                }
            };
            match self.image.encode(&bytes) {
                Ok(vector) => Some(normalize(&vector)),
                Err(e) => {
                    log::warn!("Error processing photo {url}: {e}");
                    None
                }
            }
        });

        let embeddings: Vec<Vec<f32>> = future::join_all(tasks)
            .await
            .into_iter()
            .flatten()
            .collect();

        if embeddings.is_empty() {
            return Err(Error::EmbeddingUnavailable(format!(
                "no usable photo out of {}",
                photo_urls.len().min(self.photo_limit)
            )));
        }

        Ok(normalize(&mean_of(&embeddings)))
    }
}

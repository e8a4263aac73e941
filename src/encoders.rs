//! Embedding model seams and their fastembed-backed implementations.

use std::io::Write;
use std::sync::Mutex;

use fastembed::{
    EmbeddingModel, ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, InitOptions,
    TextEmbedding,
};

use crate::error::{Error, Result};

/// Opaque `text -> vector` encoder. Implementations must be pure: the same
/// input always yields the same vector.
pub trait TextEncoder: Send + Sync {
    fn dimension(&self) -> usize;
    fn encode(&self, text: &str) -> Result<Vec<f32>>;
}

/// Opaque `image bytes -> vector` encoder. Decoding failures are reported as
/// errors so the caller can skip the offending image.
pub trait ImageEncoder: Send + Sync {
    fn dimension(&self) -> usize;
    fn encode(&self, image: &[u8]) -> Result<Vec<f32>>;
}

pub const TEXT_DIMENSION: usize = 384;
pub const IMAGE_DIMENSION: usize = 512;

/// all-MiniLM-L6-v2 sentence encoder, 384 dimensions.
pub struct MiniLmTextEncoder {
    model: Mutex<TextEmbedding>,
}

impl MiniLmTextEncoder {
    pub fn new() -> Result<Self> {
        let model = TextEmbedding::try_new(InitOptions::new(EmbeddingModel::AllMiniLML6V2))
            .map_err(|e| Error::EmbeddingUnavailable(format!("text model init: {e}")))?;
        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl TextEncoder for MiniLmTextEncoder {
    fn dimension(&self) -> usize {
        TEXT_DIMENSION
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| Error::EmbeddingUnavailable("text encoder lock poisoned".into()))?;
        model
            .embed(vec![text.to_string()], None)
            .map_err(|e| Error::EmbeddingUnavailable(format!("text encode: {e}")))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::EmbeddingUnavailable("text encoder returned no vector".into()))
    }
}

/// CLIP ViT-B/32 image encoder, 512 dimensions.
///
/// The fastembed image API is path-based, so incoming bytes are staged
/// through a temporary file that is removed when the handle drops.
pub struct ClipImageEncoder {
    model: Mutex<ImageEmbedding>,
}

impl ClipImageEncoder {
    pub fn new() -> Result<Self> {
        let model = ImageEmbedding::try_new(ImageInitOptions::new(ImageEmbeddingModel::ClipVitB32))
            .map_err(|e| Error::EmbeddingUnavailable(format!("image model init: {e}")))?;
        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl ImageEncoder for ClipImageEncoder {
    fn dimension(&self) -> usize {
        IMAGE_DIMENSION
    }

    fn encode(&self, image: &[u8]) -> Result<Vec<f32>> {
        let mut file = tempfile::NamedTempFile::new()
            .map_err(|e| Error::EmbeddingUnavailable(format!("image staging: {e}")))?;
        file.write_all(image)
            .map_err(|e| Error::EmbeddingUnavailable(format!("image staging: {e}")))?;

        let mut model = self
            .model
            .lock()
            .map_err(|_| Error::EmbeddingUnavailable("image encoder lock poisoned".into()))?;
        model
            .embed(vec![file.path()], None)
            .map_err(|e| Error::EmbeddingUnavailable(format!("image encode: {e}")))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::EmbeddingUnavailable("image encoder returned no vector".into()))
    }
}

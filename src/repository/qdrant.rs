//! Qdrant-backed vector store speaking the HTTP API through `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::property::PropertyRecord;
use crate::error::{Error, Result};
use crate::repository::{ScoredPoint, VectorPoint, VectorStore};

pub struct QdrantVectorStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl QdrantVectorStore {
    /// `base_url` is the HTTP endpoint, e.g. `http://localhost:6333`.
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::TransientIo(format!("http client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }
        request
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::TransientIo(format!("qdrant request: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::NOT_FOUND {
            Err(Error::NotFound(format!("qdrant: {body}")))
        } else {
            Err(Error::TransientIo(format!("qdrant returned {status}: {body}")))
        }
    }
}

#[derive(Serialize)]
struct CreateCollectionBody {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct VectorParams {
    size: usize,
    distance: &'static str,
}

#[derive(Serialize)]
struct UpsertBody {
    points: Vec<PointBody>,
}

#[derive(Serialize)]
struct PointBody {
    id: u64,
    vector: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<PropertyRecord>,
}

#[derive(Serialize)]
struct RetrieveBody<'a> {
    ids: &'a [u64],
    with_vector: bool,
    with_payload: bool,
}

#[derive(Deserialize)]
struct PointsResponse {
    result: Vec<PointResult>,
}

#[derive(Deserialize)]
struct PointResult {
    id: u64,
    #[serde(default)]
    vector: Option<Vec<f32>>,
    #[serde(default)]
    payload: Option<PropertyRecord>,
}

#[derive(Serialize)]
struct SearchBody<'a> {
    vector: &'a [f32],
    limit: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<ScoredResult>,
}

#[derive(Deserialize)]
struct ScoredResult {
    id: u64,
    score: f32,
}

#[derive(Serialize)]
struct ScrollBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<u64>,
    limit: usize,
    with_vector: bool,
    with_payload: bool,
}

#[derive(Deserialize)]
struct ScrollResponse {
    result: ScrollResult,
}

#[derive(Deserialize)]
struct ScrollResult {
    points: Vec<PointResult>,
    #[serde(default)]
    next_page_offset: Option<u64>,
}

impl From<PointResult> for VectorPoint {
    fn from(point: PointResult) -> Self {
        VectorPoint {
            id: point.id,
            vector: point.vector,
            payload: point.payload,
        }
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        let response = self
            .request(reqwest::Method::GET, &format!("/collections/{collection}"))
            .send()
            .await
            .map_err(|e| Error::TransientIo(format!("qdrant request: {e}")))?;
        Ok(response.status().is_success())
    }

    async fn create_collection(&self, collection: &str, dimension: usize) -> Result<()> {
        let body = CreateCollectionBody {
            vectors: VectorParams {
                size: dimension,
                distance: "Cosine",
            },
        };
        self.send(
            self.request(reqwest::Method::PUT, &format!("/collections/{collection}"))
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, point: VectorPoint) -> Result<()> {
        let vector = point
            .vector
            .ok_or_else(|| Error::Validation(format!("upsert of point {} without a vector", point.id)))?;
        let body = UpsertBody {
            points: vec![PointBody {
                id: point.id,
                vector,
                payload: point.payload,
            }],
        };
        // wait=true keeps upserts read-after-write for idempotent re-indexing.
        self.send(
            self.request(
                reqwest::Method::PUT,
                &format!("/collections/{collection}/points"),
            )
            .query(&[("wait", "true")])
            .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn retrieve(
        &self,
        collection: &str,
        ids: &[u64],
        with_vectors: bool,
        with_payload: bool,
    ) -> Result<Vec<VectorPoint>> {
        let body = RetrieveBody {
            ids,
            with_vector: with_vectors,
            with_payload,
        };
        let response = self
            .send(
                self.request(
                    reqwest::Method::POST,
                    &format!("/collections/{collection}/points"),
                )
                .json(&body),
            )
            .await?;

        let points: PointsResponse = response
            .json()
            .await
            .map_err(|e| Error::TransientIo(format!("qdrant response: {e}")))?;
        Ok(points.result.into_iter().map(VectorPoint::from).collect())
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let body = SearchBody {
            vector: query,
            limit,
        };
        let response = self
            .send(
                self.request(
                    reqwest::Method::POST,
                    &format!("/collections/{collection}/points/search"),
                )
                .json(&body),
            )
            .await?;

        let hits: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::TransientIo(format!("qdrant response: {e}")))?;
        Ok(hits
            .result
            .into_iter()
            .map(|hit| ScoredPoint {
                id: hit.id,
                score: hit.score,
            })
            .collect())
    }

    async fn scroll(
        &self,
        collection: &str,
        offset: Option<u64>,
        limit: usize,
    ) -> Result<(Vec<VectorPoint>, Option<u64>)> {
        let body = ScrollBody {
            offset,
            limit,
            with_vector: true,
            with_payload: true,
        };
        let response = self
            .send(
                self.request(
                    reqwest::Method::POST,
                    &format!("/collections/{collection}/points/scroll"),
                )
                .json(&body),
            )
            .await?;

        let page: ScrollResponse = response
            .json()
            .await
            .map_err(|e| Error::TransientIo(format!("qdrant response: {e}")))?;
        Ok((
            page.result
                .points
                .into_iter()
                .map(VectorPoint::from)
                .collect(),
            page.result.next_page_offset,
        ))
    }
}

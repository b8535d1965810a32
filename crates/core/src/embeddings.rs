use crate::error::IndexError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

/// The embedding collaborator: text in, fixed-dimension vector out. Failure
/// of a call is a chunk-level failure for the pipeline.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError>;
}

/// Embedder backed by an HTTP inference service exposing
/// `POST {base}/embed` with body `{"inputs": text}` and a `[[f32, ...]]`
/// response.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    endpoint: String,
    dimensions: usize,
    client: Client,
}

impl HttpEmbedder {
    pub fn new(endpoint: impl Into<String>, dimensions: usize) -> Self {
        Self {
            endpoint: endpoint.into(),
            dimensions,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        tracing::debug!(chars = text.chars().count(), "requesting embedding");

        let response = self
            .client
            .post(format!("{}/embed", self.endpoint))
            .json(&json!({ "inputs": text }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IndexError::backend("embedder", response.status()));
        }

        let vectors: Vec<Vec<f32>> = response.json().await?;
        let embedding = vectors
            .into_iter()
            .next()
            .ok_or_else(|| IndexError::backend("embedder", "empty embedding response"))?;

        if embedding.len() != self.dimensions {
            return Err(IndexError::Request(format!(
                "embedding dimension {} does not match configured {}",
                embedding.len(),
                self.dimensions
            )));
        }

        Ok(embedding)
    }
}

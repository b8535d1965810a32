use crate::error::IndexError;
use crate::models::{ChunkRow, SearchHit};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

pub const DEFAULT_COLLECTION_NAME: &str = "micla_embeddings";
pub const RETRIEVAL_TOP_K: usize = 7;

const VECTOR_FIELD: &str = "embedding";
const FILE_ID_FIELD: &str = "file_id";
const TEXT_FIELD: &str = "text";
const DOCUMENT_NAME_FIELD: &str = "document_name";
const DOCUMENT_PAGES_FIELD: &str = "document_pages";

/// Vector index backed by the Milvus v2 RESTful API. Rows hold the chunk
/// text, its document identity, and the structural label under the
/// `document_pages` scalar field; similarity is cosine.
pub struct MilvusStore {
    endpoint: String,
    collection: String,
    vector_size: usize,
    client: Client,
}

impl MilvusStore {
    pub fn new(
        endpoint: impl Into<String>,
        collection: impl Into<String>,
        vector_size: usize,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            collection: collection.into(),
            vector_size,
            client: Client::new(),
        }
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, IndexError> {
        let response = self
            .client
            .post(format!("{}{}", self.endpoint, path))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IndexError::backend("milvus", response.status()));
        }

        let parsed: Value = response.json().await?;
        Ok(parsed)
    }

    fn response_code(parsed: &Value) -> i64 {
        parsed.pointer("/code").and_then(Value::as_i64).unwrap_or(0)
    }

    fn response_message(parsed: &Value) -> &str {
        parsed
            .pointer("/message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
    }
}

#[async_trait]
impl VectorIndex for MilvusStore {
    async fn ensure_collection(&self, dimension: usize) -> Result<(), IndexError> {
        if self.vector_size != dimension {
            return Err(IndexError::Request(format!(
                "configured vector size {} does not match requested {}",
                self.vector_size, dimension
            )));
        }

        let has = self
            .post(
                "/v2/vectordb/collections/has",
                json!({ "collectionName": self.collection }),
            )
            .await?;
        if has
            .pointer("/data/has")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            tracing::debug!(collection = %self.collection, "collection already exists");
            return Ok(());
        }

        let created = self
            .post(
                "/v2/vectordb/collections/create",
                json!({
                    "collectionName": self.collection,
                    "dimension": dimension,
                    "metricType": "COSINE",
                    "idType": "Int64",
                    "autoID": true,
                    "primaryFieldName": "id",
                    "vectorFieldName": VECTOR_FIELD,
                }),
            )
            .await?;

        let code = Self::response_code(&created);
        let message = Self::response_message(&created);
        // A concurrent caller may have won the create race; that still counts
        // as the collection existing.
        if code != 0 && !message.contains("already exist") {
            return Err(IndexError::backend("milvus", message));
        }

        tracing::info!(collection = %self.collection, dimension, "vector collection ready");
        Ok(())
    }

    async fn insert(&self, rows: &[ChunkRow]) -> Result<(), IndexError> {
        if rows.is_empty() {
            return Ok(());
        }

        let data = rows
            .iter()
            .map(|row| {
                if row.embedding.len() != self.vector_size {
                    return Err(IndexError::Request(format!(
                        "embedding dimension {} does not match collection size {}",
                        row.embedding.len(),
                        self.vector_size
                    )));
                }
                Ok(json!({
                    FILE_ID_FIELD: row.document_id,
                    TEXT_FIELD: row.text,
                    DOCUMENT_NAME_FIELD: row.document_name,
                    DOCUMENT_PAGES_FIELD: row.label,
                    VECTOR_FIELD: row.embedding,
                }))
            })
            .collect::<Result<Vec<_>, IndexError>>()?;

        let inserted = self
            .post(
                "/v2/vectordb/entities/insert",
                json!({
                    "collectionName": self.collection,
                    "data": data,
                }),
            )
            .await?;

        if Self::response_code(&inserted) != 0 {
            return Err(IndexError::backend(
                "milvus",
                Self::response_message(&inserted),
            ));
        }

        tracing::debug!(collection = %self.collection, rows = rows.len(), "rows inserted");
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, IndexError> {
        if query_vector.len() != self.vector_size {
            return Err(IndexError::Request(format!(
                "query vector dimension {} does not match collection size {}",
                query_vector.len(),
                self.vector_size
            )));
        }

        let parsed = self
            .post(
                "/v2/vectordb/entities/search",
                json!({
                    "collectionName": self.collection,
                    "data": [query_vector],
                    "annsField": VECTOR_FIELD,
                    "limit": top_k,
                    "outputFields": [
                        DOCUMENT_NAME_FIELD,
                        DOCUMENT_PAGES_FIELD,
                        TEXT_FIELD,
                        FILE_ID_FIELD,
                    ],
                }),
            )
            .await?;

        if Self::response_code(&parsed) != 0 {
            return Err(IndexError::backend(
                "milvus",
                Self::response_message(&parsed),
            ));
        }

        let hits = parsed
            .pointer("/data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let field =
                |name: &str| hit.get(name).and_then(Value::as_str).unwrap_or_default();
            results.push(SearchHit {
                document_id: field(FILE_ID_FIELD).to_string(),
                document_name: field(DOCUMENT_NAME_FIELD).to_string(),
                label: field(DOCUMENT_PAGES_FIELD).to_string(),
                text: field(TEXT_FIELD).to_string(),
                score: hit
                    .get("distance")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0) as f32,
            });
        }

        Ok(results)
    }

    async fn delete_by_document(&self, document_id: &str) -> Result<(), IndexError> {
        let filter = format!("file_id == '{}'", document_id.replace('\'', "\\'"));
        let deleted = self
            .post(
                "/v2/vectordb/entities/delete",
                json!({
                    "collectionName": self.collection,
                    "filter": filter,
                }),
            )
            .await?;

        if Self::response_code(&deleted) != 0 {
            return Err(IndexError::backend(
                "milvus",
                Self::response_message(&deleted),
            ));
        }

        tracing::info!(collection = %self.collection, document_id, "rows deleted for document");
        Ok(())
    }
}

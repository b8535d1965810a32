use crate::error::IndexError;
use crate::models::{ChunkRow, SearchHit};
use async_trait::async_trait;

/// The vector-index collaborator. Implementations own their transport,
/// timeout, and retry policy; the pipeline only relies on the contract below.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection if it does not exist. Idempotent and safe under
    /// concurrent callers: an "already exists" outcome is success.
    async fn ensure_collection(&self, dimension: usize) -> Result<(), IndexError>;

    async fn insert(&self, rows: &[ChunkRow]) -> Result<(), IndexError>;

    /// Cosine nearest-neighbor search returning the top `top_k` rows.
    async fn search(&self, query_vector: &[f32], top_k: usize)
        -> Result<Vec<SearchHit>, IndexError>;

    /// Remove every row belonging to one document. This is the compensating
    /// delete the pipeline issues after a mid-stream failure.
    async fn delete_by_document(&self, document_id: &str) -> Result<(), IndexError>;
}

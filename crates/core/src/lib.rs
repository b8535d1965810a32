pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod stores;
pub mod traits;

pub use chunking::{chunk_spans, ChunkingConfig};
pub use embeddings::{Embedder, HttpEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{IndexError, IngestError};
pub use extract::{Extractor, PdfExtractor, SheetExtractor, WordExtractor, WordFormat};
pub use models::{
    Chunk, ChunkRow, ContentType, DocumentKind, IngestEvent, LabeledSpan, SearchHit,
    StructuralCoordinate,
};
pub use pipeline::IngestionPipeline;
pub use stores::{milvus::DEFAULT_COLLECTION_NAME, milvus::RETRIEVAL_TOP_K, MilvusStore};
pub use traits::VectorIndex;

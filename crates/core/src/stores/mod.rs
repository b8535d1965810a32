pub mod milvus;

pub use milvus::MilvusStore;

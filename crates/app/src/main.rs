use chrono::Utc;
use clap::{Parser, Subcommand};
use doc_ingest_core::{
    ContentType, Embedder, HttpEmbedder, IngestEvent, IngestionPipeline, MilvusStore, VectorIndex,
    DEFAULT_COLLECTION_NAME, DEFAULT_EMBEDDING_DIMENSIONS, RETRIEVAL_TOP_K,
};
use std::path::Path;
use tokio_stream::StreamExt;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "doc-ingest", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Embedding service base URL
    #[arg(long, env = "EMBEDDING_SERVICE_URL", default_value = "http://localhost:8081")]
    embedder_url: String,

    /// Embedding dimension
    #[arg(long, default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    dimension: usize,

    /// Milvus base URL
    #[arg(long, env = "MILVUS_URL", default_value = "http://localhost:19530")]
    milvus_url: String,

    /// Milvus collection name
    #[arg(long, default_value = DEFAULT_COLLECTION_NAME)]
    collection: String,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest one document and stream progress events as JSON lines.
    Ingest {
        /// Path of the document to ingest.
        #[arg(long)]
        file: String,
        /// Stable document identifier; a fresh UUID when omitted.
        #[arg(long)]
        document_id: Option<String>,
        /// Declared MIME type; guessed from the file extension when omitted.
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Embed a query and print the nearest chunks with their citations.
    Search {
        /// Query text.
        #[arg(long)]
        query: String,
        /// Number of chunks to return.
        #[arg(long, default_value_t = RETRIEVAL_TOP_K)]
        top_k: usize,
    },
    /// Remove every indexed row for a document identifier.
    Delete {
        #[arg(long)]
        document_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let embedder = HttpEmbedder::new(&cli.embedder_url, cli.dimension);
    let store = MilvusStore::new(&cli.milvus_url, &cli.collection, cli.dimension);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "doc-ingest boot"
    );

    match cli.command {
        Command::Ingest {
            file,
            document_id,
            content_type,
        } => {
            let path = Path::new(&file);
            let document_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("path has no file name: {file}"))?;

            let content_type = match content_type {
                Some(mime) => ContentType::from_mime(&mime),
                None => {
                    let extension = path
                        .extension()
                        .and_then(|extension| extension.to_str())
                        .unwrap_or_default();
                    ContentType::from_extension(extension)
                }
            }
            .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            let document_id =
                document_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            info!(%document_id, document = %document_name, mime = content_type.as_mime(), "ingesting");

            let reader = tokio::fs::File::open(path).await?;
            let pipeline = IngestionPipeline::new(embedder, store);
            let mut events = pipeline.ingest(reader, document_id, document_name, content_type);

            let mut failed = false;
            while let Some(event) = events.next().await {
                failed = matches!(event, IngestEvent::Error { .. });
                println!("{}", serde_json::to_string(&event)?);
            }

            if failed {
                anyhow::bail!("ingestion failed");
            }
        }
        Command::Search { query, top_k } => {
            let query_vector = embedder
                .embed(&query)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let hits = store
                .search(&query_vector, top_k)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!("query: {query}");
            for hit in hits {
                println!(
                    "[{}] score={:.4} location={} document_id={}",
                    hit.document_name, hit.score, hit.label, hit.document_id
                );
                println!("  {}", hit.text);
            }
        }
        Command::Delete { document_id } => {
            store
                .delete_by_document(&document_id)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("deleted rows for document {document_id}");
        }
    }

    Ok(())
}

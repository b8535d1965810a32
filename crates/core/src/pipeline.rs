use crate::chunking::{chunk_spans, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::error::IngestError;
use crate::extract::Extractor;
use crate::models::{Chunk, ChunkRow, ContentType, IngestEvent};
use crate::traits::VectorIndex;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Capacity of the progress-event channel. Emission blocks when the caller
/// stops draining, which is the pipeline's backpressure point.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Drives one document upload through extraction, chunking, embedding, and
/// indexing, pushing ordered progress events to the caller.
///
/// Chunks are processed strictly one at a time: at most one outstanding
/// embedding request and one outstanding insert per document, which bounds
/// memory and keeps failure attribution unambiguous.
pub struct IngestionPipeline<E, V> {
    embedder: Arc<E>,
    index: Arc<V>,
    chunking_override: Option<ChunkingConfig>,
}

impl<E, V> IngestionPipeline<E, V>
where
    E: Embedder + 'static,
    V: VectorIndex + 'static,
{
    pub fn new(embedder: E, index: V) -> Self {
        Self {
            embedder: Arc::new(embedder),
            index: Arc::new(index),
            chunking_override: None,
        }
    }

    /// Replace the per-kind default window sizing.
    pub fn with_chunking(mut self, config: ChunkingConfig) -> Self {
        self.chunking_override = Some(config);
        self
    }

    /// Ingest one document. The returned stream yields `TotalChunks`, then
    /// `Progress` per indexed chunk, and always terminates with exactly one
    /// `Completed` or `Error`.
    ///
    /// The reader is owned by the pipeline task and dropped on every exit
    /// path. Dropping the returned stream cancels the pipeline at the next
    /// emission point.
    pub fn ingest<R>(
        &self,
        reader: R,
        document_id: String,
        document_name: String,
        content_type: ContentType,
    ) -> ReceiverStream<IngestEvent>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let embedder = Arc::clone(&self.embedder);
        let index = Arc::clone(&self.index);
        let chunking_override = self.chunking_override;

        tokio::spawn(async move {
            let run = run_pipeline(
                embedder,
                index,
                reader,
                &document_id,
                &document_name,
                content_type,
                chunking_override,
                &tx,
            )
            .await;

            match run {
                Ok(()) => {}
                Err(Abort::ReceiverClosed) => {
                    tracing::debug!(
                        document = %document_name,
                        "event receiver dropped, pipeline cancelled"
                    );
                }
                Err(Abort::Failed(message)) => {
                    tracing::error!(document = %document_name, %message, "ingestion failed");
                    let _ = tx.send(IngestEvent::Error { message }).await;
                }
            }
        });

        ReceiverStream::new(rx)
    }
}

enum Abort {
    /// The caller stopped listening; nothing more can be delivered.
    ReceiverClosed,
    /// The pipeline failed; the message becomes the terminal `Error` event.
    Failed(String),
}

#[allow(clippy::too_many_arguments)]
async fn run_pipeline<E, V, R>(
    embedder: Arc<E>,
    index: Arc<V>,
    reader: R,
    document_id: &str,
    document_name: &str,
    content_type: ContentType,
    chunking_override: Option<ChunkingConfig>,
    tx: &mpsc::Sender<IngestEvent>,
) -> Result<(), Abort>
where
    E: Embedder,
    V: VectorIndex,
    R: AsyncRead + Send + Unpin + 'static,
{
    index
        .ensure_collection(embedder.dimensions())
        .await
        .map_err(|error| Abort::Failed(format!("failed to prepare vector collection: {error}")))?;

    let chunks = extract_and_chunk(
        reader,
        document_name.to_string(),
        content_type,
        chunking_override,
    )
    .await
    .map_err(|error| Abort::Failed(error.to_string()))?;

    let total_chunks = chunks.len();
    tracing::info!(document = %document_name, total_chunks, "document extracted and chunked");
    emit(
        tx,
        IngestEvent::TotalChunks {
            total_chunks,
            document_name: document_name.to_string(),
        },
    )
    .await?;

    for (index_zero_based, chunk) in chunks.into_iter().enumerate() {
        let chunk_no = index_zero_based + 1;
        tracing::info!(
            document = %document_name,
            chunk = chunk_no,
            total_chunks,
            chars = chunk.content.chars().count(),
            "embedding and indexing chunk"
        );

        if let Err(error) = embed_and_index(
            embedder.as_ref(),
            index.as_ref(),
            document_id,
            document_name,
            chunk,
        )
        .await
        {
            compensate(index.as_ref(), document_id).await;
            return Err(Abort::Failed(format!(
                "failed to process chunk {chunk_no} of {total_chunks}: {error}"
            )));
        }

        emit(
            tx,
            IngestEvent::Progress {
                chunk: chunk_no,
                total_chunks,
                document_name: document_name.to_string(),
            },
        )
        .await?;
    }

    emit(
        tx,
        IngestEvent::Completed {
            document_name: document_name.to_string(),
        },
    )
    .await?;

    Ok(())
}

/// Drains the upload stream and runs the CPU-bound extraction + chunking off
/// the async threads. The reader is consumed here and released whether or not
/// extraction succeeds.
async fn extract_and_chunk<R>(
    mut reader: R,
    document_name: String,
    content_type: ContentType,
    chunking_override: Option<ChunkingConfig>,
) -> Result<Vec<Chunk>, IngestError>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).await?;
    drop(reader);

    let name_for_error = document_name.clone();
    tokio::task::spawn_blocking(move || {
        let extractor = Extractor::for_content_type(content_type);
        let spans = extractor.extract(&bytes, &document_name)?;
        let config =
            chunking_override.unwrap_or_else(|| ChunkingConfig::for_kind(content_type.kind()));
        Ok(chunk_spans(&spans, config))
    })
    .await
    .map_err(|join_error| IngestError::document_parse(name_for_error, join_error))?
}

async fn embed_and_index<E, V>(
    embedder: &E,
    index: &V,
    document_id: &str,
    document_name: &str,
    chunk: Chunk,
) -> Result<(), crate::error::IndexError>
where
    E: Embedder + ?Sized,
    V: VectorIndex + ?Sized,
{
    let embedding = embedder.embed(&chunk.content).await?;
    let row = ChunkRow {
        document_id: document_id.to_string(),
        text: chunk.content,
        document_name: document_name.to_string(),
        label: chunk.label,
        embedding,
    };
    index.insert(&[row]).await
}

/// Best-effort removal of the rows already written for this document. A
/// failure here is logged and never masks the original error.
async fn compensate<V: VectorIndex + ?Sized>(index: &V, document_id: &str) {
    tracing::warn!(document_id, "removing partially indexed rows after failure");
    if let Err(delete_error) = index.delete_by_document(document_id).await {
        tracing::warn!(document_id, error = %delete_error, "compensating delete failed");
    }
}

async fn emit(tx: &mpsc::Sender<IngestEvent>, event: IngestEvent) -> Result<(), Abort> {
    tx.send(event).await.map_err(|_| Abort::ReceiverClosed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;
    use crate::models::SearchHit;
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio_stream::StreamExt;

    struct FakeEmbedder {
        dimensions: usize,
        fail_on_call: Option<usize>,
        calls: AtomicUsize,
    }

    impl FakeEmbedder {
        fn new(dimensions: usize) -> Self {
            Self {
                dimensions,
                fail_on_call: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing_on(dimensions: usize, call: usize) -> Self {
            Self {
                dimensions,
                fail_on_call: Some(call),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        fn dimensions(&self) -> usize {
            self.dimensions
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, IndexError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on_call == Some(call) {
                return Err(IndexError::Request("embedding service unavailable".into()));
            }
            Ok(vec![0.5; self.dimensions])
        }
    }

    #[derive(Default)]
    struct FakeIndex {
        rows: Mutex<Vec<ChunkRow>>,
        collections_created: AtomicUsize,
        deletes: AtomicUsize,
    }

    #[async_trait]
    impl VectorIndex for FakeIndex {
        async fn ensure_collection(&self, _dimension: usize) -> Result<(), IndexError> {
            self.collections_created.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn insert(&self, rows: &[ChunkRow]) -> Result<(), IndexError> {
            self.rows.lock().unwrap().extend_from_slice(rows);
            Ok(())
        }

        async fn search(
            &self,
            _query_vector: &[f32],
            _top_k: usize,
        ) -> Result<Vec<SearchHit>, IndexError> {
            Ok(Vec::new())
        }

        async fn delete_by_document(&self, document_id: &str) -> Result<(), IndexError> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            self.rows
                .lock()
                .unwrap()
                .retain(|row| row.document_id != document_id);
            Ok(())
        }
    }

    async fn collect_events(
        pipeline: &IngestionPipeline<FakeEmbedder, FakeIndex>,
        text: &str,
    ) -> Vec<IngestEvent> {
        let reader = Cursor::new(text.as_bytes().to_vec());
        let mut stream = pipeline.ingest(
            reader,
            "doc-1".to_string(),
            "notes.txt".to_string(),
            ContentType::PlainText,
        );

        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn successful_ingestion_emits_ordered_events_and_indexes_every_chunk() {
        let pipeline = IngestionPipeline::new(FakeEmbedder::new(4), FakeIndex::default());
        let text = "lorem ipsum dolor sit amet ".repeat(80);

        let events = collect_events(&pipeline, &text).await;

        let IngestEvent::TotalChunks { total_chunks, .. } = &events[0] else {
            panic!("first event must be TotalChunks, got {:?}", events[0]);
        };
        let total = *total_chunks;
        assert!(total > 1);

        let mut expected_chunk = 1;
        for event in &events[1..events.len() - 1] {
            let IngestEvent::Progress {
                chunk,
                total_chunks,
                ..
            } = event
            else {
                panic!("expected Progress, got {event:?}");
            };
            assert_eq!(*chunk, expected_chunk);
            assert_eq!(*total_chunks, total);
            expected_chunk += 1;
        }
        assert_eq!(expected_chunk - 1, total);

        assert!(matches!(
            events.last().unwrap(),
            IngestEvent::Completed { document_name } if document_name == "notes.txt"
        ));

        let rows = pipeline.index.rows.lock().unwrap();
        assert_eq!(rows.len(), total);
        assert!(rows.iter().all(|row| row.document_id == "doc-1"));
        assert!(rows.iter().all(|row| row.label.starts_with('P')));
    }

    #[tokio::test]
    async fn empty_document_reports_zero_chunks_then_completes() {
        let pipeline = IngestionPipeline::new(FakeEmbedder::new(4), FakeIndex::default());

        let events = collect_events(&pipeline, "   \n  \n").await;

        assert_eq!(
            events,
            vec![
                IngestEvent::TotalChunks {
                    total_chunks: 0,
                    document_name: "notes.txt".to_string(),
                },
                IngestEvent::Completed {
                    document_name: "notes.txt".to_string(),
                },
            ]
        );
        assert_eq!(
            pipeline.index.collections_created.load(Ordering::SeqCst),
            1
        );
        assert!(pipeline.index.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn chunk_failure_compensates_and_ends_with_a_single_error() {
        let pipeline = IngestionPipeline::new(
            FakeEmbedder::failing_on(4, 2),
            FakeIndex::default(),
        );
        let text = "lorem ipsum dolor sit amet ".repeat(80);

        let events = collect_events(&pipeline, &text).await;

        assert!(matches!(&events[0], IngestEvent::TotalChunks { .. }));
        // Exactly one chunk succeeded before the failure on the second.
        assert_eq!(
            events
                .iter()
                .filter(|event| matches!(event, IngestEvent::Progress { .. }))
                .count(),
            1
        );
        let IngestEvent::Error { message } = events.last().unwrap() else {
            panic!("stream must end with Error, got {:?}", events.last());
        };
        assert!(message.contains("chunk 2"));

        // Compensating delete wiped the partial rows.
        assert_eq!(pipeline.index.deletes.load(Ordering::SeqCst), 1);
        assert!(pipeline.index.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn parse_failure_produces_error_without_indexing() {
        let pipeline = IngestionPipeline::new(FakeEmbedder::new(4), FakeIndex::default());
        let reader = Cursor::new(b"%PDF-1.4\n%broken".to_vec());

        let mut stream = pipeline.ingest(
            reader,
            "doc-1".to_string(),
            "broken.pdf".to_string(),
            ContentType::Pdf,
        );
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], IngestEvent::Error { message } if message.contains("broken.pdf")));
        assert!(pipeline.index.rows.lock().unwrap().is_empty());
        assert_eq!(pipeline.index.deletes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ingests_from_a_file_reader() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"A short note about pump maintenance.\n")
            .unwrap();

        let pipeline = IngestionPipeline::new(FakeEmbedder::new(4), FakeIndex::default());
        let reader = tokio::fs::File::open(file.path()).await.unwrap();
        let mut stream = pipeline.ingest(
            reader,
            "doc-2".to_string(),
            "pumps.txt".to_string(),
            ContentType::PlainText,
        );

        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }

        assert!(matches!(
            events.last(),
            Some(IngestEvent::Completed { .. })
        ));
        let rows = pipeline.index.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, "P1");
    }

    #[tokio::test]
    async fn custom_chunking_config_is_honored() {
        let pipeline = IngestionPipeline::new(FakeEmbedder::new(4), FakeIndex::default())
            .with_chunking(ChunkingConfig::new(50, 10).unwrap());
        let text = "tiny words repeated over and over again ".repeat(10);

        let events = collect_events(&pipeline, &text).await;

        let IngestEvent::TotalChunks { total_chunks, .. } = &events[0] else {
            panic!("first event must be TotalChunks");
        };
        assert!(*total_chunks >= 8);
        let rows = pipeline.index.rows.lock().unwrap();
        assert!(rows.iter().all(|row| row.text.chars().count() <= 50));
    }
}

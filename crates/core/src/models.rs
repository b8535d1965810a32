use crate::error::IngestError;
use serde::{Deserialize, Serialize};

/// Document-location metadata attached to an extracted span, used to label
/// chunks for citation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructuralCoordinate {
    /// 1-based page number of a paged document.
    Page(u32),
    /// 1-based paragraph ordinal, counted over all body paragraphs
    /// (empty ones included) so the number matches the source document.
    Paragraph(u32),
    /// A table cell with no usable paragraph ordinal.
    TableCell,
    /// A spreadsheet cell; row and column are 1-based.
    Cell { sheet: String, row: u32, column: u32 },
}

/// A contiguous, labeled unit of extracted text (a page, paragraph, or cell)
/// before chunking. Ordered by `order` in document reading order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledSpan {
    pub text: String,
    pub coordinate: StructuralCoordinate,
    pub order: usize,
}

/// A bounded, overlap-joined slice of concatenated span text, the unit sent
/// for embedding. `label` is the human-readable provenance range, e.g. `"3-5"`,
/// `"P7"`, or `"Sheet1[R2C3-R2C9]"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub label: String,
}

/// One row handed to the vector index for a single chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRow {
    pub document_id: String,
    pub text: String,
    pub document_name: String,
    pub label: String,
    pub embedding: Vec<f32>,
}

/// A ranked retrieval hit returned by the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub document_id: String,
    pub document_name: String,
    pub label: String,
    pub text: String,
    pub score: f32,
}

/// Progress events pushed to the caller while a document is ingested.
///
/// Ordering contract: `TotalChunks` first, `Progress` strictly increasing by
/// `chunk` from 1 to `total_chunks`, then exactly one `Completed` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IngestEvent {
    #[serde(rename = "TOTAL_CHUNKS", rename_all = "camelCase")]
    TotalChunks {
        total_chunks: usize,
        document_name: String,
    },
    #[serde(rename = "PROGRESS", rename_all = "camelCase")]
    Progress {
        chunk: usize,
        total_chunks: usize,
        document_name: String,
    },
    #[serde(rename = "COMPLETED", rename_all = "camelCase")]
    Completed { document_name: String },
    #[serde(rename = "ERROR")]
    Error { message: String },
}

/// The three structural families an extractor can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Paged,
    ParagraphBased,
    CellBased,
}

/// Declared content type of an upload. Closed set; anything else is rejected
/// before extraction begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Pdf,
    WordLegacy,
    Word,
    SheetLegacy,
    Sheet,
    SheetMacro,
    SheetBinary,
    PlainText,
}

impl ContentType {
    pub fn from_mime(mime: &str) -> Result<Self, IngestError> {
        match mime {
            "application/pdf" => Ok(Self::Pdf),
            "application/msword" => Ok(Self::WordLegacy),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Ok(Self::Word)
            }
            "application/vnd.ms-excel" => Ok(Self::SheetLegacy),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => Ok(Self::Sheet),
            "application/vnd.ms-excel.sheet.macroEnabled.12" => Ok(Self::SheetMacro),
            "application/vnd.ms-excel.sheet.binary.macroEnabled.12" => Ok(Self::SheetBinary),
            "text/plain" => Ok(Self::PlainText),
            other => Err(IngestError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Best-effort mapping from a file extension, for callers that have a
    /// filename instead of a declared MIME type.
    pub fn from_extension(extension: &str) -> Result<Self, IngestError> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "doc" => Ok(Self::WordLegacy),
            "docx" => Ok(Self::Word),
            "xls" => Ok(Self::SheetLegacy),
            "xlsx" => Ok(Self::Sheet),
            "xlsm" => Ok(Self::SheetMacro),
            "xlsb" => Ok(Self::SheetBinary),
            "txt" => Ok(Self::PlainText),
            other => Err(IngestError::UnsupportedFormat(format!(".{other}"))),
        }
    }

    pub fn as_mime(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::WordLegacy => "application/msword",
            Self::Word => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::SheetLegacy => "application/vnd.ms-excel",
            Self::Sheet => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::SheetMacro => "application/vnd.ms-excel.sheet.macroEnabled.12",
            Self::SheetBinary => "application/vnd.ms-excel.sheet.binary.macroEnabled.12",
            Self::PlainText => "text/plain",
        }
    }

    pub fn kind(&self) -> DocumentKind {
        match self {
            Self::Pdf => DocumentKind::Paged,
            Self::WordLegacy | Self::Word | Self::PlainText => DocumentKind::ParagraphBased,
            Self::SheetLegacy | Self::Sheet | Self::SheetMacro | Self::SheetBinary => {
                DocumentKind::CellBased
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_to_wire_format() {
        let event = IngestEvent::TotalChunks {
            total_chunks: 12,
            document_name: "report.pdf".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"type":"TOTAL_CHUNKS","totalChunks":12,"documentName":"report.pdf"}"#
        );

        let event = IngestEvent::Progress {
            chunk: 3,
            total_chunks: 12,
            document_name: "report.pdf".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"type":"PROGRESS","chunk":3,"totalChunks":12,"documentName":"report.pdf"}"#
        );

        let event = IngestEvent::Completed {
            document_name: "report.pdf".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"type":"COMPLETED","documentName":"report.pdf"}"#
        );

        let event = IngestEvent::Error {
            message: "boom".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&event).unwrap(),
            r#"{"type":"ERROR","message":"boom"}"#
        );
    }

    #[test]
    fn mime_round_trip_covers_every_content_type() {
        for content_type in [
            ContentType::Pdf,
            ContentType::WordLegacy,
            ContentType::Word,
            ContentType::SheetLegacy,
            ContentType::Sheet,
            ContentType::SheetMacro,
            ContentType::SheetBinary,
            ContentType::PlainText,
        ] {
            assert_eq!(
                ContentType::from_mime(content_type.as_mime()).unwrap(),
                content_type
            );
        }
    }

    #[test]
    fn unknown_mime_is_rejected() {
        assert!(matches!(
            ContentType::from_mime("application/zip"),
            Err(IngestError::UnsupportedFormat(_))
        ));
    }
}

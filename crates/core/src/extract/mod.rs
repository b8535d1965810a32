//! Structural extractors: one per document family, all producing the same
//! ordered `LabeledSpan` sequence for the chunking core.

pub mod pdf;
pub mod sheet;
pub mod word;

use crate::error::IngestError;
use crate::models::{ContentType, LabeledSpan};

pub use pdf::PdfExtractor;
pub use sheet::SheetExtractor;
pub use word::{WordExtractor, WordFormat};

/// Closed dispatch over the supported document families, selected from the
/// declared content type.
#[derive(Debug, Clone, Copy)]
pub enum Extractor {
    Paged(PdfExtractor),
    ParagraphBased(WordExtractor),
    CellBased(SheetExtractor),
}

impl Extractor {
    pub fn for_content_type(content_type: ContentType) -> Self {
        match content_type {
            ContentType::Pdf => Self::Paged(PdfExtractor),
            ContentType::Word => Self::ParagraphBased(WordExtractor::new(WordFormat::Modern)),
            ContentType::WordLegacy => {
                Self::ParagraphBased(WordExtractor::new(WordFormat::Legacy))
            }
            ContentType::PlainText => Self::ParagraphBased(WordExtractor::new(WordFormat::Plain)),
            ContentType::SheetLegacy
            | ContentType::Sheet
            | ContentType::SheetMacro
            | ContentType::SheetBinary => Self::CellBased(SheetExtractor),
        }
    }

    /// Turns raw document bytes into ordered, trimmed, non-empty spans.
    /// `name` is used for error context only; sub-format selection already
    /// happened when the variant was chosen.
    pub fn extract(&self, bytes: &[u8], name: &str) -> Result<Vec<LabeledSpan>, IngestError> {
        match self {
            Self::Paged(extractor) => extractor.extract(bytes, name),
            Self::ParagraphBased(extractor) => extractor.extract(bytes, name),
            Self::CellBased(extractor) => extractor.extract(bytes, name),
        }
    }
}

use crate::error::IngestError;
use crate::models::{LabeledSpan, StructuralCoordinate};
use lopdf::Document;

/// Paged extractor: one span per page carrying non-empty text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn extract(&self, bytes: &[u8], name: &str) -> Result<Vec<LabeledSpan>, IngestError> {
        let document =
            Document::load_mem(bytes).map_err(|error| IngestError::document_parse(name, error))?;

        let mut spans = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::document_parse(name, error))?;

            let trimmed = text.trim();
            if !trimmed.is_empty() {
                spans.push(LabeledSpan {
                    text: trimmed.to_string(),
                    coordinate: StructuralCoordinate::Page(page_no),
                    order: spans.len(),
                });
            }
        }

        Ok(spans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_fail_with_document_parse() {
        let result = PdfExtractor.extract(b"%PDF-1.4\n%broken", "broken.pdf");
        assert!(matches!(
            result,
            Err(IngestError::DocumentParse { ref name, .. }) if name == "broken.pdf"
        ));
    }
}

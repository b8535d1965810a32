use crate::error::IngestError;
use crate::models::{LabeledSpan, StructuralCoordinate};
use std::io::{Cursor, Read};

/// Which wire format the paragraph-based extractor should expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordFormat {
    /// OOXML `.docx`: body paragraphs, then table cells flattened row-major.
    Modern,
    /// Binary `.doc`: text recovered from the OLE `WordDocument` stream and
    /// split on line breaks.
    Legacy,
    /// `text/plain`: split on line breaks.
    Plain,
}

/// Paragraph-based extractor covering Word documents and plain text.
///
/// Paragraph ordinals count every paragraph in document order, including empty
/// ones, so the numbers line up with what a reader sees in the source file.
/// Table cells carry no ordinal; their provenance degrades to "table content"
/// at labeling time.
#[derive(Debug, Clone, Copy)]
pub struct WordExtractor {
    format: WordFormat,
}

impl WordExtractor {
    pub fn new(format: WordFormat) -> Self {
        Self { format }
    }

    pub fn extract(&self, bytes: &[u8], name: &str) -> Result<Vec<LabeledSpan>, IngestError> {
        match self.format {
            WordFormat::Modern => extract_docx(bytes, name),
            WordFormat::Legacy => Ok(line_spans(&extract_legacy_doc_text(bytes, name)?)),
            WordFormat::Plain => Ok(line_spans(&String::from_utf8_lossy(bytes))),
        }
    }
}

fn extract_docx(bytes: &[u8], name: &str) -> Result<Vec<LabeledSpan>, IngestError> {
    let docx =
        docx_rs::read_docx(bytes).map_err(|error| IngestError::document_parse(name, error))?;

    let mut spans = Vec::new();
    let mut tables = Vec::new();
    let mut paragraph_no = 0u32;

    for child in docx.document.children {
        match child {
            docx_rs::DocumentChild::Paragraph(paragraph) => {
                paragraph_no += 1;
                let text = paragraph_text(&paragraph);
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    spans.push(LabeledSpan {
                        text: trimmed.to_string(),
                        coordinate: StructuralCoordinate::Paragraph(paragraph_no),
                        order: spans.len(),
                    });
                }
            }
            docx_rs::DocumentChild::Table(table) => tables.push(table),
            _ => {}
        }
    }

    // Table cells come after all body paragraphs, flattened row-major across
    // every table.
    for table in tables {
        for row in &table.rows {
            let docx_rs::TableChild::TableRow(row) = row;
            for cell in &row.cells {
                let docx_rs::TableRowChild::TableCell(cell) = cell;
                let text = table_cell_text(cell);
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    spans.push(LabeledSpan {
                        text: trimmed.to_string(),
                        coordinate: StructuralCoordinate::TableCell,
                        order: spans.len(),
                    });
                }
            }
        }
    }

    Ok(spans)
}

fn paragraph_text(paragraph: &docx_rs::Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        if let docx_rs::ParagraphChild::Run(run) = child {
            for child in &run.children {
                match child {
                    docx_rs::RunChild::Text(t) => text.push_str(&t.text),
                    docx_rs::RunChild::Tab(_) => text.push(' '),
                    _ => {}
                }
            }
        }
    }
    text
}

fn table_cell_text(cell: &docx_rs::TableCell) -> String {
    let mut lines = Vec::new();
    for content in &cell.children {
        if let docx_rs::TableCellContent::Paragraph(paragraph) = content {
            let text = paragraph_text(paragraph);
            if !text.trim().is_empty() {
                lines.push(text.trim().to_string());
            }
        }
    }
    lines.join("\n")
}

/// Recovers the text window of a non-complex binary `.doc` file: the FIB in
/// the `WordDocument` stream gives the `[fcMin, fcMac)` range, which holds
/// the document text either as UTF-16LE or as single-byte ANSI.
fn extract_legacy_doc_text(bytes: &[u8], name: &str) -> Result<String, IngestError> {
    let cursor = Cursor::new(bytes);
    let mut compound =
        cfb::CompoundFile::open(cursor).map_err(|error| IngestError::document_parse(name, error))?;
    let mut stream = compound
        .open_stream("/WordDocument")
        .map_err(|error| IngestError::document_parse(name, error))?;

    let mut data = Vec::new();
    stream
        .read_to_end(&mut data)
        .map_err(|error| IngestError::document_parse(name, error))?;

    if data.len() < 0x20 {
        return Err(IngestError::document_parse(
            name,
            "WordDocument stream too short to hold a file information block",
        ));
    }

    let fc_min = u32::from_le_bytes([data[0x18], data[0x19], data[0x1a], data[0x1b]]) as usize;
    let fc_mac = u32::from_le_bytes([data[0x1c], data[0x1d], data[0x1e], data[0x1f]]) as usize;
    let window = data.get(fc_min..fc_mac).ok_or_else(|| {
        IngestError::document_parse(name, "file information block text range out of bounds")
    })?;

    Ok(decode_doc_window(window))
}

fn decode_doc_window(window: &[u8]) -> String {
    // High bytes that are mostly zero mean UTF-16LE; otherwise treat the
    // window as single-byte ANSI (Latin-1 superset covers the common cases).
    let high_zeroes = window.iter().skip(1).step_by(2).filter(|b| **b == 0).count();
    let looks_utf16 = window.len() >= 2 && high_zeroes * 4 >= window.len();

    let text: String = if looks_utf16 {
        let units: Vec<u16> = window
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        window.iter().map(|&b| b as char).collect()
    };

    // Word uses CR as the paragraph mark and dedicated control characters for
    // cell/row/page breaks; normalize all of them to line breaks.
    text.chars()
        .map(|c| match c {
            '\r' | '\u{7}' | '\u{b}' | '\u{c}' => '\n',
            c if c.is_control() && c != '\n' && c != '\t' => ' ',
            c => c,
        })
        .collect()
}

fn line_spans(text: &str) -> Vec<LabeledSpan> {
    let mut spans = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        spans.push(LabeledSpan {
            text: trimmed.to_string(),
            coordinate: StructuralCoordinate::Paragraph(index as u32 + 1),
            order: spans.len(),
        });
    }
    spans
}

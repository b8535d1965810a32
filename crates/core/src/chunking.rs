use crate::error::IngestError;
use crate::models::{Chunk, DocumentKind, LabeledSpan, StructuralCoordinate};

/// Separator appended after every span in the concatenated buffer.
const SPAN_SEPARATOR: [char; 2] = ['\n', '\n'];

/// Window sizing for the sliding-window chunker.
///
/// `max_chars` bounds each chunk; `overlap_chars` is carried over from the end
/// of one chunk into the next so retrieval keeps context across boundaries.
/// `max_chars > overlap_chars` is required so the window always moves forward.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    max_chars: usize,
    overlap_chars: usize,
}

impl ChunkingConfig {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self, IngestError> {
        if max_chars <= overlap_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "max_chars ({max_chars}) must be greater than overlap_chars ({overlap_chars})"
            )));
        }
        Ok(Self {
            max_chars,
            overlap_chars,
        })
    }

    /// Defaults sized for a 512-token embedding model: 800 characters for
    /// paged documents, 700 for paragraph- and cell-based ones, 200 overlap.
    pub fn for_kind(kind: DocumentKind) -> Self {
        let max_chars = match kind {
            DocumentKind::Paged => 800,
            DocumentKind::ParagraphBased | DocumentKind::CellBased => 700,
        };
        Self {
            max_chars,
            overlap_chars: 200,
        }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }
}

/// Concatenates the spans into one buffer and emits overlapping, bounded
/// windows over it, each labeled with the structural range it intersects.
///
/// Indices are Unicode scalar values, not bytes, so windows never split a
/// multi-byte character. Zero spans (or all-whitespace spans) produce zero
/// chunks; that is a valid outcome, not an error.
pub fn chunk_spans(spans: &[LabeledSpan], config: ChunkingConfig) -> Vec<Chunk> {
    let mut buffer: Vec<char> = Vec::new();
    let mut offsets = Vec::with_capacity(spans.len());

    for span in spans {
        offsets.push(buffer.len());
        buffer.extend(span.text.chars());
        buffer.extend(SPAN_SEPARATOR);
    }

    let length = buffer.len();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < length {
        let mut end = (start + config.max_chars).min(length);

        // Snap back to the last space so no word is cut in half, unless that
        // would empty the window.
        if end < length {
            if let Some(position) = buffer[start..=end].iter().rposition(|c| *c == ' ') {
                if position > 0 {
                    end = start + position;
                }
            }
        }

        let content: String = buffer[start..end].iter().collect();
        let content = content.trim();
        if !content.is_empty() {
            chunks.push(Chunk {
                content: content.to_string(),
                label: label_for_range(spans, &offsets, start, end),
            });
        }

        // Slide forward minus the overlap, but never past the snapped end:
        // text between the two must not be skipped, and end > start keeps the
        // loop terminating even when snap-back shrinks the window.
        start += config.max_chars - config.overlap_chars;
        if start >= end {
            start = end;
        }
    }

    chunks
}

/// Finds every span whose interval `[offset, next_offset)` intersects the
/// chunk's `[chunk_start, chunk_end)` and summarizes the first and last match.
fn label_for_range(
    spans: &[LabeledSpan],
    offsets: &[usize],
    chunk_start: usize,
    chunk_end: usize,
) -> String {
    let mut first = None;
    let mut last = None;

    for (index, &offset) in offsets.iter().enumerate() {
        let next_offset = offsets.get(index + 1).copied().unwrap_or(usize::MAX);
        if chunk_start < next_offset && chunk_end > offset {
            if first.is_none() {
                first = Some(index);
            }
            last = Some(index);
        }
    }

    match (first, last) {
        (Some(first), Some(last)) => {
            render_label(&spans[first].coordinate, &spans[last].coordinate)
        }
        _ => "N/A".to_string(),
    }
}

fn render_label(first: &StructuralCoordinate, last: &StructuralCoordinate) -> String {
    use StructuralCoordinate::*;

    match (first, last) {
        (Page(a), Page(b)) if a == b => a.to_string(),
        (Page(a), Page(b)) => format!("{a}-{b}"),
        (Paragraph(a), Paragraph(b)) if a == b => format!("P{a}"),
        (Paragraph(a), Paragraph(b)) => format!("P{a}-{b}"),
        (
            Cell {
                sheet: first_sheet,
                row: first_row,
                column: first_column,
            },
            Cell {
                sheet: last_sheet,
                row: last_row,
                column: last_column,
            },
        ) => {
            if first_sheet != last_sheet {
                format!("{first_sheet}-{last_sheet}[Multi-sheet]")
            } else if first_row == last_row && first_column == last_column {
                format!("{first_sheet}[R{first_row}C{first_column}]")
            } else {
                format!(
                    "{first_sheet}[R{first_row}C{first_column}-R{last_row}C{last_column}]"
                )
            }
        }
        (a, b) => {
            let left = render_point(a);
            let right = render_point(b);
            if left == right {
                left
            } else {
                format!("{left}-{right}")
            }
        }
    }
}

fn render_point(coordinate: &StructuralCoordinate) -> String {
    use StructuralCoordinate::*;

    match coordinate {
        Page(n) => n.to_string(),
        Paragraph(n) => format!("P{n}"),
        TableCell => "table content".to_string(),
        Cell { sheet, row, column } => format!("{sheet}[R{row}C{column}]"),
    }
}

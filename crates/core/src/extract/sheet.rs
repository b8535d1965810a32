use crate::error::IngestError;
use crate::models::{LabeledSpan, StructuralCoordinate};
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use std::io::Cursor;

/// Cell-based extractor: one span per non-empty cell, in sheet then row then
/// column order. The container sub-format (xls/xlsx/xlsm/xlsb) is detected
/// from the bytes themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct SheetExtractor;

impl SheetExtractor {
    pub fn extract(&self, bytes: &[u8], name: &str) -> Result<Vec<LabeledSpan>, IngestError> {
        let cursor = Cursor::new(bytes);
        let mut workbook = open_workbook_auto_from_rs(cursor)
            .map_err(|error| IngestError::document_parse(name, error))?;

        let mut spans = Vec::new();
        for sheet in workbook.sheet_names() {
            let range = workbook
                .worksheet_range(&sheet)
                .map_err(|error| IngestError::document_parse(name, error))?;
            // Formula text is the fallback for cells whose cached value is an
            // evaluation error; a sheet without formulas has none.
            let formulas = workbook.worksheet_formula(&sheet).ok();

            let Some((row_base, column_base)) = range.start() else {
                continue;
            };

            for (relative_row, relative_column, value) in range.cells() {
                let row = row_base + relative_row as u32;
                let column = column_base + relative_column as u32;
                let formula = formulas
                    .as_ref()
                    .and_then(|f| formula_at(f, row, column));

                let Some(text) = render_cell(value, formula) else {
                    continue;
                };
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    continue;
                }

                spans.push(LabeledSpan {
                    // Keep the coordinate prefix inside the chunk text so a
                    // retrieved passage stays readable on its own.
                    text: format!("R{}C{}: {}", row + 1, column + 1, trimmed),
                    coordinate: StructuralCoordinate::Cell {
                        sheet: sheet.clone(),
                        row: row + 1,
                        column: column + 1,
                    },
                    order: spans.len(),
                });
            }
        }

        Ok(spans)
    }
}

fn formula_at(formulas: &Range<String>, row: u32, column: u32) -> Option<&str> {
    formulas
        .get_value((row, column))
        .map(String::as_str)
        .filter(|formula| !formula.is_empty())
}

/// Renders a cell the way it displays: formatted dates, whole numbers without
/// a trailing `.0`, and the literal formula text when the cached result is an
/// evaluation error. Empty cells render to nothing.
fn render_cell(value: &Data, formula: Option<&str>) -> Option<String> {
    match value {
        Data::Empty => None,
        Data::String(text) => Some(text.clone()),
        Data::Float(number) => Some(format_number(*number)),
        Data::Int(number) => Some(number.to_string()),
        Data::Bool(flag) => Some(flag.to_string()),
        Data::DateTime(stamp) => Some(
            stamp
                .as_datetime()
                .map(|datetime| datetime.to_string())
                .unwrap_or_else(|| stamp.as_f64().to_string()),
        ),
        Data::DateTimeIso(text) | Data::DurationIso(text) => Some(text.clone()),
        Data::Error(error) => Some(
            formula
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        ),
    }
}

fn format_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        number.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::CellErrorType;

    #[test]
    fn garbage_bytes_fail_with_document_parse() {
        let result = SheetExtractor.extract(b"definitely not a workbook", "data.xlsx");
        assert!(matches!(
            result,
            Err(IngestError::DocumentParse { ref name, .. }) if name == "data.xlsx"
        ));
    }

    #[test]
    fn whole_floats_render_without_decimal_tail() {
        assert_eq!(render_cell(&Data::Float(42.0), None).unwrap(), "42");
        assert_eq!(render_cell(&Data::Float(2.5), None).unwrap(), "2.5");
    }

    #[test]
    fn error_cells_fall_back_to_formula_text() {
        let value = Data::Error(CellErrorType::Div0);
        assert_eq!(
            render_cell(&value, Some("A1/B1")).unwrap(),
            "A1/B1"
        );
        // Without a formula the error marker itself is kept rather than
        // dropping the cell.
        assert_eq!(render_cell(&value, None).unwrap(), "#DIV/0!");
    }

    #[test]
    fn empty_cells_render_to_nothing() {
        assert!(render_cell(&Data::Empty, None).is_none());
    }

    #[test]
    fn booleans_render_lowercase() {
        assert_eq!(render_cell(&Data::Bool(true), None).unwrap(), "true");
    }
}

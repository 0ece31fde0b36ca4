use std::io::Write;

use cmdgate_types::{Table, cell_to_string};
use rust_xlsxwriter::{Format, Workbook};
use serde_json::Value;

use super::FormatError;

/// Rows as a single-sheet workbook with a bold header row.
///
/// Numbers and booleans keep their cell type; everything else is written as text.
pub fn write_excel<W: Write>(table: &Table, writer: &mut W) -> Result<(), FormatError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    {
        let worksheet = workbook.add_worksheet();
        for (column, name) in (0u16..).zip(&table.columns) {
            worksheet.write_string_with_format(0, column, name, &header)?;
        }
        for (row_index, row) in (1u32..).zip(&table.rows) {
            for (column, value) in (0u16..).zip(table.cells(row)) {
                match value {
                    Value::Null => {}
                    Value::Bool(flag) => {
                        worksheet.write_boolean(row_index, column, *flag)?;
                    }
                    Value::Number(number) => match number.as_f64() {
                        Some(number) => {
                            worksheet.write_number(row_index, column, number)?;
                        }
                        None => {
                            worksheet.write_string(row_index, column, number.to_string())?;
                        }
                    },
                    other => {
                        worksheet.write_string(row_index, column, cell_to_string(other))?;
                    }
                }
            }
        }
    }
    let buffer = workbook.save_to_buffer()?;
    writer.write_all(&buffer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdgate_types::Row;
    use serde_json::json;

    #[test]
    fn produces_a_zip_container() {
        let row: Row = [("a".to_string(), json!(1)), ("b".to_string(), json!("x"))].into_iter().collect();
        let mut buffer = Vec::new();
        write_excel(&Table::from_rows(vec![row]), &mut buffer).expect("workbook renders");
        assert!(buffer.starts_with(b"PK"));
    }
}

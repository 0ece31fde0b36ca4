use std::io::Write;

use cmdgate_types::{Table, cell_to_string};
use unicode_width::UnicodeWidthStr;

use super::FormatError;

/// CSV or TSV with a header row and `\n` record terminators.
pub fn write_delimited<W: Write>(table: &Table, writer: &mut W, delimiter: u8) -> Result<(), FormatError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);
    if !table.columns.is_empty() {
        csv_writer.write_record(&table.columns)?;
    }
    for row in &table.rows {
        csv_writer.write_record(table.cells(row).map(cell_to_string))?;
    }
    csv_writer.flush()?;
    Ok(())
}

fn markdown_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', "<br>")
}

/// GitHub-flavoured Markdown table.
pub fn write_markdown<W: Write>(table: &Table, writer: &mut W) -> Result<(), FormatError> {
    if table.columns.is_empty() {
        return Ok(());
    }
    let header: Vec<String> = table.columns.iter().map(|column| markdown_cell(column)).collect();
    writeln!(writer, "| {} |", header.join(" | "))?;
    writeln!(writer, "|{}", " --- |".repeat(table.columns.len()))?;
    for row in &table.rows {
        let cells: Vec<String> = table.cells(row).map(|value| markdown_cell(&cell_to_string(value))).collect();
        writeln!(writer, "| {} |", cells.join(" | "))?;
    }
    Ok(())
}

/// Escape text for HTML element content and attribute values.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for character in value.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// A bare `<table>` element.
pub fn write_html<W: Write>(table: &Table, writer: &mut W) -> Result<(), FormatError> {
    writeln!(writer, "<table>")?;
    writeln!(writer, "  <thead>")?;
    write!(writer, "    <tr>")?;
    for column in &table.columns {
        write!(writer, "<th>{}</th>", escape_html(column))?;
    }
    writeln!(writer, "</tr>")?;
    writeln!(writer, "  </thead>")?;
    writeln!(writer, "  <tbody>")?;
    for row in &table.rows {
        write!(writer, "    <tr>")?;
        for value in table.cells(row) {
            write!(writer, "<td>{}</td>", escape_html(&cell_to_string(value)))?;
        }
        writeln!(writer, "</tr>")?;
    }
    writeln!(writer, "  </tbody>")?;
    writeln!(writer, "</table>")?;
    Ok(())
}

/// Boxed plain-text table, aligned by display width.
pub fn write_ascii<W: Write>(table: &Table, writer: &mut W) -> Result<(), FormatError> {
    if table.columns.is_empty() {
        return Ok(());
    }
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| table.cells(row).map(|value| cell_to_string(value).replace('\n', " ")).collect())
        .collect();
    let mut widths: Vec<usize> = table.columns.iter().map(|column| column.width()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.width());
        }
    }

    let separator: String = widths.iter().map(|width| format!("+{}", "-".repeat(width + 2))).collect::<String>() + "+";
    let write_line = |writer: &mut W, cells: &[String]| -> std::io::Result<()> {
        for (cell, width) in cells.iter().zip(&widths) {
            let padding = width.saturating_sub(cell.width());
            write!(writer, "| {}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer, "|")
    };

    writeln!(writer, "{separator}")?;
    write_line(writer, &table.columns)?;
    writeln!(writer, "{separator}")?;
    for row in &rows {
        write_line(writer, row)?;
    }
    writeln!(writer, "{separator}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdgate_types::Row;
    use serde_json::json;

    fn sample() -> Table {
        let rows: Vec<Row> = vec![
            [("a".to_string(), json!(1)), ("b".to_string(), json!("x|y"))].into_iter().collect(),
            [("a".to_string(), json!(22)), ("b".to_string(), json!("日本"))].into_iter().collect(),
        ];
        Table::from_rows(rows)
    }

    fn render(write: impl Fn(&Table, &mut Vec<u8>) -> Result<(), FormatError>) -> String {
        let mut buffer = Vec::new();
        write(&sample(), &mut buffer).expect("table renders");
        String::from_utf8(buffer).expect("utf-8")
    }

    #[test]
    fn tsv_uses_tabs() {
        assert_eq!(render(|table, buffer| write_delimited(table, buffer, b'\t')), "a\tb\n1\tx|y\n22\t日本\n");
    }

    #[test]
    fn markdown_escapes_pipes() {
        let rendered = render(|table, buffer| write_markdown(table, buffer));
        assert_eq!(rendered, "| a | b |\n| --- | --- |\n| 1 | x\\|y |\n| 22 | 日本 |\n");
    }

    #[test]
    fn html_escapes_cells() {
        let mut buffer = Vec::new();
        let row: Row = [("a".to_string(), json!("<b>&"))].into_iter().collect();
        write_html(&Table::from_rows(vec![row]), &mut buffer).expect("html renders");
        let rendered = String::from_utf8(buffer).expect("utf-8");
        assert!(rendered.contains("<td>&lt;b&gt;&amp;</td>"));
        assert!(rendered.contains("<th>a</th>"));
    }

    #[test]
    fn ascii_aligns_wide_characters() {
        let rendered = render(|table, buffer| write_ascii(table, buffer));
        let expected = "\
+----+------+
| a  | b    |
+----+------+
| 1  | x|y  |
| 22 | 日本 |
+----+------+
";
        assert_eq!(rendered, expected);
    }
}

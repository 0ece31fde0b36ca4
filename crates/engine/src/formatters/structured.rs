use std::io::Write;

use cmdgate_types::Table;

use super::FormatError;

/// Rows as a compact JSON array of objects.
pub fn write_json<W: Write>(table: &Table, writer: &mut W) -> Result<(), FormatError> {
    serde_json::to_writer(&mut *writer, &table.rows)?;
    Ok(())
}

/// Rows as a YAML sequence of mappings.
pub fn write_yaml<W: Write>(table: &Table, writer: &mut W) -> Result<(), FormatError> {
    serde_yaml::to_writer(&mut *writer, &table.rows)?;
    Ok(())
}

//! Output formats for structured command results.
//!
//! Every format renders a processed [`Table`] into a [`std::io::Write`] sink, so
//! the same code backs HTTP bodies, temp-file downloads and the CLI.

mod excel;
mod structured;
mod table;

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use cmdgate_types::Table;
use thiserror::Error;

pub use excel::write_excel;
pub use structured::{write_json, write_yaml};
pub use table::{escape_html, write_ascii, write_delimited, write_html, write_markdown};

/// Errors raised while rendering a table.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("I/O error while writing output: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Excel error: {0}")]
    Excel(#[from] rust_xlsxwriter::XlsxError),

    #[error("unknown output format '{0}'")]
    UnknownFormat(String),
}

/// Text table flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableFormat {
    Csv,
    Tsv,
    Markdown,
    Html,
    Ascii,
}

/// A renderer for structured rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Json,
    Yaml,
    Excel,
    Table(TableFormat),
}

impl OutputFormat {
    /// Map a file extension (without the dot) to a format.
    pub fn from_extension(extension: &str) -> Option<Self> {
        let format = match extension.to_ascii_lowercase().as_str() {
            "csv" => Self::Table(TableFormat::Csv),
            "tsv" => Self::Table(TableFormat::Tsv),
            "md" => Self::Table(TableFormat::Markdown),
            "html" => Self::Table(TableFormat::Html),
            "json" => Self::Json,
            "yaml" => Self::Yaml,
            "xlsx" => Self::Excel,
            "txt" => Self::Table(TableFormat::Ascii),
            _ => return None,
        };
        Some(format)
    }

    /// `Content-Type` header value for HTTP responses.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Yaml => "application/yaml",
            Self::Excel => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Table(TableFormat::Csv) => "text/csv; charset=utf-8",
            Self::Table(TableFormat::Tsv) => "text/tab-separated-values; charset=utf-8",
            Self::Table(TableFormat::Markdown) => "text/markdown; charset=utf-8",
            Self::Table(TableFormat::Html) => "text/html; charset=utf-8",
            Self::Table(TableFormat::Ascii) => "text/plain; charset=utf-8",
        }
    }

    /// The `(output, table-format)` naming pair, e.g. `("table", "csv")`.
    pub fn names(self) -> (&'static str, Option<&'static str>) {
        match self {
            Self::Json => ("json", None),
            Self::Yaml => ("yaml", None),
            Self::Excel => ("excel", None),
            Self::Table(format) => ("table", Some(format.name())),
        }
    }

    /// Render `table` into `writer`.
    pub fn write<W: Write>(self, table: &Table, writer: &mut W) -> Result<(), FormatError> {
        match self {
            Self::Json => write_json(table, writer),
            Self::Yaml => write_yaml(table, writer),
            Self::Excel => write_excel(table, writer),
            Self::Table(TableFormat::Csv) => write_delimited(table, writer, b','),
            Self::Table(TableFormat::Tsv) => write_delimited(table, writer, b'\t'),
            Self::Table(TableFormat::Markdown) => write_markdown(table, writer),
            Self::Table(TableFormat::Html) => write_html(table, writer),
            Self::Table(TableFormat::Ascii) => write_ascii(table, writer),
        }
    }

    /// Render `table` into a byte buffer.
    pub fn render(self, table: &Table) -> Result<Vec<u8>, FormatError> {
        let mut buffer = Vec::new();
        self.write(table, &mut buffer)?;
        Ok(buffer)
    }
}

impl TableFormat {
    pub fn name(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Tsv => "tsv",
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Ascii => "ascii",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.names() {
            (output, Some(table)) => write!(f, "{output}/{table}"),
            (output, None) => f.write_str(output),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = FormatError;

    /// Accepts output names (`json`, `yaml`, `excel`, `csv`, `tsv`, `markdown`, `html`, `ascii`, `table`)
    /// as well as file extensions.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        let format = match normalized.as_str() {
            "excel" => Self::Excel,
            "markdown" => Self::Table(TableFormat::Markdown),
            "ascii" | "table" => Self::Table(TableFormat::Ascii),
            other => return Self::from_extension(other).ok_or_else(|| FormatError::UnknownFormat(value.to_string())),
        };
        Ok(format)
    }
}

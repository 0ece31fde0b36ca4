//! Capability dispatch: which renderer serves a command on a route family.
//!
//! | family        | structured                 | writer                       |
//! |---------------|----------------------------|------------------------------|
//! | `data`        | JSON                       | plain text                   |
//! | `text`        | ASCII table                | raw passthrough              |
//! | `streaming`   | server-sent events         | mismatch                     |
//! | `datatables`  | HTML table page            | mismatch                     |
//! | `download`    | format chosen by suffix    | raw passthrough + attachment |

use std::fmt;

use cmdgate_engine::{CapabilityKind, OutputFormat, TableFormat};
use cmdgate_util::split_command_path;

use crate::error::DispatchError;

/// The URL family a request came in through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteFamily {
    Data,
    Text,
    Streaming,
    Datatables,
    Download,
}

impl RouteFamily {
    pub const ALL: [RouteFamily; 5] = [Self::Data, Self::Text, Self::Streaming, Self::Datatables, Self::Download];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Text => "text",
            Self::Streaming => "streaming",
            Self::Datatables => "datatables",
            Self::Download => "download",
        }
    }
}

impl fmt::Display for RouteFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A renderer chosen for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Renderer {
    /// Structured rows rendered in full with `format`.
    Table(OutputFormat),
    /// Structured rows pushed one event at a time.
    EventStream,
    /// Structured rows embedded in the HTML table page.
    Datatables,
    /// Structured rows written to a temp file and sent as an attachment.
    TableDownload { format: OutputFormat, file_name: String },
    /// Writer output returned as `text/plain`.
    PlainText,
    /// Writer output sent as an attachment named `file_name`.
    RawDownload { file_name: String },
}

/// A request path split into the command path and, for downloads, the file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub command_path: String,
    pub file_name: Option<String>,
}

impl Target {
    /// Split the wildcard part of a request path.
    ///
    /// For downloads the last segment is the file name: `foo/bar/out.csv`
    /// addresses `foo/bar` and asks for `out.csv`.
    pub fn parse(family: RouteFamily, path: &str) -> Self {
        let mut segments = split_command_path(path);
        let file_name = match family {
            RouteFamily::Download => segments.pop(),
            _ => None,
        };
        Self {
            command_path: segments.join("/"),
            file_name,
        }
    }
}

/// The lower-cased suffix of `file_name` without the dot, if any.
fn suffix(file_name: &str) -> Option<String> {
    let (stem, extension) = file_name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

/// Map a download file name to its output format.
pub fn format_for_suffix(file_name: &str) -> Result<OutputFormat, DispatchError> {
    let extension = suffix(file_name).unwrap_or_default();
    OutputFormat::from_extension(&extension).ok_or(DispatchError::UnsupportedOutputFormat { suffix: extension })
}

/// Pick the renderer for a command of capability `kind` requested through `family`.
pub fn select_renderer(family: RouteFamily, kind: CapabilityKind, target: &Target) -> Result<Renderer, DispatchError> {
    let mismatch = || DispatchError::CapabilityMismatch {
        path: target.command_path.clone(),
        required: CapabilityKind::Structured,
        actual: kind,
    };
    let file_name = || target.file_name.clone().unwrap_or_default();

    match (family, kind) {
        (RouteFamily::Data, CapabilityKind::Structured) => Ok(Renderer::Table(OutputFormat::Json)),
        (RouteFamily::Data, CapabilityKind::Writer) => Ok(Renderer::PlainText),
        (RouteFamily::Text, CapabilityKind::Structured) => Ok(Renderer::Table(OutputFormat::Table(TableFormat::Ascii))),
        (RouteFamily::Text, CapabilityKind::Writer) => Ok(Renderer::PlainText),
        (RouteFamily::Streaming, CapabilityKind::Structured) => Ok(Renderer::EventStream),
        (RouteFamily::Datatables, CapabilityKind::Structured) => Ok(Renderer::Datatables),
        (RouteFamily::Streaming | RouteFamily::Datatables, CapabilityKind::Writer) => Err(mismatch()),
        (RouteFamily::Download, CapabilityKind::Structured) => {
            let file_name = file_name();
            let format = format_for_suffix(&file_name)?;
            Ok(Renderer::TableDownload { format, file_name })
        }
        (RouteFamily::Download, CapabilityKind::Writer) => Ok(Renderer::RawDownload { file_name: file_name() }),
    }
}

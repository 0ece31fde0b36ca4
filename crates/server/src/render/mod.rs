//! Renderers: turn a located command and its resolved parameters into a response.

mod datatables;
mod download;
mod streaming;

use std::sync::Arc;

use axum::http::header;
use axum::response::{IntoResponse, Response};
use cmdgate_engine::{CapabilityKind, Command, CommandCapability, OutputFormat, ParsedLayers, TableFormat, WriterCommand, collect_table};
use tracing::debug;

use crate::dispatch::Renderer;
use crate::error::DispatchError;
use crate::state::RouteState;

pub use datatables::{DATATABLES_TEMPLATE, TEMPLATE_FILE_NAME, load_template, render_page};
pub use download::TempFileGuard;

const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

/// Run `command` through `renderer`.
pub async fn render(renderer: Renderer, command: &Command, parameters: ParsedLayers, route: &RouteState) -> Result<Response, DispatchError> {
    let parameters = Arc::new(parameters);
    debug!(command = %command.description().path(), ?renderer, "rendering command");

    match (renderer, command.capability()) {
        (Renderer::Table(format), CommandCapability::Structured(producer)) => {
            let table = collect_table(Arc::clone(producer), parameters, route.stream_buffer, &route.cancellation).await?;
            let body = format.render(&table)?;
            Ok(([(header::CONTENT_TYPE, format.content_type())], body).into_response())
        }
        (Renderer::EventStream, CommandCapability::Structured(producer)) => Ok(streaming::stream_rows(
            Arc::clone(producer),
            parameters,
            route.stream_buffer,
            &route.cancellation,
        )),
        (Renderer::Datatables, CommandCapability::Structured(producer)) => {
            let table = collect_table(Arc::clone(producer), parameters, route.stream_buffer, &route.cancellation).await?;
            let template = load_template(route.templates.as_deref()).await?;
            let page = render_page(&template, &command.description().path(), &table)?;
            Ok(([(header::CONTENT_TYPE, OutputFormat::Table(TableFormat::Html).content_type())], page).into_response())
        }
        (Renderer::TableDownload { format, file_name }, CommandCapability::Structured(producer)) => {
            let table = collect_table(Arc::clone(producer), parameters, route.stream_buffer, &route.cancellation).await?;
            download::table_download(table, format, &file_name, route.staging_dir.as_deref()).await
        }
        (Renderer::PlainText, CommandCapability::Writer(writer)) => {
            let body = write_to_buffer(writer.as_ref(), &parameters).await?;
            Ok(([(header::CONTENT_TYPE, PLAIN_TEXT)], body).into_response())
        }
        (Renderer::RawDownload { file_name }, CommandCapability::Writer(writer)) => {
            download::raw_download(writer.as_ref(), &parameters, &file_name, route.staging_dir.as_deref()).await
        }
        (_, capability) => {
            let actual = capability.kind();
            let required = match actual {
                CapabilityKind::Structured => CapabilityKind::Writer,
                CapabilityKind::Writer => CapabilityKind::Structured,
            };
            Err(DispatchError::CapabilityMismatch {
                path: command.description().path(),
                required,
                actual,
            })
        }
    }
}

/// Run a writer command into memory.
pub async fn write_to_buffer(writer: &dyn WriterCommand, parameters: &ParsedLayers) -> Result<Vec<u8>, DispatchError> {
    let mut buffer = Vec::new();
    writer.run(parameters, &mut buffer).await?;
    Ok(buffer)
}

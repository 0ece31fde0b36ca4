//! Attachments staged through a temporary file.
//!
//! The full output is written to a [`NamedTempFile`] first, then the file is
//! reopened and streamed back. The file is removed when the response body is
//! dropped, whether it was sent completely, cut off by the client, or never
//! sent because rendering failed.

use std::io::{BufWriter, Write};
use std::path::Path;

use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use cmdgate_engine::{OutputFormat, ParsedLayers, WriterCommand};
use cmdgate_types::Table;
use futures_util::StreamExt;
use tempfile::{NamedTempFile, TempPath};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::error::DispatchError;

/// Deletes a staged file when dropped. Failures are logged, never raised.
#[derive(Debug)]
pub struct TempFileGuard {
    path: Option<TempPath>,
}

impl TempFileGuard {
    pub fn new(path: TempPath) -> Self {
        Self { path: Some(path) }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        let staged = path.display().to_string();
        match path.close() {
            Ok(()) => debug!(path = %staged, "removed staged download"),
            Err(error) => warn!(path = %staged, "failed to remove staged download: {error}"),
        }
    }
}

fn temp_file_error(error: impl std::fmt::Display) -> DispatchError {
    DispatchError::TempFileError(error.to_string())
}

fn staged_file(staging_dir: Option<&Path>) -> Result<NamedTempFile, DispatchError> {
    match staging_dir {
        Some(dir) => NamedTempFile::new_in(dir),
        None => NamedTempFile::new(),
    }
    .map_err(temp_file_error)
}

/// `attachment; filename="<base name>"`.
fn content_disposition(file_name: &str) -> String {
    let base_name = file_name.rsplit('/').next().unwrap_or(file_name).replace('"', "");
    format!("attachment; filename=\"{base_name}\"")
}

async fn attachment(guard: TempFileGuard, content_type: &'static str, file_name: &str) -> Result<Response, DispatchError> {
    let Some(path) = guard.path() else {
        return Err(temp_error_missing());
    };
    let file = tokio::fs::File::open(path).await.map_err(temp_file_error)?;
    let length = file.metadata().await.map_err(temp_file_error)?.len();
    let body = ReaderStream::new(file).map(move |chunk| {
        let _staged = &guard;
        chunk
    });
    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(file_name)),
            (header::CONTENT_LENGTH, length.to_string()),
        ],
        Body::from_stream(body),
    )
        .into_response())
}

fn temp_error_missing() -> DispatchError {
    DispatchError::TempFileError("staged file already removed".to_string())
}

/// Render `table` as `format` into a temp file and send it as `file_name`.
pub async fn table_download(table: Table, format: OutputFormat, file_name: &str, staging_dir: Option<&Path>) -> Result<Response, DispatchError> {
    let staging_dir = staging_dir.map(Path::to_path_buf);
    let staged = tokio::task::spawn_blocking(move || -> Result<TempFileGuard, DispatchError> {
        let mut file = staged_file(staging_dir.as_deref())?;
        let mut writer = BufWriter::new(file.as_file_mut());
        format.write(&table, &mut writer)?;
        writer.flush().map_err(temp_file_error)?;
        drop(writer);
        Ok(TempFileGuard::new(file.into_temp_path()))
    })
    .await
    .map_err(temp_file_error)??;
    debug!(%format, file_name, "staged structured download");
    attachment(staged, format.content_type(), file_name).await
}

/// Run `writer` into a temp file and send its bytes untouched as `file_name`.
pub async fn raw_download(
    writer: &dyn WriterCommand,
    parameters: &ParsedLayers,
    file_name: &str,
    staging_dir: Option<&Path>,
) -> Result<Response, DispatchError> {
    let file = staged_file(staging_dir)?;
    let handle = file.reopen().map_err(temp_file_error)?;
    let guard = TempFileGuard::new(file.into_temp_path());

    let mut output = tokio::fs::File::from_std(handle);
    writer.run(parameters, &mut output).await?;
    output.flush().await.map_err(temp_file_error)?;
    drop(output);

    debug!(file_name, "staged raw download");
    attachment(guard, "application/octet-stream", file_name).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use serde_json::json;
    use tokio::io::AsyncWrite;

    #[derive(Debug)]
    struct BrokenWriter;

    #[async_trait]
    impl WriterCommand for BrokenWriter {
        async fn run(&self, _parameters: &ParsedLayers, writer: &mut (dyn AsyncWrite + Send + Unpin)) -> anyhow::Result<()> {
            writer.write_all(b"partial").await?;
            anyhow::bail!("disk quota exceeded")
        }
    }

    fn staged_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).expect("read staging dir").count()
    }

    fn single_cell(value: serde_json::Value) -> Table {
        let mut row = cmdgate_types::Row::new();
        row.insert("a".to_string(), value);
        Table::from_rows(vec![row])
    }

    #[test]
    fn disposition_uses_the_base_name() {
        assert_eq!(content_disposition("out.csv"), "attachment; filename=\"out.csv\"");
        assert_eq!(content_disposition("a/b/out.csv"), "attachment; filename=\"out.csv\"");
    }

    #[test]
    fn guard_removes_the_file() {
        let file = NamedTempFile::new().expect("temp file");
        let path = file.path().to_path_buf();
        let guard = TempFileGuard::new(file.into_temp_path());
        assert!(path.exists());
        drop(guard);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn staged_file_lives_until_the_body_is_dropped() {
        let staging = tempfile::tempdir().expect("staging dir");
        let response = table_download(single_cell(json!(1)), OutputFormat::Json, "out.json", Some(staging.path()))
            .await
            .expect("download renders");
        assert_eq!(response.headers()[header::CONTENT_DISPOSITION], "attachment; filename=\"out.json\"");
        assert_eq!(staged_files(staging.path()), 1);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        assert_eq!(&body[..], br#"[{"a":1}]"#);
        assert_eq!(staged_files(staging.path()), 0);
    }

    #[tokio::test]
    async fn failed_writer_leaves_nothing_staged() {
        let staging = tempfile::tempdir().expect("staging dir");
        let error = raw_download(&BrokenWriter, &ParsedLayers::new(), "out.txt", Some(staging.path()))
            .await
            .unwrap_err();
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.to_string(), "disk quota exceeded");
        assert_eq!(staged_files(staging.path()), 0);
    }

    #[tokio::test]
    async fn failed_format_leaves_nothing_staged() {
        let staging = tempfile::tempdir().expect("staging dir");
        // longer than an Excel cell may hold
        let table = single_cell(json!("x".repeat(40_000)));
        let error = table_download(table, OutputFormat::Excel, "out.xlsx", Some(staging.path()))
            .await
            .unwrap_err();
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(staged_files(staging.path()), 0);
    }
}

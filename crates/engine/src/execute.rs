//! Running structured commands on their own task.
//!
//! The producer is spawned and connected to the caller by a bounded channel. The
//! caller either drains it row by row ([`RowStream`], used for streaming) or
//! collects it into a processed [`Table`] ([`collect_table`]).

use std::sync::Arc;

use anyhow::bail;
use cmdgate_types::{Row, Table};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

use crate::command::{RowSender, RowSinkClosed, StructuredCommand};
use crate::parameters::ParsedLayers;
use crate::processor::RowProcessor;

/// Channel capacity used when a caller has no configured value.
pub const DEFAULT_ROW_BUFFER: usize = 64;

/// Returned by [`collect_table`] when its token was cancelled before the
/// producer finished, so the rows received so far are incomplete.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("command was cancelled before it finished")]
pub struct CommandCancelled;

/// Consumer side of a running structured command.
///
/// Dropping the stream cancels the producer: the cancellation token is tripped
/// and the channel closes, so the next send fails with [`RowSinkClosed`].
#[derive(Debug)]
pub struct RowStream {
    receiver: mpsc::Receiver<Row>,
    producer: JoinHandle<anyhow::Result<()>>,
    processor: RowProcessor,
    _cancel_on_drop: DropGuard,
}

impl RowStream {
    /// Spawn `command` with `parameters` and return the stream of its processed rows.
    ///
    /// `cancellation` is the caller's token; the producer receives a child of it.
    pub fn spawn(command: Arc<dyn StructuredCommand>, parameters: Arc<ParsedLayers>, capacity: usize, cancellation: &CancellationToken) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let token = cancellation.child_token();
        let rows = RowSender::new(sender, token.clone());
        let processor = RowProcessor::from_parameters(&parameters);
        let producer = tokio::spawn(async move {
            let result = command.run(&parameters, &rows).await;
            drop(rows);
            result
        });
        Self {
            receiver,
            producer,
            processor,
            _cancel_on_drop: token.drop_guard(),
        }
    }

    /// The next processed row, or `None` once the producer is done.
    pub async fn next(&mut self) -> Option<Row> {
        self.receiver.recv().await.map(|row| self.processor.process_row(row))
    }

    /// Stop receiving and wait for the producer's outcome.
    ///
    /// A producer that stopped because the consumer went away is not an error.
    pub async fn finish(self) -> anyhow::Result<()> {
        let Self { receiver, producer, .. } = self;
        drop(receiver);
        match producer.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) if error.is::<RowSinkClosed>() => {
                debug!("structured command stopped after its consumer went away");
                Ok(())
            }
            Ok(Err(error)) => Err(error),
            Err(join_error) => {
                warn!("structured command task failed: {join_error}");
                Err(anyhow::Error::new(join_error).context("command task panicked or was aborted"))
            }
        }
    }
}

/// Run `command` to completion and return its rows after `glazed` processing.
///
/// Cancelling `cancellation` mid-run yields [`CommandCancelled`] instead of a
/// truncated table.
pub async fn collect_table(
    command: Arc<dyn StructuredCommand>,
    parameters: Arc<ParsedLayers>,
    capacity: usize,
    cancellation: &CancellationToken,
) -> anyhow::Result<Table> {
    let processor = RowProcessor::from_parameters(&parameters);
    let mut stream = RowStream::spawn(command, parameters, capacity, cancellation);
    let mut rows = Vec::new();
    // raw rows: the table pass below selects columns and sorts in one go
    while let Some(row) = stream.receiver.recv().await {
        rows.push(row);
    }
    stream.finish().await?;
    if cancellation.is_cancelled() {
        bail!(CommandCancelled);
    }
    let table = processor.process_table(Table::from_rows(rows));
    debug!(rows = table.rows.len(), columns = table.columns.len(), "collected structured output");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Counter {
        total: usize,
        sent: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl StructuredCommand for Counter {
        async fn run(&self, _parameters: &ParsedLayers, rows: &RowSender) -> anyhow::Result<()> {
            for index in 0..self.total {
                let row: Row = [("n".to_string(), json!(index))].into_iter().collect();
                rows.send(row).await?;
                self.sent.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Failing;

    #[async_trait]
    impl StructuredCommand for Failing {
        async fn run(&self, _parameters: &ParsedLayers, _rows: &RowSender) -> anyhow::Result<()> {
            anyhow::bail!("database unavailable")
        }
    }

    #[derive(Debug)]
    struct Endless;

    #[async_trait]
    impl StructuredCommand for Endless {
        async fn run(&self, _parameters: &ParsedLayers, rows: &RowSender) -> anyhow::Result<()> {
            loop {
                let row: Row = [("n".to_string(), json!(0))].into_iter().collect();
                rows.send(row).await?;
                tokio::task::yield_now().await;
            }
        }
    }

    fn counter(total: usize) -> (Arc<dyn StructuredCommand>, Arc<AtomicUsize>) {
        let sent = Arc::new(AtomicUsize::new(0));
        (Arc::new(Counter { total, sent: sent.clone() }), sent)
    }

    #[tokio::test]
    async fn collects_every_row_through_a_small_buffer() {
        let (command, _) = counter(10);
        let table = collect_table(command, Arc::new(ParsedLayers::new()), 2, &CancellationToken::new())
            .await
            .expect("command succeeds");
        assert_eq!(table.rows.len(), 10);
        assert_eq!(table.columns, vec!["n".to_string()]);
    }

    #[tokio::test]
    async fn dropping_the_stream_stops_the_producer() {
        let (command, sent) = counter(1_000);
        let mut stream = RowStream::spawn(command, Arc::new(ParsedLayers::new()), 1, &CancellationToken::new());
        assert!(stream.next().await.is_some());
        stream.finish().await.expect("cancelled producer is not an error");
        assert!(sent.load(Ordering::SeqCst) < 1_000);
    }

    #[tokio::test]
    async fn cancelling_the_parent_token_ends_the_stream() {
        let (command, _) = counter(1_000);
        let cancellation = CancellationToken::new();
        let mut stream = RowStream::spawn(command, Arc::new(ParsedLayers::new()), 1, &cancellation);
        cancellation.cancel();
        while stream.next().await.is_some() {}
        stream.finish().await.expect("cancelled producer is not an error");
    }

    #[tokio::test]
    async fn producer_errors_are_returned() {
        let error = collect_table(Arc::new(Failing), Arc::new(ParsedLayers::new()), 4, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "database unavailable");
    }

    #[tokio::test]
    async fn cancelled_collection_is_an_error_not_a_partial_table() {
        let cancellation = CancellationToken::new();
        let cancel = {
            let cancellation = cancellation.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                cancellation.cancel();
            })
        };
        let error = collect_table(Arc::new(Endless), Arc::new(ParsedLayers::new()), 1, &cancellation)
            .await
            .unwrap_err();
        assert!(error.is::<CommandCancelled>());
        cancel.await.expect("cancel task finishes");
    }
}

//! Commands and their execution capabilities.
//!
//! Every [`Command`] has exactly one [`CommandCapability`]: it either produces
//! rows ([`StructuredCommand`]) or writes an opaque text stream
//! ([`WriterCommand`]). Callers match on the capability once and pick a
//! renderer accordingly.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use cmdgate_types::{CommandDescription, Row};
use thiserror::Error;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::parameters::ParsedLayers;
use crate::processor::glazed_layer;

/// Returned by [`RowSender::send`] once the consumer is gone or the request was cancelled.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("row consumer is no longer receiving")]
pub struct RowSinkClosed;

/// Producer side of the bounded row channel handed to structured commands.
///
/// `send` waits while the channel is full, so a slow consumer slows the producer
/// down instead of growing a buffer.
#[derive(Debug, Clone)]
pub struct RowSender {
    sender: mpsc::Sender<Row>,
    cancellation: CancellationToken,
}

impl RowSender {
    pub fn new(sender: mpsc::Sender<Row>, cancellation: CancellationToken) -> Self {
        Self { sender, cancellation }
    }

    /// Push a row to the consumer.
    pub async fn send(&self, row: Row) -> Result<(), RowSinkClosed> {
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(RowSinkClosed),
            sent = self.sender.send(row) => sent.map_err(|_| RowSinkClosed),
        }
    }
}

/// A command that produces typed rows.
#[async_trait]
pub trait StructuredCommand: Send + Sync + fmt::Debug {
    /// Produce rows into `rows` until done.
    ///
    /// Implementations should return (or propagate) [`RowSinkClosed`] as soon as a
    /// send fails; the executor treats it as a cancelled request rather than a failure.
    async fn run(&self, parameters: &ParsedLayers, rows: &RowSender) -> anyhow::Result<()>;
}

/// A command that writes its output directly.
#[async_trait]
pub trait WriterCommand: Send + Sync + fmt::Debug {
    async fn run(&self, parameters: &ParsedLayers, writer: &mut (dyn AsyncWrite + Send + Unpin)) -> anyhow::Result<()>;
}

/// Capability tag without the implementation, used in errors and listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Structured,
    Writer,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structured => f.write_str("glazed"),
            Self::Writer => f.write_str("writer"),
        }
    }
}

/// The single execution capability of a command.
#[derive(Debug, Clone)]
pub enum CommandCapability {
    Structured(Arc<dyn StructuredCommand>),
    Writer(Arc<dyn WriterCommand>),
}

impl CommandCapability {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Self::Structured(_) => CapabilityKind::Structured,
            Self::Writer(_) => CapabilityKind::Writer,
        }
    }
}

/// A command as stored in the repository: a description plus its capability.
///
/// Cloning is cheap; both parts are reference counted and never mutated.
#[derive(Debug, Clone)]
pub struct Command {
    description: Arc<CommandDescription>,
    capability: CommandCapability,
}

impl Command {
    /// A row-producing command. The `glazed` row-processing layer is added to the
    /// description unless it already declares one.
    pub fn structured(description: CommandDescription, command: impl StructuredCommand + 'static) -> Self {
        Self::from_capability(description, CommandCapability::Structured(Arc::new(command)))
    }

    pub fn writer(description: CommandDescription, command: impl WriterCommand + 'static) -> Self {
        Self::from_capability(description, CommandCapability::Writer(Arc::new(command)))
    }

    pub fn from_capability(mut description: CommandDescription, capability: CommandCapability) -> Self {
        if capability.kind() == CapabilityKind::Structured {
            description.add_layer(glazed_layer());
        }
        Self {
            description: Arc::new(description),
            capability,
        }
    }

    /// The same command registered under another path, sharing the capability.
    pub fn alias(&self, name: impl Into<String>, parents: Vec<String>) -> Self {
        let mut description = (*self.description).clone();
        description.name = name.into();
        description.parents = parents;
        Self {
            description: Arc::new(description),
            capability: self.capability.clone(),
        }
    }

    pub fn description(&self) -> &CommandDescription {
        &self.description
    }

    pub fn capability(&self) -> &CommandCapability {
        &self.capability
    }

    pub fn kind(&self) -> CapabilityKind {
        self.capability.kind()
    }

    pub fn full_path(&self) -> Vec<String> {
        self.description.full_path()
    }
}

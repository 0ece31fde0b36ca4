//! Shared, concurrently refreshable command repository.
//!
//! Readers take an `Arc` snapshot and keep using it for the rest of a request,
//! even if a refresh lands meanwhile. A snapshot pairs the command trie with a
//! caller-defined context (a route keeps its resolution pipeline there), so
//! both always come from the same generation. Changes arrive as
//! [`RepositoryEvent`]s on a channel; a background task applies them by
//! building a new trie and swapping it in.

use std::sync::Arc;

use cmdgate_engine::Command;
use cmdgate_util::SharedSnapshot;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::locator::{LocateError, locate};
use crate::trie::CommandTrie;

/// A change to the repository's contents.
#[derive(Debug, Clone)]
pub enum RepositoryEvent {
    /// Commands to register.
    Added(Vec<Command>),
    /// Paths whose commands should be dropped.
    Removed(Vec<Vec<String>>),
    /// Replace the whole contents.
    Replaced(Vec<Command>),
}

impl RepositoryEvent {
    /// The trie that results from applying this event to `current`.
    pub fn apply_to(&self, current: &CommandTrie) -> CommandTrie {
        match self {
            Self::Added(commands) => {
                let mut next = current.clone();
                for command in commands {
                    next.insert(command.clone());
                }
                next
            }
            Self::Removed(paths) => {
                let mut next = current.clone();
                for path in paths {
                    next.remove(path);
                }
                next
            }
            Self::Replaced(commands) => CommandTrie::from_commands(commands.iter().cloned()),
        }
    }
}

/// One generation of the repository: its commands and the context served with them.
#[derive(Debug)]
pub struct RepositorySnapshot<C> {
    pub commands: Arc<CommandTrie>,
    pub context: Arc<C>,
}

impl<C> RepositorySnapshot<C> {
    pub fn locate(&self, path: &str) -> Result<Command, LocateError> {
        locate(&self.commands, path)
    }
}

/// Handle to the repository. Cloning shares the same underlying snapshot.
#[derive(Debug)]
pub struct CommandRepository<C = ()> {
    state: SharedSnapshot<RepositorySnapshot<C>>,
}

impl<C> Clone for CommandRepository<C> {
    fn clone(&self) -> Self {
        Self { state: self.state.clone() }
    }
}

impl Default for CommandRepository {
    fn default() -> Self {
        Self::new([])
    }
}

impl CommandRepository {
    pub fn new(commands: impl IntoIterator<Item = Command>) -> Self {
        Self::with_context(commands, ())
    }
}

impl<C> CommandRepository<C> {
    pub fn with_context(commands: impl IntoIterator<Item = Command>, context: C) -> Self {
        Self {
            state: SharedSnapshot::new(RepositorySnapshot {
                commands: Arc::new(CommandTrie::from_commands(commands)),
                context: Arc::new(context),
            }),
        }
    }

    /// The current generation. It stays valid however long the caller holds it.
    pub fn snapshot(&self) -> Arc<RepositorySnapshot<C>> {
        self.state.load()
    }

    /// The current trie.
    pub fn commands(&self) -> Arc<CommandTrie> {
        Arc::clone(&self.snapshot().commands)
    }

    pub fn collect_commands<S: AsRef<str>>(&self, path: &[S]) -> Vec<Command> {
        self.snapshot().commands.collect_commands(path)
    }

    pub fn locate(&self, path: &str) -> Result<Command, LocateError> {
        self.snapshot().locate(path)
    }

    /// Swap in new commands and a new context together.
    pub fn replace(&self, commands: CommandTrie, context: C) {
        let count = commands.len();
        self.state.store(Arc::new(RepositorySnapshot {
            commands: Arc::new(commands),
            context: Arc::new(context),
        }));
        debug!(commands = count, "replaced repository contents");
    }

    /// Apply one event by copy-on-write. The context carries over unchanged.
    pub fn apply(&self, event: RepositoryEvent) {
        let snapshot = self.state.update(|current| RepositorySnapshot {
            commands: Arc::new(event.apply_to(&current.commands)),
            context: Arc::clone(&current.context),
        });
        debug!(commands = snapshot.commands.len(), "applied repository event");
    }
}

impl<C: Send + Sync + 'static> CommandRepository<C> {
    /// Start the background consumer. It runs until every sender is dropped or
    /// `cancellation` fires.
    pub fn listen(&self, buffer: usize, cancellation: CancellationToken) -> (mpsc::Sender<RepositoryEvent>, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel(buffer.max(1));
        let repository = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancellation.cancelled() => break,
                    event = receiver.recv() => event,
                };
                let Some(event) = event else {
                    break;
                };
                repository.apply(event);
            }
            info!("command repository listener stopped");
        });
        (sender, handle)
    }
}

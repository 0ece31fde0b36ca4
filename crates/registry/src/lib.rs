//! Command repository for cmdgate.
//!
//! Commands live in a [`CommandTrie`] keyed by path segment. The
//! [`CommandRepository`] wraps the trie and a caller context in an atomically
//! swappable snapshot and applies add/remove notifications from a background
//! task; [`locate`] turns a request path into exactly one command or a typed
//! [`LocateError`].

pub mod listing;
pub mod loader;
pub mod locator;
pub mod repository;
pub mod trie;

pub use listing::{CommandSummary, CommandTree};
pub use loader::{load_directory, load_repositories};
pub use locator::{LocateError, locate};
pub use repository::{CommandRepository, RepositoryEvent, RepositorySnapshot};
pub use trie::{CommandTrie, TrieNode};

//! Resolving a request path to exactly one command.

use cmdgate_engine::Command;
use cmdgate_util::split_command_path;
use thiserror::Error;

use crate::trie::CommandTrie;

/// Why a path did not resolve to a single command.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LocateError {
    #[error("command {path} not found")]
    NotFound { path: String },

    #[error("command {path} is ambiguous, could be one of: {}", .candidates.join(", "))]
    Ambiguous { path: String, candidates: Vec<String> },
}

/// Look `path` up in `trie`.
///
/// The path is split on `/` with empty segments dropped, so `foo//bar/` and
/// `foo/bar` are the same lookup. Only exact matches count.
pub fn locate(trie: &CommandTrie, path: &str) -> Result<Command, LocateError> {
    let segments = split_command_path(path);
    let mut matches = trie.collect_commands(&segments);
    match matches.len() {
        0 => Err(LocateError::NotFound { path: segments.join("/") }),
        1 => Ok(matches.remove(0)),
        _ => Err(LocateError::Ambiguous {
            path: segments.join("/"),
            candidates: matches.iter().map(|command| command.description().candidate_label()).collect(),
        }),
    }
}

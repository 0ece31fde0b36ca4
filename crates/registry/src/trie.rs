//! Path-segment trie holding every registered command.

use std::collections::BTreeMap;

use cmdgate_engine::Command;

/// One node of the trie: the commands registered exactly at this path and the
/// sub-nodes keyed by their next segment.
#[derive(Debug, Clone, Default)]
pub struct TrieNode {
    commands: Vec<Command>,
    children: BTreeMap<String, TrieNode>,
}

impl TrieNode {
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Sub-nodes in segment order.
    pub fn children(&self) -> impl Iterator<Item = (&String, &TrieNode)> {
        self.children.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.children.values().all(TrieNode::is_empty)
    }

    fn collect_into(&self, commands: &mut Vec<Command>) {
        commands.extend(self.commands.iter().cloned());
        for child in self.children.values() {
            child.collect_into(commands);
        }
    }
}

/// The command repository's storage.
///
/// More than one command may live at the same path; lookups report that as
/// ambiguity instead of choosing one.
#[derive(Debug, Clone, Default)]
pub struct CommandTrie {
    root: TrieNode,
    len: usize,
}

impl CommandTrie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_commands(commands: impl IntoIterator<Item = Command>) -> Self {
        let mut trie = Self::new();
        for command in commands {
            trie.insert(command);
        }
        trie
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Register `command` under its full path.
    pub fn insert(&mut self, command: Command) {
        let mut node = &mut self.root;
        for segment in command.full_path() {
            node = node.children.entry(segment).or_default();
        }
        node.commands.push(command);
        self.len += 1;
    }

    /// Remove every command registered exactly at `path`, pruning empty nodes.
    pub fn remove<S: AsRef<str>>(&mut self, path: &[S]) -> Vec<Command> {
        let removed = remove_at(&mut self.root, path);
        self.len -= removed.len();
        removed
    }

    /// The node at `path`, if any command lives at or below it.
    pub fn node<S: AsRef<str>>(&self, path: &[S]) -> Option<&TrieNode> {
        let mut node = &self.root;
        for segment in path {
            node = node.children.get(segment.as_ref())?;
        }
        Some(node)
    }

    /// Commands whose full path equals `path`.
    pub fn collect_commands<S: AsRef<str>>(&self, path: &[S]) -> Vec<Command> {
        self.node(path).map(|node| node.commands.clone()).unwrap_or_default()
    }

    /// Commands at or below `path`, depth first in segment order.
    pub fn collect_prefix<S: AsRef<str>>(&self, path: &[S]) -> Vec<Command> {
        let mut commands = Vec::new();
        if let Some(node) = self.node(path) {
            node.collect_into(&mut commands);
        }
        commands
    }

    /// Names of the immediate sub-nodes of `path`.
    pub fn children<S: AsRef<str>>(&self, path: &[S]) -> Vec<String> {
        self.node(path)
            .map(|node| node.children.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn all(&self) -> Vec<Command> {
        self.collect_prefix::<&str>(&[])
    }

    pub fn root(&self) -> &TrieNode {
        &self.root
    }
}

fn remove_at<S: AsRef<str>>(node: &mut TrieNode, path: &[S]) -> Vec<Command> {
    let Some((first, rest)) = path.split_first() else {
        return std::mem::take(&mut node.commands);
    };
    let Some(child) = node.children.get_mut(first.as_ref()) else {
        return Vec::new();
    };
    let removed = remove_at(child, rest);
    if child.is_empty() {
        node.children.remove(first.as_ref());
    }
    removed
}

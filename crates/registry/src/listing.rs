//! Serializable views of the repository for index and node listings.

use cmdgate_engine::{CapabilityKind, Command};
use serde::Serialize;

use crate::trie::{CommandTrie, TrieNode};

/// A command as shown in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSummary {
    pub name: String,
    pub path: String,
    pub short: String,
    pub capability: CapabilityKind,
}

impl From<&Command> for CommandSummary {
    fn from(command: &Command) -> Self {
        let description = command.description();
        Self {
            name: description.name.clone(),
            path: description.path(),
            short: description.short.clone(),
            capability: command.kind(),
        }
    }
}

/// A trie node with its commands and sub-nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandTree {
    pub path: String,
    pub commands: Vec<CommandSummary>,
    pub children: Vec<CommandTree>,
}

impl CommandTree {
    /// The tree below `path`, or `None` when nothing is registered there.
    pub fn build<S: AsRef<str>>(trie: &CommandTrie, path: &[S]) -> Option<Self> {
        let node = trie.node(path)?;
        let segments: Vec<String> = path.iter().map(|segment| segment.as_ref().to_string()).collect();
        Some(from_node(node, &segments))
    }
}

fn from_node(node: &TrieNode, segments: &[String]) -> CommandTree {
    CommandTree {
        path: segments.join("/"),
        commands: node.commands().iter().map(CommandSummary::from).collect(),
        children: node
            .children()
            .map(|(segment, child)| {
                let mut child_segments = segments.to_vec();
                child_segments.push(segment.clone());
                from_node(child, &child_segments)
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::text_command;
    use serde_json::json;

    #[test]
    fn serializes_nested_nodes() {
        let trie = CommandTrie::from_commands([text_command(&["foo"], "bar")]);
        let tree = CommandTree::build::<&str>(&trie, &[]).expect("root exists");
        assert_eq!(
            serde_json::to_value(&tree).expect("tree serializes"),
            json!({
                "path": "",
                "commands": [],
                "children": [{
                    "path": "foo",
                    "commands": [],
                    "children": [{
                        "path": "foo/bar",
                        "commands": [{ "name": "bar", "path": "foo/bar", "short": "", "capability": "writer" }],
                        "children": [],
                    }],
                }],
            })
        );
        assert!(CommandTree::build(&trie, &["nope"]).is_none());
    }
}

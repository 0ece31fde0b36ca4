//! Loading command definition files from repository directories.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cmdgate_engine::{Command, load_command_file};
use tracing::{debug, info};

use crate::trie::CommandTrie;

fn is_definition_file(path: &Path) -> bool {
    matches!(path.extension().and_then(|extension| extension.to_str()), Some("yaml" | "yml"))
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

fn collect_definition_files(root: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(root).with_context(|| format!("read command directory {}", root.display()))? {
        let entry = entry.with_context(|| format!("walk command directory {}", root.display()))?;
        let path = entry.path();
        if is_hidden(&path) {
            continue;
        }
        if entry.file_type().with_context(|| format!("inspect {}", path.display()))?.is_dir() {
            collect_definition_files(&path, files)?;
        } else if is_definition_file(&path) {
            files.push(path);
        }
    }
    Ok(())
}

/// Load every `*.yaml`/`*.yml` definition below `root`, in path order.
pub fn load_directory(root: &Path) -> Result<Vec<Command>> {
    let mut files = Vec::new();
    collect_definition_files(root, &mut files)?;
    files.sort();

    let mut commands = Vec::new();
    for file in &files {
        let mut loaded = load_command_file(root, file)?;
        commands.append(&mut loaded);
    }
    debug!(root = %root.display(), files = files.len(), commands = commands.len(), "loaded command directory");
    Ok(commands)
}

/// Load several repository directories into one trie.
pub fn load_repositories(roots: &[PathBuf]) -> Result<CommandTrie> {
    let mut trie = CommandTrie::new();
    for root in roots {
        for command in load_directory(root)? {
            trie.insert(command);
        }
    }
    info!(repositories = roots.len(), commands = trie.len(), "loaded command repositories");
    Ok(trie)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_nested_directories_and_skips_other_files() {
        let root = tempfile::tempdir().expect("temp dir");
        fs::create_dir_all(root.path().join("foo/.hidden")).expect("create dirs");
        fs::write(root.path().join("foo/bar.yaml"), "rows: [{ a: 1 }]\n").expect("write bar");
        fs::write(root.path().join("foo/baz.yml"), "type: text\ntext: hi\n").expect("write baz");
        fs::write(root.path().join("foo/notes.md"), "# ignored\n").expect("write notes");
        fs::write(root.path().join("foo/.hidden/skip.yaml"), "rows: []\n").expect("write hidden");

        let commands = load_directory(root.path()).expect("directory loads");
        let paths: Vec<String> = commands.iter().map(|command| command.description().path()).collect();
        assert_eq!(paths, vec!["foo/bar", "foo/baz"]);
    }

    #[test]
    fn broken_definitions_name_the_file() {
        let root = tempfile::tempdir().expect("temp dir");
        fs::write(root.path().join("broken.yaml"), "rows: [").expect("write broken");
        let error = load_directory(root.path()).unwrap_err();
        assert!(error.to_string().contains("broken.yaml"), "{error}");
    }

    #[test]
    fn missing_directories_are_errors() {
        let error = load_repositories(&[PathBuf::from("/definitely/not/here")]).unwrap_err();
        assert!(error.to_string().starts_with("read command directory"), "{error}");
    }
}

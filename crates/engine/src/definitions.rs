//! # Command Definition Files
//!
//! Commands can be declared in YAML. A file describes one command plus optional
//! aliases:
//!
//! ```yaml
//! name: bar
//! short: Bar report
//! type: rows
//! flags:
//!   - { name: limit, type: int, default: 10 }
//! columns: [a, b]
//! rows:
//!   - { a: 1, b: x }
//! aliases:
//!   - { name: baz, parents: [foo] }
//! ```
//!
//! `type: rows` yields a structured command that emits the declared rows, with
//! `${{ ... }}` expressions in cells rendered against the resolved parameters.
//! `type: text` yields a writer command that renders its `text` template.
//!
//! When `name` or `parents` are omitted they are taken from the file's path
//! relative to the repository directory: `foo/bar.yaml` becomes `foo bar`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cmdgate_types::{CommandDescription, DEFAULT_SLUG, LayerDefinition, ParameterDefinition, Row};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::command::{Command, RowSender, StructuredCommand, WriterCommand};
use crate::parameters::ParsedLayers;
use crate::templates::{render_template, render_value};

/// Errors raised while loading a command definition file.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to read command definition {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse command definition {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid command definition {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// What a definition file produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    #[default]
    Rows,
    Text,
}

/// Another path under which the command is registered.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AliasDefinition {
    pub name: String,
    #[serde(default)]
    pub parents: Option<Vec<String>>,
}

/// On-disk shape of a command definition file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandFile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parents: Option<Vec<String>>,
    #[serde(default)]
    pub short: String,
    #[serde(default)]
    pub long: String,
    #[serde(default, rename = "type")]
    pub kind: DefinitionKind,
    /// Parameters of the default layer.
    #[serde(default)]
    pub flags: Vec<ParameterDefinition>,
    /// Additional parameter layers.
    #[serde(default)]
    pub layers: Vec<LayerDefinition>,
    /// Column order for emitted rows. Defaults to the order of the first row's keys.
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub aliases: Vec<AliasDefinition>,
}

impl CommandFile {
    /// Build the command and its aliases.
    ///
    /// `origin` is only used in error messages; `path_parents` and `path_name`
    /// fill in `parents`/`name` when the file leaves them out.
    pub fn into_commands(self, origin: &Path, path_parents: Vec<String>, path_name: &str) -> Result<Vec<Command>, DefinitionError> {
        let invalid = |reason: &str| DefinitionError::Invalid {
            path: origin.to_path_buf(),
            reason: reason.to_string(),
        };

        let name = self.name.unwrap_or_else(|| path_name.to_string());
        if !is_path_segment(&name) {
            return Err(invalid("command name must be a non-empty path segment"));
        }
        let parents = self.parents.unwrap_or(path_parents);
        if !parents.iter().all(|segment| is_path_segment(segment)) {
            return Err(invalid("command parents must be non-empty path segments"));
        }

        let mut description = CommandDescription::new(name, parents);
        description.short = self.short;
        description.long = self.long;
        let mut flags = LayerDefinition::new(DEFAULT_SLUG, "Flags");
        flags.parameters = self.flags;
        description.add_layer(flags);
        for layer in self.layers {
            description.add_layer(layer);
        }

        let command = match self.kind {
            DefinitionKind::Rows => {
                if self.text.is_some() {
                    return Err(invalid("`text` is only valid for `type: text`"));
                }
                Command::structured(
                    description,
                    RowsCommand {
                        columns: self.columns,
                        rows: self.rows,
                    },
                )
            }
            DefinitionKind::Text => {
                let Some(template) = self.text else {
                    return Err(invalid("`type: text` requires a `text` template"));
                };
                if !self.rows.is_empty() || !self.columns.is_empty() {
                    return Err(invalid("`rows` and `columns` are only valid for `type: rows`"));
                }
                Command::writer(description, TextCommand { template })
            }
        };

        let mut commands = Vec::with_capacity(1 + self.aliases.len());
        for alias in &self.aliases {
            let alias_parents = alias.parents.as_deref().unwrap_or_default();
            if !is_path_segment(&alias.name) || !alias_parents.iter().all(|segment| is_path_segment(segment)) {
                return Err(invalid("alias name and parents must be non-empty path segments"));
            }
            let parents = alias.parents.clone().unwrap_or_else(|| command.description().parents.clone());
            commands.push(command.alias(alias.name.clone(), parents));
        }
        commands.insert(0, command);
        Ok(commands)
    }
}

fn is_path_segment(segment: &str) -> bool {
    !segment.trim().is_empty() && !segment.contains('/')
}

/// Parse a definition from YAML text.
pub fn parse_command_definition(source: &str, origin: &Path, path_parents: Vec<String>, path_name: &str) -> Result<Vec<Command>, DefinitionError> {
    let file: CommandFile = serde_yaml::from_str(source).map_err(|source| DefinitionError::Yaml {
        path: origin.to_path_buf(),
        source,
    })?;
    file.into_commands(origin, path_parents, path_name)
}

/// Load `path`, deriving default parents and name from its location relative to `root`.
pub fn load_command_file(root: &Path, path: &Path) -> Result<Vec<Command>, DefinitionError> {
    let source = std::fs::read_to_string(path).map_err(|source| DefinitionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let relative = path.strip_prefix(root).unwrap_or(path);
    let parents: Vec<String> = relative
        .parent()
        .map(|parent| {
            parent
                .components()
                .map(|component| component.as_os_str().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    let name = relative
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let commands = parse_command_definition(&source, path, parents, &name)?;
    debug!(path = %path.display(), commands = commands.len(), "loaded command definition");
    Ok(commands)
}

/// Structured command emitting rows declared in its definition.
#[derive(Debug, Clone)]
pub struct RowsCommand {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl RowsCommand {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    fn shape(&self, row: &Row) -> Row {
        if self.columns.is_empty() {
            return row.clone();
        }
        self.columns
            .iter()
            .map(|column| (column.clone(), row.get(column).cloned().unwrap_or(Value::Null)))
            .collect()
    }
}

#[async_trait]
impl StructuredCommand for RowsCommand {
    async fn run(&self, parameters: &ParsedLayers, rows: &RowSender) -> anyhow::Result<()> {
        let context = parameters.template_context();
        let limit = parameters
            .get(DEFAULT_SLUG, "limit")
            .and_then(Value::as_u64)
            .map(|limit| usize::try_from(limit).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        for row in self.rows.iter().take(limit) {
            let mut rendered = Row::with_capacity(row.len());
            for (column, value) in self.shape(row) {
                rendered.insert(column, render_value(&value, &context)?);
            }
            rows.send(rendered).await?;
        }
        Ok(())
    }
}

/// Writer command rendering a `${{ ... }}` text template.
#[derive(Debug, Clone)]
pub struct TextCommand {
    template: String,
}

impl TextCommand {
    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into() }
    }
}

#[async_trait]
impl WriterCommand for TextCommand {
    async fn run(&self, parameters: &ParsedLayers, writer: &mut (dyn AsyncWrite + Send + Unpin)) -> anyhow::Result<()> {
        let rendered = render_template(&self.template, &parameters.template_context())?;
        writer.write_all(rendered.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CapabilityKind;
    use crate::execute::collect_table;
    use crate::parameters::ParameterSource;
    use crate::processor::GLAZED_SLUG;
    use serde_json::json;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn parse(source: &str, parents: &[&str], name: &str) -> Result<Vec<Command>, DefinitionError> {
        let parents = parents.iter().map(|segment| segment.to_string()).collect();
        parse_command_definition(source, Path::new("test.yaml"), parents, name)
    }

    const BAR: &str = r#"
short: Bar report
flags:
  - { name: limit, type: int }
  - { name: who, type: string, default: world }
columns: [a, b]
rows:
  - { b: x, a: 1 }
  - { a: 2, b: "${{ who }}" }
aliases:
  - { name: baz }
"#;

    #[test]
    fn path_defaults_come_from_the_file_location() {
        let commands = parse(BAR, &["foo"], "bar").expect("definition parses");
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].description().path(), "foo/bar");
        assert_eq!(commands[0].kind(), CapabilityKind::Structured);
        assert_eq!(commands[1].description().path(), "foo/baz");
        assert!(commands[0].description().layer(GLAZED_SLUG).is_some());
    }

    #[tokio::test]
    async fn rows_follow_columns_and_render_templates() {
        let commands = parse(BAR, &["foo"], "bar").expect("definition parses");
        let crate::command::CommandCapability::Structured(command) = commands[0].capability().clone() else {
            panic!("expected a structured command");
        };
        let parameters = ParsedLayers::new().with(DEFAULT_SLUG, "who", json!("there"), ParameterSource::Request);
        let table = collect_table(command.clone(), Arc::new(parameters), 4, &CancellationToken::new())
            .await
            .expect("rows are produced");
        assert_eq!(table.columns, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(serde_json::to_value(&table.rows).expect("rows serialize"), json!([{ "a": 1, "b": "x" }, { "a": 2, "b": "there" }]));

        let limited = ParsedLayers::new()
            .with(DEFAULT_SLUG, "who", json!("there"), ParameterSource::Request)
            .with(DEFAULT_SLUG, "limit", json!(1), ParameterSource::Request);
        let table = collect_table(command, Arc::new(limited), 4, &CancellationToken::new())
            .await
            .expect("rows are produced");
        assert_eq!(table.rows.len(), 1);
    }

    #[tokio::test]
    async fn text_commands_render_their_template() {
        let commands = parse("type: text\ntext: \"hello ${{ name }}\"\n", &[], "greet").expect("definition parses");
        let crate::command::CommandCapability::Writer(command) = commands[0].capability().clone() else {
            panic!("expected a writer command");
        };
        let parameters = ParsedLayers::new().with(DEFAULT_SLUG, "name", json!("ops"), ParameterSource::Request);
        let mut output: Vec<u8> = Vec::new();
        command.run(&parameters, &mut output).await.expect("template renders");
        assert_eq!(output, b"hello ops");
    }

    #[test]
    fn inconsistent_definitions_are_rejected() {
        let error = parse("type: text\n", &[], "greet").unwrap_err();
        assert_eq!(error.to_string(), "invalid command definition test.yaml: `type: text` requires a `text` template");
        assert!(matches!(parse("unknown: 1\n", &[], "x"), Err(DefinitionError::Yaml { .. })));
    }

    #[test]
    fn unreachable_paths_are_rejected() {
        let error = parse("parents: [foo, \"\"]\nrows: [{ a: 1 }]\n", &[], "bar").unwrap_err();
        assert_eq!(error.to_string(), "invalid command definition test.yaml: command parents must be non-empty path segments");
        assert!(parse("parents: [\"foo/baz\"]\nrows: [{ a: 1 }]\n", &[], "bar").is_err());
        assert!(parse("rows: [{ a: 1 }]\naliases: [{ name: \"a/b\" }]\n", &["foo"], "bar").is_err());
        assert!(parse("parents: [foo, baz]\nrows: [{ a: 1 }]\n", &[], "bar").is_ok());
    }

    #[test]
    fn loads_files_relative_to_the_repository_root() {
        let root = tempfile::tempdir().expect("temp dir");
        let nested = root.path().join("foo");
        std::fs::create_dir_all(&nested).expect("create dir");
        let path = nested.join("bar.yaml");
        std::fs::write(&path, "rows: [{ a: 1 }]\n").expect("write definition");

        let commands = load_command_file(root.path(), &path).expect("file loads");
        assert_eq!(commands[0].full_path(), vec!["foo".to_string(), "bar".to_string()]);
    }
}

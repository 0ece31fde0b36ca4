//! # cmdgate Engine
//!
//! The engine owns everything that happens between "a command was located" and
//! "its output is rendered": parsing request values against the command's
//! parameter layers, running the [resolution pipeline](pipeline), executing the
//! command through its [capability](command::CommandCapability), processing rows
//! and formatting them.
//!
//! ## Architecture
//!
//! - **`command`**: [`Command`], its capability and the producer/writer traits
//! - **`parameters`**: parsed parameter snapshots and request parsing
//! - **`pipeline`**: defaults, overrides, whitelist and blacklist in a fixed order
//! - **`processor`**: the `glazed` layer (`fields`, `filter`, `sort-by`)
//! - **`execute`**: bounded-channel execution of structured commands
//! - **`formatters`**: JSON, YAML, Excel and text tables
//! - **`templates`**: `${{ ... }}` rendering
//! - **`definitions`**: commands declared in YAML files
//!
//! ## Usage
//!
//! ```rust
//! use std::path::Path;
//! use cmdgate_engine::{OutputFormat, ResolutionPipeline, collect_table, parse_command_definition, parse_request};
//! use cmdgate_engine::command::CommandCapability;
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio::runtime::Runtime::new()?.block_on(async {
//! let commands = parse_command_definition("rows: [{ a: 1, b: x }]\n", Path::new("bar.yaml"), vec!["foo".into()], "bar")?;
//! let command = &commands[0];
//! let request = parse_request(command.description(), &[("fields".into(), "b".into())])?;
//! let resolved = ResolutionPipeline::default().resolve(command.description(), request)?;
//! if let CommandCapability::Structured(producer) = command.capability() {
//!     let table = collect_table(producer.clone(), resolved.into(), 16, &CancellationToken::new()).await?;
//!     assert_eq!(OutputFormat::Json.render(&table)?, br#"[{"b":"x"}]"#);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # })?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod command;
pub mod definitions;
pub mod execute;
pub mod formatters;
pub mod parameters;
pub mod pipeline;
pub mod processor;
pub mod templates;

pub use command::{CapabilityKind, Command, CommandCapability, RowSender, RowSinkClosed, StructuredCommand, WriterCommand};
pub use definitions::{CommandFile, DefinitionError, RowsCommand, TextCommand, load_command_file, parse_command_definition};
pub use execute::{CommandCancelled, DEFAULT_ROW_BUFFER, RowStream, collect_table};
pub use formatters::{FormatError, OutputFormat, TableFormat};
pub use parameters::{ParameterSource, ParsedLayer, ParsedLayers, ParsedParameter, parse_request};
pub use pipeline::{ResolutionPipeline, ResolutionStage, ResolutionStep};
pub use processor::{GLAZED_SLUG, RowProcessor, glazed_layer};
pub use templates::{TemplateError, render_template};

//! Data models for the server configuration file.

use std::path::PathBuf;

use cmdgate_engine::DEFAULT_ROW_BUFFER;
use cmdgate_types::{LayerParameters, ParameterFilter, ParameterFilterList};
use cmdgate_util::EvaluatorError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ValidationError;

/// Errors raised while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to evaluate configuration {path}: {source}")]
    Evaluation {
        path: PathBuf,
        #[source]
        source: EvaluatorError,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

fn default_stream_buffer() -> usize {
    DEFAULT_ROW_BUFFER
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address, e.g. `127.0.0.1:8080`. When omitted, a loopback default is used.
    #[serde(default)]
    pub address: Option<String>,
    /// Capacity of the row channel between a streaming producer and the SSE writer.
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
    /// Directory that may override the built-in `datatables.html` template.
    #[serde(default)]
    pub templates: Option<PathBuf>,
    /// Directory where downloads are staged. Defaults to the system temp directory.
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: None,
            stream_buffer: DEFAULT_ROW_BUFFER,
            templates: None,
            staging_dir: None,
            routes: Vec::new(),
        }
    }
}

/// One mounted command repository with its parameter rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    pub name: String,
    /// URL prefix, e.g. `/reports`. Empty or `/` mounts at the root.
    #[serde(default)]
    pub mount: String,
    /// Directories of command definition files.
    #[serde(default)]
    pub repositories: Vec<PathBuf>,
    #[serde(default)]
    pub defaults: LayerParameters,
    #[serde(default)]
    pub overrides: LayerParameters,
    #[serde(default)]
    pub whitelist: ParameterFilterList,
    #[serde(default)]
    pub blacklist: ParameterFilterList,
}

impl RouteConfig {
    /// The route's parameter filter.
    pub fn parameter_filter(&self) -> ParameterFilter {
        ParameterFilter::new(
            self.defaults.clone(),
            self.overrides.clone(),
            self.whitelist.clone(),
            self.blacklist.clone(),
        )
    }
}

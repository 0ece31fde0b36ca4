//! Per-route state shared by request handlers.

use std::path::PathBuf;

use anyhow::{Context, Result};
use cmdgate_engine::ResolutionPipeline;
use cmdgate_registry::{CommandRepository, CommandTrie, load_repositories};
use cmdgate_types::ParameterFilter;
use cmdgate_util::normalize_mount;
use tokio_util::sync::CancellationToken;

use crate::config::{RouteConfig, ServerConfig};

/// Everything needed to serve one route, fully populated up front.
#[derive(Debug, Clone)]
pub struct RouteSettings {
    pub name: String,
    /// Normalized mount: empty for the root, otherwise `/segment[/segment...]`.
    pub mount: String,
    pub commands: CommandTrie,
    pub filter: ParameterFilter,
}

impl RouteSettings {
    pub fn new(name: impl Into<String>, mount: &str, commands: CommandTrie, filter: ParameterFilter) -> Self {
        Self {
            name: name.into(),
            mount: normalize_mount(mount),
            commands,
            filter,
        }
    }

    /// Load the route's repositories from disk.
    pub fn load(route: &RouteConfig) -> Result<Self> {
        let commands = load_repositories(&route.repositories).with_context(|| format!("failed to load commands for route '{}'", route.name))?;
        Ok(Self::new(&route.name, &route.mount, commands, route.parameter_filter()))
    }
}

/// Server-wide settings handed to [`crate::CommandServer::new`].
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Bind address; `None` picks a free loopback port.
    pub address: Option<String>,
    pub stream_buffer: usize,
    pub templates: Option<PathBuf>,
    pub staging_dir: Option<PathBuf>,
    pub routes: Vec<RouteSettings>,
}

impl ServerSettings {
    /// Build settings from a validated configuration, loading every repository.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let routes = config.routes.iter().map(RouteSettings::load).collect::<Result<Vec<_>>>()?;
        Ok(Self {
            address: config.address.clone(),
            stream_buffer: config.stream_buffer,
            templates: config.templates.clone(),
            staging_dir: config.staging_dir.clone(),
            routes,
        })
    }
}

/// Live state of one mounted route.
///
/// The repository snapshot carries the commands together with the route's
/// resolution pipeline: a reload swaps both at once while in-flight requests
/// keep the generation they started with.
#[derive(Debug)]
pub struct RouteState {
    pub name: String,
    pub mount: String,
    pub repository: CommandRepository<ResolutionPipeline>,
    pub stream_buffer: usize,
    pub templates: Option<PathBuf>,
    pub staging_dir: Option<PathBuf>,
    pub cancellation: CancellationToken,
}

impl RouteState {
    /// Build the live state for `route`, taking server-wide knobs from `settings`.
    pub fn new(route: RouteSettings, settings: &ServerSettings, cancellation: CancellationToken) -> Self {
        Self {
            repository: CommandRepository::with_context(route.commands.all(), ResolutionPipeline::from_filter(&route.filter)),
            name: route.name,
            mount: route.mount,
            stream_buffer: settings.stream_buffer,
            templates: settings.templates.clone(),
            staging_dir: settings.staging_dir.clone(),
            cancellation,
        }
    }

    /// Replace the route's commands and parameter rules in one step.
    pub fn replace(&self, route: RouteSettings) {
        self.repository.replace(route.commands, ResolutionPipeline::from_filter(&route.filter));
    }
}

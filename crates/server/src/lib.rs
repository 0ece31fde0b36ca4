//! HTTP front end for command repositories.
//!
//! Each configured route mounts a command repository under a URL prefix and
//! exposes every command through several renderers:
//!
//! - `/data/<path>`: JSON rows, or plain text for writer commands
//! - `/text/<path>`: an ASCII table, or the writer's raw output
//! - `/streaming/<path>`: one server-sent event per row
//! - `/datatables/<path>`: an HTML table page
//! - `/download/<path>/<file>`: an attachment whose format follows the file suffix
//!
//! Request query parameters pass through the route's resolution pipeline
//! (defaults, overrides, whitelist, blacklist) before the command runs.
//! Failures are reported as `{"error": "<message>"}`.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod render;
pub mod routes;
pub mod state;

pub use config::{ConfigError, RouteConfig, ServerConfig, default_config_path, load_config_from_path, parse_config};
pub use dispatch::{Renderer, RouteFamily, Target, format_for_suffix, select_renderer};
pub use error::DispatchError;
pub use http::{CommandServer, RunningServer, resolve_bind_address};
pub use routes::build_router;
pub use state::{RouteSettings, RouteState, ServerSettings};

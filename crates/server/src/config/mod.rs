//! Configuration management for the command server.
//! This module handles loading, evaluation, and validation of the
//! ~/.config/cmdgate/config.yaml configuration file.

mod io;
mod model;
mod validation;

pub use io::{CONFIG_PATH_ENV_VAR, default_config_path, load_config_from_path, parse_config};
pub use model::{ConfigError, RouteConfig, ServerConfig};
pub use validation::{ValidationError, validate_config, validate_route};

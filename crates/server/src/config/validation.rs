//! Configuration validation.

use std::collections::HashSet;

use cmdgate_util::normalize_mount;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::config::{RouteConfig, ServerConfig};

static ROUTE_NAME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9._-]+$").expect("route name regex should compile"));

/// Reasons a configuration is rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid route name '{name}': {reason}")]
    InvalidRouteName { name: String, reason: String },

    #[error("route '{name}' must list at least one repository")]
    MissingRepositories { name: String },

    #[error("routes '{first}' and '{second}' share the mount '{mount}'")]
    DuplicateMount { mount: String, first: String, second: String },

    #[error("duplicate route name '{name}'")]
    DuplicateRouteName { name: String },

    #[error("stream_buffer must be at least 1")]
    InvalidStreamBuffer,
}

/// Validate the entire configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), ValidationError> {
    if config.stream_buffer == 0 {
        return Err(ValidationError::InvalidStreamBuffer);
    }

    let mut names = HashSet::new();
    let mut mounts: Vec<(String, &str)> = Vec::new();
    for route in &config.routes {
        validate_route(route)?;
        if !names.insert(route.name.as_str()) {
            return Err(ValidationError::DuplicateRouteName { name: route.name.clone() });
        }
        let mount = normalize_mount(&route.mount);
        if let Some((_, first)) = mounts.iter().find(|(existing, _)| *existing == mount) {
            return Err(ValidationError::DuplicateMount {
                mount: if mount.is_empty() { "/".to_string() } else { mount },
                first: first.to_string(),
                second: route.name.clone(),
            });
        }
        mounts.push((mount, route.name.as_str()));
        debug!("Validated route configuration: {}", route.name);
    }
    Ok(())
}

/// Validate a single route.
pub fn validate_route(route: &RouteConfig) -> Result<(), ValidationError> {
    if route.name.is_empty() {
        return Err(ValidationError::InvalidRouteName {
            name: route.name.clone(),
            reason: "Route name cannot be empty".to_string(),
        });
    }
    if !ROUTE_NAME_REGEX.is_match(&route.name) {
        return Err(ValidationError::InvalidRouteName {
            name: route.name.clone(),
            reason: "Route name must contain only lowercase letters, numbers, dots, underscores, and hyphens".to_string(),
        });
    }
    if route.repositories.is_empty() {
        return Err(ValidationError::MissingRepositories { name: route.name.clone() });
    }
    Ok(())
}

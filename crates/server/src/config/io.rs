//! Configuration IO helpers.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use cmdgate_util::{ValueEvaluator, evaluate, expand_tilde, resolve_relative};
use dirs_next::config_dir;
use tracing::debug;

use crate::config::{ConfigError, ServerConfig, validate_config};

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV_VAR: &str = "CMDGATE_CONFIG";

/// Returns the default path for the configuration file.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV_VAR)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    config_dir().unwrap_or_else(|| PathBuf::from(".")).join("cmdgate").join("config.yaml")
}

/// Parse configuration text, running `evaluators` over the raw tree before
/// deserializing. Relative paths are resolved against `base_dir`.
pub fn parse_config(content: &str, origin: &Path, base_dir: &Path, evaluators: &[Box<dyn ValueEvaluator>]) -> Result<ServerConfig, ConfigError> {
    let raw: serde_yaml::Value = serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
        path: origin.to_path_buf(),
        source,
    })?;
    let evaluated = evaluate(raw, evaluators).map_err(|source| ConfigError::Evaluation {
        path: origin.to_path_buf(),
        source,
    })?;
    let mut config: ServerConfig = serde_yaml::from_value(evaluated).map_err(|source| ConfigError::Parse {
        path: origin.to_path_buf(),
        source,
    })?;

    for route in &mut config.routes {
        route.repositories = route
            .repositories
            .iter()
            .map(|repository| resolve_relative(base_dir, repository))
            .collect();
    }
    config.templates = config.templates.as_deref().map(|templates| resolve_relative(base_dir, templates));
    config.staging_dir = config.staging_dir.as_deref().map(|staging| resolve_relative(base_dir, staging));

    validate_config(&config)?;
    Ok(config)
}

/// Loads and validates the configuration at `path`.
pub fn load_config_from_path(path: &Path, evaluators: &[Box<dyn ValueEvaluator>]) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let config = parse_config(&content, path, &base_dir, evaluators)?;
    debug!(path = %path.display(), routes = config.routes.len(), "loaded configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdgate_types::DEFAULT_SLUG;
    use cmdgate_util::default_evaluators;
    use serde_json::json;

    const CONFIG: &str = r#"
address: 127.0.0.1:9000
routes:
  - name: reports
    mount: /reports
    repositories: [commands]
    defaults:
      layers: { glazed: { fields: [a] } }
      parameters: { limit: 10 }
    overrides:
      parameters: { token: { _env: CMDGATE_TEST_TOKEN } }
    whitelist: { layers: [glazed], parameters: [limit] }
    blacklist: { parameters: [debug] }
"#;

    #[test]
    fn default_path_honors_environment_override() {
        let override_path = "~/custom/cmdgate/config.yaml";
        temp_env::with_var(CONFIG_PATH_ENV_VAR, Some(override_path), || {
            assert_eq!(default_config_path(), expand_tilde(override_path));
        });
    }

    #[test]
    fn parses_routes_and_evaluates_nodes() {
        temp_env::with_var("CMDGATE_TEST_TOKEN", Some("s3cret"), || {
            let config = parse_config(CONFIG, Path::new("config.yaml"), Path::new("/etc/cmdgate"), &default_evaluators()).expect("config parses");
            assert_eq!(config.address.as_deref(), Some("127.0.0.1:9000"));
            assert_eq!(config.stream_buffer, 64);

            let route = &config.routes[0];
            assert_eq!(route.repositories, vec![PathBuf::from("/etc/cmdgate/commands")]);
            assert_eq!(route.defaults.get("glazed", "fields"), Some(&json!(["a"])));
            assert_eq!(route.defaults.get(DEFAULT_SLUG, "limit"), Some(&json!(10)));
            assert_eq!(route.overrides.get(DEFAULT_SLUG, "token"), Some(&json!("s3cret")));
            assert!(route.whitelist.contains_layer("glazed"));
            assert!(route.blacklist.contains_parameter(DEFAULT_SLUG, "debug"));
        });
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let error = parse_config("listen: x\n", Path::new("config.yaml"), Path::new("."), &default_evaluators()).unwrap_err();
        assert!(matches!(error, ConfigError::Parse { .. }), "{error}");
    }

    #[test]
    fn missing_files_are_io_errors() {
        let error = load_config_from_path(Path::new("/definitely/missing.yaml"), &default_evaluators()).unwrap_err();
        assert!(matches!(error, ConfigError::Io { .. }));
    }
}

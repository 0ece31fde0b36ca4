//! Configuration evaluators for environment variables and secrets.
//!
//! Configuration files are parsed into a [`serde_yaml::Value`] tree first. The
//! loader then walks the tree and offers every node to an explicit, ordered list
//! of [`ValueEvaluator`]s. The first evaluator that handles a node replaces it.
//!
//! Supported forms with [`default_evaluators`]:
//!
//! ```yaml
//! password: { _env: DB_PASSWORD }
//! token: { _secret: reports-token }
//! dsn: "postgres://reports:${secret:reports-db}@${env:DB_HOST}/reports"
//! ```

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_yaml::{Mapping, Value};
use thiserror::Error;
use tracing::debug;

/// Keychain service name used for `_secret` lookups.
static SERVICE: &str = "cmdgate";
/// Environment variable used to select the secret resolution backend.
pub const SECRETS_BACKEND_ENV_VAR: &str = "CMDGATE_SECRETS_BACKEND";

static PLACEHOLDER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{(env|secret):([\w.+-]*)}").expect("placeholder regex should compile"));

/// Errors that can occur while evaluating configuration nodes.
#[derive(Debug, Error, Clone)]
pub enum EvaluatorError {
    #[error("Missing environment variable: {name}")]
    MissingEnvVar { name: String },

    #[error("Missing secret: {name} - {error}")]
    MissingSecret { name: String, error: String },

    #[error("Keyring error for {name}: {error}")]
    KeyringError { name: String, error: String },

    #[error("{tag} expects a string name, found {found}")]
    InvalidNode { tag: String, found: String },
}

/// A resolver that may replace a configuration node.
///
/// `Ok(None)` means "not handled", letting the next evaluator in the list try.
pub trait ValueEvaluator: Send + Sync {
    fn try_resolve(&self, node: &Value) -> Result<Option<Value>, EvaluatorError>;
}

/// Walk `node` depth-first and let `evaluators` rewrite it.
///
/// A replaced node is not re-evaluated, so an evaluator cannot loop on its own output.
pub fn evaluate(node: Value, evaluators: &[Box<dyn ValueEvaluator>]) -> Result<Value, EvaluatorError> {
    for evaluator in evaluators {
        if let Some(resolved) = evaluator.try_resolve(&node)? {
            return Ok(resolved);
        }
    }
    match node {
        Value::Sequence(items) => items
            .into_iter()
            .map(|item| evaluate(item, evaluators))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Sequence),
        Value::Mapping(mapping) => {
            let mut evaluated = Mapping::with_capacity(mapping.len());
            for (key, value) in mapping {
                evaluated.insert(key, evaluate(value, evaluators)?);
            }
            Ok(Value::Mapping(evaluated))
        }
        Value::Tagged(tagged) => {
            let mut tagged = *tagged;
            tagged.value = evaluate(tagged.value, evaluators)?;
            Ok(Value::Tagged(Box::new(tagged)))
        }
        scalar => Ok(scalar),
    }
}

/// The evaluator list used by the configuration loader unless a caller supplies its own.
pub fn default_evaluators() -> Vec<Box<dyn ValueEvaluator>> {
    let backend = secrets_backend();
    vec![
        Box::new(EnvEvaluator),
        Box::new(SecretEvaluator::new(backend)),
        Box::new(PlaceholderEvaluator::new(backend)),
    ]
}

/// Returns the name carried by a single-key `{tag: name}` mapping, if `node` has that shape.
fn tagged_name<'a>(node: &'a Value, tag: &str) -> Result<Option<&'a str>, EvaluatorError> {
    let Value::Mapping(mapping) = node else {
        return Ok(None);
    };
    if mapping.len() != 1 {
        return Ok(None);
    }
    let Some(inner) = mapping.get(tag) else {
        return Ok(None);
    };
    match inner {
        Value::String(name) => Ok(Some(name.as_str())),
        other => Err(EvaluatorError::InvalidNode {
            tag: tag.to_string(),
            found: format!("{other:?}"),
        }),
    }
}

/// Resolves `{_env: NAME}` from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvEvaluator;

impl ValueEvaluator for EnvEvaluator {
    fn try_resolve(&self, node: &Value) -> Result<Option<Value>, EvaluatorError> {
        let Some(name) = tagged_name(node, "_env")? else {
            return Ok(None);
        };
        let value = std::env::var(name).map_err(|_| EvaluatorError::MissingEnvVar { name: name.to_string() })?;
        debug!("Evaluated env var: {} -> [REDACTED]", name);
        Ok(Some(Value::String(value)))
    }
}

/// Secret resolution backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretsBackend {
    /// Resolve secrets via the OS keychain (`keyring-rs`).
    Keychain,
    /// Resolve secrets from the process environment variable of the same name.
    Environment,
}

impl SecretsBackend {
    fn from_env_var(raw: Option<String>) -> Self {
        match raw.unwrap_or_default().trim().to_ascii_lowercase().as_str() {
            "env" => Self::Environment,
            _ => Self::Keychain,
        }
    }

    /// Look a secret up in this backend.
    pub fn resolve(self, name: &str) -> Result<String, EvaluatorError> {
        match self {
            Self::Environment => std::env::var(name).map_err(|error| EvaluatorError::MissingSecret {
                name: name.to_string(),
                error: error.to_string(),
            }),
            Self::Keychain => {
                let entry = keyring::Entry::new(SERVICE, name).map_err(|error| EvaluatorError::KeyringError {
                    name: name.to_string(),
                    error: error.to_string(),
                })?;
                entry.get_password().map_err(|error| EvaluatorError::MissingSecret {
                    name: name.to_string(),
                    error: error.to_string(),
                })
            }
        }
    }
}

/// Determine the currently configured secrets backend.
pub fn secrets_backend() -> SecretsBackend {
    SecretsBackend::from_env_var(std::env::var(SECRETS_BACKEND_ENV_VAR).ok())
}

/// Resolves `{_secret: NAME}` through a [`SecretsBackend`].
#[derive(Debug, Clone, Copy)]
pub struct SecretEvaluator {
    backend: SecretsBackend,
}

impl SecretEvaluator {
    pub fn new(backend: SecretsBackend) -> Self {
        Self { backend }
    }
}

impl ValueEvaluator for SecretEvaluator {
    fn try_resolve(&self, node: &Value) -> Result<Option<Value>, EvaluatorError> {
        let Some(name) = tagged_name(node, "_secret")? else {
            return Ok(None);
        };
        let secret = self.backend.resolve(name)?;
        debug!("Evaluated secret: {} -> [REDACTED]", name);
        Ok(Some(Value::String(secret)))
    }
}

/// Replaces `${env:NAME}` and `${secret:NAME}` placeholders embedded in strings.
#[derive(Debug, Clone, Copy)]
pub struct PlaceholderEvaluator {
    backend: SecretsBackend,
}

impl PlaceholderEvaluator {
    pub fn new(backend: SecretsBackend) -> Self {
        Self { backend }
    }

    /// Interpolate every placeholder in `value`.
    pub fn interpolate(&self, value: &str) -> Result<String, EvaluatorError> {
        let mut failure = None;
        let interpolated = PLACEHOLDER_REGEX.replace_all(value, |captures: &Captures| {
            let name = &captures[2];
            let resolved = match &captures[1] {
                "env" => std::env::var(name).map_err(|_| EvaluatorError::MissingEnvVar { name: name.to_string() }),
                _ => self.backend.resolve(name),
            };
            match resolved {
                Ok(resolved) => resolved,
                Err(error) => {
                    failure.get_or_insert(error);
                    String::new()
                }
            }
        });
        match failure {
            Some(error) => Err(error),
            None => Ok(interpolated.into_owned()),
        }
    }
}

impl ValueEvaluator for PlaceholderEvaluator {
    fn try_resolve(&self, node: &Value) -> Result<Option<Value>, EvaluatorError> {
        let Value::String(text) = node else {
            return Ok(None);
        };
        if !PLACEHOLDER_REGEX.is_match(text) {
            return Ok(None);
        }
        self.interpolate(text).map(|resolved| Some(Value::String(resolved)))
    }
}

//! Utility helpers shared across the cmdgate workspace.

pub mod evaluators;
pub mod path_processing;
pub mod redaction;
pub mod snapshot;

pub use evaluators::{
    EnvEvaluator, EvaluatorError, PlaceholderEvaluator, SecretEvaluator, SecretsBackend, ValueEvaluator, default_evaluators, evaluate,
};
pub use path_processing::{expand_tilde, normalize_mount, resolve_relative, split_command_path};
pub use redaction::{is_sensitive_name, redact_sensitive, redact_value};
pub use snapshot::SharedSnapshot;

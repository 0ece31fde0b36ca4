//! Parameter and command descriptions.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;

use crate::layers::DEFAULT_SLUG;

/// Errors raised when a raw request value cannot be turned into a typed parameter value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParameterError {
    #[error("invalid parameter {name}: {reason}")]
    Invalid { name: String, reason: String },
}

impl ParameterError {
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// The value type of a parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    #[default]
    String,
    Int,
    Float,
    Bool,
    Choice,
    StringList,
    IntList,
}

impl ParameterType {
    /// Whether values of this type accumulate across repeated query keys.
    pub fn is_list(self) -> bool {
        matches!(self, Self::StringList | Self::IntList)
    }
}

/// Declaration of a single parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub name: String,
    #[serde(default, rename = "type")]
    pub r#type: ParameterType,
    #[serde(default)]
    pub help: Option<String>,
    /// Value used when no source provides one.
    #[serde(default)]
    pub default: Option<Value>,
    /// Valid values for `choice` parameters.
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(default)]
    pub required: bool,
}

impl ParameterDefinition {
    pub fn new(name: impl Into<String>, r#type: ParameterType) -> Self {
        Self {
            name: name.into(),
            r#type,
            help: None,
            default: None,
            choices: Vec::new(),
            required: false,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_choices(mut self, choices: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Parse the raw strings a request supplied for this parameter.
    ///
    /// Scalar types use the last occurrence. List types accept repeated keys as well
    /// as comma separated values.
    pub fn parse_raw(&self, raw: &[String]) -> Result<Value, ParameterError> {
        let Some(last) = raw.last() else {
            return Err(ParameterError::invalid(&self.name, "no value supplied"));
        };
        match self.r#type {
            ParameterType::String => Ok(Value::String(last.clone())),
            ParameterType::Int => parse_int(&self.name, last).map(Value::from),
            ParameterType::Float => {
                let parsed: f64 = last
                    .trim()
                    .parse()
                    .map_err(|_| ParameterError::invalid(&self.name, format!("'{last}' is not a number")))?;
                Number::from_f64(parsed)
                    .map(Value::Number)
                    .ok_or_else(|| ParameterError::invalid(&self.name, format!("'{last}' is not a finite number")))
            }
            ParameterType::Bool => parse_bool(&self.name, last).map(Value::Bool),
            ParameterType::Choice => {
                if self.choices.iter().any(|choice| choice == last) {
                    Ok(Value::String(last.clone()))
                } else {
                    Err(ParameterError::invalid(
                        &self.name,
                        format!("'{last}' is not one of {}", self.choices.join(", ")),
                    ))
                }
            }
            ParameterType::StringList => Ok(Value::Array(split_list(raw).map(Value::String).collect())),
            ParameterType::IntList => split_list(raw)
                .map(|item| parse_int(&self.name, &item).map(Value::from))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
        }
    }
}

fn parse_int(name: &str, raw: &str) -> Result<i64, ParameterError> {
    raw.trim()
        .parse()
        .map_err(|_| ParameterError::invalid(name, format!("'{raw}' is not an integer")))
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, ParameterError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        // a bare `?flag` means "set"
        "" | "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ParameterError::invalid(name, format!("'{raw}' is not a boolean"))),
    }
}

fn split_list(raw: &[String]) -> impl Iterator<Item = String> + '_ {
    raw.iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
}

/// A named group of parameter declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDefinition {
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDefinition>,
}

impl LayerDefinition {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            description: String::new(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: ParameterDefinition) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterDefinition> {
        self.parameters.iter().find(|parameter| parameter.name == name)
    }
}

/// Read-only description of a command: where it lives in the repository and which
/// parameters it accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDescription {
    pub name: String,
    /// One-line summary shown in listings.
    #[serde(default)]
    pub short: String,
    #[serde(default)]
    pub long: String,
    /// Path segments leading to the command, excluding its name.
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub layers: Vec<LayerDefinition>,
}

impl CommandDescription {
    pub fn new(name: impl Into<String>, parents: Vec<String>) -> Self {
        Self {
            name: name.into(),
            short: String::new(),
            long: String::new(),
            parents,
            layers: Vec::new(),
        }
    }

    pub fn with_short(mut self, short: impl Into<String>) -> Self {
        self.short = short.into();
        self
    }

    /// Append a layer, merging its parameters into an existing layer with the same slug.
    pub fn with_layer(mut self, layer: LayerDefinition) -> Self {
        self.add_layer(layer);
        self
    }

    pub fn add_layer(&mut self, layer: LayerDefinition) {
        match self.layers.iter_mut().find(|existing| existing.slug == layer.slug) {
            Some(existing) => {
                for parameter in layer.parameters {
                    if existing.parameter(&parameter.name).is_none() {
                        existing.parameters.push(parameter);
                    }
                }
            }
            None => self.layers.push(layer),
        }
    }

    /// Parents followed by the command name.
    pub fn full_path(&self) -> Vec<String> {
        let mut path = self.parents.clone();
        path.push(self.name.clone());
        path
    }

    /// Slash-joined full path, e.g. `foo/bar`.
    pub fn path(&self) -> String {
        self.full_path().join("/")
    }

    /// Human-readable label: parent segments joined by spaces, then the name.
    pub fn candidate_label(&self) -> String {
        if self.parents.is_empty() {
            return self.name.clone();
        }
        format!("{} {}", self.parents.join(" "), self.name)
    }

    pub fn layer(&self, slug: &str) -> Option<&LayerDefinition> {
        self.layers.iter().find(|layer| layer.slug == slug)
    }

    pub fn has_parameter(&self, slug: &str, name: &str) -> bool {
        self.layer(slug).and_then(|layer| layer.parameter(name)).is_some()
    }

    /// Find the layer that declares `name`, checking the default layer first and
    /// then the remaining layers in declaration order.
    pub fn find_parameter(&self, name: &str) -> Option<(&LayerDefinition, &ParameterDefinition)> {
        let default_first = self
            .layers
            .iter()
            .filter(|layer| layer.slug == DEFAULT_SLUG)
            .chain(self.layers.iter().filter(|layer| layer.slug != DEFAULT_SLUG));
        for layer in default_first {
            if let Some(parameter) = layer.parameter(name) {
                return Some((layer, parameter));
            }
        }
        None
    }
}

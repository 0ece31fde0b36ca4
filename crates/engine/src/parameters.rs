//! Parsed parameter snapshots and request parsing.

use std::fmt;

use cmdgate_types::{CommandDescription, DEFAULT_SLUG, LayerParameters, ParameterError, ParameterValues};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterSource {
    /// The command's own declared default.
    Definition,
    /// The route's configured defaults.
    Defaults,
    /// The incoming request.
    Request,
    /// The route's configured overrides.
    Overrides,
}

impl fmt::Display for ParameterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Definition => "definition",
            Self::Defaults => "defaults",
            Self::Request => "request",
            Self::Overrides => "overrides",
        };
        f.write_str(label)
    }
}

/// A value plus its provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedParameter {
    pub value: Value,
    pub source: ParameterSource,
}

/// Parsed values of one layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedLayer {
    pub slug: String,
    pub parameters: IndexMap<String, ParsedParameter>,
}

impl ParsedLayer {
    fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            parameters: IndexMap::new(),
        }
    }
}

/// An immutable-by-convention snapshot of every resolved parameter of a request.
///
/// Pipeline steps take a snapshot by value and return the next one. The default
/// layer is always present, possibly empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedLayers {
    layers: IndexMap<String, ParsedLayer>,
}

impl Default for ParsedLayers {
    fn default() -> Self {
        Self::new()
    }
}

impl ParsedLayers {
    pub fn new() -> Self {
        let mut layers = IndexMap::new();
        layers.insert(DEFAULT_SLUG.to_string(), ParsedLayer::new(DEFAULT_SLUG));
        Self { layers }
    }

    pub fn layers(&self) -> impl Iterator<Item = &ParsedLayer> {
        self.layers.values()
    }

    pub fn layer(&self, slug: &str) -> Option<&ParsedLayer> {
        self.layers.get(slug)
    }

    pub fn get_parameter(&self, slug: &str, name: &str) -> Option<&ParsedParameter> {
        self.layers.get(slug).and_then(|layer| layer.parameters.get(name))
    }

    pub fn get(&self, slug: &str, name: &str) -> Option<&Value> {
        self.get_parameter(slug, name).map(|parameter| &parameter.value)
    }

    pub fn contains(&self, slug: &str, name: &str) -> bool {
        self.get_parameter(slug, name).is_some()
    }

    pub fn set(&mut self, slug: &str, name: impl Into<String>, value: Value, source: ParameterSource) {
        self.layers
            .entry(slug.to_string())
            .or_insert_with(|| ParsedLayer::new(slug))
            .parameters
            .insert(name.into(), ParsedParameter { value, source });
    }

    pub fn with(mut self, slug: &str, name: impl Into<String>, value: Value, source: ParameterSource) -> Self {
        self.set(slug, name, value, source);
        self
    }

    /// Keep only the parameters for which `keep(slug, name)` holds. Layers are kept even when emptied.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &str) -> bool) {
        for (slug, layer) in self.layers.iter_mut() {
            layer.parameters.retain(|name, _| keep(slug, name));
        }
    }

    /// Plain values, dropping provenance.
    pub fn to_layer_parameters(&self) -> LayerParameters {
        let mut parameters = LayerParameters::new();
        for layer in self.layers.values() {
            for (name, parameter) in &layer.parameters {
                parameters.set(&layer.slug, name.clone(), parameter.value.clone());
            }
        }
        parameters
    }

    /// Values of the default layer.
    pub fn default_values(&self) -> ParameterValues {
        self.layer_values(DEFAULT_SLUG)
    }

    pub fn layer_values(&self, slug: &str) -> ParameterValues {
        self.layers
            .get(slug)
            .map(|layer| {
                layer
                    .parameters
                    .iter()
                    .map(|(name, parameter)| (name.clone(), parameter.value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// JSON object used as template context: default-layer values at the top level,
    /// every layer under `layers.<slug>`.
    pub fn template_context(&self) -> Value {
        let mut context: Map<String, Value> = self.default_values().into_iter().collect();
        let layers: Map<String, Value> = self
            .layers
            .keys()
            .map(|slug| (slug.clone(), Value::Object(self.layer_values(slug).into_iter().collect())))
            .collect();
        context.insert("layers".to_string(), Value::Object(layers));
        Value::Object(context)
    }
}

/// Parse the raw query pairs of a request into a snapshot, typed by the command's definitions.
///
/// A key may address a parameter by name (the default layer is searched first, then the
/// other layers in declaration order) or by `<slug>.<name>`. Unknown keys are ignored.
pub fn parse_request(description: &CommandDescription, pairs: &[(String, String)]) -> Result<ParsedLayers, ParameterError> {
    let mut raw: IndexMap<(String, String), Vec<String>> = IndexMap::new();
    for (key, value) in pairs {
        let Some((slug, name)) = locate_key(description, key) else {
            continue;
        };
        raw.entry((slug, name)).or_default().push(value.clone());
    }

    let mut parsed = ParsedLayers::new();
    for ((slug, name), values) in raw {
        let Some(definition) = description.layer(&slug).and_then(|layer| layer.parameter(&name)) else {
            continue;
        };
        let value = definition.parse_raw(&values)?;
        parsed.set(&slug, name, value, ParameterSource::Request);
    }
    Ok(parsed)
}

fn locate_key(description: &CommandDescription, key: &str) -> Option<(String, String)> {
    if let Some((slug, name)) = key.split_once('.')
        && description.has_parameter(slug, name)
    {
        return Some((slug.to_string(), name.to_string()));
    }
    description
        .find_parameter(key)
        .map(|(layer, parameter)| (layer.slug.clone(), parameter.name.clone()))
}

//! Layered parameter values and their right-biased merge.
//!
//! A [`LayerParameters`] value is the raw form of a configuration source such as
//! operator defaults or overrides. Values are opaque JSON values: nothing here
//! checks them against a command's parameter definitions.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Slug of the layer that holds a command's own flags and arguments.
pub const DEFAULT_SLUG: &str = "default";

/// Ordered mapping of parameter name to value.
pub type ParameterValues = IndexMap<String, Value>;

/// A named group of parameter values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterLayer {
    /// Slug identifying the layer (for example `glazed` or `default`).
    pub slug: String,
    /// Parameter values keyed by parameter name.
    #[serde(default)]
    pub parameters: ParameterValues,
}

impl ParameterLayer {
    /// Create an empty layer with the given slug.
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            parameters: IndexMap::new(),
        }
    }

    /// Merge `other` into this layer; values from `other` win.
    pub fn merge(&mut self, other: &ParameterLayer) {
        for (name, value) in &other.parameters {
            self.parameters.insert(name.clone(), value.clone());
        }
    }
}

/// Per-layer parameter values plus a top-level mapping for the default layer.
///
/// In configuration files this is written as:
///
/// ```yaml
/// layers:
///   glazed:
///     fields: [a, b]
/// parameters:
///   limit: 10
/// ```
///
/// where `parameters` is shorthand for `layers.default`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "LayerParametersDocument", into = "LayerParametersDocument")]
pub struct LayerParameters {
    /// Layers keyed by slug.
    pub layers: IndexMap<String, ParameterLayer>,
    /// Values for the default layer.
    pub parameters: ParameterValues,
}

impl LayerParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when no layer and no default-layer parameter carries a value.
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.layers.values().all(|layer| layer.parameters.is_empty())
    }

    /// Set a single value, routing the default slug to the top-level mapping.
    pub fn set(&mut self, slug: &str, name: impl Into<String>, value: Value) {
        if slug == DEFAULT_SLUG {
            self.parameters.insert(name.into(), value);
            return;
        }
        self.layers
            .entry(slug.to_string())
            .or_insert_with(|| ParameterLayer::new(slug))
            .parameters
            .insert(name.into(), value);
    }

    /// Builder-style variant of [`LayerParameters::set`], mostly useful in tests and fixtures.
    pub fn with(mut self, slug: &str, name: impl Into<String>, value: Value) -> Self {
        self.set(slug, name, value);
        self
    }

    /// Right-biased merge: every layer and parameter of `other` is copied into `self`,
    /// replacing any value already present under the same key.
    pub fn merge(&mut self, other: &LayerParameters) {
        for (slug, layer) in &other.layers {
            self.layers
                .entry(slug.clone())
                .or_insert_with(|| ParameterLayer::new(slug.clone()))
                .merge(layer);
        }
        for (name, value) in &other.parameters {
            self.parameters.insert(name.clone(), value.clone());
        }
    }

    /// Non-mutating variant of [`LayerParameters::merge`].
    pub fn merged(&self, other: &LayerParameters) -> LayerParameters {
        let mut merged = self.clone();
        merged.merge(other);
        merged
    }

    /// Per-layer view of every value.
    ///
    /// The default slug is always present in the result. Top-level parameters are
    /// folded into it and win over any value stored under `layers.default`.
    pub fn get_parameter_map(&self) -> IndexMap<String, ParameterValues> {
        let mut map: IndexMap<String, ParameterValues> = IndexMap::new();
        map.insert(DEFAULT_SLUG.to_string(), IndexMap::new());
        for (slug, layer) in &self.layers {
            let entry = map.entry(slug.clone()).or_default();
            for (name, value) in &layer.parameters {
                entry.insert(name.clone(), value.clone());
            }
        }
        if let Some(defaults) = map.get_mut(DEFAULT_SLUG) {
            for (name, value) in &self.parameters {
                defaults.insert(name.clone(), value.clone());
            }
        }
        map
    }

    /// Look up a single value through the normalized view.
    pub fn get(&self, slug: &str, name: &str) -> Option<&Value> {
        if slug == DEFAULT_SLUG
            && let Some(value) = self.parameters.get(name)
        {
            return Some(value);
        }
        self.layers.get(slug).and_then(|layer| layer.parameters.get(name))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LayerParametersDocument {
    layers: IndexMap<String, ParameterValues>,
    parameters: ParameterValues,
}

impl From<LayerParametersDocument> for LayerParameters {
    fn from(document: LayerParametersDocument) -> Self {
        let layers = document
            .layers
            .into_iter()
            .map(|(slug, parameters)| {
                let layer = ParameterLayer {
                    slug: slug.clone(),
                    parameters,
                };
                (slug, layer)
            })
            .collect();
        Self {
            layers,
            parameters: document.parameters,
        }
    }
}

impl From<LayerParameters> for LayerParametersDocument {
    fn from(parameters: LayerParameters) -> Self {
        Self {
            layers: parameters
                .layers
                .into_iter()
                .map(|(slug, layer)| (slug, layer.parameters))
                .collect(),
            parameters: parameters.parameters,
        }
    }
}

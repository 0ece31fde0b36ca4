//! Whitelist/blacklist filter lists and the per-route parameter filter.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::layers::{DEFAULT_SLUG, LayerParameters};

/// A set of layers and per-layer parameter names used to restrict or exclude parameters.
///
/// `layers` names whole layers, `layer_parameters` names individual parameters of a
/// layer, and `parameters` is shorthand for `layer_parameters.default`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParameterFilterList {
    pub layers: IndexSet<String>,
    pub layer_parameters: IndexMap<String, IndexSet<String>>,
    pub parameters: IndexSet<String>,
}

impl ParameterFilterList {
    pub fn new() -> Self {
        Self::default()
    }

    /// A list that names nothing. An empty whitelist means "no restriction".
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty() && self.parameters.is_empty() && self.layer_parameters.values().all(IndexSet::is_empty)
    }

    /// Add a whole layer.
    pub fn with_layer(mut self, slug: impl Into<String>) -> Self {
        self.layers.insert(slug.into());
        self
    }

    /// Add a single parameter of a layer; the default slug goes to the top-level set.
    pub fn with_parameter(mut self, slug: &str, name: impl Into<String>) -> Self {
        if slug == DEFAULT_SLUG {
            self.parameters.insert(name.into());
        } else {
            self.layer_parameters.entry(slug.to_string()).or_default().insert(name.into());
        }
        self
    }

    /// Per-layer parameter names with the top-level set folded into the default slug.
    ///
    /// The default slug is always present, even when no default-layer parameter is listed.
    pub fn get_all_layer_parameters(&self) -> IndexMap<String, IndexSet<String>> {
        let mut all = IndexMap::new();
        all.insert(DEFAULT_SLUG.to_string(), IndexSet::new());
        for (slug, names) in &self.layer_parameters {
            let entry: &mut IndexSet<String> = all.entry(slug.clone()).or_default();
            entry.extend(names.iter().cloned());
        }
        if let Some(defaults) = all.get_mut(DEFAULT_SLUG) {
            defaults.extend(self.parameters.iter().cloned());
        }
        all
    }

    /// Whether the whole layer is listed.
    pub fn contains_layer(&self, slug: &str) -> bool {
        self.layers.contains(slug)
    }

    /// Whether the parameter is listed, either individually or through its layer.
    pub fn contains_parameter(&self, slug: &str, name: &str) -> bool {
        if self.contains_layer(slug) {
            return true;
        }
        if slug == DEFAULT_SLUG && self.parameters.contains(name) {
            return true;
        }
        self.layer_parameters.get(slug).is_some_and(|names| names.contains(name))
    }
}

/// Parameter sources and visibility rules attached to one mounted route.
///
/// Built once from configuration and treated as immutable until the whole
/// configuration is reloaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParameterFilter {
    /// Values forced onto every request.
    pub overrides: LayerParameters,
    /// Values used when the request does not provide one.
    pub defaults: LayerParameters,
    /// When non-empty, only these layers/parameters remain visible.
    pub whitelist: ParameterFilterList,
    /// Layers/parameters removed from every request; wins over the whitelist.
    pub blacklist: ParameterFilterList,
}

impl ParameterFilter {
    pub fn new(
        defaults: LayerParameters,
        overrides: LayerParameters,
        whitelist: ParameterFilterList,
        blacklist: ParameterFilterList,
    ) -> Self {
        Self {
            overrides,
            defaults,
            whitelist,
            blacklist,
        }
    }
}

//! # Parameter Resolution Pipeline
//!
//! Turns the parameters a request parsed from its query string into the final
//! values a command sees, by applying the route's configured sources and
//! visibility rules.
//!
//! The effective order is fixed:
//!
//! 1. **Defaults**: fill parameters the request did not set.
//! 2. **Request values**: already present in the input snapshot.
//! 3. **Overrides**: force-set values, replacing request values and defaults.
//! 4. **Whitelist**: when configured, drop everything not listed.
//! 5. **Blacklist**: drop everything listed; wins over the whitelist.
//!
//! Steps carry their stage and the pipeline sorts them before running, so the
//! order in which a caller assembles the steps has no effect on the outcome.
//! After the last step, parameters that are still missing receive the
//! command's declared default, and required parameters are checked.

use cmdgate_types::{CommandDescription, LayerParameters, ParameterError, ParameterFilter, ParameterFilterList};
use cmdgate_util::redact_value;
use tracing::debug;

use crate::parameters::{ParameterSource, ParsedLayers};

/// Position of a step in the effective evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResolutionStage {
    Defaults,
    Overrides,
    Whitelist,
    Blacklist,
}

/// A single pure transform over a parameter snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionStep {
    /// Set values the snapshot does not contain yet.
    Defaults(LayerParameters),
    /// Set values unconditionally.
    Overrides(LayerParameters),
    /// Keep only listed layers/parameters. An empty list keeps everything.
    Whitelist(ParameterFilterList),
    /// Remove listed layers/parameters.
    Blacklist(ParameterFilterList),
}

impl ResolutionStep {
    pub fn stage(&self) -> ResolutionStage {
        match self {
            Self::Defaults(_) => ResolutionStage::Defaults,
            Self::Overrides(_) => ResolutionStage::Overrides,
            Self::Whitelist(_) => ResolutionStage::Whitelist,
            Self::Blacklist(_) => ResolutionStage::Blacklist,
        }
    }

    /// Apply the step to `snapshot`, producing the next snapshot.
    ///
    /// Defaults and overrides only touch parameters `description` declares.
    pub fn apply(&self, description: &CommandDescription, mut snapshot: ParsedLayers) -> ParsedLayers {
        match self {
            Self::Defaults(defaults) => {
                for_each_declared(description, defaults, |slug, name, value| {
                    if !snapshot.contains(slug, name) {
                        snapshot.set(slug, name, value.clone(), ParameterSource::Defaults);
                    }
                });
            }
            Self::Overrides(overrides) => {
                for_each_declared(description, overrides, |slug, name, value| {
                    snapshot.set(slug, name, value.clone(), ParameterSource::Overrides);
                });
            }
            Self::Whitelist(whitelist) => {
                if !whitelist.is_empty() {
                    snapshot.retain(|slug, name| whitelist.contains_parameter(slug, name));
                }
            }
            Self::Blacklist(blacklist) => {
                snapshot.retain(|slug, name| !blacklist.contains_parameter(slug, name));
            }
        }
        snapshot
    }
}

fn for_each_declared(description: &CommandDescription, values: &LayerParameters, mut visit: impl FnMut(&str, &str, &serde_json::Value)) {
    for (slug, parameters) in values.get_parameter_map() {
        for (name, value) in &parameters {
            if description.has_parameter(&slug, name) {
                visit(&slug, name, value);
            }
        }
    }
}

/// Ordered resolution steps for one route.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionPipeline {
    steps: Vec<ResolutionStep>,
}

impl ResolutionPipeline {
    /// Build a pipeline from steps given in any order.
    pub fn new(mut steps: Vec<ResolutionStep>) -> Self {
        steps.sort_by_key(ResolutionStep::stage);
        Self { steps }
    }

    /// The standard pipeline for a route's parameter filter.
    pub fn from_filter(filter: &ParameterFilter) -> Self {
        Self::new(vec![
            ResolutionStep::Blacklist(filter.blacklist.clone()),
            ResolutionStep::Whitelist(filter.whitelist.clone()),
            ResolutionStep::Overrides(filter.overrides.clone()),
            ResolutionStep::Defaults(filter.defaults.clone()),
        ])
    }

    pub fn steps(&self) -> &[ResolutionStep] {
        &self.steps
    }

    /// Run every step over the request snapshot, then fill declared defaults and check
    /// required parameters.
    pub fn resolve(&self, description: &CommandDescription, request: ParsedLayers) -> Result<ParsedLayers, ParameterError> {
        let mut snapshot = request;
        for step in &self.steps {
            snapshot = step.apply(description, snapshot);
        }
        let resolved = apply_definition_defaults(description, snapshot)?;
        for layer in resolved.layers() {
            for (name, parameter) in &layer.parameters {
                debug!(
                    command = %description.path(),
                    layer = %layer.slug,
                    parameter = %name,
                    source = %parameter.source,
                    value = %redact_value(name, &parameter.value),
                    "resolved parameter"
                );
            }
        }
        Ok(resolved)
    }
}

fn apply_definition_defaults(description: &CommandDescription, mut snapshot: ParsedLayers) -> Result<ParsedLayers, ParameterError> {
    for layer in &description.layers {
        for parameter in &layer.parameters {
            if snapshot.contains(&layer.slug, &parameter.name) {
                continue;
            }
            match &parameter.default {
                Some(default) => snapshot.set(&layer.slug, parameter.name.clone(), default.clone(), ParameterSource::Definition),
                None if parameter.required => return Err(ParameterError::invalid(&parameter.name, "required")),
                None => {}
            }
        }
    }
    Ok(snapshot)
}

//! Shared type definitions for cmdgate.
//!
//! The data model used by the resolution pipeline, the command repository and
//! the HTTP layer: layered parameter values and their merge, whitelist/blacklist
//! filter lists, parameter/command descriptions and result rows.

pub mod definitions;
pub mod filter;
pub mod layers;
pub mod row;

pub use definitions::{CommandDescription, LayerDefinition, ParameterDefinition, ParameterError, ParameterType};
pub use filter::{ParameterFilter, ParameterFilterList};
pub use layers::{DEFAULT_SLUG, LayerParameters, ParameterLayer, ParameterValues};
pub use row::{Row, Table, cell_to_string};

//! Row processing driven by the `glazed` parameter layer.

use std::cmp::Ordering;

use cmdgate_types::{LayerDefinition, ParameterDefinition, ParameterType, Row, Table};
use serde_json::Value;

use crate::parameters::ParsedLayers;

/// Slug of the row-processing layer every structured command carries.
pub const GLAZED_SLUG: &str = "glazed";

/// Definition of the row-processing layer.
pub fn glazed_layer() -> LayerDefinition {
    let mut layer = LayerDefinition::new(GLAZED_SLUG, "Glazed output")
        .with_parameter(ParameterDefinition::new("fields", ParameterType::StringList).with_help("Columns to keep, in this order"))
        .with_parameter(ParameterDefinition::new("filter", ParameterType::StringList).with_help("Columns to remove"))
        .with_parameter(ParameterDefinition::new("sort-by", ParameterType::String).with_help("Column to sort by, prefix with - for descending"));
    layer.description = "Select, remove and sort output columns".to_string();
    layer
}

/// Column selection and ordering applied to a command's rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowProcessor {
    fields: Vec<String>,
    filter: Vec<String>,
    sort_by: Option<(String, bool)>,
}

impl RowProcessor {
    /// Read the `glazed` layer of a resolved snapshot. Missing parameters mean "no processing".
    pub fn from_parameters(parameters: &ParsedLayers) -> Self {
        let fields = string_list(parameters.get(GLAZED_SLUG, "fields"));
        let filter = string_list(parameters.get(GLAZED_SLUG, "filter"));
        let sort_by = parameters
            .get(GLAZED_SLUG, "sort-by")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|column| !column.is_empty())
            .map(|column| match column.strip_prefix('-') {
                Some(column) => (column.to_string(), true),
                None => (column.to_string(), false),
            });
        Self { fields, filter, sort_by }
    }

    /// Apply column selection to a single row. Used for streaming, where sorting is not possible.
    pub fn process_row(&self, row: Row) -> Row {
        let selected = if self.fields.is_empty() {
            row
        } else {
            let mut row = row;
            self.fields
                .iter()
                .filter_map(|field| row.shift_remove(field).map(|value| (field.clone(), value)))
                .collect()
        };
        if self.filter.is_empty() {
            return selected;
        }
        selected
            .into_iter()
            .filter(|(column, _)| !self.filter.contains(column))
            .collect()
    }

    /// Apply column selection and sorting to a complete table.
    pub fn process_table(&self, table: Table) -> Table {
        let mut rows = table.rows;
        // sort before selection so the sort column may be one that `fields` drops
        if let Some((column, descending)) = &self.sort_by {
            rows.sort_by(|left, right| {
                let ordering = compare_values(left.get(column), right.get(column));
                if *descending { ordering.reverse() } else { ordering }
            });
        }
        let rows: Vec<Row> = rows.into_iter().map(|row| self.process_row(row)).collect();
        let mut processed = Table::from_rows(rows);
        if !self.fields.is_empty() {
            // keep the requested order even for columns that first appear in later rows
            processed.columns = self
                .fields
                .iter()
                .filter(|field| processed.columns.contains(field))
                .cloned()
                .collect();
        } else if processed.rows.is_empty() {
            processed.columns = table
                .columns
                .into_iter()
                .filter(|column| !self.filter.contains(column))
                .collect();
        }
        processed
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(|item| item.as_str().map(str::to_string)).collect(),
        Some(Value::String(text)) => text
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (Some(Value::Number(left)), Some(Value::Number(right))) => {
            let left = left.as_f64().unwrap_or_default();
            let right = right.as_f64().unwrap_or_default();
            left.partial_cmp(&right).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(left)), Some(Value::String(right))) => left.cmp(right),
        (Some(Value::Bool(left)), Some(Value::Bool(right))) => left.cmp(right),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(left), Some(right)) => left.to_string().cmp(&right.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ParameterSource;
    use serde_json::json;

    fn row(values: &[(&str, Value)]) -> Row {
        values.iter().map(|(key, value)| (key.to_string(), value.clone())).collect()
    }

    fn processor(values: &[(&str, Value)]) -> RowProcessor {
        let mut parameters = ParsedLayers::new();
        for (name, value) in values {
            parameters.set(GLAZED_SLUG, *name, value.clone(), ParameterSource::Request);
        }
        RowProcessor::from_parameters(&parameters)
    }

    #[test]
    fn fields_select_and_reorder_columns() {
        let processor = processor(&[("fields", json!(["b", "a", "missing"]))]);
        let processed = processor.process_row(row(&[("a", json!(1)), ("b", json!(2)), ("c", json!(3))]));
        assert_eq!(processed.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn filter_removes_columns() {
        let processor = processor(&[("filter", json!(["c"]))]);
        let processed = processor.process_row(row(&[("a", json!(1)), ("c", json!(3))]));
        assert_eq!(processed.keys().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn tables_sort_descending() {
        let processor = processor(&[("sort-by", json!("-n"))]);
        let table = Table::from_rows(vec![
            row(&[("n", json!(1))]),
            row(&[("n", json!(3))]),
            row(&[("n", json!(2))]),
        ]);
        let sorted = processor.process_table(table);
        let values: Vec<_> = sorted.rows.iter().map(|row| row["n"].clone()).collect();
        assert_eq!(values, vec![json!(3), json!(2), json!(1)]);
    }

    #[test]
    fn no_glazed_parameters_is_identity() {
        let processor = RowProcessor::from_parameters(&ParsedLayers::new());
        assert_eq!(processor, RowProcessor::default());
        let original = Table::from_rows(vec![row(&[("a", json!(1)), ("b", json!("x"))])]);
        assert_eq!(processor.process_table(original.clone()), original);
    }
}

//! Rows and tables produced by structured commands.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

static NULL_CELL: Value = Value::Null;

/// A single result row: column name to value, in column order.
pub type Row = IndexMap<String, Value>;

/// Rows plus the ordered union of their column names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    /// Build a table, collecting columns in first-seen order.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut columns = IndexSet::new();
        for row in &rows {
            for column in row.keys() {
                if !columns.contains(column) {
                    columns.insert(column.clone());
                }
            }
        }
        Self {
            columns: columns.into_iter().collect(),
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell values of a row in column order; missing cells are `Null`.
    pub fn cells<'a>(&'a self, row: &'a Row) -> impl Iterator<Item = &'a Value> + 'a {
        self.columns.iter().map(move |column| row.get(column).unwrap_or(&NULL_CELL))
    }
}

/// Render a cell for text-oriented formats: strings verbatim, null as empty, everything else as JSON.
pub fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn columns_follow_first_seen_order() {
        let first = Row::from([("b".to_string(), json!(1)), ("a".to_string(), json!(2))]);
        let second = Row::from([("c".to_string(), json!(3)), ("a".to_string(), json!(4))]);
        let table = Table::from_rows(vec![first, second]);
        assert_eq!(table.columns, vec!["b", "a", "c"]);

        let cells: Vec<_> = table.cells(&table.rows[1]).cloned().collect();
        assert_eq!(cells, vec![Value::Null, json!(4), json!(3)]);
    }

    #[test]
    fn cells_render_as_plain_text() {
        assert_eq!(cell_to_string(&json!("x")), "x");
        assert_eq!(cell_to_string(&json!(1)), "1");
        assert_eq!(cell_to_string(&Value::Null), "");
        assert_eq!(cell_to_string(&json!(["a"])), "[\"a\"]");
    }
}

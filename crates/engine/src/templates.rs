//! `${{ expression }}` templates rendered against resolved parameters.
//!
//! An expression is a dotted path into the template context produced by
//! [`ParsedLayers::template_context`](crate::parameters::ParsedLayers::template_context),
//! for example `${{ name }}`, `${{ layers.glazed.fields[0] }}` or `${{ items.0.id }}`.

use serde_json::Value;
use thiserror::Error;

/// Errors raised while rendering a template.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unterminated template expression starting at byte {offset}")]
    Unterminated { offset: usize },

    #[error("unresolved template expression '{expression}'")]
    Unresolved { expression: String },
}

/// Extracts template expressions from a string value.
///
/// Returned expressions do not include `${{` or `}}` delimiters.
pub fn extract_template_expressions(value: &str) -> Vec<String> {
    let mut expressions = Vec::new();
    let mut remainder = value;

    while let Some(start) = remainder.find("${{") {
        let after_start = &remainder[start + 3..];
        let Some(end) = after_start.find("}}") else {
            break;
        };
        let expression = after_start[..end].trim();
        if !expression.is_empty() {
            expressions.push(expression.to_string());
        }
        remainder = &after_start[end + 2..];
    }

    expressions
}

/// Splits `a.b[0].c` into `["a", "b", "0", "c"]`.
fn path_segments(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();

    while let Some(character) = chars.next() {
        match character {
            '.' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                let mut inner = String::new();
                while let Some(next_character) = chars.next() {
                    if next_character == ']' {
                        break;
                    }
                    inner.push(next_character);
                }
                segments.push(inner.trim().to_string());
            }
            _ => current.push(character),
        }
    }

    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

/// Look up a dotted path inside `context`.
pub fn resolve_expression<'a>(expression: &str, context: &'a Value) -> Option<&'a Value> {
    let segments = path_segments(expression.trim());
    if segments.is_empty() {
        return None;
    }
    segments.iter().try_fold(context, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    })
}

/// Substitute every `${{ ... }}` expression in `template`.
///
/// Strings are inserted verbatim, null as an empty string, everything else as JSON.
pub fn render_template(template: &str, context: &Value) -> Result<String, TemplateError> {
    let mut rendered = String::with_capacity(template.len());
    let mut remainder = template;
    let mut consumed = 0;

    while let Some(start) = remainder.find("${{") {
        rendered.push_str(&remainder[..start]);
        let after_start = &remainder[start + 3..];
        let Some(end) = after_start.find("}}") else {
            return Err(TemplateError::Unterminated { offset: consumed + start });
        };
        let expression = after_start[..end].trim();
        let value = resolve_expression(expression, context).ok_or_else(|| TemplateError::Unresolved {
            expression: expression.to_string(),
        })?;
        match value {
            Value::Null => {}
            Value::String(text) => rendered.push_str(text),
            other => rendered.push_str(&other.to_string()),
        }
        let advanced = start + 3 + end + 2;
        consumed += advanced;
        remainder = &remainder[advanced..];
    }

    rendered.push_str(remainder);
    Ok(rendered)
}

/// Render a value tree: strings that consist of exactly one expression keep the
/// referenced value's type, other strings are rendered as text.
pub fn render_value(value: &Value, context: &Value) -> Result<Value, TemplateError> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            if let Some(inner) = trimmed.strip_prefix("${{").and_then(|rest| rest.strip_suffix("}}"))
                && !inner.contains("${{")
            {
                return resolve_expression(inner, context)
                    .cloned()
                    .ok_or_else(|| TemplateError::Unresolved {
                        expression: inner.trim().to_string(),
                    });
            }
            render_template(text, context).map(Value::String)
        }
        Value::Array(items) => items
            .iter()
            .map(|item| render_value(item, context))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut rendered = serde_json::Map::with_capacity(map.len());
            for (key, nested) in map {
                rendered.insert(key.clone(), render_value(nested, context)?);
            }
            Ok(Value::Object(rendered))
        }
        scalar => Ok(scalar.clone()),
    }
}

//! The HTML table page.

use std::borrow::Cow;
use std::io::ErrorKind;
use std::path::Path;

use cmdgate_engine::formatters::{escape_html, write_html};
use cmdgate_types::Table;
use tracing::debug;

use crate::error::DispatchError;

/// Built-in page template.
pub const DATATABLES_TEMPLATE: &str = include_str!("../../templates/datatables.html");

/// File name looked up in the configured template directory.
pub const TEMPLATE_FILE_NAME: &str = "datatables.html";

const TITLE_PLACEHOLDER: &str = "{{ title }}";
const TABLE_PLACEHOLDER: &str = "{{ table }}";

/// The page template: `<templates>/datatables.html` when present, the built-in one otherwise.
pub async fn load_template(templates: Option<&Path>) -> Result<Cow<'static, str>, DispatchError> {
    let Some(directory) = templates else {
        return Ok(Cow::Borrowed(DATATABLES_TEMPLATE));
    };
    let path = directory.join(TEMPLATE_FILE_NAME);
    match tokio::fs::read_to_string(&path).await {
        Ok(template) => {
            debug!(path = %path.display(), "using datatables template override");
            Ok(Cow::Owned(template))
        }
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(Cow::Borrowed(DATATABLES_TEMPLATE)),
        Err(error) => Err(DispatchError::TemplateLoadError(format!("{}: {error}", path.display()))),
    }
}

/// Fill `template` with `title` and the rendered table.
pub fn render_page(template: &str, title: &str, table: &Table) -> Result<String, DispatchError> {
    if !template.contains(TABLE_PLACEHOLDER) {
        return Err(DispatchError::TemplateLoadError(format!("template has no {TABLE_PLACEHOLDER} placeholder")));
    }
    let mut rendered = Vec::new();
    write_html(table, &mut rendered)?;
    let rendered = String::from_utf8_lossy(&rendered);
    Ok(template.replace(TITLE_PLACEHOLDER, &escape_html(title)).replace(TABLE_PLACEHOLDER, &rendered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> Table {
        let mut row = cmdgate_types::Row::new();
        row.insert("a".to_string(), json!(1));
        row.insert("b".to_string(), json!("<x>"));
        Table::from_rows(vec![row])
    }

    #[test]
    fn page_embeds_the_escaped_table() {
        let page = render_page(DATATABLES_TEMPLATE, "foo/bar", &table()).expect("page renders");
        assert!(page.contains("<title>foo/bar</title>"));
        assert!(page.contains("<th>a</th><th>b</th>"));
        assert!(page.contains("<td>1</td><td>&lt;x&gt;</td>"));
        assert!(!page.contains(TABLE_PLACEHOLDER));
    }

    #[test]
    fn templates_without_a_table_slot_are_rejected() {
        let error = render_page("<html></html>", "t", &table()).unwrap_err();
        assert!(matches!(error, DispatchError::TemplateLoadError(_)));
    }

    #[tokio::test]
    async fn override_directory_wins_and_falls_back() {
        let directory = tempfile::tempdir().expect("tempdir");
        assert_eq!(load_template(Some(directory.path())).await.expect("fallback"), DATATABLES_TEMPLATE);

        std::fs::write(directory.path().join(TEMPLATE_FILE_NAME), "custom {{ table }}").expect("write template");
        assert_eq!(load_template(Some(directory.path())).await.expect("override"), "custom {{ table }}");
    }

    #[tokio::test]
    async fn unreadable_overrides_are_template_errors() {
        let directory = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(directory.path().join(TEMPLATE_FILE_NAME)).expect("create dir");
        let error = load_template(Some(directory.path())).await.unwrap_err();
        assert!(error.to_string().starts_with("could not load template:"), "{error}");
    }
}

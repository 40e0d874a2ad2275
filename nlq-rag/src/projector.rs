//! Canonical text rendering of records for embedding.

use serde_json::Value;

use crate::record::Fields;

/// Separator placed between `field: value` fragments.
pub const FRAGMENT_SEPARATOR: &str = " | ";

/// Render `record` over `fields` as `"name: value"` fragments joined by
/// [`FRAGMENT_SEPARATOR`].
///
/// Fragments follow the order of `fields`; names absent from the record are
/// skipped, so a record with none of the fields projects to `""`.
pub fn project<S: AsRef<str>>(record: &Fields, fields: &[S]) -> String {
    fields
        .iter()
        .filter_map(|name| {
            let name = name.as_ref();
            record.get(name).map(|value| format!("{name}: {}", render_value(value)))
        })
        .collect::<Vec<_>>()
        .join(FRAGMENT_SEPARATOR)
}

/// Strings render verbatim; everything else uses its compact JSON form.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn follows_configured_field_order() {
        let record = fields(json!({"a": "x", "b": "y"}));
        assert_eq!(project(&record, &["b", "a"]), "b: y | a: x");
    }

    #[test]
    fn missing_fields_project_to_empty_string() {
        let record = fields(json!({"a": "x"}));
        assert_eq!(project(&record, &["z"]), "");
        assert_eq!(project::<&str>(&record, &[]), "");
    }

    #[test]
    fn skips_absent_fields_between_present_ones() {
        let record = fields(json!({"title": "Loft", "price": 1200}));
        assert_eq!(project(&record, &["title", "category", "price"]), "title: Loft | price: 1200");
    }

    #[test]
    fn renders_scalars_and_nested_values() {
        let record = fields(json!({
            "ok": true,
            "ratio": 0.5,
            "none": null,
            "tags": ["a", "b"],
        }));
        assert_eq!(
            project(&record, &["ok", "ratio", "none", "tags"]),
            r#"ok: true | ratio: 0.5 | none: null | tags: ["a","b"]"#
        );
    }
}

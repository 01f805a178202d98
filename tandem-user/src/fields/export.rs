//! CSV rendering for profile exports.
//!
//! Each catalog kind owns its cell formatting: multi-value choices render as
//! comma-joined quoted values, textarea content collapses to a single line,
//! booleans render as the localized yes/no word, and everything else passes
//! through unmodified.

use super::registry::{FieldDef, FieldKind, FieldRegistry};

pub fn localized_yes_no(locale: &str, value: bool) -> &'static str {
    match (locale, value) {
        ("de", true) => "Ja",
        ("de", false) => "Nein",
        (_, true) => "Yes",
        (_, false) => "No",
    }
}

/// Formats one stored field value for an export cell.
pub fn format_field_value(def: &FieldDef, value: &serde_json::Value, locale: &str) -> String {
    match (&def.kind, value) {
        (_, serde_json::Value::Null) => String::new(),

        (FieldKind::Boolean, serde_json::Value::Bool(b)) => {
            localized_yes_no(locale, *b).to_string()
        }

        (FieldKind::Textarea, serde_json::Value::String(s)) => single_line(s),

        (_, serde_json::Value::Array(items)) => items
            .iter()
            .map(|item| format!("\"{}\"", json_scalar_to_string(item)))
            .collect::<Vec<_>>()
            .join(", "),

        (_, other) => json_scalar_to_string(other),
    }
}

fn json_scalar_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn single_line(s: &str) -> String {
    s.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

/// Standard CSV quoting for a formatted cell.
fn csv_cell(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub struct ExportRow<'a> {
    pub profile_id: uuid::Uuid,
    pub display_name: &'a str,
    pub fields: &'a serde_json::Value,
}

/// Renders a header row plus one row per profile, columns in catalog order.
pub fn export_csv(registry: &FieldRegistry, rows: &[ExportRow<'_>], locale: &str) -> String {
    let mut out = String::new();

    let mut header = vec!["id".to_string(), "display_name".to_string()];
    header.extend(registry.fields().iter().map(|f| f.label.clone()));
    push_row(&mut out, &header);

    for row in rows {
        let store = row.fields.as_object();
        let mut cells = vec![row.profile_id.to_string(), row.display_name.to_string()];
        for def in registry.fields() {
            let cell = store
                .and_then(|map| map.get(&def.name))
                .map(|value| format_field_value(def, value, locale))
                .unwrap_or_default();
            cells.push(cell);
        }
        push_row(&mut out, &cells);
    }

    out
}

fn push_row(out: &mut String, cells: &[String]) {
    let line = cells
        .iter()
        .map(|c| csv_cell(c))
        .collect::<Vec<_>>()
        .join(",");
    out.push_str(&line);
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::registry::FieldRegistry;

    fn registry() -> FieldRegistry {
        FieldRegistry::load(
            r#"{
                "fields": [
                    {"name": "interests", "label": "Interests", "type": "free_choice_text", "multiple": true},
                    {"name": "motto", "label": "Motto", "type": "textarea"},
                    {"name": "newsletter", "label": "Newsletter", "type": "boolean"},
                    {"name": "hometown", "label": "Hometown", "type": "text"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_multi_value_cells_are_quote_wrapped() {
        let registry = registry();
        let def = registry.get("interests").unwrap();
        let formatted = format_field_value(def, &serde_json::json!(["a", "b"]), "en");
        assert_eq!(formatted, r#""a", "b""#);
    }

    #[test]
    fn test_boolean_renders_localized() {
        let registry = registry();
        let def = registry.get("newsletter").unwrap();
        assert_eq!(format_field_value(def, &serde_json::json!(true), "en"), "Yes");
        assert_eq!(format_field_value(def, &serde_json::json!(true), "de"), "Ja");
        assert_eq!(format_field_value(def, &serde_json::json!(false), "de"), "Nein");
    }

    #[test]
    fn test_textarea_collapses_line_breaks() {
        let registry = registry();
        let def = registry.get("motto").unwrap();
        let formatted = format_field_value(def, &serde_json::json!("line1\nline2"), "en");
        assert_eq!(formatted, "line1 line2");
        let formatted = format_field_value(def, &serde_json::json!("a\r\nb\rc"), "en");
        assert_eq!(formatted, "a b c");
    }

    #[test]
    fn test_plain_values_pass_through() {
        let registry = registry();
        let def = registry.get("hometown").unwrap();
        assert_eq!(
            format_field_value(def, &serde_json::json!("Leipzig"), "en"),
            "Leipzig"
        );
    }

    #[test]
    fn test_export_rows_follow_catalog_order() {
        let registry = registry();
        let id = uuid::Uuid::nil();
        let fields = serde_json::json!({
            "interests": ["a", "b"],
            "motto": "one\ntwo",
            "newsletter": true,
            "hometown": "Leipzig"
        });
        let rows = vec![ExportRow {
            profile_id: id,
            display_name: "ada",
            fields: &fields,
        }];

        let csv = export_csv(&registry, &rows, "en");
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), "id,display_name,Interests,Motto,Newsletter,Hometown");
        // The multi-value cell contains commas and quotes, so it is CSV-escaped.
        assert_eq!(
            lines.next().unwrap(),
            format!(r#"{id},ada,"""a"", ""b""",one two,Yes,Leipzig"#)
        );
    }

    #[test]
    fn test_missing_store_entry_renders_empty_cell() {
        let registry = registry();
        let fields = serde_json::json!({});
        let rows = vec![ExportRow {
            profile_id: uuid::Uuid::nil(),
            display_name: "",
            fields: &fields,
        }];
        let csv = export_csv(&registry, &rows, "en");
        let data_line = csv.lines().nth(1).unwrap();
        assert!(data_line.ends_with(",,,,"));
    }
}

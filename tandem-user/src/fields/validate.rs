//! Validator dispatch for dynamic field submissions.
//!
//! Raw form input arrives as strings, lists of strings, or a string map for
//! the address widget. Each catalog kind coerces its own native value.
//! Failures accumulate per field so one submission reports everything wrong
//! with it at once; a missing required value is reported as a distinct error
//! from a value of the wrong shape.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use super::registry::{FieldDef, FieldKind, FieldRegistry};
use super::value::{FieldValue, MultiAddress};

/// Raw per-field submission payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawFieldInput {
    One(String),
    Many(Vec<String>),
    Map(HashMap<String, String>),
}

impl RawFieldInput {
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    fn is_empty(&self) -> bool {
        match self {
            RawFieldInput::One(s) => s.is_empty(),
            RawFieldInput::Many(items) => items.iter().all(String::is_empty),
            RawFieldInput::Map(map) => map.values().all(String::is_empty),
        }
    }
}

/// Per-request choice lists for `dynamic_choice` fields, keyed by source.
#[derive(Debug, Clone, Default)]
pub struct ChoiceContext {
    pub dynamic: HashMap<String, Vec<String>>,
}

impl ChoiceContext {
    fn choices_for(&self, source: &str) -> &[String] {
        self.dynamic.get(source).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// Required field with an empty or absent value.
    Required,
    /// Value present but failed coercion or a kind constraint.
    Invalid(String),
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldError::Required => write!(f, "this field is required"),
            FieldError::Invalid(reason) => write!(f, "{reason}"),
        }
    }
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub field_errors: BTreeMap<String, Vec<FieldError>>,
    pub non_field_errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.field_errors.is_empty() && self.non_field_errors.is_empty()
    }

    pub fn add_field(&mut self, name: &str, errors: Vec<FieldError>) {
        self.field_errors.entry(name.to_string()).or_default().extend(errors);
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.non_field_errors.push(message.into());
    }

    /// Structured payload for the API error envelope.
    pub fn to_details(&self) -> serde_json::Value {
        let fields: serde_json::Map<String, serde_json::Value> = self
            .field_errors
            .iter()
            .map(|(name, errors)| {
                let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
                (name.clone(), serde_json::Value::from(messages))
            })
            .collect();
        serde_json::json!({
            "fields": fields,
            "non_field_errors": self.non_field_errors,
        })
    }
}

/// Validates a whole submission against the catalog.
///
/// Absent optional fields fall back to their configured default (if any);
/// empty optional values validate to nothing, which is how a field gets
/// cleared. Field names outside the catalog are rejected.
pub fn validate_submission(
    registry: &FieldRegistry,
    ctx: &ChoiceContext,
    raw: &BTreeMap<String, RawFieldInput>,
) -> Result<BTreeMap<String, FieldValue>, ValidationReport> {
    let mut report = ValidationReport::default();
    let mut cleaned = BTreeMap::new();

    for name in raw.keys() {
        if registry.get(name).is_none() {
            report.add_field(name, vec![FieldError::Invalid("unknown field".into())]);
        }
    }

    for field in registry.fields() {
        let submitted = raw.get(&field.name);

        let input = match submitted {
            Some(input) => input.clone(),
            None => match field.default.as_ref().and_then(RawFieldInput::from_json) {
                Some(default) => default,
                None => {
                    if field.required {
                        report.add_field(&field.name, vec![FieldError::Required]);
                    }
                    continue;
                }
            },
        };

        match validate_one(registry, ctx, field, &input) {
            Ok(Some(value)) => {
                cleaned.insert(field.name.clone(), value);
            }
            Ok(None) => {
                // Cleared; only store an explicit empty when submitted.
                if submitted.is_some() {
                    cleaned.insert(field.name.clone(), empty_value(field));
                }
            }
            Err(errors) => report.add_field(&field.name, errors),
        }
    }

    if report.is_empty() {
        Ok(cleaned)
    } else {
        Err(report)
    }
}

fn empty_value(field: &FieldDef) -> FieldValue {
    if field.multiple {
        FieldValue::List(vec![])
    } else {
        FieldValue::Text(String::new())
    }
}

/// Validates a single field. `Ok(None)` means "empty and allowed to be".
pub fn validate_one(
    registry: &FieldRegistry,
    ctx: &ChoiceContext,
    field: &FieldDef,
    input: &RawFieldInput,
) -> Result<Option<FieldValue>, Vec<FieldError>> {
    if input.is_empty() {
        return if field.required {
            Err(vec![FieldError::Required])
        } else {
            Ok(None)
        };
    }

    if matches!(field.kind, FieldKind::MultiAddress) {
        let RawFieldInput::Map(map) = input else {
            return Err(vec![FieldError::Invalid(
                "expected address subfields".into(),
            )]);
        };
        let addresses = MultiAddress::parse(map).map_err(|e| vec![FieldError::Invalid(e)])?;
        return if addresses.addresses.is_empty() {
            if field.required {
                Err(vec![FieldError::Required])
            } else {
                Ok(None)
            }
        } else {
            Ok(Some(FieldValue::Addresses(addresses)))
        };
    }

    if field.multiple {
        let items: Vec<&String> = match input {
            RawFieldInput::One(s) => vec![s],
            RawFieldInput::Many(items) => items.iter().filter(|s| !s.is_empty()).collect(),
            RawFieldInput::Map(_) => {
                return Err(vec![FieldError::Invalid("expected a list of values".into())])
            }
        };
        let mut errors = Vec::new();
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            match validate_scalar(registry, ctx, field, item) {
                Ok(FieldValue::Text(s)) => values.push(s),
                Ok(other) => values.push(other.to_json().to_string()),
                Err(reason) => errors.push(FieldError::Invalid(reason)),
            }
        }
        return if errors.is_empty() {
            Ok(Some(FieldValue::List(values)))
        } else {
            Err(errors)
        };
    }

    let scalar = match input {
        RawFieldInput::One(s) => s.as_str(),
        RawFieldInput::Many(_) => {
            return Err(vec![FieldError::Invalid(
                "multiple values submitted for a single-value field".into(),
            )])
        }
        RawFieldInput::Map(_) => {
            return Err(vec![FieldError::Invalid("expected a single value".into())])
        }
    };

    validate_scalar(registry, ctx, field, scalar)
        .map(Some)
        .map_err(|reason| vec![FieldError::Invalid(reason)])
}

fn validate_scalar(
    registry: &FieldRegistry,
    ctx: &ChoiceContext,
    field: &FieldDef,
    raw: &str,
) -> Result<FieldValue, String> {
    match &field.kind {
        FieldKind::Text { max_length } => {
            if let Some(max) = max_length {
                if raw.chars().count() > *max {
                    return Err(format!("must be at most {max} characters"));
                }
            }
            Ok(FieldValue::Text(raw.to_string()))
        }

        FieldKind::Textarea | FieldKind::FreeChoiceText { .. } => {
            Ok(FieldValue::Text(raw.to_string()))
        }

        FieldKind::Slug => {
            if raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                Ok(FieldValue::Text(raw.to_lowercase()))
            } else {
                Err("may only contain letters, numbers, hyphens, and underscores".into())
            }
        }

        FieldKind::Int { min, max } => {
            let n: i64 = raw
                .trim()
                .parse()
                .map_err(|_| "enter a whole number".to_string())?;
            if let Some(min) = min {
                if n < *min {
                    return Err(format!("must be greater than or equal to {min}"));
                }
            }
            if let Some(max) = max {
                if n > *max {
                    return Err(format!("must be less than or equal to {max}"));
                }
            }
            Ok(FieldValue::Int(n))
        }

        FieldKind::Boolean => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(FieldValue::Bool(true)),
            "false" | "0" | "no" | "off" => Ok(FieldValue::Bool(false)),
            _ => Err("enter a yes/no value".into()),
        },

        FieldKind::Date => chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(FieldValue::Date)
            .map_err(|_| "enter a valid date (YYYY-MM-DD)".into()),

        FieldKind::Country => {
            if raw.len() == 2 && raw.chars().all(|c| c.is_ascii_alphabetic()) {
                Ok(FieldValue::Text(raw.to_uppercase()))
            } else {
                Err("enter a two-letter country code".into())
            }
        }

        FieldKind::Language => {
            if raw.len() == 2 && raw.chars().all(|c| c.is_ascii_alphabetic()) {
                Ok(FieldValue::Text(raw.to_lowercase()))
            } else {
                Err("enter a two-letter language code".into())
            }
        }

        FieldKind::Phone => {
            let normalized: String = raw
                .chars()
                .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '/'))
                .collect();
            let digits = normalized.strip_prefix('+').unwrap_or(&normalized);
            if digits.len() >= 6
                && digits.len() <= 15
                && digits.chars().all(|c| c.is_ascii_digit())
            {
                Ok(FieldValue::Text(normalized))
            } else {
                Err("enter a valid phone number".into())
            }
        }

        FieldKind::Email => {
            if validator::validate_email(raw) {
                Ok(FieldValue::Text(raw.to_lowercase()))
            } else {
                Err("enter a valid email address".into())
            }
        }

        FieldKind::Url => {
            if validator::validate_url(raw) {
                Ok(FieldValue::Text(raw.to_string()))
            } else {
                Err("enter a valid URL".into())
            }
        }

        FieldKind::PredefinedChoice { choices } => {
            check_choice(raw, choices).map(|()| FieldValue::Text(raw.to_string()))
        }

        FieldKind::AdminDefinedChoice { set } => check_choice(raw, registry.choice_set(set))
            .map(|()| FieldValue::Text(raw.to_string())),

        FieldKind::ManagedTagChoice => check_choice(raw, registry.managed_tags())
            .map(|()| FieldValue::Text(raw.to_string())),

        FieldKind::DynamicChoice { source } => check_choice(raw, ctx.choices_for(source))
            .map(|()| FieldValue::Text(raw.to_string())),

        FieldKind::MultiAddress => Err("expected address subfields".into()),
    }
}

fn check_choice(raw: &str, choices: &[String]) -> Result<(), String> {
    if choices.iter().any(|c| c == raw) {
        Ok(())
    } else {
        Err(format!("`{raw}` is not one of the available choices"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::registry::FieldRegistry;

    fn registry() -> FieldRegistry {
        FieldRegistry::load(
            r#"{
                "choice_sets": {"organisations": ["ngo", "co-op", "collective"]},
                "managed_tags": ["host", "mentor"],
                "dynamic_sources": ["regions"],
                "fields": [
                    {"name": "hometown", "label": "Hometown", "type": "text", "required": true},
                    {"name": "motto", "label": "Motto", "type": "textarea"},
                    {"name": "founded", "label": "Founded", "type": "int", "min": 1800, "max": 2100},
                    {"name": "newsletter", "label": "Newsletter", "type": "boolean"},
                    {"name": "birthday", "label": "Birthday", "type": "date"},
                    {"name": "contact_email", "label": "Contact email", "type": "email", "unique": true},
                    {"name": "homepage", "label": "Homepage", "type": "url"},
                    {"name": "organisation", "label": "Organisation", "type": "admin_defined_choice", "set": "organisations"},
                    {"name": "languages", "label": "Languages", "type": "language", "multiple": true},
                    {"name": "region", "label": "Region", "type": "dynamic_choice", "source": "regions"},
                    {"name": "locations", "label": "Locations", "type": "multi_address"}
                ]
            }"#,
        )
        .unwrap()
    }

    fn one(s: &str) -> RawFieldInput {
        RawFieldInput::One(s.to_string())
    }

    fn submit(entries: Vec<(&str, RawFieldInput)>) -> BTreeMap<String, RawFieldInput> {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_required_missing_reports_required_error() {
        let result = validate_submission(&registry(), &ChoiceContext::default(), &submit(vec![]));
        let report = result.unwrap_err();
        assert_eq!(report.field_errors["hometown"], vec![FieldError::Required]);
    }

    #[test]
    fn test_required_empty_string_reports_required_error() {
        let raw = submit(vec![("hometown", one(""))]);
        let report = validate_submission(&registry(), &ChoiceContext::default(), &raw).unwrap_err();
        assert_eq!(report.field_errors["hometown"], vec![FieldError::Required]);
    }

    #[test]
    fn test_errors_accumulate_across_fields() {
        let raw = submit(vec![
            ("founded", one("soon")),
            ("contact_email", one("not-an-email")),
        ]);
        let report = validate_submission(&registry(), &ChoiceContext::default(), &raw).unwrap_err();
        // Both bad fields plus the missing required one.
        assert!(report.field_errors.contains_key("founded"));
        assert!(report.field_errors.contains_key("contact_email"));
        assert!(report.field_errors.contains_key("hometown"));
        assert!(matches!(
            report.field_errors["founded"][0],
            FieldError::Invalid(_)
        ));
    }

    #[test]
    fn test_valid_submission_coerces_native_types() {
        let raw = submit(vec![
            ("hometown", one("Leipzig")),
            ("founded", one("1992")),
            ("newsletter", one("yes")),
            ("birthday", one("1990-06-15")),
            ("contact_email", one("Info@Example.org")),
        ]);
        let cleaned = validate_submission(&registry(), &ChoiceContext::default(), &raw).unwrap();
        assert_eq!(cleaned["hometown"], FieldValue::Text("Leipzig".into()));
        assert_eq!(cleaned["founded"], FieldValue::Int(1992));
        assert_eq!(cleaned["newsletter"], FieldValue::Bool(true));
        assert_eq!(
            cleaned["birthday"],
            FieldValue::Date(chrono::NaiveDate::from_ymd_opt(1990, 6, 15).unwrap())
        );
        // Emails normalize to lowercase.
        assert_eq!(
            cleaned["contact_email"],
            FieldValue::Text("info@example.org".into())
        );
    }

    #[test]
    fn test_int_bounds_enforced() {
        let raw = submit(vec![("hometown", one("x")), ("founded", one("1700"))]);
        let report = validate_submission(&registry(), &ChoiceContext::default(), &raw).unwrap_err();
        assert_eq!(
            report.field_errors["founded"],
            vec![FieldError::Invalid("must be greater than or equal to 1800".into())]
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let raw = submit(vec![("hometown", one("x")), ("shoe_size", one("44"))]);
        let report = validate_submission(&registry(), &ChoiceContext::default(), &raw).unwrap_err();
        assert_eq!(
            report.field_errors["shoe_size"],
            vec![FieldError::Invalid("unknown field".into())]
        );
    }

    #[test]
    fn test_admin_defined_choice_membership() {
        let raw = submit(vec![("hometown", one("x")), ("organisation", one("cartel"))]);
        let report = validate_submission(&registry(), &ChoiceContext::default(), &raw).unwrap_err();
        assert!(matches!(
            &report.field_errors["organisation"][0],
            FieldError::Invalid(msg) if msg.contains("cartel")
        ));

        let raw = submit(vec![("hometown", one("x")), ("organisation", one("co-op"))]);
        let cleaned = validate_submission(&registry(), &ChoiceContext::default(), &raw).unwrap();
        assert_eq!(cleaned["organisation"], FieldValue::Text("co-op".into()));
    }

    #[test]
    fn test_multiple_language_field_collects_list() {
        let raw = submit(vec![
            ("hometown", one("x")),
            ("languages", RawFieldInput::Many(vec!["DE".into(), "fr".into()])),
        ]);
        let cleaned = validate_submission(&registry(), &ChoiceContext::default(), &raw).unwrap();
        assert_eq!(
            cleaned["languages"],
            FieldValue::List(vec!["de".into(), "fr".into()])
        );
    }

    #[test]
    fn test_dynamic_choice_resolves_through_context() {
        let mut ctx = ChoiceContext::default();
        ctx.dynamic
            .insert("regions".into(), vec!["north".into(), "south".into()]);

        let raw = submit(vec![("hometown", one("x")), ("region", one("south"))]);
        let cleaned = validate_submission(&registry(), &ctx, &raw).unwrap();
        assert_eq!(cleaned["region"], FieldValue::Text("south".into()));

        // Without the context entry the same submission fails.
        let raw = submit(vec![("hometown", one("x")), ("region", one("south"))]);
        let report = validate_submission(&registry(), &ChoiceContext::default(), &raw).unwrap_err();
        assert!(report.field_errors.contains_key("region"));
    }

    #[test]
    fn test_multi_address_requires_subfield_map() {
        let raw = submit(vec![("hometown", one("x")), ("locations", one("Berlin"))]);
        let report = validate_submission(&registry(), &ChoiceContext::default(), &raw).unwrap_err();
        assert_eq!(
            report.field_errors["locations"],
            vec![FieldError::Invalid("expected address subfields".into())]
        );
    }

    #[test]
    fn test_optional_empty_value_clears_field() {
        let raw = submit(vec![("hometown", one("x")), ("motto", one(""))]);
        let cleaned = validate_submission(&registry(), &ChoiceContext::default(), &raw).unwrap();
        assert_eq!(cleaned["motto"], FieldValue::Text(String::new()));
    }

    #[test]
    fn test_phone_normalization() {
        let registry = FieldRegistry::load(
            r#"{"fields": [{"name": "phone", "label": "Phone", "type": "phone"}]}"#,
        )
        .unwrap();
        let raw = submit(vec![("phone", one("+49 (030) 123-456"))]);
        let cleaned = validate_submission(&registry, &ChoiceContext::default(), &raw).unwrap();
        assert_eq!(cleaned["phone"], FieldValue::Text("+49030123456".into()));
    }
}

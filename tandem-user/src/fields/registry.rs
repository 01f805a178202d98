//! The portal field catalog: which extra profile fields exist, how each one
//! validates, and which of them feed search and export.
//!
//! The catalog is a JSON document loaded once at startup. Anything wrong with
//! it (unknown kind, dangling choice-set reference, bad default) aborts the
//! service instead of surfacing later as a per-request error.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::validate::{self, ChoiceContext, RawFieldInput};

/// How a field participates in profile search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    /// Matched by jsonb containment against the stored value.
    Exact,
    /// Matched by case-insensitive substring after load.
    Text,
}

/// Field kind plus its kind-specific configuration payload.
///
/// One variant per supported kind; an unrecognized `type` tag in the catalog
/// is a deserialization error, which is what makes misconfiguration fail at
/// load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
    },
    Textarea,
    Slug,
    Int {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    Boolean,
    Date,
    Country,
    Language,
    Phone,
    Email,
    Url,
    PredefinedChoice {
        choices: Vec<String>,
    },
    /// Choices come from a named, admin-editable set in the same catalog.
    AdminDefinedChoice {
        set: String,
    },
    /// Choices are the catalog's managed-tag list.
    ManagedTagChoice,
    /// Freeform text; `suggestions` are rendering hints, never enforced.
    FreeChoiceText {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        suggestions: Vec<String>,
    },
    MultiAddress,
    /// Choices resolved per request from a declared dynamic source.
    DynamicChoice {
        source: String,
    },
}

impl FieldKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Text { .. } => "text",
            FieldKind::Textarea => "textarea",
            FieldKind::Slug => "slug",
            FieldKind::Int { .. } => "int",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
            FieldKind::Country => "country",
            FieldKind::Language => "language",
            FieldKind::Phone => "phone",
            FieldKind::Email => "email",
            FieldKind::Url => "url",
            FieldKind::PredefinedChoice { .. } => "predefined_choice",
            FieldKind::AdminDefinedChoice { .. } => "admin_defined_choice",
            FieldKind::ManagedTagChoice => "managed_tag_choice",
            FieldKind::FreeChoiceText { .. } => "free_choice_text",
            FieldKind::MultiAddress => "multi_address",
            FieldKind::DynamicChoice { .. } => "dynamic_choice",
        }
    }

    /// Kinds whose values may be submitted as a list.
    pub fn accepts_multiple(&self) -> bool {
        matches!(
            self,
            FieldKind::PredefinedChoice { .. }
                | FieldKind::AdminDefinedChoice { .. }
                | FieldKind::ManagedTagChoice
                | FieldKind::FreeChoiceText { .. }
                | FieldKind::DynamicChoice { .. }
                | FieldKind::Language
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub label: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchKind>,
}

/// Raw catalog document as it appears on disk.
#[derive(Debug, Deserialize)]
struct CatalogDoc {
    #[serde(default)]
    choice_sets: HashMap<String, Vec<String>>,
    #[serde(default)]
    managed_tags: Vec<String>,
    #[serde(default)]
    dynamic_sources: Vec<String>,
    fields: Vec<FieldDef>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to parse field catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate field name `{0}`")]
    DuplicateField(String),

    #[error("field `{field}` references unknown choice set `{set}`")]
    UnknownChoiceSet { field: String, set: String },

    #[error("field `{field}` references undeclared dynamic source `{source_name}`")]
    UnknownDynamicSource { field: String, source_name: String },

    #[error("field `{field}` is marked multiple but kind `{kind}` takes a single value")]
    MultipleNotAllowed { field: String, kind: &'static str },

    #[error("default for field `{field}` does not validate: {reason}")]
    BadDefault { field: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct FieldRegistry {
    fields: Vec<FieldDef>,
    by_name: HashMap<String, usize>,
    choice_sets: HashMap<String, Vec<String>>,
    managed_tags: Vec<String>,
    dynamic_sources: Vec<String>,
}

impl FieldRegistry {
    pub fn load_from_path(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read field catalog {path}: {e}"))?;
        Ok(Self::load(&raw)?)
    }

    pub fn load(json: &str) -> Result<Self, RegistryError> {
        let doc: CatalogDoc = serde_json::from_str(json)?;

        let mut by_name = HashMap::with_capacity(doc.fields.len());
        for (idx, field) in doc.fields.iter().enumerate() {
            if by_name.insert(field.name.clone(), idx).is_some() {
                return Err(RegistryError::DuplicateField(field.name.clone()));
            }

            match &field.kind {
                FieldKind::AdminDefinedChoice { set } => {
                    if !doc.choice_sets.contains_key(set) {
                        return Err(RegistryError::UnknownChoiceSet {
                            field: field.name.clone(),
                            set: set.clone(),
                        });
                    }
                }
                FieldKind::DynamicChoice { source } => {
                    if !doc.dynamic_sources.contains(source) {
                        return Err(RegistryError::UnknownDynamicSource {
                            field: field.name.clone(),
                            source_name: source.clone(),
                        });
                    }
                }
                _ => {}
            }

            if field.multiple && !field.kind.accepts_multiple() {
                return Err(RegistryError::MultipleNotAllowed {
                    field: field.name.clone(),
                    kind: field.kind.type_name(),
                });
            }
        }

        let registry = Self {
            fields: doc.fields,
            by_name,
            choice_sets: doc.choice_sets,
            managed_tags: doc.managed_tags,
            dynamic_sources: doc.dynamic_sources,
        };

        registry.check_defaults()?;

        tracing::info!(fields = registry.fields.len(), "field catalog loaded");
        Ok(registry)
    }

    /// Every configured default must pass its own field's validator. Dynamic
    /// sources are resolved as empty here, so defaults on dynamic-choice
    /// fields are rejected rather than deferred.
    fn check_defaults(&self) -> Result<(), RegistryError> {
        let ctx = ChoiceContext::default();
        for field in &self.fields {
            let Some(default) = &field.default else { continue };
            let raw = match RawFieldInput::from_json(default) {
                Some(raw) => raw,
                None => {
                    return Err(RegistryError::BadDefault {
                        field: field.name.clone(),
                        reason: "default must be a string, list of strings, or string map".into(),
                    })
                }
            };
            if let Err(errors) = validate::validate_one(self, &ctx, field, &raw) {
                let reason = errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(RegistryError::BadDefault {
                    field: field.name.clone(),
                    reason,
                });
            }
        }
        Ok(())
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.by_name.get(name).map(|idx| &self.fields[*idx])
    }

    pub fn choice_set(&self, set: &str) -> &[String] {
        self.choice_sets.get(set).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn managed_tags(&self) -> &[String] {
        &self.managed_tags
    }

    pub fn dynamic_sources(&self) -> &[String] {
        &self.dynamic_sources
    }

    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.unique)
    }

    pub fn searchable_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.search.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal(fields_json: &str) -> Result<FieldRegistry, RegistryError> {
        FieldRegistry::load(&format!(
            r#"{{
                "choice_sets": {{"organisations": ["ngo", "co-op"]}},
                "managed_tags": ["host", "mentor"],
                "dynamic_sources": ["regions"],
                "fields": {fields_json}
            }}"#
        ))
    }

    #[test]
    fn test_load_minimal_catalog() {
        let registry = minimal(
            r#"[{"name": "hometown", "label": "Hometown", "type": "text"}]"#,
        )
        .unwrap();
        assert_eq!(registry.fields().len(), 1);
        assert!(registry.get("hometown").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_unknown_kind_fails_at_load() {
        let err = minimal(
            r#"[{"name": "x", "label": "X", "type": "telepathy"}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::Parse(_)));
    }

    #[test]
    fn test_duplicate_name_fails_at_load() {
        let err = minimal(
            r#"[
                {"name": "x", "label": "X", "type": "text"},
                {"name": "x", "label": "X again", "type": "boolean"}
            ]"#,
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateField(name) if name == "x"));
    }

    #[test]
    fn test_dangling_choice_set_fails_at_load() {
        let err = minimal(
            r#"[{"name": "org", "label": "Org", "type": "admin_defined_choice", "set": "nope"}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownChoiceSet { set, .. } if set == "nope"));
    }

    #[test]
    fn test_undeclared_dynamic_source_fails_at_load() {
        let err = minimal(
            r#"[{"name": "area", "label": "Area", "type": "dynamic_choice", "source": "galaxies"}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownDynamicSource { source_name, .. } if source_name == "galaxies"));
    }

    #[test]
    fn test_multiple_on_scalar_kind_fails_at_load() {
        let err = minimal(
            r#"[{"name": "age", "label": "Age", "type": "int", "multiple": true}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::MultipleNotAllowed { kind: "int", .. }));
    }

    #[test]
    fn test_bad_default_fails_at_load() {
        let err = minimal(
            r#"[{"name": "age", "label": "Age", "type": "int", "default": "not-a-number"}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::BadDefault { field, .. } if field == "age"));
    }

    #[test]
    fn test_valid_default_passes_load() {
        let registry = minimal(
            r#"[{"name": "age", "label": "Age", "type": "int", "default": "30"}]"#,
        )
        .unwrap();
        assert!(registry.get("age").unwrap().default.is_some());
    }
}

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use tandem_shared::errors::{AppError, AppResult, ErrorCode};

use crate::fields::registry::FieldRegistry;
use crate::fields::validate::{self, ChoiceContext, RawFieldInput};
use crate::fields::value::{json_is_empty, FieldValue};
use crate::models::{NewProfile, Profile};
use crate::schema::profiles;
use crate::DbPool;

/// Creates a default profile for a newly registered account, with the field
/// store seeded from catalog defaults.
/// Called from the RabbitMQ subscriber when an `account.user.registered`
/// event is received.
pub fn create_default_profile(
    pool: &DbPool,
    registry: &FieldRegistry,
    account_id: Uuid,
) -> AppResult<Profile> {
    let mut conn = pool.get().map_err(|e| AppError::internal(e.to_string()))?;

    let new_profile = NewProfile {
        account_id,
        fields: default_field_store(registry),
    };

    let profile = diesel::insert_into(profiles::table)
        .values(&new_profile)
        .get_result::<Profile>(&mut conn)?;

    tracing::info!(
        profile_id = %profile.id,
        account_id = %account_id,
        "default profile created"
    );

    Ok(profile)
}

/// Field store seeded from catalog defaults. Defaults were validated at
/// catalog load, so failures here reduce to skipping the entry.
pub fn default_field_store(registry: &FieldRegistry) -> serde_json::Value {
    let ctx = ChoiceContext::default();
    let mut store = serde_json::Map::new();
    for field in registry.fields() {
        let Some(raw) = field.default.as_ref().and_then(RawFieldInput::from_json) else {
            continue;
        };
        if let Ok(Some(value)) = validate::validate_one(registry, &ctx, field, &raw) {
            store.insert(field.name.clone(), value.to_json());
        }
    }
    serde_json::Value::Object(store)
}

/// Overlays validated values on the existing store. Untouched entries stay.
pub fn merge_field_store(
    existing: &serde_json::Value,
    validated: &BTreeMap<String, FieldValue>,
) -> serde_json::Value {
    let mut store = existing
        .as_object()
        .cloned()
        .unwrap_or_default();
    for (name, value) in validated {
        store.insert(name.clone(), value.to_json());
    }
    serde_json::Value::Object(store)
}

/// Containment probe for the jsonb uniqueness query.
pub fn unique_probe(name: &str, value: &serde_json::Value) -> serde_json::Value {
    serde_json::json!({ name: value })
}

/// Scans sibling profiles for values that collide on unique fields.
///
/// Empty values are exempt, and the owning profile is excluded so re-saving
/// an already-held value never trips the check. Violations are non-field
/// messages: the colliding field may not exist as a concrete form field in
/// every surface that saves profiles.
pub fn unique_violations(
    conn: &mut PgConnection,
    registry: &FieldRegistry,
    profile_id: Uuid,
    store: &serde_json::Value,
) -> AppResult<Vec<String>> {
    let mut violations = Vec::new();
    let Some(map) = store.as_object() else {
        return Ok(violations);
    };

    for def in registry.unique_fields() {
        let Some(value) = map.get(&def.name) else { continue };
        if json_is_empty(value) {
            continue;
        }

        let probe = unique_probe(&def.name, value);
        let taken: i64 = profiles::table
            .filter(profiles::id.ne(profile_id))
            .filter(profiles::fields.contains(probe))
            .count()
            .get_result(conn)?;

        if taken > 0 {
            violations.push(format!(
                "the value for `{}` is already in use by another profile",
                def.label
            ));
        }
    }

    Ok(violations)
}

/// The single write path for the field store: merge, re-check uniqueness,
/// persist. Programmatic updates go through here too, so the uniqueness
/// check runs on every save and not only on form validation.
pub fn save_profile_fields(
    conn: &mut PgConnection,
    registry: &FieldRegistry,
    profile: &Profile,
    validated: &BTreeMap<String, FieldValue>,
) -> AppResult<serde_json::Value> {
    let merged = merge_field_store(&profile.fields, validated);

    let violations = unique_violations(conn, registry, profile.id, &merged)?;
    if !violations.is_empty() {
        return Err(AppError::with_details(
            ErrorCode::DuplicateFieldValue,
            "one or more field values are already taken",
            serde_json::json!({ "non_field_errors": violations }),
        ));
    }

    diesel::update(profiles::table.filter(profiles::id.eq(profile.id)))
        .set((
            profiles::fields.eq(&merged),
            profiles::updated_at.eq(Utc::now()),
        ))
        .execute(conn)?;

    Ok(merged)
}

/// Stamps the login time reported by the account service.
pub fn record_login(pool: &DbPool, account_id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
    let mut conn = pool.get().map_err(|e| AppError::internal(e.to_string()))?;

    diesel::update(profiles::table.filter(profiles::account_id.eq(account_id)))
        .set(profiles::last_login_at.eq(Some(at)))
        .execute(&mut conn)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::registry::FieldRegistry;

    fn registry() -> FieldRegistry {
        FieldRegistry::load(
            r#"{
                "fields": [
                    {"name": "hometown", "label": "Hometown", "type": "text", "default": "Leipzig"},
                    {"name": "member_code", "label": "Member code", "type": "slug", "unique": true}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_default_store_seeds_configured_defaults() {
        let store = default_field_store(&registry());
        assert_eq!(store, serde_json::json!({"hometown": "Leipzig"}));
    }

    #[test]
    fn test_merge_overlays_and_preserves() {
        let existing = serde_json::json!({"hometown": "Leipzig", "member_code": "x1"});
        let mut validated = BTreeMap::new();
        validated.insert("hometown".to_string(), FieldValue::Text("Jena".into()));

        let merged = merge_field_store(&existing, &validated);
        assert_eq!(
            merged,
            serde_json::json!({"hometown": "Jena", "member_code": "x1"})
        );
    }

    #[test]
    fn test_unique_probe_shape() {
        let probe = unique_probe("member_code", &serde_json::json!("x1"));
        assert_eq!(probe, serde_json::json!({"member_code": "x1"}));
    }
}

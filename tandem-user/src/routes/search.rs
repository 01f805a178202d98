use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::Json;
use diesel::prelude::*;
use std::sync::Arc;

use tandem_shared::errors::{AppError, AppResult};
use tandem_shared::types::auth::AuthUser;
use tandem_shared::types::ApiResponse;

use crate::fields::SearchKind;
use crate::models::{Profile, VISIBILITY_PLATFORM};
use crate::schema::profiles;
use crate::services::profile_service;
use crate::AppState;

const DEFAULT_LIMIT: i64 = 20;

/// GET /search?q=<query>&limit=20&<field>=<value>
///
/// `q` matches display names; any other parameter naming a search-flagged
/// catalog field filters on the stored value — exact kinds through jsonb
/// containment, text kinds by substring after load.
pub async fn search_profiles(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<ApiResponse<Vec<Profile>>>> {
    let q = params.get("q").map(|s| s.trim().to_string()).unwrap_or_default();
    let limit = params
        .get("limit")
        .and_then(|l| l.parse::<i64>().ok())
        .unwrap_or(DEFAULT_LIMIT)
        .clamp(1, 50);

    let mut exact_probes: Vec<serde_json::Value> = Vec::new();
    let mut text_filters: Vec<(String, String)> = Vec::new();
    for def in state.registry.searchable_fields() {
        let Some(value) = params.get(&def.name).filter(|v| !v.is_empty()) else {
            continue;
        };
        match def.search {
            Some(SearchKind::Exact) => {
                // List-valued fields store arrays; containment needs the
                // probe in the same shape.
                let probe_value = if def.multiple {
                    serde_json::json!([value])
                } else {
                    serde_json::json!(value)
                };
                exact_probes.push(profile_service::unique_probe(&def.name, &probe_value));
            }
            Some(SearchKind::Text) => {
                text_filters.push((def.name.clone(), value.to_lowercase()));
            }
            None => {}
        }
    }

    if q.is_empty() && exact_probes.is_empty() && text_filters.is_empty() {
        return Ok(Json(ApiResponse::ok(vec![])));
    }

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let mut query = profiles::table
        .filter(profiles::account_id.ne(user.id))
        .filter(profiles::visibility.eq(VISIBILITY_PLATFORM))
        .into_boxed();

    if !q.is_empty() {
        let pattern = format!("%{q}%");
        query = query.filter(profiles::display_name.ilike(pattern));
    }

    for probe in &exact_probes {
        query = query.filter(profiles::fields.contains(probe.clone()));
    }

    // Text-kind filters match in memory, so over-fetch when they apply.
    let fetch_limit = if text_filters.is_empty() { limit } else { limit * 10 };

    let mut results = query
        .limit(fetch_limit)
        .load::<Profile>(&mut conn)
        .map_err(|e| AppError::internal(e.to_string()))?;

    if !text_filters.is_empty() {
        results.retain(|profile| {
            let store = profile.fields.as_object();
            text_filters.iter().all(|(name, needle)| {
                store
                    .and_then(|map| map.get(name))
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_lowercase().contains(needle))
                    .unwrap_or(false)
            })
        });
        results.truncate(limit as usize);
    }

    // Enrich is_online from Redis (source of truth for presence)
    for p in &mut results {
        let key = format!("online:{}", p.account_id);
        if let Ok(true) = state.redis.exists(&key).await {
            p.is_online = true;
        }
    }

    Ok(Json(ApiResponse::ok(results)))
}

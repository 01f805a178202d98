use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::Json;
use diesel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use tandem_shared::errors::{AppError, AppResult, ErrorCode};
use tandem_shared::types::auth::AuthUser;
use tandem_shared::types::ApiResponse;

use crate::events::publisher;
use crate::fields::validate::{self, ChoiceContext, RawFieldInput};
use crate::models::{Profile, UpdateProfile, VISIBILITY_PLATFORM, VISIBILITY_PRIVATE};
use crate::schema::profiles;
use crate::services::profile_service;
use crate::AppState;

// --- GET /me ---

pub async fn get_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let profile = profiles::table
        .filter(profiles::account_id.eq(user.id))
        .first::<Profile>(&mut conn)
        .map_err(|_| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))?;

    Ok(Json(ApiResponse::ok(profile)))
}

// --- PATCH /me ---

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub website: Option<String>,
    pub visibility: Option<String>,
    pub match_opt_in: Option<bool>,
    pub topics: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    /// Full dynamic-field form submission; absent means "leave the store
    /// alone", present means every field goes through the validators.
    pub fields: Option<BTreeMap<String, RawFieldInput>>,
}

pub async fn update_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateProfileRequest>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let profile = profiles::table
        .filter(profiles::account_id.eq(user.id))
        .first::<Profile>(&mut conn)
        .map_err(|_| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))?;

    if let Some(name) = &req.display_name {
        validate_display_name(name)?;

        let taken: bool = profiles::table
            .filter(profiles::display_name.eq(name))
            .filter(profiles::id.ne(profile.id))
            .count()
            .get_result::<i64>(&mut conn)
            .map(|c| c > 0)
            .unwrap_or(false);

        if taken {
            return Err(AppError::new(ErrorCode::DisplayNameTaken, "display name is already taken"));
        }
    }

    if let Some(visibility) = &req.visibility {
        if visibility != VISIBILITY_PLATFORM && visibility != VISIBILITY_PRIVATE {
            return Err(AppError::new(
                ErrorCode::ValidationError,
                "visibility must be `platform` or `private`",
            ));
        }
    }

    // Dynamic fields validate as one submission, so every problem in it is
    // reported at once.
    if let Some(raw_fields) = &req.fields {
        let ctx = load_choice_context(&state).await;
        let cleaned = validate::validate_submission(&state.registry, &ctx, raw_fields)
            .map_err(|report| {
                AppError::with_details(
                    ErrorCode::FieldValidationFailed,
                    "field validation failed",
                    report.to_details(),
                )
            })?;

        profile_service::save_profile_fields(&mut conn, &state.registry, &profile, &cleaned)?;
    }

    let changes = UpdateProfile {
        display_name: req.display_name,
        description: req.description,
        avatar_url: req.avatar_url,
        website: req.website,
        visibility: req.visibility,
        match_opt_in: req.match_opt_in,
        topics: req.topics.map(serde_json::Value::from),
        tags: req.tags.map(serde_json::Value::from),
    };

    let updated = diesel::update(profiles::table.filter(profiles::id.eq(profile.id)))
        .set((
            &changes,
            profiles::updated_at.eq(chrono::Utc::now()),
        ))
        .get_result::<Profile>(&mut conn)?;

    publisher::publish_profile_updated(&state.rabbitmq, updated.id, updated.account_id).await;

    Ok(Json(ApiResponse::ok(updated)))
}

fn validate_display_name(name: &str) -> AppResult<()> {
    if name.len() < 3 || name.len() > 50 {
        return Err(AppError::new(
            ErrorCode::InvalidDisplayName,
            "display name must be between 3 and 50 characters",
        ));
    }
    if !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == ' ') {
        return Err(AppError::new(
            ErrorCode::InvalidDisplayName,
            "display name can only contain letters, numbers, spaces, and underscores",
        ));
    }
    Ok(())
}

/// Resolves the catalog's dynamic choice sources from Redis, where admin
/// tooling publishes them as JSON arrays under `choices:{source}`.
pub async fn load_choice_context(state: &AppState) -> ChoiceContext {
    let mut ctx = ChoiceContext::default();
    for source in state.registry.dynamic_sources() {
        let key = format!("choices:{source}");
        let choices = match state.redis.get(&key).await {
            Ok(Some(data)) => serde_json::from_str::<Vec<String>>(&data).unwrap_or_default(),
            Ok(None) => vec![],
            Err(e) => {
                tracing::warn!(error = %e, source = %source, "failed to resolve dynamic choices");
                vec![]
            }
        };
        ctx.dynamic.insert(source.clone(), choices);
    }
    ctx
}

// --- GET /profiles/:id --- (public profile by profile id or account id)

pub async fn get_public_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let profile = profiles::table
        .filter(profiles::id.eq(id).or(profiles::account_id.eq(id)))
        .first::<Profile>(&mut conn)
        .map_err(|_| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))?;

    if profile.visibility == VISIBILITY_PRIVATE && profile.account_id != user.id {
        return Err(AppError::new(ErrorCode::ProfileHidden, "this profile is not visible"));
    }

    Ok(Json(ApiResponse::ok(profile)))
}

use axum::extract::{Path, State};
use axum::Json;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use tandem_shared::errors::{AppError, AppResult, ErrorCode};
use tandem_shared::types::auth::AuthUser;
use tandem_shared::types::ApiResponse;

use crate::matching::likes_cache;
use crate::matching::trigger::{self, MatchEffect, ReactionWrite};
use crate::models::{MatchReaction, NewMatchReaction, Profile, ReactionKind};
use crate::schema::{match_reactions, profiles};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SendReactionRequest {
    pub target_id: Uuid,
    pub kind: ReactionKind,
}

/// POST /reactions - upsert the requester's reaction towards a target.
///
/// One row per (from, to) pair: repeating the same reaction is a no-op,
/// switching kind updates the row in place. Only effective transitions fire
/// downstream effects.
pub async fn send_reaction(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendReactionRequest>,
) -> AppResult<Json<ApiResponse<MatchReaction>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let me = profiles::table
        .filter(profiles::account_id.eq(user.id))
        .first::<Profile>(&mut conn)
        .map_err(|_| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))?;

    // target_id can be either profile id or account id
    let target = profiles::table
        .filter(
            profiles::id.eq(req.target_id)
                .or(profiles::account_id.eq(req.target_id)),
        )
        .first::<Profile>(&mut conn)
        .map_err(|_| AppError::new(ErrorCode::ProfileNotFound, "target profile not found"))?;

    if me.id == target.id {
        return Err(AppError::new(ErrorCode::CannotReactSelf, "cannot react to yourself"));
    }

    let existing: Option<MatchReaction> = match_reactions::table
        .filter(match_reactions::from_profile_id.eq(me.id))
        .filter(match_reactions::to_profile_id.eq(target.id))
        .first::<MatchReaction>(&mut conn)
        .optional()?;

    let (reaction, write) = match existing {
        Some(existing) if existing.kind == req.kind.as_str() => (existing, ReactionWrite::Unchanged),
        Some(existing) => {
            let updated = diesel::update(match_reactions::table.filter(match_reactions::id.eq(existing.id)))
                .set((
                    match_reactions::kind.eq(req.kind.as_str()),
                    match_reactions::updated_at.eq(chrono::Utc::now()),
                ))
                .get_result::<MatchReaction>(&mut conn)?;
            (updated, ReactionWrite::Changed)
        }
        None => {
            let new_reaction = NewMatchReaction {
                from_profile_id: me.id,
                to_profile_id: target.id,
                kind: req.kind.as_str().to_string(),
            };
            let inserted = diesel::insert_into(match_reactions::table)
                .values(&new_reaction)
                .get_result::<MatchReaction>(&mut conn)?;
            (inserted, ReactionWrite::Changed)
        }
    };

    if write == ReactionWrite::Changed {
        likes_cache::invalidate_liked_set(&state.redis, &me.id).await;
    }

    let reciprocal_like: bool = match_reactions::table
        .filter(match_reactions::from_profile_id.eq(target.id))
        .filter(match_reactions::to_profile_id.eq(me.id))
        .filter(match_reactions::kind.eq(ReactionKind::Like.as_str()))
        .count()
        .get_result::<i64>(&mut conn)
        .map(|c| c > 0)
        .unwrap_or(false);

    match trigger::effect_for(write, req.kind, reciprocal_like) {
        MatchEffect::Mutual => trigger::run_mutual_effects(&state, &me, &target).await,
        MatchEffect::Liked => trigger::run_like_effects(&state, &me, &target).await,
        MatchEffect::None => {}
    }

    Ok(Json(ApiResponse::ok(reaction)))
}

#[derive(Debug, Serialize)]
pub struct ReactionCheckResponse {
    pub kind: Option<String>,
}

/// GET /reactions/check/:target_id - the requester's current reaction, if any
pub async fn check_reaction(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(target_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ReactionCheckResponse>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let me = profiles::table
        .filter(profiles::account_id.eq(user.id))
        .first::<Profile>(&mut conn)
        .map_err(|_| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))?;

    let target: Option<Profile> = profiles::table
        .filter(
            profiles::id.eq(target_id)
                .or(profiles::account_id.eq(target_id)),
        )
        .first::<Profile>(&mut conn)
        .optional()?;

    let kind = if let Some(target) = target {
        match_reactions::table
            .filter(match_reactions::from_profile_id.eq(me.id))
            .filter(match_reactions::to_profile_id.eq(target.id))
            .first::<MatchReaction>(&mut conn)
            .optional()?
            .map(|r| r.kind)
    } else {
        None
    };

    Ok(Json(ApiResponse::ok(ReactionCheckResponse { kind })))
}

use std::collections::{BTreeMap, HashMap, HashSet};

use axum::extract::State;
use axum::Json;
use chrono::{Duration, Utc};
use diesel::prelude::*;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use tandem_shared::errors::{AppError, AppResult, ErrorCode};
use tandem_shared::types::auth::AuthUser;
use tandem_shared::types::ApiResponse;

use crate::matching::likes_cache;
use crate::matching::scoring::{self, ProfileSignals, ScoredCandidate};
use crate::models::{Profile, ReactionKind, VISIBILITY_PLATFORM};
use crate::schema::{match_reactions, profiles};
use crate::AppState;

/// Candidates must have been active within the last year; a login within the
/// last month earns the recency bonus.
const ACTIVE_WINDOW_DAYS: i64 = 365;
const RECENT_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Serialize)]
pub struct Suggestion {
    pub profile: Profile,
    pub score: i64,
}

/// GET /suggestions - the top-3 shortlist of profiles to react to.
pub async fn get_suggestions(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<Suggestion>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let me = profiles::table
        .filter(profiles::account_id.eq(user.id))
        .first::<Profile>(&mut conn)
        .map_err(|_| AppError::new(ErrorCode::ProfileNotFound, "profile not found"))?;

    // Visibility is mutual: a hidden or opted-out requester sees nobody.
    if me.visibility != VISIBILITY_PLATFORM || !me.match_opt_in {
        return Ok(Json(ApiResponse::ok(vec![])));
    }

    let now = Utc::now();
    let active_cutoff = now - Duration::days(ACTIVE_WINDOW_DAYS);

    // Everyone the requester already reacted to is out, in either direction
    // for dislikes.
    let reacted_to: Vec<Uuid> = match_reactions::table
        .filter(match_reactions::from_profile_id.eq(me.id))
        .select(match_reactions::to_profile_id)
        .load::<Uuid>(&mut conn)?;

    let disliked_by: Vec<Uuid> = match_reactions::table
        .filter(match_reactions::to_profile_id.eq(me.id))
        .filter(match_reactions::kind.eq(ReactionKind::Dislike.as_str()))
        .select(match_reactions::from_profile_id)
        .load::<Uuid>(&mut conn)?;

    let candidates: Vec<Profile> = profiles::table
        .filter(profiles::id.ne(me.id))
        .filter(profiles::visibility.eq(VISIBILITY_PLATFORM))
        .filter(profiles::match_opt_in.eq(true))
        .filter(profiles::last_login_at.gt(active_cutoff))
        .filter(profiles::id.ne_all(&reacted_to))
        .filter(profiles::id.ne_all(&disliked_by))
        .load::<Profile>(&mut conn)?;

    if candidates.is_empty() {
        return Ok(Json(ApiResponse::ok(vec![])));
    }

    // Liked sets: the requester's own comes through the short-lived cache,
    // every candidate's from one query over the pool.
    let my_liked = match likes_cache::read_liked_set(&state.redis, &me.id).await {
        Some(cached) => cached,
        None => {
            let liked: HashSet<Uuid> = match_reactions::table
                .filter(match_reactions::from_profile_id.eq(me.id))
                .filter(match_reactions::kind.eq(ReactionKind::Like.as_str()))
                .select(match_reactions::to_profile_id)
                .load::<Uuid>(&mut conn)?
                .into_iter()
                .collect();
            likes_cache::cache_liked_set(&state.redis, &me.id, &liked).await;
            liked
        }
    };

    let candidate_ids: Vec<Uuid> = candidates.iter().map(|p| p.id).collect();
    let mut liked_by_candidate: HashMap<Uuid, HashSet<Uuid>> = HashMap::new();
    let candidate_likes: Vec<(Uuid, Uuid)> = match_reactions::table
        .filter(match_reactions::from_profile_id.eq_any(&candidate_ids))
        .filter(match_reactions::kind.eq(ReactionKind::Like.as_str()))
        .select((match_reactions::from_profile_id, match_reactions::to_profile_id))
        .load::<(Uuid, Uuid)>(&mut conn)?;
    for (from, to) in candidate_likes {
        liked_by_candidate.entry(from).or_default().insert(to);
    }

    let requester_signals = profile_signals(&me, my_liked, now);
    let candidate_signals: Vec<ProfileSignals> = candidates
        .iter()
        .map(|profile| {
            let liked = liked_by_candidate.remove(&profile.id).unwrap_or_default();
            profile_signals(profile, liked, now)
        })
        .collect();

    let ranked = scoring::rank_candidates(&requester_signals, &candidate_signals);
    let shortlist = scoring::select_shortlist(&ranked, |slots| {
        rand::thread_rng().gen_range(0..slots)
    });

    let mut by_id: HashMap<Uuid, Profile> =
        candidates.into_iter().map(|p| (p.id, p)).collect();

    let mut suggestions = Vec::with_capacity(shortlist.len());
    for ScoredCandidate { profile_id, score, .. } in shortlist {
        let Some(mut profile) = by_id.remove(&profile_id) else { continue };

        // Presence lives in Redis, the row is a fallback.
        let key = format!("online:{}", profile.account_id);
        if let Ok(true) = state.redis.exists(&key).await {
            profile.is_online = true;
        }

        suggestions.push(Suggestion { profile, score });
    }

    Ok(Json(ApiResponse::ok(suggestions)))
}

fn profile_signals(
    profile: &Profile,
    liked: HashSet<Uuid>,
    now: chrono::DateTime<Utc>,
) -> ProfileSignals {
    let recent_cutoff = now - Duration::days(RECENT_WINDOW_DAYS);
    let fields: BTreeMap<String, serde_json::Value> = profile
        .fields
        .as_object()
        .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();

    ProfileSignals {
        profile_id: profile.id,
        has_description: profile
            .description
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty()),
        has_avatar: profile.avatar_url.as_deref().is_some_and(|a| !a.is_empty()),
        has_website: profile.website.as_deref().is_some_and(|w| !w.is_empty()),
        email_verified: profile.email_verified,
        active_last_month: profile
            .last_login_at
            .is_some_and(|at| at > recent_cutoff),
        topics: profile.topic_set(),
        tags: profile.tag_set(),
        fields,
        liked,
    }
}

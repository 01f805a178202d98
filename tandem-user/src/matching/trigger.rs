//! Side effects of a reaction write.
//!
//! A like that completes a mutual pair provisions a direct conversation on
//! the messaging backend and announces the match; a one-directional like
//! only notifies the target. Conversation provisioning is best-effort: on
//! failure the reaction row stays and only the room-bound notifications are
//! skipped.

use serde::Deserialize;
use uuid::Uuid;

use crate::events::publisher;
use crate::models::{Profile, ReactionKind};
use crate::AppState;

/// What a reaction write changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionWrite {
    /// No row changed; the caller must not re-fire effects.
    Unchanged,
    /// A new row was inserted or an existing row switched kind.
    Changed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchEffect {
    None,
    Liked,
    Mutual,
}

/// Decides the effect of a reaction write. Only an effective transition to
/// `like` fires anything, and only a reciprocal like upgrades it to a match.
pub fn effect_for(write: ReactionWrite, kind: ReactionKind, reciprocal_like: bool) -> MatchEffect {
    match (write, kind) {
        (ReactionWrite::Unchanged, _) => MatchEffect::None,
        (ReactionWrite::Changed, ReactionKind::Dislike) => MatchEffect::None,
        (ReactionWrite::Changed, ReactionKind::Like) => {
            if reciprocal_like {
                MatchEffect::Mutual
            } else {
                MatchEffect::Liked
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConversationResponse {
    conversation_id: Uuid,
}

/// Asks the messaging backend for a direct conversation between the pair.
async fn provision_conversation(
    state: &AppState,
    user_a: Uuid,
    user_b: Uuid,
) -> anyhow::Result<Uuid> {
    let url = format!(
        "{}/internal/conversations/direct",
        state.config.messaging_service_url
    );
    let response = state
        .http
        .post(&url)
        .json(&serde_json::json!({ "member_ids": [user_a, user_b] }))
        .send()
        .await?
        .error_for_status()?;

    let body: ConversationResponse = response.json().await?;
    Ok(body.conversation_id)
}

/// Runs the effects for a like that just completed a mutual pair.
pub async fn run_mutual_effects(state: &AppState, liker: &Profile, liked: &Profile) {
    let conversation_id = match provision_conversation(state, liker.id, liked.id).await {
        Ok(id) => id,
        Err(e) => {
            // The like itself stays; only the room-bound announcements are
            // dropped.
            tracing::error!(
                error = %e,
                liker_id = %liker.id,
                liked_id = %liked.id,
                "conversation provisioning failed, skipping match notifications"
            );
            return;
        }
    };

    tracing::info!(
        liker_id = %liker.id,
        liked_id = %liked.id,
        conversation_id = %conversation_id,
        "mutual match established"
    );

    publisher::publish_match_established(
        &state.rabbitmq,
        liker,
        liked,
        conversation_id,
    )
    .await;
}

/// Runs the effect for a one-directional like.
pub async fn run_like_effects(state: &AppState, liker: &Profile, liked: &Profile) {
    publisher::publish_like_sent(&state.rabbitmq, liker, liked).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unchanged_write_never_fires() {
        assert_eq!(
            effect_for(ReactionWrite::Unchanged, ReactionKind::Like, true),
            MatchEffect::None
        );
        assert_eq!(
            effect_for(ReactionWrite::Unchanged, ReactionKind::Dislike, false),
            MatchEffect::None
        );
    }

    #[test]
    fn test_dislike_never_fires() {
        assert_eq!(
            effect_for(ReactionWrite::Changed, ReactionKind::Dislike, true),
            MatchEffect::None
        );
    }

    #[test]
    fn test_like_without_reciprocal_notifies_target() {
        assert_eq!(
            effect_for(ReactionWrite::Changed, ReactionKind::Like, false),
            MatchEffect::Liked
        );
    }

    #[test]
    fn test_like_with_reciprocal_is_mutual() {
        assert_eq!(
            effect_for(ReactionWrite::Changed, ReactionKind::Like, true),
            MatchEffect::Mutual
        );
    }
}

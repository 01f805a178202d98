use std::sync::Arc;

use futures_lite::StreamExt;
use lapin::options::BasicAckOptions;

use tandem_shared::types::event::{payloads, routing_keys, Event};

use crate::services::notification_service;
use crate::AppState;

/// Listen for like events (like.sent).
pub async fn listen_like_events(state: Arc<AppState>) -> anyhow::Result<()> {
    let mut consumer = state.rabbitmq.subscribe(
        "tandem-notification.match.like.sent",
        &[routing_keys::MATCH_LIKE_SENT],
    ).await?;

    tracing::info!("listening for like events");

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                match serde_json::from_slice::<Event<payloads::LikeSent>>(&delivery.data) {
                    Ok(event) => {
                        let data = &event.data;
                        tracing::info!(
                            liker_id = %data.liker_id,
                            liked_id = %data.liked_id,
                            "received like.sent event"
                        );

                        let liker = display_or_someone(&data.liker_display_name);
                        if let Err(e) = notification_service::create_notification(
                            &state.db,
                            data.liked_account_id,
                            "like_received",
                            "Someone likes your profile",
                            &format!("{liker} likes your profile"),
                            Some(serde_json::json!({
                                "liker_id": data.liker_id,
                                "liker_display_name": data.liker_display_name,
                            })),
                        ) {
                            tracing::error!(error = %e, "failed to create like notification");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to deserialize like.sent event");
                    }
                }

                let _ = delivery.ack(BasicAckOptions::default()).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "like consumer error");
            }
        }
    }

    Ok(())
}

/// Listen for match events (pair.established). One event fans out into one
/// directional notification per member of the pair.
pub async fn listen_match_events(state: Arc<AppState>) -> anyhow::Result<()> {
    let mut consumer = state.rabbitmq.subscribe(
        "tandem-notification.match.pair.established",
        &[routing_keys::MATCH_ESTABLISHED],
    ).await?;

    tracing::info!("listening for match events");

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                match serde_json::from_slice::<Event<payloads::MatchEstablished>>(&delivery.data) {
                    Ok(event) => {
                        let data = &event.data;
                        tracing::info!(
                            user_a_id = %data.user_a_id,
                            user_b_id = %data.user_b_id,
                            conversation_id = %data.conversation_id,
                            "received pair.established event"
                        );

                        let sides = [
                            (
                                data.user_a_account_id,
                                data.user_b_id,
                                &data.user_b_display_name,
                            ),
                            (
                                data.user_b_account_id,
                                data.user_a_id,
                                &data.user_a_display_name,
                            ),
                        ];

                        for (recipient, partner_id, partner_name) in sides {
                            let partner = display_or_someone(partner_name);
                            if let Err(e) = notification_service::create_notification(
                                &state.db,
                                recipient,
                                "match_established",
                                "You have a new match",
                                &format!("You and {partner} liked each other"),
                                Some(serde_json::json!({
                                    "partner_id": partner_id,
                                    "partner_display_name": partner_name,
                                    "conversation_id": data.conversation_id,
                                })),
                            ) {
                                tracing::error!(
                                    error = %e,
                                    recipient = %recipient,
                                    "failed to create match notification"
                                );
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to deserialize pair.established event");
                    }
                }

                let _ = delivery.ack(BasicAckOptions::default()).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "match consumer error");
            }
        }
    }

    Ok(())
}

fn display_or_someone(name: &str) -> &str {
    if name.is_empty() { "Someone" } else { name }
}

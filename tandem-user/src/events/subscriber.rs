use std::sync::Arc;

use futures_lite::StreamExt;
use lapin::options::BasicAckOptions;

use tandem_shared::types::event::{payloads, routing_keys, Event};

use crate::services::profile_service;
use crate::AppState;

/// Listen for account.user.registered events to create default profiles
pub async fn listen_user_registered(state: Arc<AppState>) -> anyhow::Result<()> {
    let mut consumer = state.rabbitmq.subscribe(
        "tandem-user.account.user.registered",
        &[routing_keys::ACCOUNT_USER_REGISTERED],
    ).await?;

    tracing::info!("listening for account.user.registered events");

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                match serde_json::from_slice::<Event<payloads::UserRegistered>>(&delivery.data) {
                    Ok(event) => {
                        let data = &event.data;
                        tracing::info!(
                            account_id = %data.account_id,
                            "received user.registered event"
                        );

                        match profile_service::create_default_profile(
                            &state.db,
                            &state.registry,
                            data.account_id,
                        ) {
                            Ok(profile) => {
                                tracing::info!(
                                    profile_id = %profile.id,
                                    "profile created for new account"
                                );
                            }
                            Err(e) => {
                                tracing::error!(
                                    error = %e,
                                    account_id = %data.account_id,
                                    "failed to create default profile"
                                );
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to deserialize user.registered event");
                    }
                }
                let _ = delivery.ack(BasicAckOptions::default()).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "consumer error");
            }
        }
    }

    Ok(())
}

/// Listen for account.user.logged_in events to keep last_login_at current,
/// which feeds the recency filters in match suggestions.
pub async fn listen_user_logins(state: Arc<AppState>) -> anyhow::Result<()> {
    let mut consumer = state.rabbitmq.subscribe(
        "tandem-user.account.user.logged_in",
        &[routing_keys::ACCOUNT_USER_LOGGED_IN],
    ).await?;

    tracing::info!("listening for account.user.logged_in events");

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                match serde_json::from_slice::<Event<payloads::UserLoggedIn>>(&delivery.data) {
                    Ok(event) => {
                        let data = &event.data;
                        if let Err(e) = profile_service::record_login(
                            &state.db,
                            data.account_id,
                            data.logged_in_at,
                        ) {
                            tracing::error!(
                                error = %e,
                                account_id = %data.account_id,
                                "failed to record login"
                            );
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to deserialize user.logged_in event");
                    }
                }
                let _ = delivery.ack(BasicAckOptions::default()).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "consumer error");
            }
        }
    }

    Ok(())
}

use uuid::Uuid;

use tandem_shared::clients::rabbitmq::RabbitMQClient;
use tandem_shared::types::event::{payloads, routing_keys, Event};

use crate::models::Profile;

pub async fn publish_profile_updated(rabbitmq: &RabbitMQClient, profile_id: Uuid, account_id: Uuid) {
    let event = Event::new(
        "tandem-user",
        routing_keys::PROFILE_UPDATED,
        payloads::ProfileUpdated {
            profile_id,
            account_id,
        },
    )
    .with_user(account_id);

    if let Err(e) = rabbitmq.publish(routing_keys::PROFILE_UPDATED, &event).await {
        tracing::error!(error = %e, "failed to publish profile.updated event");
    }
}

pub async fn publish_like_sent(rabbitmq: &RabbitMQClient, liker: &Profile, liked: &Profile) {
    let event = Event::new(
        "tandem-user",
        routing_keys::MATCH_LIKE_SENT,
        payloads::LikeSent {
            liker_id: liker.id,
            liker_display_name: liker.display_name.clone().unwrap_or_default(),
            liked_id: liked.id,
            liked_account_id: liked.account_id,
        },
    )
    .with_user(liker.account_id);

    if let Err(e) = rabbitmq.publish(routing_keys::MATCH_LIKE_SENT, &event).await {
        tracing::error!(error = %e, "failed to publish like.sent event");
    }
}

pub async fn publish_match_established(
    rabbitmq: &RabbitMQClient,
    user_a: &Profile,
    user_b: &Profile,
    conversation_id: Uuid,
) {
    let event = Event::new(
        "tandem-user",
        routing_keys::MATCH_ESTABLISHED,
        payloads::MatchEstablished {
            user_a_id: user_a.id,
            user_a_account_id: user_a.account_id,
            user_a_display_name: user_a.display_name.clone().unwrap_or_default(),
            user_b_id: user_b.id,
            user_b_account_id: user_b.account_id,
            user_b_display_name: user_b.display_name.clone().unwrap_or_default(),
            conversation_id,
        },
    )
    .with_user(user_a.account_id);

    if let Err(e) = rabbitmq.publish(routing_keys::MATCH_ESTABLISHED, &event).await {
        tracing::error!(error = %e, "failed to publish match.established event");
    }
}

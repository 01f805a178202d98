use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RabbitMQ event envelope wrapping all domain events.
///
/// Routing key format: `tandem.{domain}.{entity}.{action}`
/// Example: `tandem.match.like.sent`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub data: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            user_id: None,
            data,
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

/// RabbitMQ routing keys
pub mod routing_keys {
    // Account events (published by the account service)
    pub const ACCOUNT_USER_REGISTERED: &str = "tandem.account.user.registered";
    pub const ACCOUNT_USER_LOGGED_IN: &str = "tandem.account.user.logged_in";

    // Profile events
    pub const PROFILE_UPDATED: &str = "tandem.profile.profile.updated";

    // Matching events
    pub const MATCH_LIKE_SENT: &str = "tandem.match.like.sent";
    pub const MATCH_ESTABLISHED: &str = "tandem.match.pair.established";
}

/// Common event data payloads
pub mod payloads {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct UserRegistered {
        pub account_id: Uuid,
        pub email: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct UserLoggedIn {
        pub account_id: Uuid,
        pub logged_in_at: chrono::DateTime<chrono::Utc>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ProfileUpdated {
        pub profile_id: Uuid,
        pub account_id: Uuid,
    }

    /// Profile ids identify the pair for client-side linking; the account id
    /// is the notification address.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct LikeSent {
        pub liker_id: Uuid,
        pub liker_display_name: String,
        pub liked_id: Uuid,
        pub liked_account_id: Uuid,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MatchEstablished {
        pub user_a_id: Uuid,
        pub user_a_account_id: Uuid,
        pub user_a_display_name: String,
        pub user_b_id: Uuid,
        pub user_b_account_id: Uuid,
        pub user_b_display_name: String,
        pub conversation_id: Uuid,
    }
}

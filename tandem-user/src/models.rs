use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{match_reactions, profiles};

// --- Profile ---

pub const VISIBILITY_PLATFORM: &str = "platform";
pub const VISIBILITY_PRIVATE: &str = "private";

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub id: Uuid,
    pub account_id: Uuid,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub website: Option<String>,
    pub email_verified: bool,
    pub visibility: String,
    pub match_opt_in: bool,
    pub topics: serde_json::Value,
    pub tags: serde_json::Value,
    pub fields: serde_json::Value,
    pub last_login_at: Option<DateTime<Utc>>,
    pub is_online: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Topics/tags are stored as jsonb string arrays; anything else reads as empty.
    pub fn topic_set(&self) -> std::collections::HashSet<String> {
        json_string_set(&self.topics)
    }

    pub fn tag_set(&self) -> std::collections::HashSet<String> {
        json_string_set(&self.tags)
    }
}

fn json_string_set(value: &serde_json::Value) -> std::collections::HashSet<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Insertable)]
#[diesel(table_name = profiles)]
pub struct NewProfile {
    pub account_id: Uuid,
    pub fields: serde_json::Value,
}

#[derive(Debug, AsChangeset, Default)]
#[diesel(table_name = profiles)]
pub struct UpdateProfile {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub website: Option<String>,
    pub visibility: Option<String>,
    pub match_opt_in: Option<bool>,
    pub topics: Option<serde_json::Value>,
    pub tags: Option<serde_json::Value>,
}

// --- MatchReaction ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
        }
    }
}

impl std::str::FromStr for ReactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(ReactionKind::Like),
            "dislike" => Ok(ReactionKind::Dislike),
            _ => Err(format!("unknown reaction kind: {s}")),
        }
    }
}

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = match_reactions)]
pub struct MatchReaction {
    pub id: Uuid,
    pub from_profile_id: Uuid,
    pub to_profile_id: Uuid,
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = match_reactions)]
pub struct NewMatchReaction {
    pub from_profile_id: Uuid,
    pub to_profile_id: Uuid,
    pub kind: String,
}

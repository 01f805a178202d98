//! Request-cycle cache for liked-profile sets.
//!
//! The suggestion scorer needs the requester's full liked set on every call;
//! it changes rarely, so it sits in Redis with a short TTL and gets dropped
//! whenever the owner writes a new reaction.

use std::collections::HashSet;

use uuid::Uuid;

use tandem_shared::clients::redis::RedisClient;

const LIKED_PREFIX: &str = "match:liked";
const LIKED_TTL: u64 = 120;

fn liked_key(profile_id: &Uuid) -> String {
    format!("{LIKED_PREFIX}:{profile_id}")
}

pub async fn read_liked_set(redis: &RedisClient, profile_id: &Uuid) -> Option<HashSet<Uuid>> {
    match redis.get(&liked_key(profile_id)).await {
        Ok(Some(data)) => serde_json::from_str(&data).ok(),
        _ => None,
    }
}

pub async fn cache_liked_set(redis: &RedisClient, profile_id: &Uuid, liked: &HashSet<Uuid>) {
    let key = liked_key(profile_id);
    if let Ok(data) = serde_json::to_string(liked) {
        if let Err(e) = redis.set(&key, &data, LIKED_TTL).await {
            tracing::warn!(error = %e, profile_id = %profile_id, "failed to cache liked set");
        }
    }
}

pub async fn invalidate_liked_set(redis: &RedisClient, profile_id: &Uuid) {
    if let Err(e) = redis.del(&liked_key(profile_id)).await {
        tracing::warn!(error = %e, profile_id = %profile_id, "failed to drop liked-set cache");
    }
}

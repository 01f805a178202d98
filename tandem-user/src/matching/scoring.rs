//! Candidate scoring for match suggestions.
//!
//! A pure pass over an already-fetched candidate set: every signal adds whole
//! units, candidates sort by total, and the top three become the suggestion
//! shortlist. One product rule sits on top: someone who already likes the
//! requester can be spliced into the shortlist at a random slot.

use std::collections::{BTreeMap, HashSet};

use uuid::Uuid;

use crate::fields::value::json_is_empty;

pub const SHORTLIST_SIZE: usize = 3;

/// Scoring view of one profile, detached from the database row.
#[derive(Debug, Clone)]
pub struct ProfileSignals {
    pub profile_id: Uuid,
    pub has_description: bool,
    pub has_avatar: bool,
    pub has_website: bool,
    pub email_verified: bool,
    pub active_last_month: bool,
    pub topics: HashSet<String>,
    pub tags: HashSet<String>,
    pub fields: BTreeMap<String, serde_json::Value>,
    /// Profile ids this user has liked.
    pub liked: HashSet<Uuid>,
}

#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub profile_id: Uuid,
    pub score: i64,
    pub likes_requester: bool,
}

/// One unit per filled-out completeness signal.
fn completeness(candidate: &ProfileSignals) -> i64 {
    [
        candidate.has_description,
        candidate.has_avatar,
        candidate.has_website,
        candidate.email_verified,
    ]
    .iter()
    .filter(|present| **present)
    .count() as i64
}

/// Shared non-empty dynamic-field values. List values count the size of the
/// set intersection; scalar values count one when equal.
fn field_overlap(
    a: &BTreeMap<String, serde_json::Value>,
    b: &BTreeMap<String, serde_json::Value>,
) -> i64 {
    let mut total = 0;
    for (name, left) in a {
        let Some(right) = b.get(name) else { continue };
        if json_is_empty(left) || json_is_empty(right) {
            continue;
        }
        match (left.as_array(), right.as_array()) {
            (Some(left_items), Some(right_items)) => {
                let right_set: HashSet<&str> =
                    right_items.iter().filter_map(|v| v.as_str()).collect();
                let left_set: HashSet<&str> =
                    left_items.iter().filter_map(|v| v.as_str()).collect();
                total += left_set.intersection(&right_set).count() as i64;
            }
            _ => {
                if left == right {
                    total += 1;
                }
            }
        }
    }
    total
}

fn set_overlap(a: &HashSet<String>, b: &HashSet<String>) -> i64 {
    a.intersection(b).count() as i64
}

pub fn score_candidate(requester: &ProfileSignals, candidate: &ProfileSignals) -> i64 {
    let mut score = completeness(candidate);
    score += field_overlap(&requester.fields, &candidate.fields);
    score += set_overlap(&requester.topics, &candidate.topics);
    score += set_overlap(&requester.tags, &candidate.tags);
    if candidate.active_last_month {
        score += 1;
    }
    score += requester.liked.intersection(&candidate.liked).count() as i64;
    score
}

/// Scores and sorts the whole candidate pool, highest first. The sort is
/// stable, so equal scores keep the order the pool was supplied in.
pub fn rank_candidates(
    requester: &ProfileSignals,
    candidates: &[ProfileSignals],
) -> Vec<ScoredCandidate> {
    let mut ranked: Vec<ScoredCandidate> = candidates
        .iter()
        .map(|candidate| ScoredCandidate {
            profile_id: candidate.profile_id,
            score: score_candidate(requester, candidate),
            likes_requester: candidate.liked.contains(&requester.profile_id),
        })
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

/// Takes the shortlist off a ranked pool.
///
/// When nobody in the natural top three likes the requester but someone
/// further down does, the highest-ranked such candidate takes a slot chosen
/// by `pick_slot` (uniform over the shortlist in production) and the natural
/// third place drops out.
pub fn select_shortlist<F>(ranked: &[ScoredCandidate], pick_slot: F) -> Vec<ScoredCandidate>
where
    F: FnOnce(usize) -> usize,
{
    let mut shortlist: Vec<ScoredCandidate> =
        ranked.iter().take(SHORTLIST_SIZE).cloned().collect();

    if shortlist.iter().any(|c| c.likes_requester) {
        return shortlist;
    }

    let Some(liked_me) = ranked
        .iter()
        .skip(SHORTLIST_SIZE)
        .find(|c| c.likes_requester)
    else {
        return shortlist;
    };

    shortlist.pop();
    let slot = pick_slot(SHORTLIST_SIZE).min(shortlist.len());
    shortlist.insert(slot, liked_me.clone());
    shortlist
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(id: u128) -> ProfileSignals {
        ProfileSignals {
            profile_id: Uuid::from_u128(id),
            has_description: false,
            has_avatar: false,
            has_website: false,
            email_verified: false,
            active_last_month: false,
            topics: HashSet::new(),
            tags: HashSet::new(),
            fields: BTreeMap::new(),
            liked: HashSet::new(),
        }
    }

    fn ids(ranked: &[ScoredCandidate]) -> Vec<Uuid> {
        ranked.iter().map(|c| c.profile_id).collect()
    }

    #[test]
    fn test_completeness_counts_four_units() {
        let requester = signals(1);

        let mut complete = signals(2);
        complete.has_description = true;
        complete.has_avatar = true;
        complete.has_website = true;
        complete.email_verified = true;

        let bare = signals(3);

        let full = score_candidate(&requester, &complete);
        let empty = score_candidate(&requester, &bare);
        assert_eq!(full - empty, 4);
    }

    #[test]
    fn test_field_overlap_scalar_and_list() {
        let mut requester = signals(1);
        requester.fields.insert("hometown".into(), serde_json::json!("Leipzig"));
        requester
            .fields
            .insert("languages".into(), serde_json::json!(["de", "en", "fr"]));
        requester.fields.insert("motto".into(), serde_json::json!(""));

        let mut candidate = signals(2);
        candidate.fields.insert("hometown".into(), serde_json::json!("Leipzig"));
        candidate
            .fields
            .insert("languages".into(), serde_json::json!(["en", "fr", "es"]));
        candidate.fields.insert("motto".into(), serde_json::json!("onwards"));

        // hometown matches (1) + two shared languages (2); empty motto is skipped.
        assert_eq!(score_candidate(&requester, &candidate), 3);
    }

    #[test]
    fn test_topic_tag_and_mutual_like_overlap() {
        let mut requester = signals(1);
        requester.topics.extend(["housing".to_string(), "energy".to_string()]);
        requester.tags.insert("berlin".to_string());
        requester.liked.extend([Uuid::from_u128(10), Uuid::from_u128(11)]);

        let mut candidate = signals(2);
        candidate.topics.insert("energy".to_string());
        candidate.tags.insert("berlin".to_string());
        candidate.liked.extend([Uuid::from_u128(11), Uuid::from_u128(12)]);
        candidate.active_last_month = true;

        // energy (1) + berlin (1) + recent activity (1) + shared like of user 11 (1)
        assert_eq!(score_candidate(&requester, &candidate), 4);
    }

    #[test]
    fn test_ranking_is_deterministic_and_stable() {
        let requester = signals(1);
        let mut a = signals(2);
        a.has_avatar = true;
        let b = signals(3);
        let c = signals(4);

        let pool = vec![b.clone(), a.clone(), c.clone()];
        let first = rank_candidates(&requester, &pool);
        let second = rank_candidates(&requester, &pool);

        assert_eq!(ids(&first), ids(&second));
        // a wins on score; b and c tie and keep pool order.
        assert_eq!(
            ids(&first),
            vec![a.profile_id, b.profile_id, c.profile_id]
        );
    }

    #[test]
    fn test_empty_pool_yields_empty_shortlist() {
        let requester = signals(1);
        let ranked = rank_candidates(&requester, &[]);
        let shortlist = select_shortlist(&ranked, |_| 0);
        assert!(shortlist.is_empty());
    }

    fn ranked_pool_with_liked_me_outside_top3(requester_id: u128) -> Vec<ScoredCandidate> {
        // Four candidates; the last one likes the requester but scores lowest.
        let requester = signals(requester_id);
        let mut pool = Vec::new();
        for (id, units) in [(2u128, 4), (3, 3), (4, 2)] {
            let mut c = signals(id);
            c.has_description = units > 0;
            c.has_avatar = units > 1;
            c.has_website = units > 2;
            c.email_verified = units > 3;
            pool.push(c);
        }
        let mut liked_me = signals(5);
        liked_me.liked.insert(Uuid::from_u128(requester_id));
        pool.push(liked_me);
        rank_candidates(&requester, &pool)
    }

    #[test]
    fn test_splice_inserts_liked_me_at_chosen_slot() {
        for slot in 0..SHORTLIST_SIZE {
            let ranked = ranked_pool_with_liked_me_outside_top3(1);
            assert_eq!(ranked.len(), 4);
            assert!(ranked[3].likes_requester);

            let shortlist = select_shortlist(&ranked, |_| slot);
            assert_eq!(shortlist.len(), SHORTLIST_SIZE);
            // The liked-me candidate landed exactly at the requested slot.
            assert_eq!(shortlist[slot].profile_id, Uuid::from_u128(5));
            // The natural third place was dropped.
            assert!(!shortlist.iter().any(|c| c.profile_id == Uuid::from_u128(4)));
            // The surviving natural members keep their relative order.
            let survivors: Vec<Uuid> = shortlist
                .iter()
                .filter(|c| c.profile_id != Uuid::from_u128(5))
                .map(|c| c.profile_id)
                .collect();
            assert_eq!(survivors, vec![Uuid::from_u128(2), Uuid::from_u128(3)]);
        }
    }

    #[test]
    fn test_no_splice_when_liked_me_already_in_top3() {
        let requester = signals(1);
        let mut liked_me = signals(2);
        liked_me.liked.insert(requester.profile_id);
        liked_me.has_description = true;
        let b = signals(3);
        let c = signals(4);
        let d = signals(5);

        let ranked = rank_candidates(&requester, &[liked_me.clone(), b, c, d]);
        let shortlist = select_shortlist(&ranked, |_| panic!("slot picker must not run"));
        assert_eq!(shortlist[0].profile_id, liked_me.profile_id);
        assert_eq!(shortlist.len(), SHORTLIST_SIZE);
    }

    #[test]
    fn test_no_splice_when_nobody_likes_requester() {
        let requester = signals(1);
        let pool: Vec<ProfileSignals> = (2..7).map(signals).collect();
        let ranked = rank_candidates(&requester, &pool);
        let shortlist = select_shortlist(&ranked, |_| panic!("slot picker must not run"));
        assert_eq!(ids(&shortlist), ids(&ranked[..3]));
    }
}

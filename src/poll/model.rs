use crate::utils::error::CustomError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 5;

/// Poll attached to an article.
///
/// `votes` and `total_votes` are a cached snapshot keyed by option index
/// (as strings, the way documents store map keys). The authoritative tally
/// always comes from the vote records.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Poll {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub question: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub expiration: Option<DateTime<Utc>>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub votes: BTreeMap<String, u64>,
    #[serde(default)]
    pub total_votes: u64,
}

fn enabled_by_default() -> bool {
    true
}

impl Poll {
    /// Build a poll from authoring input, dropping blank option labels.
    pub fn new(
        question: &str,
        options: &[&str],
        expiration: Option<DateTime<Utc>>,
        locked: bool,
    ) -> Result<Self, CustomError> {
        let poll = Poll {
            enabled: true,
            question: question.trim().to_string(),
            options: options
                .iter()
                .map(|o| o.trim())
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect(),
            expiration,
            locked,
            votes: BTreeMap::new(),
            total_votes: 0,
        };
        poll.validate()?;
        Ok(poll)
    }

    pub fn validate(&self) -> Result<(), CustomError> {
        if self.question.trim().is_empty() {
            return Err(CustomError::InvalidInputError(
                "Poll question cannot be empty".to_string(),
            ));
        }
        if self.options.len() < MIN_OPTIONS || self.options.len() > MAX_OPTIONS {
            return Err(CustomError::InvalidInputError(format!(
                "Poll must have between {} and {} options",
                MIN_OPTIONS, MAX_OPTIONS
            )));
        }
        if self.options.iter().any(|o| o.trim().is_empty()) {
            return Err(CustomError::InvalidInputError(
                "Poll options cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_some_and(|expiration| expiration < now)
    }
}

/// One user's vote on one article's poll.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PollVote {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub article_id: String,
    pub user_id: String,
    pub option_index: usize,
    pub voted_at: DateTime<Utc>,
}

impl PollVote {
    pub fn new(article_id: &str, user_id: &str, option_index: usize) -> Self {
        PollVote {
            id: vote_key(article_id, user_id),
            article_id: article_id.to_string(),
            user_id: user_id.to_string(),
            option_index,
            voted_at: Utc::now(),
        }
    }
}

/// Record key for a user's vote; at most one record per user per poll.
pub fn vote_key(article_id: &str, user_id: &str) -> String {
    format!("{}_{}", article_id, user_id)
}

#[derive(Deserialize)]
pub struct VoteRequest {
    pub option_index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn blank_options_are_dropped() {
        let poll = Poll::new(" Best drop? ", &["Vinyl", "  ", "Tape"], None, false).unwrap();
        assert_eq!(poll.question, "Best drop?");
        assert_eq!(poll.options, vec!["Vinyl".to_string(), "Tape".to_string()]);
    }

    #[test]
    fn option_count_is_bounded() {
        assert!(Poll::new("Q", &["only"], None, false).is_err());
        assert!(Poll::new("Q", &["a", "b", "c", "d", "e", "f"], None, false).is_err());
        assert!(Poll::new("Q", &["a", "b", "c", "d", "e"], None, false).is_ok());
        assert!(Poll::new("  ", &["a", "b"], None, false).is_err());
    }

    #[test]
    fn expiry_is_strictly_after_the_deadline() {
        let now = Utc::now();
        let poll = Poll::new("Q", &["a", "b"], Some(now), false).unwrap();
        assert!(!poll.is_expired(now));
        assert!(poll.is_expired(now + Duration::seconds(1)));

        let open = Poll::new("Q", &["a", "b"], None, false).unwrap();
        assert!(!open.is_expired(now + Duration::days(365)));
    }

    #[test]
    fn vote_key_combines_article_and_user() {
        assert_eq!(vote_key("a1", "u1"), "a1_u1");
        assert_eq!(PollVote::new("a1", "u1", 2).id, "a1_u1");
    }
}

use crate::poll::model::Poll;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Byline shown on an article page.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ArticleAuthor {
    pub id: String,
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub followers: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Article {
    #[serde(rename = "_id", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub header_image: String,
    #[serde(default)]
    pub author: ArticleAuthor,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub featured: bool,
    pub publish_date: DateTime<Utc>,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub poll: Option<Poll>,
}

impl Article {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// The poll, if one is attached and switched on.
    pub fn active_poll(&self) -> Option<&Poll> {
        self.poll.as_ref().filter(|poll| poll.enabled)
    }
}

#[derive(Deserialize)]
pub struct ArticleListQuery {
    #[serde(default)]
    pub tag: Option<String>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Profile of a signed-in user, stored under the user's uid.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub uid: String,
    pub display_name: String,
    pub username: String,
    #[serde(default)]
    pub photo_url: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_username_change: Option<DateTime<Utc>>,
}

/// Author identity captured on a comment at posting time.
///
/// It is never refreshed from the profile, so a comment keeps showing the
/// author as they were when it was written.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AuthorSnapshot {
    pub user_id: String,
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub verified: bool,
}

impl UserProfile {
    pub fn author_snapshot(&self) -> AuthorSnapshot {
        AuthorSnapshot {
            user_id: self.uid.clone(),
            name: self.display_name.clone(),
            username: self.username.clone(),
            avatar: self.photo_url.clone(),
            verified: self.verified,
        }
    }
}

/// One user following another, keyed `{follower_id}_{following_id}`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Follow {
    #[serde(rename = "_id")]
    pub id: String,
    pub follower_id: String,
    pub following_id: String,
    pub created_at: DateTime<Utc>,
}

pub fn follow_key(follower_id: &str, following_id: &str) -> String {
    format!("{}_{}", follower_id, following_id)
}

#[derive(Deserialize)]
pub struct UsernameRequest {
    pub username: String,
}

#[derive(Deserialize)]
pub struct FlagRequest {
    pub value: bool,
}

#[derive(Deserialize)]
pub struct FollowerCountRequest {
    pub count: u64,
}

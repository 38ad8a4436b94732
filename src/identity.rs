//! Who is acting, and whether they hold the admin capability.

use crate::user::model::UserProfile;
use std::collections::HashSet;

/// The acting user as seen by the engagement services.
pub trait Identity: Send + Sync {
    /// Id of the signed-in user, if any.
    fn current_user(&self) -> Option<&str>;

    /// Whether the acting user may perform privileged operations.
    fn is_admin(&self) -> bool;
}

/// Admin role resolution.
///
/// A user is an admin when listed in the configured allow-list or when their
/// profile carries the admin role. Built once at startup.
#[derive(Debug, Clone, Default)]
pub struct AdminRoster {
    allow_list: HashSet<String>,
}

impl AdminRoster {
    pub fn new<I, S>(user_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allow_list: user_ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_admin(&self, user_id: &str, profile: Option<&UserProfile>) -> bool {
        self.allow_list.contains(user_id) || profile.is_some_and(|p| p.is_admin)
    }
}

/// Identity of a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestIdentity {
    user_id: Option<String>,
    admin: bool,
}

impl RequestIdentity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            admin: false,
        }
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            admin: true,
        }
    }

    pub fn resolve(user_id: &str, roster: &AdminRoster, profile: Option<&UserProfile>) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            admin: roster.is_admin(user_id, profile),
        }
    }
}

impl Identity for RequestIdentity {
    fn current_user(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    fn is_admin(&self) -> bool {
        self.user_id.is_some() && self.admin
    }
}

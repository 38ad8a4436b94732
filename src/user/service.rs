use crate::database::{DocumentStore, StoreError, decode, encode};
use crate::identity::Identity;
use crate::user::model::{Follow, UserProfile, follow_key};
use crate::utils::error::CustomError;
use chrono::{Duration, Utc};
use log::{error, info};
use mongodb::bson::{self, Document, doc};
use std::sync::Arc;

pub const USERS: &str = "users";
pub const FOLLOWERS: &str = "followers";

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 20;
const USERNAME_COOLDOWN_DAYS: i64 = 14;

/// Lower-case a requested username and keep only `a-z`, `0-9` and `_`.
pub fn normalize_username(raw: &str) -> Result<String, CustomError> {
    let clean: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect();

    if clean.len() < USERNAME_MIN_LEN {
        return Err(CustomError::InvalidInputError(format!(
            "Username must be at least {} characters",
            USERNAME_MIN_LEN
        )));
    }
    if clean.len() > USERNAME_MAX_LEN {
        return Err(CustomError::InvalidInputError(format!(
            "Username must be {} characters or less",
            USERNAME_MAX_LEN
        )));
    }
    Ok(clean)
}

fn require_user(identity: &dyn Identity) -> Result<&str, CustomError> {
    identity
        .current_user()
        .ok_or_else(|| CustomError::UnauthenticatedError("Not authenticated".to_string()))
}

fn require_admin(identity: &dyn Identity) -> Result<&str, CustomError> {
    let user_id = require_user(identity)?;
    if !identity.is_admin() {
        return Err(CustomError::ForbiddenError(
            "Only admins can manage users".to_string(),
        ));
    }
    Ok(user_id)
}

fn now_as_bson() -> Result<bson::Bson, StoreError> {
    bson::to_bson(&Utc::now()).map_err(|e| StoreError::Malformed(e.to_string()))
}

pub struct UserService {
    store: Arc<dyn DocumentStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        UserService { store }
    }

    /// Look up a profile by uid
    pub async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, CustomError> {
        match self.store.get(USERS, uid).await? {
            Some(record) => Ok(Some(decode(record)?)),
            None => Ok(None),
        }
    }

    /// Create or replace a profile
    pub async fn save_profile(&self, profile: &UserProfile) -> Result<(), CustomError> {
        let record = encode(profile)?;
        self.store.upsert(USERS, &profile.uid, record).await?;
        Ok(())
    }

    /// Look up a profile by username, ignoring case
    pub async fn get_profile_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserProfile>, CustomError> {
        let username = username.trim().trim_start_matches('@').to_lowercase();
        match self
            .store
            .query(USERS, doc! { "username": username }, None)
            .await?
            .into_iter()
            .next()
        {
            Some(record) => Ok(Some(decode(record)?)),
            None => Ok(None),
        }
    }

    pub async fn is_username_available(&self, raw: &str) -> Result<bool, CustomError> {
        let username = normalize_username(raw)?;
        Ok(self.get_profile_by_username(&username).await?.is_none())
    }

    /// Rename the acting user, at most once per cooldown window
    pub async fn change_username(
        &self,
        identity: &dyn Identity,
        raw: &str,
    ) -> Result<String, CustomError> {
        let user_id = require_user(identity)?;
        let username = normalize_username(raw)?;

        let profile = self
            .get_profile(user_id)
            .await?
            .ok_or_else(|| CustomError::NotFoundError("Profile not found".to_string()))?;
        if profile.username == username {
            return Ok(username);
        }

        if let Some(changed_at) = profile.last_username_change
            && Utc::now() < changed_at + Duration::days(USERNAME_COOLDOWN_DAYS)
        {
            return Err(CustomError::InvalidInputError(format!(
                "Username can only be changed once every {} days",
                USERNAME_COOLDOWN_DAYS
            )));
        }

        if !self.is_username_available(&username).await? {
            return Err(CustomError::InvalidInputError(
                "Username is already taken".to_string(),
            ));
        }

        self.store
            .update(
                USERS,
                user_id,
                doc! { "username": username.clone(), "last_username_change": now_as_bson()? },
            )
            .await?;

        info!("User {} is now @{}", user_id, username);
        Ok(username)
    }

    pub async fn is_following(
        &self,
        follower_id: &str,
        following_id: &str,
    ) -> Result<bool, CustomError> {
        Ok(self
            .store
            .get(FOLLOWERS, &follow_key(follower_id, following_id))
            .await?
            .is_some())
    }

    /// Follow another user; `false` when already following
    ///
    /// The follow record and both counters are separate writes. When a
    /// counter update fails the earlier writes are undone before the error is
    /// returned.
    pub async fn follow_user(
        &self,
        identity: &dyn Identity,
        following_id: &str,
    ) -> Result<bool, CustomError> {
        let follower_id = require_user(identity)?;
        if follower_id == following_id {
            return Err(CustomError::InvalidInputError(
                "You cannot follow yourself".to_string(),
            ));
        }
        if self.get_profile(following_id).await?.is_none() {
            return Err(CustomError::NotFoundError("User not found".to_string()));
        }
        if self.get_profile(follower_id).await?.is_none() {
            return Err(CustomError::InvalidInputError(
                "Create a profile before following others".to_string(),
            ));
        }

        let key = follow_key(follower_id, following_id);
        if self.store.get(FOLLOWERS, &key).await?.is_some() {
            return Ok(false);
        }

        let follow = Follow {
            id: key.clone(),
            follower_id: follower_id.to_string(),
            following_id: following_id.to_string(),
            created_at: Utc::now(),
        };
        self.store.upsert(FOLLOWERS, &key, encode(&follow)?).await?;

        if let Err(e) = self.adjust_follow_counts(follower_id, following_id, 1).await {
            if let Err(undo) = self.store.delete(FOLLOWERS, &key).await {
                error!("Could not undo follow {}: {}", key, undo);
            }
            return Err(e);
        }

        info!("User {} followed {}", follower_id, following_id);
        Ok(true)
    }

    /// Stop following a user; `false` when not following
    pub async fn unfollow_user(
        &self,
        identity: &dyn Identity,
        following_id: &str,
    ) -> Result<bool, CustomError> {
        let follower_id = require_user(identity)?;
        let key = follow_key(follower_id, following_id);

        let Some(record) = self.store.get(FOLLOWERS, &key).await? else {
            return Ok(false);
        };
        self.store.delete(FOLLOWERS, &key).await?;

        if let Err(e) = self.adjust_follow_counts(follower_id, following_id, -1).await {
            if let Err(undo) = self.store.upsert(FOLLOWERS, &key, record).await {
                error!("Could not restore follow {}: {}", key, undo);
            }
            return Err(e);
        }

        info!("User {} unfollowed {}", follower_id, following_id);
        Ok(true)
    }

    async fn adjust_follow_counts(
        &self,
        follower_id: &str,
        following_id: &str,
        delta: i64,
    ) -> Result<(), CustomError> {
        self.store
            .increment_field(USERS, following_id, "followers", delta)
            .await?;

        if let Err(e) = self
            .store
            .increment_field(USERS, follower_id, "following", delta)
            .await
        {
            if let Err(undo) = self
                .store
                .increment_field(USERS, following_id, "followers", -delta)
                .await
            {
                error!("Could not undo follower count on {}: {}", following_id, undo);
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Grant or remove the verified badge (admins only)
    pub async fn set_verified(
        &self,
        identity: &dyn Identity,
        uid: &str,
        verified: bool,
    ) -> Result<(), CustomError> {
        self.admin_update(identity, uid, doc! { "verified": verified })
            .await
    }

    /// Grant or remove the admin role (admins only)
    pub async fn set_admin(
        &self,
        identity: &dyn Identity,
        uid: &str,
        is_admin: bool,
    ) -> Result<(), CustomError> {
        self.admin_update(identity, uid, doc! { "is_admin": is_admin })
            .await
    }

    /// Overwrite a follower count (admins only)
    pub async fn set_follower_count(
        &self,
        identity: &dyn Identity,
        uid: &str,
        count: u64,
    ) -> Result<(), CustomError> {
        let count = i64::try_from(count).map_err(|_| {
            CustomError::InvalidInputError("Follower count is too large".to_string())
        })?;
        self.admin_update(identity, uid, doc! { "followers": count })
            .await
    }

    async fn admin_update(
        &self,
        identity: &dyn Identity,
        uid: &str,
        fields: Document,
    ) -> Result<(), CustomError> {
        let admin_id = require_admin(identity)?;
        self.store.update(USERS, uid, fields.clone()).await?;
        info!("Admin {} updated user {}: {}", admin_id, uid, fields);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryStore, Operation};
    use crate::identity::RequestIdentity;

    fn profile(uid: &str, username: &str) -> UserProfile {
        UserProfile {
            uid: uid.to_string(),
            display_name: format!("User {uid}"),
            username: username.to_string(),
            ..Default::default()
        }
    }

    async fn setup(profiles: &[(&str, &str)]) -> (Arc<MemoryStore>, UserService) {
        let store = Arc::new(MemoryStore::new());
        let service = UserService::new(store.clone());
        for (uid, username) in profiles {
            service.save_profile(&profile(uid, username)).await.unwrap();
        }
        (store, service)
    }

    async fn counts(service: &UserService, uid: &str) -> (u64, u64) {
        let profile = service.get_profile(uid).await.unwrap().unwrap();
        (profile.followers, profile.following)
    }

    #[tokio::test]
    async fn saved_profiles_read_back() {
        let service = UserService::new(Arc::new(MemoryStore::new()));
        let profile = UserProfile {
            uid: "u1".to_string(),
            display_name: "Dana Reyes".to_string(),
            username: "dana".to_string(),
            photo_url: "https://cdn.example/dana.png".to_string(),
            verified: true,
            ..Default::default()
        };

        service.save_profile(&profile).await.unwrap();

        assert_eq!(service.get_profile("u1").await.unwrap(), Some(profile));
        assert_eq!(service.get_profile("u2").await.unwrap(), None);
    }

    #[test]
    fn usernames_are_cleaned_and_bounded() {
        assert_eq!(normalize_username("  Dana.Reyes! ").unwrap(), "danareyes");
        assert_eq!(normalize_username("dj_42").unwrap(), "dj_42");
        assert!(matches!(
            normalize_username("a!"),
            Err(CustomError::InvalidInputError(_))
        ));
        assert!(matches!(
            normalize_username(&"x".repeat(21)),
            Err(CustomError::InvalidInputError(_))
        ));
    }

    #[tokio::test]
    async fn profiles_are_found_by_username_ignoring_case() {
        let (_, service) = setup(&[("u1", "dana")]).await;

        let found = service.get_profile_by_username("@Dana").await.unwrap();
        assert_eq!(found.map(|p| p.uid), Some("u1".to_string()));
        assert!(service.get_profile_by_username("nobody").await.unwrap().is_none());

        assert!(!service.is_username_available("DANA").await.unwrap());
        assert!(service.is_username_available("dana_2").await.unwrap());
    }

    #[tokio::test]
    async fn username_changes_respect_taken_names_and_cooldown() {
        let (_, service) = setup(&[("u1", "dana"), ("u2", "sam")]).await;
        let identity = RequestIdentity::user("u1");

        let err = service.change_username(&identity, "Sam").await.unwrap_err();
        assert!(matches!(err, CustomError::InvalidInputError(_)));

        assert_eq!(
            service.change_username(&identity, "Dana_R").await.unwrap(),
            "dana_r"
        );
        assert_eq!(
            service.get_profile("u1").await.unwrap().unwrap().username,
            "dana_r"
        );

        let err = service.change_username(&identity, "dana_again").await.unwrap_err();
        assert!(matches!(err, CustomError::InvalidInputError(_)));

        let err = service
            .change_username(&RequestIdentity::anonymous(), "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, CustomError::UnauthenticatedError(_)));
    }

    #[tokio::test]
    async fn follow_and_unfollow_move_both_counters() {
        let (_, service) = setup(&[("u1", "dana"), ("u2", "sam")]).await;
        let identity = RequestIdentity::user("u1");

        assert!(service.follow_user(&identity, "u2").await.unwrap());
        assert!(!service.follow_user(&identity, "u2").await.unwrap());
        assert!(service.is_following("u1", "u2").await.unwrap());
        assert!(!service.is_following("u2", "u1").await.unwrap());
        assert_eq!(counts(&service, "u2").await, (1, 0));
        assert_eq!(counts(&service, "u1").await, (0, 1));

        assert!(service.unfollow_user(&identity, "u2").await.unwrap());
        assert!(!service.unfollow_user(&identity, "u2").await.unwrap());
        assert!(!service.is_following("u1", "u2").await.unwrap());
        assert_eq!(counts(&service, "u2").await, (0, 0));
        assert_eq!(counts(&service, "u1").await, (0, 0));
    }

    #[tokio::test]
    async fn bad_follow_requests_are_refused() {
        let (_, service) = setup(&[("u1", "dana")]).await;

        let err = service
            .follow_user(&RequestIdentity::user("u1"), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, CustomError::InvalidInputError(_)));

        let err = service
            .follow_user(&RequestIdentity::user("u1"), "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, CustomError::NotFoundError(_)));

        let err = service
            .follow_user(&RequestIdentity::anonymous(), "u1")
            .await
            .unwrap_err();
        assert!(matches!(err, CustomError::UnauthenticatedError(_)));
    }

    #[tokio::test]
    async fn follower_counts_survive_any_single_failed_write() {
        let (store, service) = setup(&[("u1", "dana"), ("u2", "sam")]).await;
        let identity = RequestIdentity::user("u1");

        for operation in Operation::ALL {
            for follow in [true, false] {
                store.fail_operation(operation, true);
                let _ = if follow {
                    service.follow_user(&identity, "u2").await
                } else {
                    service.unfollow_user(&identity, "u2").await
                };
                store.fail_operation(operation, false);

                let edges = u64::from(service.is_following("u1", "u2").await.unwrap());
                assert_eq!(
                    counts(&service, "u2").await.0,
                    edges,
                    "followers drifted while {:?} was failing",
                    operation
                );
                assert_eq!(
                    counts(&service, "u1").await.1,
                    edges,
                    "following drifted while {:?} was failing",
                    operation
                );
            }
        }
    }

    #[tokio::test]
    async fn only_admins_manage_users() {
        let (_, service) = setup(&[("u1", "dana")]).await;

        let err = service
            .set_verified(&RequestIdentity::user("u2"), "u1", true)
            .await
            .unwrap_err();
        assert!(matches!(err, CustomError::ForbiddenError(_)));

        let admin = RequestIdentity::admin("root");
        service.set_verified(&admin, "u1", true).await.unwrap();
        service.set_admin(&admin, "u1", true).await.unwrap();
        service.set_follower_count(&admin, "u1", 1200).await.unwrap();

        let updated = service.get_profile("u1").await.unwrap().unwrap();
        assert!(updated.verified);
        assert!(updated.author_snapshot().verified);
        assert!(updated.is_admin);
        assert_eq!(updated.followers, 1200);

        let err = service.set_verified(&admin, "ghost", true).await.unwrap_err();
        assert!(matches!(err, CustomError::NotFoundError(_)));
    }
}

use crate::comment::model::Comment;
use crate::database::{DocumentStore, SetChange, SortBy, decode, encode};
use crate::identity::Identity;
use crate::user::model::AuthorSnapshot;
use crate::utils::error::CustomError;
use chrono::Utc;
use log::{debug, info};
use mongodb::bson::doc;
use std::sync::Arc;

pub const COMMENTS: &str = "comments";

pub struct CommentService {
    store: Arc<dyn DocumentStore>,
}

impl CommentService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        CommentService { store }
    }

    /// Add a new comment, or a reply when `parent_id` is set
    ///
    /// Replies may only target a top-level comment on the same article.
    pub async fn submit_comment(
        &self,
        identity: &dyn Identity,
        article_id: &str,
        author: AuthorSnapshot,
        body: &str,
        parent_id: Option<&str>,
    ) -> Result<String, CustomError> {
        let user_id = identity
            .current_user()
            .ok_or_else(|| CustomError::UnauthenticatedError("Not authenticated".to_string()))?;

        if author.user_id != user_id {
            return Err(CustomError::InvalidInputError(
                "Comment author must be the signed-in user".to_string(),
            ));
        }

        let content = body.trim();
        if content.is_empty() {
            return Err(CustomError::InvalidInputError(
                "Comment content cannot be empty".to_string(),
            ));
        }

        if let Some(parent_id) = parent_id {
            let parent = self
                .get_comment(parent_id)
                .await?
                .ok_or_else(|| CustomError::NotFoundError("Parent comment not found".to_string()))?;

            if parent.article_id != article_id {
                return Err(CustomError::InvalidInputError(
                    "Parent comment belongs to another article".to_string(),
                ));
            }
            if !parent.is_top_level() {
                return Err(CustomError::InvalidInputError(
                    "Replies can only be added to top-level comments".to_string(),
                ));
            }
        }

        let comment = Comment {
            id: String::new(),
            article_id: article_id.to_string(),
            author,
            content: content.to_string(),
            parent_id: parent_id.map(str::to_string),
            likes: 0,
            liked_by: Vec::new(),
            pinned: false,
            created_at: Utc::now(),
        };

        let comment_id = self.store.create(COMMENTS, encode(&comment)?).await?;
        info!(
            "Comment {} added to article {} by {}",
            comment_id, article_id, user_id
        );
        Ok(comment_id)
    }

    /// Get all comments for an article, newest first
    pub async fn list_comments(&self, article_id: &str) -> Result<Vec<Comment>, CustomError> {
        let records = self
            .store
            .query(
                COMMENTS,
                doc! { "article_id": article_id },
                Some(SortBy::descending("created_at")),
            )
            .await?;

        let mut comments = records
            .into_iter()
            .map(|record| decode(record).map_err(CustomError::from))
            .collect::<Result<Vec<Comment>, CustomError>>()?;
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(comments)
    }

    /// Get a single comment by ID
    pub async fn get_comment(&self, comment_id: &str) -> Result<Option<Comment>, CustomError> {
        match self.store.get(COMMENTS, comment_id).await? {
            Some(record) => Ok(Some(decode(record)?)),
            None => Ok(None),
        }
    }

    /// Like the comment, or take the like back if the acting user already liked it
    ///
    /// The like set and the counter change in one store write, and only when
    /// the membership actually changed, so a retried request cannot count twice.
    pub async fn toggle_like(
        &self,
        identity: &dyn Identity,
        comment: &Comment,
    ) -> Result<(), CustomError> {
        let user_id = identity
            .current_user()
            .ok_or_else(|| CustomError::UnauthenticatedError("Not authenticated".to_string()))?;

        let change = if comment.is_liked_by(user_id) {
            SetChange::Remove
        } else {
            SetChange::Add
        };

        let changed = self
            .store
            .change_counted_set(
                COMMENTS,
                &comment.id,
                "liked_by",
                "likes",
                user_id.into(),
                change,
            )
            .await?;

        debug!(
            "User {} {} comment {} (changed: {})",
            user_id,
            if change == SetChange::Add { "liked" } else { "unliked" },
            comment.id,
            changed
        );
        Ok(())
    }

    /// Pin or unpin a comment (admins only)
    pub async fn toggle_pin(
        &self,
        identity: &dyn Identity,
        comment: &Comment,
    ) -> Result<(), CustomError> {
        let user_id = identity
            .current_user()
            .ok_or_else(|| CustomError::UnauthenticatedError("Not authenticated".to_string()))?;

        if !identity.is_admin() {
            return Err(CustomError::ForbiddenError(
                "Only admins can pin comments".to_string(),
            ));
        }

        self.store
            .update(COMMENTS, &comment.id, doc! { "pinned": !comment.pinned })
            .await?;

        info!(
            "Comment {} {} by {}",
            comment.id,
            if comment.pinned { "unpinned" } else { "pinned" },
            user_id
        );
        Ok(())
    }
}

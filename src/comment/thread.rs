//! Threaded view of an article's comments.

use crate::comment::model::Comment;
use serde::Serialize;

/// A top-level comment with its direct replies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thread {
    pub comment: Comment,
    pub replies: Vec<Comment>,
}

/// Arrange a flat comment list into display order.
///
/// Top-level comments come pinned first, then newest first. Replies under
/// each read oldest first. Both sorts are stable, so equal timestamps keep
/// the order of `comments`. Only direct replies of a top-level comment are
/// included; deeper chains are not rendered.
pub fn build_threads(comments: &[Comment]) -> Vec<Thread> {
    let mut top_level: Vec<&Comment> = comments.iter().filter(|c| c.is_top_level()).collect();
    top_level.sort_by(|a, b| {
        b.pinned
            .cmp(&a.pinned)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });

    top_level
        .into_iter()
        .map(|comment| Thread {
            comment: comment.clone(),
            replies: replies_of(comments, &comment.id),
        })
        .collect()
}

fn replies_of(comments: &[Comment], parent_id: &str) -> Vec<Comment> {
    let mut replies: Vec<Comment> = comments
        .iter()
        .filter(|c| c.parent_id.as_deref() == Some(parent_id))
        .cloned()
        .collect();
    replies.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    replies
}

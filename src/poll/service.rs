use crate::article::service::ArticleService;
use crate::database::{DocumentStore, decode, encode};
use crate::identity::Identity;
use crate::poll::model::{Poll, PollVote, vote_key};
use crate::poll::tally::{Tally, current_tally};
use crate::utils::error::CustomError;
use chrono::Utc;
use log::info;
use mongodb::bson::doc;
use std::sync::Arc;

pub const POLL_VOTES: &str = "poll_votes";

pub struct PollService {
    store: Arc<dyn DocumentStore>,
    articles: ArticleService,
}

impl PollService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let articles = ArticleService::new(store.clone());
        PollService { store, articles }
    }

    /// The active poll on an article
    pub async fn get_poll(&self, article_id: &str) -> Result<Poll, CustomError> {
        let article = self.articles.get_article(article_id).await?;
        article
            .active_poll()
            .cloned()
            .ok_or_else(|| CustomError::NotFoundError("Article has no poll".to_string()))
    }

    /// The persisted vote of one user, if any
    pub async fn get_user_vote(
        &self,
        article_id: &str,
        user_id: &str,
    ) -> Result<Option<PollVote>, CustomError> {
        match self
            .store
            .get(POLL_VOTES, &vote_key(article_id, user_id))
            .await?
        {
            Some(record) => Ok(Some(decode(record)?)),
            None => Ok(None),
        }
    }

    /// Every vote record for an article's poll
    pub async fn list_votes(&self, article_id: &str) -> Result<Vec<PollVote>, CustomError> {
        let records = self
            .store
            .query(POLL_VOTES, doc! { "article_id": article_id }, None)
            .await?;

        records
            .into_iter()
            .map(|record| decode(record).map_err(CustomError::from))
            .collect()
    }

    /// Authoritative tally recounted from the vote records
    pub async fn tally(&self, article_id: &str) -> Result<Tally, CustomError> {
        Ok(current_tally(&self.list_votes(article_id).await?))
    }

    /// Record the acting user's choice, replacing any earlier vote
    ///
    /// A locked poll refuses a new choice once a vote for this user is
    /// persisted; before the first vote the lock does not apply. An expired
    /// poll refuses every vote.
    pub async fn cast_vote(
        &self,
        identity: &dyn Identity,
        article_id: &str,
        option_index: usize,
    ) -> Result<(), CustomError> {
        let user_id = identity
            .current_user()
            .ok_or_else(|| CustomError::UnauthenticatedError("Sign in to vote".to_string()))?;

        let poll = self.get_poll(article_id).await?;

        if option_index >= poll.options.len() {
            return Err(CustomError::InvalidInputError(format!(
                "Option {} does not exist, poll has {} options",
                option_index,
                poll.options.len()
            )));
        }

        if poll.is_expired(Utc::now()) {
            return Err(CustomError::PollClosedError("Poll has ended".to_string()));
        }

        if poll.locked && self.get_user_vote(article_id, user_id).await?.is_some() {
            return Err(CustomError::PollClosedError(
                "Poll is locked after voting".to_string(),
            ));
        }

        let vote = PollVote::new(article_id, user_id, option_index);
        self.store
            .upsert(POLL_VOTES, &vote.id, encode(&vote)?)
            .await?;

        info!(
            "User {} voted option {} on article {}",
            user_id, option_index, article_id
        );
        Ok(())
    }
}

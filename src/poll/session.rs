//! One viewer's view of one poll.
//!
//! The session starts from the snapshot cached on the poll, shows a local
//! guess right after a successful vote, and is brought back in line with
//! the vote records on every reload.

use crate::poll::model::{Poll, PollVote};
use crate::poll::tally::{
    Tally, apply_optimistic_delta, current_tally, is_closed, reconcile_with_authoritative,
    show_results,
};
use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum PollState {
    NotVoted,
    Voted { option_index: usize },
    /// Past expiry; view only, whatever the viewer did before.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionView {
    pub label: String,
    pub votes: Option<u64>,
    pub percentage: Option<u8>,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollView {
    pub question: String,
    pub options: Vec<OptionView>,
    pub total_votes: Option<u64>,
    pub state: PollState,
    pub voted: Option<usize>,
    pub can_vote: bool,
    pub show_results: bool,
    pub locked: bool,
    pub expiration: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct PollSession {
    poll: Poll,
    authenticated: bool,
    voted: Option<usize>,
    tally: Tally,
}

impl PollSession {
    pub fn new(poll: Poll, authenticated: bool) -> Self {
        let tally = Tally::from_snapshot(&poll.votes).zero_filled(poll.options.len());
        PollSession {
            poll,
            authenticated,
            voted: None,
            tally,
        }
    }

    pub fn poll(&self) -> &Poll {
        &self.poll
    }

    pub fn voted(&self) -> Option<usize> {
        self.voted
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    /// Replace local state with the recount and the viewer's persisted vote.
    ///
    /// Returns whether the local tally had drifted from the records.
    pub fn reload(&mut self, votes: &[PollVote], own_vote: Option<&PollVote>) -> bool {
        let reconciled =
            reconcile_with_authoritative(&self.tally, current_tally(votes), self.poll.options.len());
        if reconciled.diverged {
            debug!(
                "Poll tally drifted from the records: local {:?}, recount {:?}",
                self.tally.counts, reconciled.tally.counts
            );
        }
        self.tally = reconciled.tally;
        self.voted = own_vote.map(|vote| vote.option_index);
        reconciled.diverged
    }

    /// Show the vote right away, ahead of the next reload.
    pub fn record_vote(&mut self, option_index: usize) {
        self.tally = apply_optimistic_delta(&self.tally, self.voted, option_index);
        self.voted = Some(option_index);
    }

    pub fn state(&self, now: DateTime<Utc>) -> PollState {
        if self.poll.is_expired(now) {
            return PollState::Closed;
        }
        match self.voted {
            Some(option_index) => PollState::Voted { option_index },
            None => PollState::NotVoted,
        }
    }

    pub fn can_vote(&self, now: DateTime<Utc>) -> bool {
        self.authenticated && !is_closed(&self.poll, self.voted.is_some(), now)
    }

    pub fn show_results(&self, now: DateTime<Utc>) -> bool {
        show_results(
            self.voted.is_some(),
            self.poll.is_expired(now),
            self.authenticated,
        )
    }

    /// What the viewer gets to see. Counts stay hidden until results are
    /// visible.
    pub fn view(&self, now: DateTime<Utc>) -> PollView {
        let visible = self.show_results(now);
        let options = self
            .poll
            .options
            .iter()
            .enumerate()
            .map(|(index, label)| OptionView {
                label: label.clone(),
                votes: visible.then(|| self.tally.count(index)),
                percentage: visible.then(|| self.tally.percentage(index)),
                selected: self.voted == Some(index),
            })
            .collect();

        PollView {
            question: self.poll.question.clone(),
            options,
            total_votes: visible.then_some(self.tally.total),
            state: self.state(now),
            voted: self.voted,
            can_vote: self.can_vote(now),
            show_results: visible,
            locked: self.poll.locked,
            expiration: self.poll.expiration,
        }
    }
}

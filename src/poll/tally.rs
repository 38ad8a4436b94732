//! Vote counting and the rules deciding who may vote and who sees results.

use crate::poll::model::{Poll, PollVote};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Per-option vote counts plus their sum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub counts: BTreeMap<usize, u64>,
    pub total: u64,
}

impl Tally {
    fn from_counts(counts: BTreeMap<usize, u64>) -> Self {
        let total = counts.values().sum();
        Tally { counts, total }
    }

    /// Tally from the snapshot cached on the poll. Keys that are not option
    /// indices are ignored and the total is recomputed.
    pub fn from_snapshot(votes: &BTreeMap<String, u64>) -> Self {
        let counts = votes
            .iter()
            .filter_map(|(key, count)| key.parse::<usize>().ok().map(|index| (index, *count)))
            .collect();
        Self::from_counts(counts)
    }

    pub fn count(&self, option_index: usize) -> u64 {
        self.counts.get(&option_index).copied().unwrap_or(0)
    }

    /// Add an explicit zero for every option index without votes.
    pub fn zero_filled(mut self, option_count: usize) -> Self {
        for index in 0..option_count {
            self.counts.entry(index).or_insert(0);
        }
        self
    }

    pub fn percentage(&self, option_index: usize) -> u8 {
        percentage(self.count(option_index), self.total)
    }
}

/// Count votes per option.
///
/// Records that share a vote key count once, the later record winning, so a
/// revote retracts the earlier choice even if both records are present.
pub fn current_tally(votes: &[PollVote]) -> Tally {
    let mut latest: HashMap<(&str, &str), usize> = HashMap::new();
    for vote in votes {
        latest.insert(
            (vote.article_id.as_str(), vote.user_id.as_str()),
            vote.option_index,
        );
    }

    let mut counts = BTreeMap::new();
    for option_index in latest.into_values() {
        *counts.entry(option_index).or_insert(0) += 1;
    }
    Tally::from_counts(counts)
}

/// Whole-number share of `count` in `total`, halves rounded up.
///
/// Each option is rounded on its own, so shares across a poll need not add
/// up to exactly 100.
pub fn percentage(count: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let share = (u128::from(count) * 200 + u128::from(total)) / (u128::from(total) * 2);
    share.min(100) as u8
}

/// Local guess at the tally right after a successful vote.
pub fn apply_optimistic_delta(tally: &Tally, previous: Option<usize>, chosen: usize) -> Tally {
    let mut counts = tally.counts.clone();
    if let Some(previous) = previous {
        let count = counts.entry(previous).or_insert(0);
        *count = count.saturating_sub(1);
    }
    *counts.entry(chosen).or_insert(0) += 1;
    Tally::from_counts(counts)
}

/// Outcome of replacing a local guess with a recount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub tally: Tally,
    /// The guess disagreed with the recount, e.g. after a write that failed
    /// quietly or votes cast by others in the meantime.
    pub diverged: bool,
}

/// The recount always wins; the guess is only compared against it.
pub fn reconcile_with_authoritative(
    optimistic: &Tally,
    authoritative: Tally,
    option_count: usize,
) -> Reconciled {
    let tally = authoritative.zero_filled(option_count);
    let diverged = optimistic.clone().zero_filled(option_count) != tally;
    Reconciled { tally, diverged }
}

/// Closed for new choices: locked after this viewer voted, or past expiry.
pub fn is_closed(poll: &Poll, has_voted: bool, now: DateTime<Utc>) -> bool {
    (poll.locked && has_voted) || poll.is_expired(now)
}

/// Results are visible after voting, after expiry, or to anonymous viewers.
pub fn show_results(has_voted: bool, expired: bool, authenticated: bool) -> bool {
    has_voted || expired || !authenticated
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn vote(user: &str, option_index: usize) -> PollVote {
        PollVote::new("a1", user, option_index)
    }

    fn tally(pairs: &[(usize, u64)]) -> Tally {
        Tally::from_counts(pairs.iter().copied().collect())
    }

    #[test]
    fn counts_votes_per_option() {
        let result = current_tally(&[vote("u1", 0), vote("u2", 1), vote("u3", 1)]);
        assert_eq!(result.count(0), 1);
        assert_eq!(result.count(1), 2);
        assert_eq!(result.total, 3);
    }

    #[test]
    fn revote_retracts_the_earlier_choice() {
        let result = current_tally(&[vote("u1", 0), vote("u2", 1), vote("u1", 1)]);
        assert_eq!(result.count(0), 0);
        assert_eq!(result.count(1), 2);
        assert_eq!(result.total, 2);
    }

    #[test]
    fn only_observed_options_until_zero_filled() {
        let result = current_tally(&[vote("u1", 2)]);
        assert_eq!(result.counts.len(), 1);

        let filled = result.zero_filled(4);
        assert_eq!(filled.counts.len(), 4);
        assert_eq!(filled.count(0), 0);
        assert_eq!(filled.count(2), 1);
        assert_eq!(filled.total, 1);
    }

    #[test]
    fn percentage_of_nothing_is_zero() {
        for count in [0, 1, 7, u64::MAX] {
            assert_eq!(percentage(count, 0), 0);
        }
    }

    #[test]
    fn percentages_round_half_up_independently() {
        assert_eq!(percentage(1, 2), 50);
        assert_eq!(percentage(1, 8), 13); // 12.5
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(3, 3), 100);

        // Three-way split: 33 + 33 + 33 = 99, accepted.
        let split = tally(&[(0, 1), (1, 1), (2, 1)]);
        let sum: u32 = (0..3).map(|i| u32::from(split.percentage(i))).sum();
        assert_eq!(sum, 99);
    }

    #[test]
    fn snapshot_ignores_junk_keys() {
        let snapshot: BTreeMap<String, u64> = [
            ("0".to_string(), 4),
            ("1".to_string(), 6),
            ("other".to_string(), 99),
        ]
        .into_iter()
        .collect();

        let result = Tally::from_snapshot(&snapshot);
        assert_eq!(result.count(0), 4);
        assert_eq!(result.count(1), 6);
        assert_eq!(result.total, 10);
    }

    #[test]
    fn optimistic_delta_moves_one_vote() {
        let before = tally(&[(0, 3), (1, 1)]);

        let first = apply_optimistic_delta(&before, None, 1);
        assert_eq!(first, tally(&[(0, 3), (1, 2)]));

        let moved = apply_optimistic_delta(&first, Some(1), 0);
        assert_eq!(moved, tally(&[(0, 4), (1, 1)]));
        assert_eq!(moved.total, 5);
    }

    #[test]
    fn optimistic_delta_never_goes_negative() {
        let empty = Tally::default();
        let result = apply_optimistic_delta(&empty, Some(0), 1);
        assert_eq!(result.count(0), 0);
        assert_eq!(result.count(1), 1);
        assert_eq!(result.total, 1);
    }

    #[test]
    fn recount_replaces_the_guess() {
        let guess = tally(&[(0, 1)]);

        let agreed = reconcile_with_authoritative(&guess, tally(&[(0, 1)]), 2);
        assert!(!agreed.diverged);
        assert_eq!(agreed.tally, tally(&[(0, 1), (1, 0)]));

        let lost_write = reconcile_with_authoritative(&guess, Tally::default(), 2);
        assert!(lost_write.diverged);
        assert_eq!(lost_write.tally.total, 0);
    }

    #[test]
    fn closed_when_locked_and_voted_or_expired() {
        let now = Utc::now();
        let mut poll = Poll::new("Q", &["Yes", "No"], None, true).unwrap();

        assert!(!is_closed(&poll, false, now));
        assert!(is_closed(&poll, true, now));

        poll.locked = false;
        assert!(!is_closed(&poll, true, now));

        poll.expiration = Some(now - Duration::minutes(1));
        assert!(is_closed(&poll, false, now));
    }

    #[test]
    fn results_hidden_only_from_signed_in_non_voters() {
        assert!(!show_results(false, false, true));
        assert!(show_results(true, false, true));
        assert!(show_results(false, true, true));
        assert!(show_results(false, false, false));
    }
}

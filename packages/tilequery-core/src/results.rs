//! Distance-ranked candidate accumulation with optional dedupe.
//!
//! Ranking is by ascending distance. Ties keep the order in which candidates
//! were offered. With dedupe enabled a key is held at most once, and a later
//! instance only replaces it when strictly closer.
//!
//! Dedupe picks the closest instance of a key before the attribute filter
//! runs, so an instance that fails the filter can still shadow a farther one
//! that passes. Without a filter (or without dedupe) that never matters and
//! the set stays bounded to `limit`, dropping anything not strictly closer than
//! the current worst. With both, the closest instance of every key is kept
//! and the filter and limit are applied on output.

use std::collections::HashMap;

use crate::dedupe::DedupeKey;
use crate::models::{Candidate, QueryOptions};

#[derive(Debug)]
struct Ranked {
    key: Option<DedupeKey>,
    candidate: Candidate,
}

#[derive(Debug)]
struct Winner {
    seq: u64,
    passes: bool,
    candidate: Candidate,
}

#[derive(Debug)]
enum Store {
    /// Sorted and bounded; every entry passed the filter.
    Ranked(Vec<Ranked>),
    /// Closest instance per key, whether or not it passed the filter.
    Winners { next_seq: u64, by_key: HashMap<DedupeKey, Winner> },
}

#[derive(Debug)]
pub struct ResultSet {
    limit: usize,
    dedupe: bool,
    store: Store,
}

impl ResultSet {
    /// A bounded set for candidates that all passed filtering.
    pub fn new(limit: usize, dedupe: bool) -> Self {
        Self {
            limit,
            dedupe,
            store: Store::Ranked(Vec::with_capacity(limit.min(1024))),
        }
    }

    /// A set whose candidates are filtered after dedupe.
    pub fn with_filter(limit: usize, dedupe: bool) -> Self {
        if !dedupe {
            return Self::new(limit, dedupe);
        }
        Self {
            limit,
            dedupe,
            store: Store::Winners {
                next_seq: 0,
                by_key: HashMap::new(),
            },
        }
    }

    pub fn for_options(options: &QueryOptions) -> Self {
        match options.basic_filters {
            Some(_) => Self::with_filter(options.limit, options.dedupe),
            None => Self::new(options.limit, options.dedupe),
        }
    }

    /// Candidates currently held, including ones kept only for dedupe.
    pub fn len(&self) -> usize {
        match &self.store {
            Store::Ranked(entries) => entries.len(),
            Store::Winners { by_key, .. } => by_key.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether candidates failing the filter still have to be offered.
    pub fn keeps_rejected(&self) -> bool {
        matches!(self.store, Store::Winners { .. })
    }

    /// Whether a candidate at `distance` could still make the cut.
    ///
    /// Lets callers skip building properties for features that would be
    /// dropped anyway.
    pub fn admits(&self, distance: f64) -> bool {
        if self.limit == 0 {
            return false;
        }
        match &self.store {
            Store::Ranked(entries) => match entries.last() {
                Some(worst) if entries.len() >= self.limit => distance < worst.candidate.distance,
                _ => true,
            },
            Store::Winners { .. } => true,
        }
    }

    /// Offer a candidate that passed filtering. Returns whether it is now held.
    pub fn insert(&mut self, candidate: Candidate) -> bool {
        self.offer(candidate, true)
    }

    /// Offer a candidate along with its filter outcome.
    pub fn offer(&mut self, candidate: Candidate, passes: bool) -> bool {
        if !self.admits(candidate.distance) {
            return false;
        }

        let limit = self.limit;
        let dedupe = self.dedupe;
        match &mut self.store {
            Store::Ranked(entries) => {
                if !passes {
                    return false;
                }
                let key = if dedupe {
                    let key = DedupeKey::from_candidate(&candidate);
                    if let Some(pos) = entries.iter().position(|e| e.key.as_ref() == Some(&key)) {
                        if candidate.distance >= entries[pos].candidate.distance {
                            return false;
                        }
                        entries.remove(pos);
                    }
                    Some(key)
                } else {
                    None
                };

                let distance = candidate.distance;
                let at = entries.partition_point(|e| e.candidate.distance <= distance);
                entries.insert(at, Ranked { key, candidate });
                entries.truncate(limit);
                true
            }
            Store::Winners { next_seq, by_key } => {
                let key = DedupeKey::from_candidate(&candidate);
                if let Some(held) = by_key.get(&key) {
                    if candidate.distance >= held.candidate.distance {
                        return false;
                    }
                }
                let seq = *next_seq;
                *next_seq += 1;
                by_key.insert(
                    key,
                    Winner {
                        seq,
                        passes,
                        candidate,
                    },
                );
                true
            }
        }
    }

    /// Merge another set's entries in their ranked order.
    pub fn extend(&mut self, other: ResultSet) {
        for (candidate, passes) in other.into_ranked() {
            self.offer(candidate, passes);
        }
    }

    // Every held candidate with its filter outcome, in rank order.
    fn into_ranked(self) -> Vec<(Candidate, bool)> {
        match self.store {
            Store::Ranked(entries) => entries.into_iter().map(|e| (e.candidate, true)).collect(),
            Store::Winners { by_key, .. } => {
                let mut winners: Vec<Winner> = by_key.into_values().collect();
                winners.sort_by(|a, b| {
                    a.candidate
                        .distance
                        .total_cmp(&b.candidate.distance)
                        .then(a.seq.cmp(&b.seq))
                });
                winners.into_iter().map(|w| (w.candidate, w.passes)).collect()
            }
        }
    }

    /// The final ranking: passing candidates only, at most `limit` of them.
    pub fn into_vec(self) -> Vec<Candidate> {
        let limit = self.limit;
        self.into_ranked()
            .into_iter()
            .filter(|(_, passes)| *passes)
            .map(|(candidate, _)| candidate)
            .take(limit)
            .collect()
    }
}

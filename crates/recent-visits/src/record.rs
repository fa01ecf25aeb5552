//! Per-user visit storage
//!
//! A [`UserRecord`] is an unordered, capacity-bounded collection of visits.
//! Removal uses swap-and-pop, so positional order inside the record carries
//! no meaning until [`UserRecord::sort_by_recency`] is called.

use tracing::debug;

use crate::error::StorageError;
use crate::visit::Visit;

/// The bounded visit history of one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    user_id: u32,
    visits: Vec<Visit>,
}

impl UserRecord {
    /// Create an empty record
    pub fn new(user_id: u32) -> Self {
        Self {
            user_id,
            visits: Vec::new(),
        }
    }

    /// Create an empty record with room for `capacity` visits
    pub fn with_capacity(user_id: u32, capacity: usize) -> Result<Self, StorageError> {
        let mut visits = Vec::new();
        visits.try_reserve_exact(capacity)?;
        Ok(Self { user_id, visits })
    }

    /// The owning user
    pub fn user_id(&self) -> u32 {
        self.user_id
    }

    /// Number of stored visits
    pub fn len(&self) -> usize {
        self.visits.len()
    }

    /// Whether the record holds no visits
    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }

    /// Stored visits in their current positional order
    pub fn visits(&self) -> &[Visit] {
        &self.visits
    }

    /// Whether a visit with this id is stored
    pub fn contains(&self, visit_id: u32) -> bool {
        self.position(visit_id).is_some()
    }

    fn position(&self, visit_id: u32) -> Option<usize> {
        self.visits.iter().position(|v| v.visit_id == visit_id)
    }

    /// Index of the oldest visit by `(seconds, nanos)`
    ///
    /// Ties keep the first candidate encountered since only a strictly older
    /// timestamp replaces the current minimum.
    pub fn oldest_index(&self) -> Option<usize> {
        let mut iter = self.visits.iter().enumerate();
        let (mut oldest_idx, first) = iter.next()?;
        let mut oldest = first.timestamp;
        for (idx, visit) in iter {
            if visit.timestamp < oldest {
                oldest_idx = idx;
                oldest = visit.timestamp;
            }
        }
        Some(oldest_idx)
    }

    /// Insert a visit, evicting the oldest one first if the record is full
    ///
    /// The caller must have checked that `visit.visit_id` is not already
    /// present. Returns the evicted visit, if any. On allocation failure the
    /// record is left untouched.
    pub fn insert_bounded(
        &mut self,
        visit: Visit,
        max_visits: usize,
    ) -> Result<Option<Visit>, StorageError> {
        if self.visits.len() < max_visits {
            self.visits.try_reserve(1)?;
            self.visits.push(visit);
            return Ok(None);
        }

        let mut evicted = None;
        while self.visits.len() >= max_visits {
            let Some(idx) = self.oldest_index() else {
                break;
            };
            let removed = self.visits.swap_remove(idx);
            debug!(
                user_id = self.user_id,
                visit_id = removed.visit_id,
                "Evicted oldest visit to stay within capacity"
            );
            evicted = Some(removed);
        }
        // Eviction freed a slot, so this push never reallocates.
        self.visits.push(visit);
        Ok(evicted)
    }

    /// Append a visit without any capacity or duplicate checks
    ///
    /// Used when rebuilding a record from a snapshot.
    pub(crate) fn push_unchecked(&mut self, visit: Visit) -> Result<(), StorageError> {
        self.visits.try_reserve(1)?;
        self.visits.push(visit);
        Ok(())
    }

    /// Remove the visit with this id via swap-and-pop
    pub fn remove(&mut self, visit_id: u32) -> Option<Visit> {
        let idx = self.position(visit_id)?;
        Some(self.visits.swap_remove(idx))
    }

    /// Remove every listed id that is present, returning how many were removed
    pub fn remove_many(&mut self, visit_ids: &[u32]) -> usize {
        visit_ids
            .iter()
            .filter(|&&id| self.remove(id).is_some())
            .count()
    }

    /// Drop all visits; the record itself stays alive
    pub fn clear(&mut self) {
        self.visits.clear();
    }

    /// Reorder visits in place, newest first
    pub fn sort_by_recency(&mut self) {
        self.visits.sort_unstable_by(Visit::cmp_recency);
    }

    /// Copy of the visits, newest first, leaving storage order alone
    pub fn sorted_copy(&self) -> Vec<Visit> {
        let mut copy = self.visits.clone();
        copy.sort_unstable_by(Visit::cmp_recency);
        copy
    }
}

//! The visit manager
//!
//! [`VisitManager`] owns every user's record and rewrites the whole snapshot
//! file after each mutation. Queries never touch the file.
//!
//! Persistence failures do not undo the in-memory change. By default they are
//! logged and remembered (see [`VisitManager::last_persist_error`]) while the
//! mutating call still succeeds; with
//! [`ManagerConfig::strict_persistence`] they are returned instead.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::codec;
use crate::config::ManagerConfig;
use crate::error::StorageError;
use crate::record::UserRecord;
use crate::snapshot::SnapshotFile;
use crate::visit::{Timestamp, Visit};

/// Result of a successful [`VisitManager::add_visit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The visit was stored
    Inserted {
        /// Id of the visit evicted to make room, if the record was full
        evicted: Option<u32>,
    },
    /// A visit with the same id already existed; nothing changed
    Duplicate,
}

impl AddOutcome {
    /// Whether the call stored a new visit
    pub fn is_inserted(&self) -> bool {
        matches!(self, AddOutcome::Inserted { .. })
    }
}

/// Per-user, capacity-bounded visit history backed by one snapshot file
#[derive(Debug)]
pub struct VisitManager<C: Clock = SystemClock> {
    config: ManagerConfig,
    snapshot: SnapshotFile,
    users: BTreeMap<u32, UserRecord>,
    clock: C,
    last_persist_error: Option<StorageError>,
}

impl VisitManager<SystemClock> {
    /// Open the manager for `path`, loading an existing snapshot if present
    ///
    /// A snapshot that cannot be read or decoded is discarded and the
    /// manager starts empty.
    pub fn open(path: impl AsRef<Path>, max_visits: usize) -> Result<Self, StorageError> {
        Self::open_with_config(ManagerConfig::new(path, max_visits))
    }

    /// Open with a full configuration
    pub fn open_with_config(config: ManagerConfig) -> Result<Self, StorageError> {
        Self::open_with_clock(config, SystemClock)
    }
}

impl<C: Clock> VisitManager<C> {
    /// Open with a custom time source
    pub fn open_with_clock(config: ManagerConfig, clock: C) -> Result<Self, StorageError> {
        config.validate()?;
        let snapshot = SnapshotFile::from_config(&config);
        let users = Self::load(&snapshot, config.max_visits);

        Ok(Self {
            config,
            snapshot,
            users,
            clock,
            last_persist_error: None,
        })
    }

    /// Load the snapshot, falling back to empty state on any failure
    fn load(snapshot: &SnapshotFile, max_visits: usize) -> BTreeMap<u32, UserRecord> {
        let path = snapshot.path();
        let data = match snapshot.read() {
            Ok(Some(data)) => data,
            Ok(None) => {
                info!(path = ?path, users = 0, visits = 0, "No existing snapshot, starting fresh");
                return BTreeMap::new();
            }
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to read snapshot, starting fresh");
                return BTreeMap::new();
            }
        };

        match codec::decode(&data, max_visits) {
            Ok(decoded) => {
                if decoded.truncated > 0 {
                    warn!(
                        path = ?path,
                        discarded = decoded.truncated,
                        max_visits,
                        "Snapshot held more visits per user than allowed, kept the first in file order"
                    );
                }
                info!(
                    path = ?path,
                    users = decoded.users.len(),
                    visits = decoded.users.values().map(UserRecord::len).sum::<usize>(),
                    stored_max_visits = decoded.stored_max_visits,
                    "Loaded visit snapshot"
                );
                decoded.users
            }
            Err(e) => {
                warn!(path = ?path, error = %e, "Failed to decode snapshot, starting fresh");
                BTreeMap::new()
            }
        }
    }

    /// Record a visit for a user
    ///
    /// Re-adding an existing `visit_id` for the same user is a successful
    /// no-op that keeps the original url and text. When the user's record is
    /// full, the visit with the oldest timestamp is evicted first.
    pub fn add_visit(
        &mut self,
        user_id: u32,
        visit_id: u32,
        url: &str,
        text: &str,
    ) -> Result<AddOutcome, StorageError> {
        check_terminable("url", url)?;
        check_terminable("text", text)?;

        let record = self
            .users
            .entry(user_id)
            .or_insert_with(|| UserRecord::new(user_id));

        if record.contains(visit_id) {
            debug!(user_id, visit_id, "Visit already recorded, ignoring");
            return Ok(AddOutcome::Duplicate);
        }

        let timestamp = Timestamp::from(self.clock.now_utc());
        let visit = Visit::new(visit_id, try_copy(url)?, try_copy(text)?, timestamp);

        let evicted = record
            .insert_bounded(visit, self.config.max_visits)?
            .map(|v| v.visit_id);
        trace!(user_id, visit_id, %timestamp, "Added visit");

        self.sync()?;
        Ok(AddOutcome::Inserted { evicted })
    }

    /// Visits for a user, newest first
    ///
    /// Sorts the user's stored visits in place and lends them out. Unknown
    /// users yield an empty slice.
    pub fn recent_visits(&mut self, user_id: u32) -> &[Visit] {
        match self.users.get_mut(&user_id) {
            Some(record) => {
                record.sort_by_recency();
                record.visits()
            }
            None => &[],
        }
    }

    /// Owned copy of a user's visits, newest first, without reordering storage
    pub fn recent_visits_snapshot(&self, user_id: u32) -> Vec<Visit> {
        self.users
            .get(&user_id)
            .map(UserRecord::sorted_copy)
            .unwrap_or_default()
    }

    /// Delete the listed visits for a user
    ///
    /// Returns `Ok(true)` if at least one id was found and removed. An empty
    /// id list, an unknown user, or a list of only absent ids returns
    /// `Ok(false)` and changes nothing.
    pub fn delete_visits(&mut self, user_id: u32, visit_ids: &[u32]) -> Result<bool, StorageError> {
        if visit_ids.is_empty() {
            return Ok(false);
        }
        let Some(record) = self.users.get_mut(&user_id) else {
            trace!(user_id, "Delete for unknown user");
            return Ok(false);
        };

        let removed = record.remove_many(visit_ids);
        debug!(user_id, requested = visit_ids.len(), removed, "Deleted visits");
        if removed == 0 {
            return Ok(false);
        }

        self.sync()?;
        Ok(true)
    }

    /// Remove every visit for a user
    ///
    /// The user stays known. Unknown users are ignored.
    pub fn clear(&mut self, user_id: u32) -> Result<(), StorageError> {
        let Some(record) = self.users.get_mut(&user_id) else {
            trace!(user_id, "Clear for unknown user");
            return Ok(());
        };

        let dropped = record.len();
        record.clear();
        debug!(user_id, dropped, "Cleared visits");
        self.sync()
    }

    /// Write the current state to the snapshot file, surfacing any failure
    pub fn persist(&mut self) -> Result<(), StorageError> {
        let data = codec::encode(self.config.max_visits, self.users.values());
        match self.snapshot.write(&data) {
            Ok(()) => {
                self.last_persist_error = None;
                Ok(())
            }
            Err(e) => {
                self.last_persist_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Persist after a mutation, honouring the strictness setting
    fn sync(&mut self) -> Result<(), StorageError> {
        match self.persist() {
            Ok(()) => Ok(()),
            Err(e) if self.config.strict_persistence => Err(e),
            Err(e) => {
                warn!(path = ?self.snapshot.path(), error = %e, "Failed to persist visits, snapshot is stale");
                Ok(())
            }
        }
    }

    /// Release the manager. The snapshot file is left in place.
    pub fn close(self) {
        debug!(
            path = ?self.snapshot.path(),
            users = self.users.len(),
            "Closing visit manager"
        );
    }

    /// Number of visits stored for a user
    pub fn visit_count(&self, user_id: u32) -> usize {
        self.users.get(&user_id).map_or(0, UserRecord::len)
    }

    /// Whether the user has ever had a visit added (clearing does not forget)
    pub fn is_known_user(&self, user_id: u32) -> bool {
        self.users.contains_key(&user_id)
    }

    /// Number of known users
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Known user ids in ascending order
    pub fn user_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.users.keys().copied()
    }

    /// Per-user capacity bound
    pub fn max_visits(&self) -> usize {
        self.config.max_visits
    }

    /// Snapshot file path
    pub fn path(&self) -> &Path {
        self.snapshot.path()
    }

    /// The configuration this manager was opened with
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// The most recent persistence failure, cleared by the next successful write
    pub fn last_persist_error(&self) -> Option<&StorageError> {
        self.last_persist_error.as_ref()
    }
}

/// Reject strings the NUL-terminated snapshot format cannot carry
fn check_terminable(field: &str, value: &str) -> Result<(), StorageError> {
    if value.as_bytes().contains(&0) {
        return Err(StorageError::invalid_input(format!(
            "{field} contains a NUL byte"
        )));
    }
    Ok(())
}

fn try_copy(s: &str) -> Result<String, StorageError> {
    let mut owned = String::new();
    owned.try_reserve_exact(s.len())?;
    owned.push_str(s);
    Ok(owned)
}

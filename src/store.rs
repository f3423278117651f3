//! Per-table state persistence and coarse locking.
//!
//! The store is a serialisation surface, not an owner: sessions load a
//! table's state, mutate it through the rules engine, and save it back.
//! The per-table lock serialises leave handling and round transitions; it
//! auto-expires so a crashed holder cannot deadlock a table.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::StoreError;
use crate::game::GameState;

/// Directory entry the store keeps per seated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerProfile {
    /// Display name.
    pub username: String,
    /// Whether the seat is played by the house bot.
    pub is_ai: bool,
    /// Optional avatar URL.
    pub avatar_url: Option<String>,
}

/// Storage for per-table game state, player directories and locks.
///
/// Production deployments back this with a shared cache; any backend with
/// atomic set-if-absent and hash operations fits. [`MemoryStore`] is the
/// single-process implementation.
pub trait StateStore: Send + Sync {
    /// Persists a table's game state.
    fn save(&self, table_id: &str, state: &GameState) -> Result<(), StoreError>;

    /// Loads a table's game state, or `None` when no round is stored.
    fn load(&self, table_id: &str) -> Result<Option<GameState>, StoreError>;

    /// Removes a table's game state.
    fn delete(&self, table_id: &str);

    /// Attempts to take the per-table lock for `ttl`.
    ///
    /// Returns `false` while another actor holds an unexpired lock.
    fn try_lock(&self, table_id: &str, ttl: Duration) -> bool;

    /// Releases the per-table lock.
    fn unlock(&self, table_id: &str);

    /// Records a seated user's profile.
    fn set_profile(&self, table_id: &str, user_id: &str, profile: PlayerProfile);

    /// Removes a seated user's profile.
    fn remove_profile(&self, table_id: &str, user_id: &str);

    /// The table's user directory.
    fn profiles(&self, table_id: &str) -> HashMap<String, PlayerProfile>;

    /// Queues a user to leave when the current round ends.
    fn mark_leaving(&self, table_id: &str, user_id: &str);

    /// Drains the queued leavers for a table.
    fn take_leaving(&self, table_id: &str) -> Vec<String>;

    /// Drops a table's stored state, player directory and leaving set in
    /// one call, used when a table resets. The per-table lock is left to
    /// its holder.
    fn clear_table(&self, table_id: &str);
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Serialized game state per table; stored as JSON so save/load
    /// round-trips exactly what a shared cache would hold.
    states: HashMap<String, String>,
    locks: HashMap<String, Instant>,
    profiles: HashMap<String, HashMap<String, PlayerProfile>>,
    leaving: HashMap<String, HashSet<String>>,
}

/// In-memory [`StateStore`] for single-process deployments and tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn save(&self, table_id: &str, state: &GameState) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(state)?;
        self.inner.lock().states.insert(table_id.to_string(), encoded);
        Ok(())
    }

    fn load(&self, table_id: &str) -> Result<Option<GameState>, StoreError> {
        let inner = self.inner.lock();
        let Some(encoded) = inner.states.get(table_id) else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(encoded)?))
    }

    fn delete(&self, table_id: &str) {
        self.inner.lock().states.remove(table_id);
    }

    fn try_lock(&self, table_id: &str, ttl: Duration) -> bool {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        match inner.locks.get(table_id) {
            Some(deadline) if *deadline > now => false,
            _ => {
                inner.locks.insert(table_id.to_string(), now + ttl);
                true
            }
        }
    }

    fn unlock(&self, table_id: &str) {
        self.inner.lock().locks.remove(table_id);
    }

    fn set_profile(&self, table_id: &str, user_id: &str, profile: PlayerProfile) {
        self.inner
            .lock()
            .profiles
            .entry(table_id.to_string())
            .or_default()
            .insert(user_id.to_string(), profile);
    }

    fn remove_profile(&self, table_id: &str, user_id: &str) {
        let mut inner = self.inner.lock();
        if let Some(profiles) = inner.profiles.get_mut(table_id) {
            profiles.remove(user_id);
        }
    }

    fn profiles(&self, table_id: &str) -> HashMap<String, PlayerProfile> {
        self.inner
            .lock()
            .profiles
            .get(table_id)
            .cloned()
            .unwrap_or_default()
    }

    fn mark_leaving(&self, table_id: &str, user_id: &str) {
        self.inner
            .lock()
            .leaving
            .entry(table_id.to_string())
            .or_default()
            .insert(user_id.to_string());
    }

    fn take_leaving(&self, table_id: &str) -> Vec<String> {
        self.inner
            .lock()
            .leaving
            .remove(table_id)
            .map(|set| {
                let mut ids: Vec<String> = set.into_iter().collect();
                ids.sort();
                ids
            })
            .unwrap_or_default()
    }

    fn clear_table(&self, table_id: &str) {
        let mut inner = self.inner.lock();
        inner.states.remove(table_id);
        inner.profiles.remove(table_id);
        inner.leaving.remove(table_id);
    }
}

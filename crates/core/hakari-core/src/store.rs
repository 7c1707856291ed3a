//! Per-guild session bookkeeping
//!
//! The store is pure state: no I/O, no timers of its own. At most one
//! session exists per guild, and every session carries a generation
//! that scheduled timers re-validate before acting, so a timer armed
//! for a torn-down session can never touch a newer one.

use std::collections::HashMap;

use tokio::task::JoinHandle;

/// Live binding between a guild and one voice channel, player and
/// repeat-count state
#[derive(Debug)]
pub struct Session {
    /// Guild this session belongs to; immutable for its lifetime
    pub guild_id: u64,
    /// Voice channel the bot occupies; set at creation only
    pub channel_id: u64,
    /// Cycles left to play; `None` means loop forever
    pub remaining_cycles: Option<u64>,
    /// Store-assigned generation, never reused across sessions
    pub generation: u64,
    /// Whether a playback cycle is currently running. Guards against
    /// spurious idle notifications while nothing was playing.
    pub cycle_active: bool,
    /// Idle-channel watchdog task; aborted exactly once at teardown
    pub watchdog: Option<JoinHandle<()>>,
    /// Pending exhaustion-grace teardown timer, if armed
    pub pending_stop: Option<JoinHandle<()>>,
}

impl Session {
    /// Abort any timers this session owns. Called with the session
    /// already removed from the store, so firing timers see "absent".
    pub fn cancel_timers(&mut self) {
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.abort();
        }
        if let Some(pending) = self.pending_stop.take() {
            pending.abort();
        }
    }
}

/// Process-wide map from guild id to at most one active session
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<u64, Session>,
    next_generation: u64,
}

impl SessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session for a guild, assigning it the next
    /// generation. Returns the generation. Panics in debug builds if a
    /// session already exists for the guild; callers check first.
    pub fn insert(&mut self, guild_id: u64, channel_id: u64, remaining_cycles: Option<u64>) -> u64 {
        debug_assert!(!self.sessions.contains_key(&guild_id));
        self.next_generation += 1;
        let generation = self.next_generation;
        self.sessions.insert(
            guild_id,
            Session {
                guild_id,
                channel_id,
                remaining_cycles,
                generation,
                cycle_active: false,
                watchdog: None,
                pending_stop: None,
            },
        );
        generation
    }

    /// Look up the session for a guild
    pub fn get(&self, guild_id: u64) -> Option<&Session> {
        self.sessions.get(&guild_id)
    }

    /// Look up the session for a guild, mutably
    pub fn get_mut(&mut self, guild_id: u64) -> Option<&mut Session> {
        self.sessions.get_mut(&guild_id)
    }

    /// Remove and return the session for a guild. Ownership moves to
    /// the caller, which makes it the single release point.
    pub fn remove(&mut self, guild_id: u64) -> Option<Session> {
        self.sessions.remove(&guild_id)
    }

    /// Whether the session a timer was armed for is still the current
    /// one for this guild
    pub fn generation_matches(&self, guild_id: u64, generation: u64) -> bool {
        self.sessions
            .get(&guild_id)
            .is_some_and(|s| s.generation == generation)
    }

    /// Number of live sessions across all guilds
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is live
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut store = SessionStore::new();
        let generation = store.insert(1, 10, Some(3));
        assert_eq!(store.len(), 1);

        let session = store.get(1).expect("session should exist");
        assert_eq!(session.channel_id, 10);
        assert_eq!(session.remaining_cycles, Some(3));
        assert_eq!(session.generation, generation);
        assert!(!session.cycle_active);
    }

    #[test]
    fn test_generations_are_unique() {
        let mut store = SessionStore::new();
        let first = store.insert(1, 10, None);
        store.remove(1);
        let second = store.insert(1, 10, None);
        assert_ne!(first, second);
        assert!(store.generation_matches(1, second));
        assert!(!store.generation_matches(1, first));
    }

    #[test]
    fn test_remove_is_terminal() {
        let mut store = SessionStore::new();
        store.insert(1, 10, None);
        assert!(store.remove(1).is_some());
        assert!(store.remove(1).is_none());
        assert!(store.is_empty());
    }
}

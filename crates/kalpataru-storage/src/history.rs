//! Write-through conversation log.
//!
//! The in-memory sequence and the persisted snapshot are kept equal after
//! every mutation: each append rewrites the whole snapshot, and a failed
//! write rolls the in-memory append back.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use kalpataru_core::error::KalpataruError;
use kalpataru_core::events::{EventBus, SessionEvent};
use kalpataru_core::types::Turn;

use crate::kv::KeyValueStore;

/// Append-only, persisted sequence of conversation turns.
pub struct HistoryStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
    turns: Mutex<Vec<Turn>>,
    events: EventBus,
}

impl HistoryStore {
    /// Open the log stored under `key`, rehydrating whatever snapshot exists.
    pub fn open(store: Arc<dyn KeyValueStore>, key: impl Into<String>, events: EventBus) -> Self {
        let key = key.into();
        let turns = read_snapshot(store.as_ref(), &key);
        info!(key = %key, turns = turns.len(), "Conversation history loaded");
        Self {
            store,
            key,
            turns: Mutex::new(turns),
            events,
        }
    }

    /// Append a turn, persist the full sequence, and notify the presentation.
    ///
    /// Returns the index of the new turn.
    pub fn append(&self, turn: Turn) -> Result<usize, KalpataruError> {
        let mut turns = self.lock_turns();

        turns.push(turn);
        let index = turns.len() - 1;

        let persisted = serde_json::to_string(&*turns)
            .map_err(KalpataruError::from)
            .and_then(|snapshot| self.store.set(&self.key, &snapshot));
        if let Err(e) = persisted {
            turns.pop();
            warn!(key = %self.key, error = %e, "Failed to persist history, append rolled back");
            return Err(e);
        }

        debug!(index, sender = %turns[index].sender, "Turn appended");
        self.events.emit(SessionEvent::TurnAppended {
            index,
            turn: turns[index].clone(),
        });
        Ok(index)
    }

    /// Read the persisted snapshot.
    ///
    /// A missing or corrupt snapshot yields an empty sequence; this never
    /// fails.
    pub fn load_all(&self) -> Vec<Turn> {
        read_snapshot(self.store.as_ref(), &self.key)
    }

    /// In-memory view of the log.
    pub fn turns(&self) -> Vec<Turn> {
        self.lock_turns().clone()
    }

    pub fn get(&self, index: usize) -> Option<Turn> {
        self.lock_turns().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock_turns().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_turns(&self) -> MutexGuard<'_, Vec<Turn>> {
        // Every mutation leaves the vector matching the snapshot, even one
        // interrupted by a panic, so a poisoned lock still holds a valid log.
        self.turns.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove every turn, both in memory and in the store.
    pub fn clear(&self) -> Result<(), KalpataruError> {
        let mut turns = self.lock_turns();
        self.store.remove(&self.key)?;
        let removed = turns.len();
        turns.clear();
        info!(key = %self.key, removed, "Conversation history cleared");
        self.events.emit(SessionEvent::HistoryCleared);
        Ok(())
    }
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("key", &self.key)
            .field("len", &self.len())
            .finish()
    }
}

fn read_snapshot(store: &dyn KeyValueStore, key: &str) -> Vec<Turn> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(key = %key, error = %e, "Failed to read history, starting empty");
            return Vec::new();
        }
    };
    match serde_json::from_str::<Vec<Turn>>(&raw) {
        Ok(turns) => turns,
        Err(e) => {
            warn!(key = %key, error = %e, "Corrupt history snapshot, starting empty");
            Vec::new()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use std::sync::atomic::{AtomicBool, Ordering};

    const KEY: &str = "chatHistory";

    fn memory_store() -> Arc<dyn KeyValueStore> {
        Arc::new(Database::in_memory().unwrap())
    }

    /// Store whose writes can be switched off.
    struct FlakyStore {
        inner: Database,
        fail_writes: AtomicBool,
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>, KalpataruError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), KalpataruError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(KalpataruError::Storage("disk full".to_string()));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), KalpataruError> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_open_empty() {
        let history = HistoryStore::open(memory_store(), KEY, EventBus::default());
        assert!(history.is_empty());
        assert!(history.load_all().is_empty());
    }

    #[test]
    fn test_append_is_write_through() {
        let store = memory_store();
        let history = HistoryStore::open(Arc::clone(&store), KEY, EventBus::default());

        assert_eq!(history.append(Turn::user("hello")).unwrap(), 0);
        assert_eq!(history.append(Turn::bot("namaste")).unwrap(), 1);

        assert_eq!(history.load_all(), history.turns());
        let raw = store.get(KEY).unwrap().unwrap();
        assert_eq!(
            raw,
            r#"[{"sender":"user","text":"hello"},{"sender":"bot","text":"namaste"}]"#
        );
    }

    #[test]
    fn test_reopen_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");

        let expected = vec![
            Turn::user("How do I treat wheat rust?"),
            Turn::bot("Apply fungicide X"),
            Turn::user("गेहूं"),
            Turn::bot("ठीक है"),
        ];
        {
            let store: Arc<dyn KeyValueStore> = Arc::new(Database::new(&path).unwrap());
            let history = HistoryStore::open(store, KEY, EventBus::default());
            for turn in &expected {
                history.append(turn.clone()).unwrap();
            }
        }

        let store: Arc<dyn KeyValueStore> = Arc::new(Database::new(&path).unwrap());
        let reopened = HistoryStore::open(store, KEY, EventBus::default());
        assert_eq!(reopened.turns(), expected);
        assert_eq!(reopened.load_all(), expected);
    }

    #[test]
    fn test_corrupt_snapshot_loads_empty() {
        let store = memory_store();
        store.set(KEY, "{not json").unwrap();

        let history = HistoryStore::open(Arc::clone(&store), KEY, EventBus::default());
        assert!(history.is_empty());
        assert!(history.load_all().is_empty());

        // The next append replaces the corrupt snapshot.
        history.append(Turn::user("fresh start")).unwrap();
        assert_eq!(history.load_all(), vec![Turn::user("fresh start")]);
    }

    #[test]
    fn test_wrong_shape_snapshot_loads_empty() {
        let store = memory_store();
        store.set(KEY, r#"{"sender":"user","text":"not a list"}"#).unwrap();
        let history = HistoryStore::open(store, KEY, EventBus::default());
        assert!(history.is_empty());
    }

    #[test]
    fn test_append_emits_turn_appended() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let history = HistoryStore::open(memory_store(), KEY, bus);

        history.append(Turn::user("hi")).unwrap();
        history.append(Turn::bot("hello")).unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::TurnAppended {
                index: 0,
                turn: Turn::user("hi")
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::TurnAppended {
                index: 1,
                turn: Turn::bot("hello")
            }
        );
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let flaky = Arc::new(FlakyStore {
            inner: Database::in_memory().unwrap(),
            fail_writes: AtomicBool::new(false),
        });
        let bus = EventBus::default();
        let history = HistoryStore::open(flaky.clone(), KEY, bus.clone());
        history.append(Turn::user("kept")).unwrap();

        let mut rx = bus.subscribe();
        flaky.fail_writes.store(true, Ordering::SeqCst);
        let result = history.append(Turn::bot("lost"));

        assert!(matches!(result, Err(KalpataruError::Storage(_))));
        assert_eq!(history.turns(), vec![Turn::user("kept")]);
        assert_eq!(history.load_all(), history.turns());
        assert!(rx.try_recv().is_err(), "no event for a rolled-back append");
    }

    #[test]
    fn test_clear() {
        let bus = EventBus::default();
        let store = memory_store();
        let history = HistoryStore::open(Arc::clone(&store), KEY, bus.clone());
        history.append(Turn::user("a")).unwrap();
        history.append(Turn::bot("b")).unwrap();

        let mut rx = bus.subscribe();
        history.clear().unwrap();

        assert!(history.is_empty());
        assert_eq!(store.get(KEY).unwrap(), None);
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::HistoryCleared);

        // Indices restart after a clear.
        assert_eq!(history.append(Turn::user("c")).unwrap(), 0);
    }

    #[test]
    fn test_get_by_index() {
        let history = HistoryStore::open(memory_store(), KEY, EventBus::default());
        history.append(Turn::user("q")).unwrap();
        history.append(Turn::bot("a")).unwrap();
        assert_eq!(history.get(1), Some(Turn::bot("a")));
        assert_eq!(history.get(2), None);
    }

    #[test]
    fn test_poisoned_lock_keeps_the_log() {
        let history = Arc::new(HistoryStore::open(memory_store(), KEY, EventBus::default()));
        history.append(Turn::user("before")).unwrap();

        let holder = Arc::clone(&history);
        let _ = std::thread::spawn(move || {
            let _guard = holder.turns.lock().unwrap();
            panic!("panic while holding the history lock");
        })
        .join();
        assert!(history.turns.is_poisoned());

        assert_eq!(history.turns(), vec![Turn::user("before")]);
        assert_eq!(history.len(), 1);
        assert_eq!(history.get(0), Some(Turn::user("before")));
        assert_eq!(history.append(Turn::bot("after")).unwrap(), 1);
        assert_eq!(history.load_all(), history.turns());

        history.clear().unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn test_separate_keys_do_not_mix() {
        let store = memory_store();
        let a = HistoryStore::open(Arc::clone(&store), "a", EventBus::default());
        let b = HistoryStore::open(Arc::clone(&store), "b", EventBus::default());
        a.append(Turn::user("only in a")).unwrap();
        assert!(b.load_all().is_empty());
    }
}

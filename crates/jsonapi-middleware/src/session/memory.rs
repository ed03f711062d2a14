//! In-memory session store.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::Mutex;
use rand::RngCore;

use super::store::Store;
use super::{SessionError, SessionValues};

/// Random bytes per session id. Encodes to 32 base64 characters.
const ID_BYTES: usize = 24;

/// Minimum interval between two collections.
const GC_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct Element {
    data: SessionValues,
    last_used: Instant,
    ttl: Duration,
}

impl Element {
    // A deadline past what `Instant` can hold never expires.
    fn is_valid(&self, now: Instant) -> bool {
        self.last_used
            .checked_add(self.ttl)
            .map_or(true, |deadline| now <= deadline)
    }
}

#[derive(Debug, Default)]
struct State {
    sessions: HashMap<String, Element>,
    last_gc: Option<Instant>,
}

/// Sessions kept in process memory. Data is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, expired ones included until collected.
    pub fn len(&self) -> usize {
        self.state.lock().sessions.len()
    }

    /// Returns `true` if no session is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn random_id() -> String {
        let mut buf = [0u8; ID_BYTES];
        rand::thread_rng().fill_bytes(&mut buf);
        STANDARD.encode(buf)
    }

    fn with_valid<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Element) -> T,
    ) -> Result<T, SessionError> {
        let mut state = self.state.lock();
        let ele = state
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        let now = Instant::now();
        if !ele.is_valid(now) {
            return Err(SessionError::Expired(id.to_string()));
        }
        ele.last_used = now;
        Ok(f(ele))
    }
}

impl Store for MemoryStore {
    fn create(&self, ttl: Duration) -> Result<String, SessionError> {
        let mut state = self.state.lock();
        let id = loop {
            let id = Self::random_id();
            if !state.sessions.contains_key(&id) {
                break id;
            }
        };

        state.sessions.insert(
            id.clone(),
            Element {
                data: SessionValues::new(),
                last_used: Instant::now(),
                ttl,
            },
        );
        Ok(id)
    }

    fn get(&self, id: &str) -> Result<SessionValues, SessionError> {
        self.with_valid(id, |ele| ele.data.clone())
    }

    fn set(&self, id: &str, data: SessionValues) -> Result<(), SessionError> {
        self.with_valid(id, |ele| ele.data = data)
    }

    fn unset(&self, id: &str) -> Result<(), SessionError> {
        self.state.lock().sessions.remove(id);
        Ok(())
    }

    fn gc(&self) {
        let mut state = self.state.lock();
        let now = Instant::now();
        if state.last_gc.is_some_and(|t| now.duration_since(t) <= GC_INTERVAL) {
            return;
        }
        state.last_gc = Some(now);

        let before = state.sessions.len();
        state.sessions.retain(|_, ele| ele.is_valid(now));
        let removed = before - state.sessions.len();
        if removed > 0 {
            tracing::debug!(removed, "collected expired sessions");
        }
    }
}

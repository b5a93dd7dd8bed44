//! Process-wide registry of the service providers each session has visited.
//!
//! The identity provider records every participant (by logout URL) that
//! received an assertion for a session, so a global logout can be fanned
//! out to them in reverse order of registration.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tracing::debug;

#[derive(Debug, Default)]
struct SessionParticipants {
    /// Logout URLs in registration order; the last one is popped first.
    stack: Vec<String>,
    /// Participants a logout request is currently in flight to.
    in_transit: HashSet<String>,
}

/// Concurrent session participant registry.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    sessions: DashMap<String, SessionParticipants>,
    post_binding: DashMap<String, bool>,
    active_sessions: AtomicUsize,
}

impl ParticipantRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a session, resetting any previous state for its ID.
    pub fn create_session(&self, session_id: &str) {
        let previous = self
            .sessions
            .insert(session_id.to_string(), SessionParticipants::default());
        if previous.is_none() {
            let active = self.active_sessions.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(session_id, active, "session created");
        }
    }

    /// Stops tracking a session.
    pub fn remove_session(&self, session_id: &str) {
        if self.sessions.remove(session_id).is_some() {
            let active = self.active_sessions.fetch_sub(1, Ordering::Relaxed) - 1;
            debug!(session_id, active, "session destroyed");
        }
    }

    /// Registers a participant for a session.
    ///
    /// Registering the same participant twice for a session is a no-op; its
    /// binding flag keeps the value of the first registration.
    pub fn register(&self, session_id: &str, participant: &str, post_binding: bool) {
        let mut entry = self.sessions.entry(session_id.to_string()).or_insert_with(|| {
            self.active_sessions.fetch_add(1, Ordering::Relaxed);
            SessionParticipants::default()
        });
        if !entry.stack.iter().any(|p| p == participant) {
            entry.stack.push(participant.to_string());
            self.post_binding.insert(participant.to_string(), post_binding);
            debug!(session_id, participant, post_binding, "participant registered");
        }
    }

    /// Returns the most recently registered participant of a session.
    #[must_use]
    pub fn peek(&self, session_id: &str) -> Option<String> {
        self.sessions
            .get(session_id)
            .and_then(|entry| entry.stack.last().cloned())
    }

    /// Removes and returns the most recently registered participant.
    pub fn pop(&self, session_id: &str) -> Option<String> {
        self.sessions
            .get_mut(session_id)
            .and_then(|mut entry| entry.stack.pop())
    }

    /// Returns the number of participants registered for a session.
    #[must_use]
    pub fn participant_count(&self, session_id: &str) -> usize {
        self.sessions
            .get(session_id)
            .map_or(0, |entry| entry.stack.len())
    }

    /// Returns whether a participant is reached with the POST binding.
    #[must_use]
    pub fn binding(&self, participant: &str) -> Option<bool> {
        self.post_binding.get(participant).map(|flag| *flag)
    }

    /// Marks a participant as having a logout in flight.
    ///
    /// Returns `false` if it was already in transit.
    pub fn register_transit(&self, session_id: &str, participant: &str) -> bool {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                self.active_sessions.fetch_add(1, Ordering::Relaxed);
                SessionParticipants::default()
            })
            .in_transit
            .insert(participant.to_string())
    }

    /// Clears the in-flight mark of a participant and forgets its binding.
    ///
    /// Returns `false` if the participant was not in transit.
    pub fn deregister_transit(&self, session_id: &str, participant: &str) -> bool {
        let Some(mut entry) = self.sessions.get_mut(session_id) else {
            return false;
        };
        self.post_binding.remove(participant);
        entry.in_transit.remove(participant)
    }

    /// Returns the number of participants with a logout in flight.
    #[must_use]
    pub fn transit_count(&self, session_id: &str) -> usize {
        self.sessions
            .get(session_id)
            .map_or(0, |entry| entry.in_transit.len())
    }

    /// Returns the number of tracked sessions.
    #[must_use]
    pub fn total_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }
}

//! HTTP session state used by the handlers.
//!
//! The handlers never reach for ambient session state; the caller passes a
//! [`SessionStore`] into every chain invocation.

use std::collections::BTreeMap;
use std::fmt;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::types::Assertion;

/// Attribute values keyed by attribute name.
pub type AttributeMap = BTreeMap<String, Vec<String>>;

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal {
    name: String,
}

impl Principal {
    /// Creates a principal.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Returns the principal name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The assertion most recently issued for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionAssertion {
    /// The principal the assertion was issued for.
    pub principal: Principal,
    /// ID of the assertion.
    pub assertion_id: String,
    /// The assertion itself.
    pub assertion: Assertion,
}

impl SessionAssertion {
    /// Binds an assertion to a principal.
    #[must_use]
    pub fn new(principal: Principal, assertion: Assertion) -> Self {
        Self {
            principal,
            assertion_id: assertion.id.clone(),
            assertion,
        }
    }
}

/// Per-user session state.
///
/// Implementations use interior mutability: a session is shared between
/// the requests of one user, which the container already serializes.
pub trait SessionStore: Send + Sync {
    /// Returns the session ID.
    fn id(&self) -> &str;

    /// Returns the principal bound to the session.
    fn principal(&self) -> Option<Principal>;

    /// Binds a principal to the session.
    fn set_principal(&self, principal: Principal);

    /// Returns the roles of the session's principal.
    fn roles(&self) -> Vec<String>;

    /// Stores the roles of the session's principal.
    fn set_roles(&self, roles: Vec<String>);

    /// Returns the assertion binding.
    fn assertion(&self) -> Option<SessionAssertion>;

    /// Stores the assertion binding.
    fn set_assertion(&self, binding: SessionAssertion);

    /// Returns the ID of the last AuthnRequest sent.
    fn auth_request_id(&self) -> Option<String>;

    /// Stores the ID of an AuthnRequest sent.
    fn set_auth_request_id(&self, id: String);

    /// Removes and returns the stored AuthnRequest ID.
    fn take_auth_request_id(&self) -> Option<String>;

    /// Returns the attributes stored for the principal.
    fn attributes(&self) -> Option<AttributeMap>;

    /// Stores the attributes for the principal.
    fn set_attributes(&self, attributes: AttributeMap);

    /// Clears all state (logout).
    fn invalidate(&self);
}

#[derive(Debug, Default)]
struct SessionState {
    principal: Option<Principal>,
    roles: Vec<String>,
    assertion: Option<SessionAssertion>,
    auth_request_id: Option<String>,
    attributes: Option<AttributeMap>,
}

/// In-memory session.
#[derive(Debug)]
pub struct InMemorySession {
    id: String,
    state: RwLock<SessionState>,
}

impl InMemorySession {
    /// Creates an empty session with a random ID.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(Uuid::now_v7().to_string())
    }

    /// Creates an empty session with the given ID.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: RwLock::new(SessionState::default()),
        }
    }
}

impl Default for InMemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for InMemorySession {
    fn id(&self) -> &str {
        &self.id
    }

    fn principal(&self) -> Option<Principal> {
        self.state.read().principal.clone()
    }

    fn set_principal(&self, principal: Principal) {
        self.state.write().principal = Some(principal);
    }

    fn roles(&self) -> Vec<String> {
        self.state.read().roles.clone()
    }

    fn set_roles(&self, roles: Vec<String>) {
        self.state.write().roles = roles;
    }

    fn assertion(&self) -> Option<SessionAssertion> {
        self.state.read().assertion.clone()
    }

    fn set_assertion(&self, binding: SessionAssertion) {
        self.state.write().assertion = Some(binding);
    }

    fn auth_request_id(&self) -> Option<String> {
        self.state.read().auth_request_id.clone()
    }

    fn set_auth_request_id(&self, id: String) {
        self.state.write().auth_request_id = Some(id);
    }

    fn take_auth_request_id(&self) -> Option<String> {
        self.state.write().auth_request_id.take()
    }

    fn attributes(&self) -> Option<AttributeMap> {
        self.state.read().attributes.clone()
    }

    fn set_attributes(&self, attributes: AttributeMap) {
        self.state.write().attributes = Some(attributes);
    }

    fn invalidate(&self) {
        *self.state.write() = SessionState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_roundtrip() {
        let session = InMemorySession::with_id("s1");
        assert_eq!(session.id(), "s1");
        assert!(session.principal().is_none());

        session.set_principal(Principal::new("alice"));
        session.set_roles(vec!["user".to_string()]);
        session.set_auth_request_id("ID_1".to_string());

        assert_eq!(session.principal().unwrap().name(), "alice");
        assert_eq!(session.roles(), vec!["user"]);
        assert_eq!(session.take_auth_request_id().as_deref(), Some("ID_1"));
        assert!(session.auth_request_id().is_none());
    }

    #[test]
    fn assertion_binding_tracks_id() {
        let session = InMemorySession::new();
        let assertion = Assertion::new("idp");
        let id = assertion.id.clone();
        session.set_assertion(SessionAssertion::new(Principal::new("alice"), assertion));
        assert_eq!(session.assertion().unwrap().assertion_id, id);
    }

    #[test]
    fn invalidate_clears_state() {
        let session = InMemorySession::new();
        session.set_principal(Principal::new("alice"));
        session.set_attributes(AttributeMap::from([("mail".to_string(), vec!["a@x".to_string()])]));
        session.invalidate();
        assert!(session.principal().is_none());
        assert!(session.attributes().is_none());
    }
}

//! The SAML2 handler chain.
//!
//! A chain is an ordered list of [`SamlHandler`]s run for one of three
//! entry points: an inbound request, an inbound status response, or the
//! generation of an outgoing request. Handlers share a [`HandlerRequest`]
//! (the inbound message and per-invocation options) and accumulate their
//! output in a [`HandlerResponse`]. Order matters:
//!
//! 1. [`SignatureValidationHandler`] checks inbound signatures
//! 2. [`IssuerTrustHandler`] rejects untrusted issuers
//! 3. [`AttributeHandler`] fetches attributes (identity provider)
//! 4. [`AuthenticationHandler`] builds or consumes the protocol message
//! 5. [`AttributeHandler`] stores received attributes (service provider)
//! 6. [`InResponseToHandler`] correlates responses with requests (service provider)
//! 7. [`EncryptionHandler`] encrypts then signs (identity provider), or
//!    [`SignatureHandler`] signs the outgoing document
//!
//! [`FederationConfig::build_chain`](crate::config::FederationConfig::build_chain)
//! assembles this order for a configured role. The first error aborts the
//! invocation.

mod attribute;
mod authentication;
mod config;
mod encryption;
mod in_response_to;
mod registry;
mod request;
mod response;
mod role;
mod session;
mod signature;
mod signature_validation;
mod trust;

pub use attribute::{AttributeHandler, AttributeManager, StaticAttributeManager};
pub use authentication::{AuthenticationHandler, IdpAuthenticationHandler, SpAuthenticationHandler};
pub use config::{ChainConfig, HandlerConfig, IdpConfig, ProviderRole, SpConfig};
pub use encryption::EncryptionHandler;
pub use in_response_to::InResponseToHandler;
pub use registry::ParticipantRegistry;
pub use request::{GenerateRequestType, HandlerRequest, HttpMethod, RequestOptions};
pub use response::{HandlerError, HandlerResponse};
pub use role::{extract_roles, AllowListRoleValidator, AcceptAllRoleValidator, RoleValidator};
pub use session::{AttributeMap, InMemorySession, Principal, SessionAssertion, SessionStore};
pub use signature::SignatureHandler;
pub use signature_validation::SignatureValidationHandler;
pub use trust::{is_trusted, IssuerTrustHandler};

use crate::error::SamlResult;

/// A step of the handler chain.
///
/// Every entry point defaults to doing nothing, so a handler only
/// implements the ones it takes part in.
pub trait SamlHandler: Send + Sync {
    /// Returns the handler name used in logs.
    fn name(&self) -> &'static str;

    /// Handles an inbound request message (an AuthnRequest).
    ///
    /// # Errors
    ///
    /// Any error aborts the chain.
    fn handle_request_type(
        &self,
        _request: &mut HandlerRequest,
        _response: &mut HandlerResponse,
        _session: &dyn SessionStore,
    ) -> SamlResult<()> {
        Ok(())
    }

    /// Handles an inbound status response.
    ///
    /// # Errors
    ///
    /// Any error aborts the chain.
    fn handle_status_response_type(
        &self,
        _request: &mut HandlerRequest,
        _response: &mut HandlerResponse,
        _session: &dyn SessionStore,
    ) -> SamlResult<()> {
        Ok(())
    }

    /// Generates an outgoing request.
    ///
    /// # Errors
    ///
    /// Any error aborts the chain.
    fn generate_saml_request(
        &self,
        _request: &mut HandlerRequest,
        _response: &mut HandlerResponse,
        _session: &dyn SessionStore,
    ) -> SamlResult<()> {
        Ok(())
    }
}

/// Handlers run in order until one fails.
#[derive(Default)]
pub struct HandlerChain {
    handlers: Vec<Box<dyn SamlHandler>>,
}

impl HandlerChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler.
    #[must_use]
    pub fn with_handler(mut self, handler: impl SamlHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Returns the handler names in order.
    #[must_use]
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Runs every handler's [`SamlHandler::handle_request_type`].
    ///
    /// # Errors
    ///
    /// Returns the first handler error.
    pub fn handle_request_type(
        &self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
        session: &dyn SessionStore,
    ) -> SamlResult<()> {
        for handler in &self.handlers {
            tracing::trace!(handler = handler.name(), "handle_request_type");
            handler.handle_request_type(request, response, session)?;
        }
        Ok(())
    }

    /// Runs every handler's [`SamlHandler::handle_status_response_type`].
    ///
    /// # Errors
    ///
    /// Returns the first handler error.
    pub fn handle_status_response_type(
        &self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
        session: &dyn SessionStore,
    ) -> SamlResult<()> {
        for handler in &self.handlers {
            tracing::trace!(handler = handler.name(), "handle_status_response_type");
            handler.handle_status_response_type(request, response, session)?;
        }
        Ok(())
    }

    /// Runs every handler's [`SamlHandler::generate_saml_request`].
    ///
    /// # Errors
    ///
    /// Returns the first handler error.
    pub fn generate_saml_request(
        &self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
        session: &dyn SessionStore,
    ) -> SamlResult<()> {
        for handler in &self.handlers {
            tracing::trace!(handler = handler.name(), "generate_saml_request");
            handler.generate_saml_request(request, response, session)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerChain")
            .field("handlers", &self.handler_names())
            .finish()
    }
}

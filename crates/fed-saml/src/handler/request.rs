//! The inbound side of a chain invocation.

use std::fmt;
use std::sync::Arc;

use fed_core::AuditSink;
use fed_crypto::{RsaDecryptionKey, RsaEncryptionKey};

use crate::error::SamlResult;
use crate::types::{Assertion, ProtocolMessage, SpSsoDescriptor};
use crate::xml::Element;

use super::session::{AttributeMap, Principal};

/// HTTP method the inbound message arrived with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    /// `GET`, the HTTP-Redirect binding.
    #[default]
    Get,
    /// `POST`, the HTTP-POST binding.
    Post,
}

/// Kind of message a chain is asked to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateRequestType {
    /// An AuthnRequest.
    Auth,
    /// A LogoutRequest.
    Logout,
}

/// Per-invocation context shared by the handlers of a chain.
///
/// Handlers read their inputs from here and leave results for the handlers
/// that follow them (the generated AuthnRequest ID, the resolved assertion).
#[derive(Clone, Default)]
pub struct RequestOptions {
    /// Attributes to embed in the issued assertion.
    pub attributes: Option<AttributeMap>,

    /// Private key for decrypting received assertions.
    pub decrypting_key: Option<Arc<RsaDecryptionKey>>,

    /// Public key of the service provider assertions are encrypted for.
    pub sender_public_key: Option<Arc<RsaEncryptionKey>>,

    /// Public key (PKCS#1 DER) the peer's signatures are checked with.
    pub validating_key: Option<Vec<u8>>,

    /// Receiver of audit events.
    pub audit: Option<Arc<dyn AuditSink>>,

    /// Metadata of the service provider that sent the request.
    pub sp_metadata: Option<SpSsoDescriptor>,

    /// ID of the AuthnRequest generated in this invocation.
    pub auth_request_id: Option<String>,

    /// The assertion resolved from a received response.
    pub assertion: Option<Assertion>,

    /// Overrides the chain's signature support for this request.
    pub supports_signature: Option<bool>,

    /// Overrides the identity provider's strict POST binding.
    pub strict_post_binding: Option<bool>,

    /// The raw query string of an HTTP-Redirect message.
    pub redirect_query: Option<String>,
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("attributes", &self.attributes)
            .field("has_decrypting_key", &self.decrypting_key.is_some())
            .field("has_sender_public_key", &self.sender_public_key.is_some())
            .field("has_audit", &self.audit.is_some())
            .field("auth_request_id", &self.auth_request_id)
            .field("supports_signature", &self.supports_signature)
            .field("strict_post_binding", &self.strict_post_binding)
            .finish_non_exhaustive()
    }
}

/// Input of a chain invocation.
#[derive(Debug, Clone, Default)]
pub struct HandlerRequest {
    /// The inbound message; absent when generating.
    pub message: Option<ProtocolMessage>,

    /// The inbound document as received, for signature checks.
    pub document: Option<Element>,

    /// Issuer of the inbound message.
    pub issuer: Option<String>,

    /// HTTP method of the inbound request.
    pub method: HttpMethod,

    /// Principal authenticated by the transport layer.
    pub user_principal: Option<Principal>,

    /// Relay state received with the message.
    pub relay_state: Option<String>,

    /// What to generate, for `generate_saml_request`.
    pub generate_type: Option<GenerateRequestType>,

    /// Shared per-invocation options.
    pub options: RequestOptions,
}

impl HandlerRequest {
    /// Creates a request for a parsed inbound message.
    #[must_use]
    pub fn inbound(message: ProtocolMessage, method: HttpMethod) -> Self {
        Self {
            issuer: message.issuer().map(str::to_string),
            message: Some(message),
            method,
            ..Self::default()
        }
    }

    /// Creates a request for an inbound document, keeping the document for
    /// signature validation.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a supported message.
    pub fn from_document(document: Element, method: HttpMethod) -> SamlResult<Self> {
        let message = ProtocolMessage::from_element(&document)?;
        Ok(Self {
            document: Some(document),
            ..Self::inbound(message, method)
        })
    }

    /// Creates a request asking the chain to generate a message.
    #[must_use]
    pub fn generate(generate_type: GenerateRequestType) -> Self {
        Self {
            generate_type: Some(generate_type),
            ..Self::default()
        }
    }

    /// Sets the relay state.
    #[must_use]
    pub fn with_relay_state(mut self, relay_state: impl Into<String>) -> Self {
        self.relay_state = Some(relay_state.into());
        self
    }

    /// Sets the transport-level principal.
    #[must_use]
    pub fn with_user_principal(mut self, principal: Principal) -> Self {
        self.user_principal = Some(principal);
        self
    }

    /// Replaces the options.
    #[must_use]
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns true if signatures are supported for this request.
    #[must_use]
    pub fn supports_signature(&self, chain_default: bool) -> bool {
        self.options.supports_signature.unwrap_or(chain_default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AuthnRequest;

    #[test]
    fn inbound_takes_issuer_from_message() {
        let message = ProtocolMessage::from(AuthnRequest::new("https://sp1.example.com"));
        let request = HandlerRequest::inbound(message, HttpMethod::Post);
        assert_eq!(request.issuer.as_deref(), Some("https://sp1.example.com"));
        assert!(request.supports_signature(true));
        assert!(request.document.is_none());
    }

    #[test]
    fn from_document_keeps_the_document() {
        let document = AuthnRequest::new("sp1").to_element();
        let request = HandlerRequest::from_document(document.clone(), HttpMethod::Get).unwrap();
        assert_eq!(request.document, Some(document));
        assert!(matches!(request.message, Some(ProtocolMessage::AuthnRequest(_))));
    }

    #[test]
    fn option_overrides_signature_support() {
        let mut request = HandlerRequest::generate(GenerateRequestType::Auth);
        request.options.supports_signature = Some(false);
        assert!(!request.supports_signature(true));
    }
}

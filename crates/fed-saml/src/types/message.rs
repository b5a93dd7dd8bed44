//! Inbound protocol messages.

use crate::error::{SamlError, SamlResult};
use crate::xml::Element;

use super::{AuthnRequest, Response, SAMLP_NS};

/// A protocol message handled by the chain.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolMessage {
    /// An authentication request.
    AuthnRequest(AuthnRequest),
    /// A status response.
    Response(Response),
}

impl ProtocolMessage {
    /// Returns the issuer of the message.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        match self {
            Self::AuthnRequest(request) => request.issuer.as_deref(),
            Self::Response(response) => response.issuer.as_deref(),
        }
    }

    /// Returns the message ID.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::AuthnRequest(request) => &request.id,
            Self::Response(response) => &response.id,
        }
    }

    /// Reads a message, dispatching on the root element.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Protocol`] for any root other than
    /// `AuthnRequest` or `Response`.
    pub fn from_element(element: &Element) -> SamlResult<Self> {
        if element.is(SAMLP_NS, "AuthnRequest") {
            AuthnRequest::from_element(element).map(Self::AuthnRequest)
        } else if element.is(SAMLP_NS, "Response") {
            Response::from_element(element).map(Self::Response)
        } else {
            Err(SamlError::Protocol(format!(
                "unsupported message {}",
                element.qualified_name()
            )))
        }
    }

    /// Parses a message document.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed XML or an unsupported message.
    pub fn from_xml(xml: &str) -> SamlResult<Self> {
        Self::from_element(&Element::parse(xml)?)
    }
}

impl From<AuthnRequest> for ProtocolMessage {
    fn from(request: AuthnRequest) -> Self {
        Self::AuthnRequest(request)
    }
}

impl From<Response> for ProtocolMessage {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

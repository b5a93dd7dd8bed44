//! SAML bindings.
//!
//! - **HTTP-POST** - messages are base64-encoded and sent in an HTML form
//! - **HTTP-Redirect** - messages are deflated, base64-encoded and
//!   URL-encoded into the query string, with a detached signature

mod post;
mod redirect;

pub use post::*;
pub use redirect::*;

/// SAML message type for binding operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamlMessageType {
    /// Request message.
    Request,
    /// Response message.
    Response,
}

impl SamlMessageType {
    /// Returns the form or query parameter name for this message type.
    #[must_use]
    pub const fn form_param(&self) -> &'static str {
        match self {
            Self::Request => "SAMLRequest",
            Self::Response => "SAMLResponse",
        }
    }
}

/// Decoded SAML binding message.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    /// The decoded XML message.
    pub xml: String,
    /// The message type (request or response).
    pub message_type: SamlMessageType,
    /// The RelayState if present.
    pub relay_state: Option<String>,
    /// The base64 signature (redirect binding).
    pub signature: Option<String>,
    /// The signature algorithm URI (redirect binding).
    pub sig_alg: Option<String>,
}

//! SAML error types.
//!
//! Errors are grouped the way the handler chain reports them: configuration
//! problems, protocol violations, trust failures, cryptographic failures and
//! handler ordering mistakes. Every variant aborts the chain; the only soft
//! failure (a rejected principal) is not an error but a 403 on the
//! [`HandlerResponse`](crate::handler::HandlerResponse).

use thiserror::Error;

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SAML protocol errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// Missing or invalid configuration (key pair, trust list, binding type).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The message violates the protocol (wrong message type, missing data).
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Missing required element or attribute.
    #[error("missing required element: {0}")]
    MissingElement(String),

    /// The identity provider did not report success.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The assertion is outside its validity window.
    #[error("assertion expired: {id}")]
    AssertionExpired {
        /// ID of the expired assertion.
        id: String,
    },

    /// The InResponseTo correlation did not match.
    #[error("AuthnRequest ID verification failed: {0}")]
    InResponseToMismatch(String),

    /// The issuer is not in the trusted domain list.
    #[error("issuer not trusted: {0}")]
    IssuerNotTrusted(String),

    /// Unknown or unsupported binding.
    #[error("unsupported binding: {0}")]
    UnsupportedBinding(String),

    /// An attribute value that cannot be read as a role.
    #[error("unsupported role value type: {0}")]
    UnsupportedRoleType(String),

    /// A handler ran before the handler it depends on.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// XML parsing error.
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// XML signature validation failed.
    #[error("signature validation failed: {0}")]
    SignatureInvalid(String),

    /// XML signature creation failed.
    #[error("signature creation failed: {0}")]
    SignatureCreation(String),

    /// Cryptographic operation error.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Base64 decoding error.
    #[error("base64 decode error: {0}")]
    Base64Decode(String),

    /// Deflate compression error.
    #[error("deflate error: {0}")]
    Deflate(String),

    /// Wrapping error raised when building the outgoing message fails.
    #[error("processing error: {context}")]
    Processing {
        /// What was being processed.
        context: String,
        /// The underlying failure.
        #[source]
        source: Box<SamlError>,
    },
}

impl SamlError {
    /// Wraps an error as a processing failure.
    #[must_use]
    pub fn processing(context: impl Into<String>, source: SamlError) -> Self {
        Self::Processing {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Returns the innermost error, looking through processing wrappers.
    #[must_use]
    pub fn root_cause(&self) -> &SamlError {
        match self {
            Self::Processing { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns the SAML status code for this error.
    #[must_use]
    pub fn status_code(&self) -> &'static str {
        match self.root_cause() {
            Self::Protocol(_)
            | Self::MissingElement(_)
            | Self::AssertionExpired { .. }
            | Self::InResponseToMismatch(_)
            | Self::SignatureInvalid(_)
            | Self::XmlParse(_)
            | Self::Base64Decode(_)
            | Self::Deflate(_) => "urn:oasis:names:tc:SAML:2.0:status:Requester",
            Self::AuthenticationFailed(_) => "urn:oasis:names:tc:SAML:2.0:status:AuthnFailed",
            Self::IssuerNotTrusted(_) => "urn:oasis:names:tc:SAML:2.0:status:RequestDenied",
            Self::UnsupportedBinding(_) => "urn:oasis:names:tc:SAML:2.0:status:RequestUnsupported",
            _ => "urn:oasis:names:tc:SAML:2.0:status:Responder",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self.root_cause() {
            Self::Protocol(_)
            | Self::MissingElement(_)
            | Self::XmlParse(_)
            | Self::Base64Decode(_)
            | Self::Deflate(_)
            | Self::UnsupportedBinding(_) => 400,
            Self::AuthenticationFailed(_)
            | Self::AssertionExpired { .. }
            | Self::InResponseToMismatch(_)
            | Self::SignatureInvalid(_) => 401,
            Self::IssuerNotTrusted(_) => 403,
            _ => 500,
        }
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for SamlError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<std::str::Utf8Error> for SamlError {
    fn from(err: std::str::Utf8Error) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64Decode(err.to_string())
    }
}

impl From<std::io::Error> for SamlError {
    fn from(err: std::io::Error) -> Self {
        Self::Deflate(err.to_string())
    }
}

impl From<fed_crypto::CryptoError> for SamlError {
    fn from(err: fed_crypto::CryptoError) -> Self {
        Self::Crypto(err.to_string())
    }
}

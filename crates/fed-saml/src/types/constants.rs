//! SAML 2.0 constants and URIs.
//!
//! Namespace URIs, binding URIs, name ID formats, authentication context
//! classes and status codes used by the handlers.

/// SAML 2.0 assertion namespace URI.
pub const SAML_NS: &str = "urn:oasis:names:tc:SAML:2.0:assertion";

/// SAML 2.0 protocol namespace URI.
pub const SAMLP_NS: &str = "urn:oasis:names:tc:SAML:2.0:protocol";

/// SAML 2.0 metadata namespace URI.
pub const MD_NS: &str = "urn:oasis:names:tc:SAML:2.0:metadata";

/// XML Digital Signature namespace URI.
pub const XMLDSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// XML Encryption namespace URI.
pub const XMLENC_NS: &str = "http://www.w3.org/2001/04/xmlenc#";

/// XML Encryption `Type` for an encrypted element.
pub const XMLENC_ELEMENT_TYPE: &str = "http://www.w3.org/2001/04/xmlenc#Element";

/// Enveloped signature transform URI.
pub const ENVELOPED_SIGNATURE_TRANSFORM: &str =
    "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// Exclusive C14N without comments.
pub const EXCLUSIVE_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// Bearer subject confirmation method.
pub const CONFIRMATION_BEARER: &str = "urn:oasis:names:tc:SAML:2.0:cm:bearer";

/// Attribute name used when sending roles.
pub const ROLE_ATTRIBUTE_NAME: &str = "Role";

/// Basic attribute name format.
pub const ATTRIBUTE_FORMAT_BASIC: &str = "urn:oasis:names:tc:SAML:2.0:attrname-format:basic";

// ============================================================================
// Binding URIs
// ============================================================================

/// SAML binding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamlBinding {
    /// HTTP POST binding.
    HttpPost,
    /// HTTP Redirect binding.
    HttpRedirect,
}

impl SamlBinding {
    /// Returns the URI for this binding.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::HttpPost => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST",
            Self::HttpRedirect => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect",
        }
    }

    /// Parses a binding from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" => Some(Self::HttpPost),
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" => Some(Self::HttpRedirect),
            _ => None,
        }
    }

    /// Parses the short configuration name (`POST` or `REDIRECT`).
    #[must_use]
    pub fn from_config_name(name: &str) -> Option<Self> {
        match name {
            "POST" => Some(Self::HttpPost),
            "REDIRECT" => Some(Self::HttpRedirect),
            _ => None,
        }
    }
}

// ============================================================================
// Name ID Formats
// ============================================================================

/// SAML Name ID formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NameIdFormat {
    /// Unspecified format.
    #[default]
    Unspecified,
    /// Email address.
    Email,
    /// Persistent, opaque identifier.
    Persistent,
    /// Transient, one-time identifier.
    Transient,
}

impl NameIdFormat {
    /// Returns the URI for this format.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::Unspecified => "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified",
            Self::Email => "urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress",
            Self::Persistent => "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent",
            Self::Transient => "urn:oasis:names:tc:SAML:2.0:nameid-format:transient",
        }
    }

    /// Parses a format from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        [Self::Unspecified, Self::Email, Self::Persistent, Self::Transient]
            .into_iter()
            .find(|format| format.uri() == uri)
    }
}

// ============================================================================
// Authentication Context Classes
// ============================================================================

/// SAML authentication context classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthnContextClass {
    /// Unspecified.
    Unspecified,
    /// Password over an unprotected channel.
    Password,
    /// Password over a protected channel.
    PasswordProtectedTransport,
}

impl AuthnContextClass {
    /// Returns the URI for this class.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::Unspecified => "urn:oasis:names:tc:SAML:2.0:ac:classes:unspecified",
            Self::Password => "urn:oasis:names:tc:SAML:2.0:ac:classes:Password",
            Self::PasswordProtectedTransport => {
                "urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport"
            }
        }
    }

    /// Parses a class from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        [Self::Unspecified, Self::Password, Self::PasswordProtectedTransport]
            .into_iter()
            .find(|class| class.uri() == uri)
    }
}

// ============================================================================
// Status Codes
// ============================================================================

/// Top-level SAML status codes.
pub mod status_codes {
    /// Success.
    pub const SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";

    /// The request could not be performed due to an error on the sender's part.
    pub const REQUESTER: &str = "urn:oasis:names:tc:SAML:2.0:status:Requester";

    /// The request could not be performed due to an error on the responder's part.
    pub const RESPONDER: &str = "urn:oasis:names:tc:SAML:2.0:status:Responder";

    /// The responding provider was unable to authenticate the principal.
    pub const AUTHN_FAILED: &str = "urn:oasis:names:tc:SAML:2.0:status:AuthnFailed";
}

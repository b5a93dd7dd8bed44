//! SAML AuthnRequest types.
//!
//! Authentication request message sent by a service provider to an identity provider.

use chrono::{DateTime, Utc};

use crate::error::{SamlError, SamlResult};
use crate::xml::Element;

use super::{
    format_instant, generate_id, parse_instant, required_attribute, saml_element, samlp_element,
    SamlBinding, SAMLP_NS, SAML_NS,
};

/// SAML Authentication Request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthnRequest {
    /// Unique identifier for this request.
    pub id: String,

    /// Timestamp when this request was issued.
    pub issue_instant: DateTime<Utc>,

    /// The entity ID of the service provider issuing the request.
    pub issuer: Option<String>,

    /// The URL this request is sent to.
    pub destination: Option<String>,

    /// The URL where the response should be sent.
    pub assertion_consumer_service_url: Option<String>,

    /// Binding URI requested for the response.
    pub protocol_binding: Option<String>,

    /// Name ID policy constraints.
    pub name_id_policy: Option<NameIdPolicy>,

    /// Whether the IdP must authenticate the user directly.
    pub force_authn: bool,
}

impl AuthnRequest {
    /// Creates a new authentication request with a generated ID.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            issue_instant: Utc::now(),
            issuer: Some(issuer.into()),
            destination: None,
            assertion_consumer_service_url: None,
            protocol_binding: None,
            name_id_policy: None,
            force_authn: false,
        }
    }

    /// Creates a new authentication request with a custom ID.
    #[must_use]
    pub fn with_id(id: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::new(issuer)
        }
    }

    /// Sets the assertion consumer service URL.
    #[must_use]
    pub fn with_acs_url(mut self, url: impl Into<String>) -> Self {
        self.assertion_consumer_service_url = Some(url.into());
        self
    }

    /// Sets the destination URL.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Sets the protocol binding for the response.
    #[must_use]
    pub fn with_binding(mut self, binding: SamlBinding) -> Self {
        self.protocol_binding = Some(binding.uri().to_string());
        self
    }

    /// Sets the name ID policy.
    #[must_use]
    pub fn with_name_id_policy(mut self, policy: NameIdPolicy) -> Self {
        self.name_id_policy = Some(policy);
        self
    }

    /// Returns the requested binding, if it is a known one.
    #[must_use]
    pub fn parsed_binding(&self) -> Option<SamlBinding> {
        self.protocol_binding.as_deref().and_then(SamlBinding::from_uri)
    }

    /// Builds the element tree.
    #[must_use]
    pub fn to_element(&self) -> Element {
        let mut element = Element::declared("samlp", "AuthnRequest", SAMLP_NS)
            .with_attribute("xmlns:saml", SAML_NS)
            .with_attribute("ID", self.id.as_str())
            .with_attribute("Version", "2.0")
            .with_attribute("IssueInstant", format_instant(&self.issue_instant))
            .with_optional_attribute("Destination", self.destination.as_deref())
            .with_optional_attribute(
                "AssertionConsumerServiceURL",
                self.assertion_consumer_service_url.as_deref(),
            )
            .with_optional_attribute("ProtocolBinding", self.protocol_binding.as_deref());
        if self.force_authn {
            element = element.with_attribute("ForceAuthn", "true");
        }
        if let Some(issuer) = &self.issuer {
            element = element.with_child(saml_element("Issuer").with_text(issuer.as_str()));
        }
        if let Some(policy) = &self.name_id_policy {
            element = element.with_child(policy.to_element());
        }
        element
    }

    /// Serializes the request.
    #[must_use]
    pub fn to_xml(&self) -> String {
        self.to_element().to_xml()
    }

    /// Reads a request from its element.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is not an AuthnRequest or required
    /// attributes are missing.
    pub fn from_element(element: &Element) -> SamlResult<Self> {
        if !element.is(SAMLP_NS, "AuthnRequest") {
            return Err(SamlError::Protocol(format!(
                "expected samlp:AuthnRequest, found {}",
                element.qualified_name()
            )));
        }
        Ok(Self {
            id: required_attribute(element, "ID")?.to_string(),
            issue_instant: parse_instant(required_attribute(element, "IssueInstant")?)?,
            issuer: element.child_text(SAML_NS, "Issuer"),
            destination: element.attribute("Destination").map(str::to_string),
            assertion_consumer_service_url: element
                .attribute("AssertionConsumerServiceURL")
                .map(str::to_string),
            protocol_binding: element.attribute("ProtocolBinding").map(str::to_string),
            name_id_policy: element
                .child(SAMLP_NS, "NameIDPolicy")
                .map(NameIdPolicy::from_element),
            force_authn: matches!(element.attribute("ForceAuthn"), Some("true" | "1")),
        })
    }

    /// Parses a request document.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed XML or a non-AuthnRequest root.
    pub fn from_xml(xml: &str) -> SamlResult<Self> {
        Self::from_element(&Element::parse(xml)?)
    }
}

/// Name ID policy of an authentication request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NameIdPolicy {
    /// Requested name ID format URI.
    pub format: Option<String>,

    /// Whether the IdP may create a new identifier.
    pub allow_create: Option<bool>,
}

impl NameIdPolicy {
    /// Creates a policy requesting a format.
    #[must_use]
    pub fn format(format: impl Into<String>) -> Self {
        Self {
            format: Some(format.into()),
            allow_create: Some(true),
        }
    }

    fn to_element(&self) -> Element {
        samlp_element("NameIDPolicy")
            .with_optional_attribute("Format", self.format.as_deref())
            .with_optional_attribute("AllowCreate", self.allow_create.map(|b| b.to_string()))
    }

    fn from_element(element: &Element) -> Self {
        Self {
            format: element.attribute("Format").map(str::to_string),
            allow_create: element.attribute("AllowCreate").map(|v| v == "true" || v == "1"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NameIdFormat;

    #[test]
    fn request_roundtrip() {
        let request = AuthnRequest::new("https://sp.example.com")
            .with_acs_url("https://sp.example.com/acs")
            .with_destination("https://idp.example.com/sso")
            .with_binding(SamlBinding::HttpPost)
            .with_name_id_policy(NameIdPolicy::format(NameIdFormat::Email.uri()));

        let parsed = AuthnRequest::from_xml(&request.to_xml()).unwrap();
        assert_eq!(parsed.id, request.id);
        assert_eq!(parsed.issuer.as_deref(), Some("https://sp.example.com"));
        assert_eq!(parsed.parsed_binding(), Some(SamlBinding::HttpPost));
        assert_eq!(
            parsed.name_id_policy.and_then(|p| p.format).as_deref(),
            Some(NameIdFormat::Email.uri())
        );
        assert!(!parsed.force_authn);
    }

    #[test]
    fn response_document_is_not_a_request() {
        let xml = format!(r#"<samlp:Response xmlns:samlp="{SAMLP_NS}" ID="x"/>"#);
        assert!(matches!(AuthnRequest::from_xml(&xml), Err(SamlError::Protocol(_))));
    }
}

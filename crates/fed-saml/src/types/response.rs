//! SAML Response types.
//!
//! Response messages sent by an identity provider to a service provider.

use chrono::{DateTime, Utc};

use crate::error::{SamlError, SamlResult};
use crate::xml::{Element, Node};

use super::{
    format_instant, generate_id, parse_instant, required_attribute, saml_element, Assertion,
    Status, SAMLP_NS, SAML_NS, XMLENC_NS,
};

/// SAML Response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Unique identifier for this response.
    pub id: String,

    /// Timestamp when this response was issued.
    pub issue_instant: DateTime<Utc>,

    /// The entity ID of the identity provider that issued this response.
    pub issuer: Option<String>,

    /// The ID of the request this response is for.
    pub in_response_to: Option<String>,

    /// The URL where this response was sent.
    pub destination: Option<String>,

    /// The status of the response.
    pub status: Status,

    /// Assertions in document order, plain or encrypted.
    pub assertions: Vec<AssertionChoice>,
}

impl Response {
    /// Creates a new success response.
    #[must_use]
    pub fn success(issuer: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            issue_instant: Utc::now(),
            issuer: Some(issuer.into()),
            in_response_to: None,
            destination: None,
            status: Status::success(),
            assertions: Vec::new(),
        }
    }

    /// Creates a new error response.
    #[must_use]
    pub fn error(issuer: impl Into<String>, status: Status) -> Self {
        Self {
            status,
            ..Self::success(issuer)
        }
    }

    /// Sets the request ID this response is for.
    #[must_use]
    pub fn in_response_to(mut self, request_id: impl Into<String>) -> Self {
        self.in_response_to = Some(request_id.into());
        self
    }

    /// Sets the destination URL.
    #[must_use]
    pub fn with_destination(mut self, url: impl Into<String>) -> Self {
        self.destination = Some(url.into());
        self
    }

    /// Adds a plain assertion.
    #[must_use]
    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(AssertionChoice::Plain(assertion));
        self
    }

    /// Adds an encrypted assertion.
    #[must_use]
    pub fn with_encrypted_assertion(mut self, assertion: EncryptedAssertion) -> Self {
        self.assertions.push(AssertionChoice::Encrypted(assertion));
        self
    }

    /// Returns true if the status is success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns the first assertion choice.
    #[must_use]
    pub fn first_assertion_choice(&self) -> Option<&AssertionChoice> {
        self.assertions.first()
    }

    /// Returns the first plain assertion.
    #[must_use]
    pub fn first_assertion(&self) -> Option<&Assertion> {
        self.assertions.iter().find_map(|choice| match choice {
            AssertionChoice::Plain(assertion) => Some(assertion),
            AssertionChoice::Encrypted(_) => None,
        })
    }

    /// Builds the element tree.
    #[must_use]
    pub fn to_element(&self) -> Element {
        let mut element = Element::declared("samlp", "Response", SAMLP_NS)
            .with_attribute("xmlns:saml", SAML_NS)
            .with_attribute("ID", self.id.as_str())
            .with_attribute("Version", "2.0")
            .with_attribute("IssueInstant", format_instant(&self.issue_instant))
            .with_optional_attribute("Destination", self.destination.as_deref())
            .with_optional_attribute("InResponseTo", self.in_response_to.as_deref());
        if let Some(issuer) = &self.issuer {
            element = element.with_child(saml_element("Issuer").with_text(issuer.as_str()));
        }
        element = element.with_child(self.status.to_element());
        for choice in &self.assertions {
            element = element.with_child(match choice {
                AssertionChoice::Plain(assertion) => assertion.to_element(),
                AssertionChoice::Encrypted(encrypted) => encrypted.element.clone(),
            });
        }
        element
    }

    /// Serializes the response.
    #[must_use]
    pub fn to_xml(&self) -> String {
        self.to_element().to_xml()
    }

    /// Reads a response from its element.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is not a Response, the status is
    /// missing, or an embedded assertion is malformed.
    pub fn from_element(element: &Element) -> SamlResult<Self> {
        if !element.is(SAMLP_NS, "Response") {
            return Err(SamlError::Protocol(format!(
                "expected samlp:Response, found {}",
                element.qualified_name()
            )));
        }

        let status = element
            .child(SAMLP_NS, "Status")
            .ok_or_else(|| SamlError::MissingElement("Status".to_string()))?;

        let mut assertions = Vec::new();
        for (index, node) in element.children.iter().enumerate() {
            let Node::Element(child) = node else {
                continue;
            };
            if child.is(SAML_NS, "Assertion") {
                assertions.push(AssertionChoice::Plain(Assertion::from_element(child)?));
            } else if child.is(SAML_NS, "EncryptedAssertion") {
                let detached = element.detached(&[index]).ok_or_else(|| {
                    SamlError::XmlParse("EncryptedAssertion could not be detached".to_string())
                })?;
                assertions.push(AssertionChoice::Encrypted(EncryptedAssertion::new(detached)?));
            }
        }

        Ok(Self {
            id: required_attribute(element, "ID")?.to_string(),
            issue_instant: parse_instant(required_attribute(element, "IssueInstant")?)?,
            issuer: element.child_text(SAML_NS, "Issuer"),
            in_response_to: element.attribute("InResponseTo").map(str::to_string),
            destination: element.attribute("Destination").map(str::to_string),
            status: Status::from_element(status)?,
            assertions,
        })
    }

    /// Parses a response document.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed XML or a non-Response root.
    pub fn from_xml(xml: &str) -> SamlResult<Self> {
        Self::from_element(&Element::parse(xml)?)
    }
}

/// The assertion choice of a response.
#[derive(Debug, Clone, PartialEq)]
pub enum AssertionChoice {
    /// A plaintext assertion.
    Plain(Assertion),
    /// An encrypted assertion.
    Encrypted(EncryptedAssertion),
}

impl AssertionChoice {
    /// Returns the plaintext assertion, if not encrypted.
    #[must_use]
    pub fn as_plain(&self) -> Option<&Assertion> {
        match self {
            Self::Plain(assertion) => Some(assertion),
            Self::Encrypted(_) => None,
        }
    }
}

/// An `EncryptedAssertion` element kept as a tree until it is decrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedAssertion {
    /// The `EncryptedAssertion` element, with its namespace declarations.
    pub element: Element,
}

impl EncryptedAssertion {
    /// Wraps an `EncryptedAssertion` element.
    ///
    /// # Errors
    ///
    /// Returns an error if the element has the wrong name or carries no
    /// `xenc:EncryptedData`.
    pub fn new(element: Element) -> SamlResult<Self> {
        if !element.is(SAML_NS, "EncryptedAssertion") {
            return Err(SamlError::Protocol(format!(
                "expected saml:EncryptedAssertion, found {}",
                element.qualified_name()
            )));
        }
        if element.child(XMLENC_NS, "EncryptedData").is_none() {
            return Err(SamlError::MissingElement("EncryptedData".to_string()));
        }
        Ok(Self { element })
    }

    /// The `Id` of the `EncryptedData`, if present.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.element
            .child(XMLENC_NS, "EncryptedData")
            .and_then(|data| data.attribute("Id"))
    }
}

//! SAML Assertion types.
//!
//! Assertions contain statements about a subject made by an issuer.

use chrono::{DateTime, Duration, Utc};

use crate::error::{SamlError, SamlResult};
use crate::xml::Element;

use super::{
    format_instant, generate_id, optional_instant, parse_instant, required_attribute,
    saml_element, NameId, CONFIRMATION_BEARER, SAML_NS,
};

/// SAML Assertion.
///
/// A package of information that supplies one or more statements made
/// by a SAML authority (the issuer).
#[derive(Debug, Clone, PartialEq)]
pub struct Assertion {
    /// Unique identifier for this assertion.
    pub id: String,

    /// Timestamp when this assertion was issued.
    pub issue_instant: DateTime<Utc>,

    /// The entity ID of the issuer.
    pub issuer: Option<String>,

    /// The subject of this assertion.
    pub subject: Option<Subject>,

    /// Conditions that must be evaluated for the assertion to be valid.
    pub conditions: Option<Conditions>,

    /// Authentication and attribute statements in document order.
    pub statements: Vec<Statement>,
}

impl Assertion {
    /// Creates a new assertion with a generated ID.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            issue_instant: Utc::now(),
            issuer: Some(issuer.into()),
            subject: None,
            conditions: None,
            statements: Vec::new(),
        }
    }

    /// Creates a new assertion with a custom ID.
    #[must_use]
    pub fn with_id(id: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::new(issuer)
        }
    }

    /// Sets the subject.
    #[must_use]
    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Sets the conditions.
    #[must_use]
    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Appends a statement.
    #[must_use]
    pub fn with_statement(mut self, statement: Statement) -> Self {
        self.statements.push(statement);
        self
    }

    /// Returns the NameID of the subject, if the subject is identified by one.
    #[must_use]
    pub fn subject_name_id(&self) -> Option<&NameId> {
        match self.subject.as_ref()?.identifier.as_ref()? {
            SubjectIdentifier::NameId(name_id) => Some(name_id),
            SubjectIdentifier::BaseId(_) | SubjectIdentifier::EncryptedId => None,
        }
    }

    /// Iterates over the authentication statements.
    pub fn authn_statements(&self) -> impl Iterator<Item = &AuthnStatement> {
        self.statements.iter().filter_map(|s| match s {
            Statement::Authn(statement) => Some(statement),
            Statement::Attribute(_) => None,
        })
    }

    /// Iterates over the attribute statements.
    pub fn attribute_statements(&self) -> impl Iterator<Item = &AttributeStatement> {
        self.statements.iter().filter_map(|s| match s {
            Statement::Attribute(statement) => Some(statement),
            Statement::Authn(_) => None,
        })
    }

    /// Checks the validity window against `now`.
    ///
    /// The window `[NotBefore - skew, NotOnOrAfter + skew)` must contain
    /// `now`. An assertion without conditions never expires. A bound that
    /// overflows once widened by the skew leaves that side open.
    #[must_use]
    pub fn has_expired(&self, now: DateTime<Utc>, clock_skew: Duration) -> bool {
        let Some(conditions) = &self.conditions else {
            return false;
        };
        if let Some(not_before) = conditions.not_before {
            if not_before
                .checked_sub_signed(clock_skew)
                .is_some_and(|earliest| now < earliest)
            {
                return true;
            }
        }
        if let Some(not_on_or_after) = conditions.not_on_or_after {
            if not_on_or_after
                .checked_add_signed(clock_skew)
                .is_some_and(|latest| now >= latest)
            {
                return true;
            }
        }
        false
    }

    /// Builds the element tree. The root declares the `saml` namespace so
    /// the element can stand alone or be embedded.
    #[must_use]
    pub fn to_element(&self) -> Element {
        let mut element = Element::declared("saml", "Assertion", SAML_NS)
            .with_attribute("ID", self.id.as_str())
            .with_attribute("Version", "2.0")
            .with_attribute("IssueInstant", format_instant(&self.issue_instant));

        if let Some(issuer) = &self.issuer {
            element = element.with_child(saml_element("Issuer").with_text(issuer.as_str()));
        }
        if let Some(subject) = &self.subject {
            element = element.with_child(subject.to_element());
        }
        if let Some(conditions) = &self.conditions {
            element = element.with_child(conditions.to_element());
        }
        for statement in &self.statements {
            element = element.with_child(match statement {
                Statement::Authn(authn) => authn.to_element(),
                Statement::Attribute(attributes) => attributes.to_element(),
            });
        }
        element
    }

    /// Serializes the assertion as a standalone document.
    #[must_use]
    pub fn to_xml(&self) -> String {
        self.to_element().to_xml()
    }

    /// Reads an assertion from its element.
    ///
    /// # Errors
    ///
    /// Returns an error if the element is not an assertion or required
    /// attributes are missing or malformed.
    pub fn from_element(element: &Element) -> SamlResult<Self> {
        if !element.is(SAML_NS, "Assertion") {
            return Err(SamlError::Protocol(format!(
                "expected saml:Assertion, found {}",
                element.qualified_name()
            )));
        }

        let mut statements = Vec::new();
        for child in element.child_elements() {
            if child.is(SAML_NS, "AuthnStatement") {
                statements.push(Statement::Authn(AuthnStatement::from_element(child)?));
            } else if child.is(SAML_NS, "AttributeStatement") {
                statements.push(Statement::Attribute(AttributeStatement::from_element(child)?));
            }
        }

        Ok(Self {
            id: required_attribute(element, "ID")?.to_string(),
            issue_instant: parse_instant(required_attribute(element, "IssueInstant")?)?,
            issuer: element.child_text(SAML_NS, "Issuer"),
            subject: element
                .child(SAML_NS, "Subject")
                .map(Subject::from_element)
                .transpose()?,
            conditions: element
                .child(SAML_NS, "Conditions")
                .map(Conditions::from_element)
                .transpose()?,
            statements,
        })
    }

    /// Parses an assertion document.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed XML or a non-assertion root.
    pub fn from_xml(xml: &str) -> SamlResult<Self> {
        Self::from_element(&Element::parse(xml)?)
    }
}

/// A statement carried by an assertion.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Authentication statement.
    Authn(AuthnStatement),
    /// Attribute statement.
    Attribute(AttributeStatement),
}

/// Subject of an assertion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Subject {
    /// How the subject is identified.
    pub identifier: Option<SubjectIdentifier>,

    /// Subject confirmations.
    pub confirmations: Vec<SubjectConfirmation>,
}

impl Subject {
    /// Creates a subject identified by a name ID.
    #[must_use]
    pub fn new(name_id: NameId) -> Self {
        Self {
            identifier: Some(SubjectIdentifier::NameId(name_id)),
            confirmations: Vec::new(),
        }
    }

    /// Adds a subject confirmation.
    #[must_use]
    pub fn with_confirmation(mut self, confirmation: SubjectConfirmation) -> Self {
        self.confirmations.push(confirmation);
        self
    }

    fn to_element(&self) -> Element {
        let mut element = saml_element("Subject");
        match &self.identifier {
            Some(SubjectIdentifier::NameId(name_id)) => {
                element = element.with_child(name_id.to_element());
            }
            Some(SubjectIdentifier::BaseId(value)) => {
                element = element.with_child(saml_element("BaseID").with_text(value.as_str()));
            }
            Some(SubjectIdentifier::EncryptedId) => {
                element = element.with_child(saml_element("EncryptedID"));
            }
            None => {}
        }
        for confirmation in &self.confirmations {
            element = element.with_child(confirmation.to_element());
        }
        element
    }

    fn from_element(element: &Element) -> SamlResult<Self> {
        let identifier = if let Some(name_id) = element.child(SAML_NS, "NameID") {
            Some(SubjectIdentifier::NameId(NameId::from_element(name_id)))
        } else if let Some(base_id) = element.child(SAML_NS, "BaseID") {
            Some(SubjectIdentifier::BaseId(base_id.text()))
        } else if element.child(SAML_NS, "EncryptedID").is_some() {
            Some(SubjectIdentifier::EncryptedId)
        } else {
            None
        };

        let confirmations = element
            .children_named(SAML_NS, "SubjectConfirmation")
            .map(SubjectConfirmation::from_element)
            .collect::<SamlResult<Vec<_>>>()?;

        Ok(Self {
            identifier,
            confirmations,
        })
    }
}

/// The identifier choice of a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectIdentifier {
    /// A name identifier.
    NameId(NameId),
    /// An extension identifier, kept as text.
    BaseId(String),
    /// An encrypted identifier; its content is not interpreted.
    EncryptedId,
}

/// Subject confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectConfirmation {
    /// The confirmation method.
    pub method: String,

    /// Additional confirmation data.
    pub data: Option<SubjectConfirmationData>,
}

impl SubjectConfirmation {
    /// Creates a bearer confirmation.
    #[must_use]
    pub fn bearer() -> Self {
        Self {
            method: CONFIRMATION_BEARER.to_string(),
            data: None,
        }
    }

    /// Sets the confirmation data.
    #[must_use]
    pub fn with_data(mut self, data: SubjectConfirmationData) -> Self {
        self.data = Some(data);
        self
    }

    fn to_element(&self) -> Element {
        let element = saml_element("SubjectConfirmation").with_attribute("Method", self.method.as_str());
        match &self.data {
            Some(data) => element.with_child(data.to_element()),
            None => element,
        }
    }

    fn from_element(element: &Element) -> SamlResult<Self> {
        Ok(Self {
            method: required_attribute(element, "Method")?.to_string(),
            data: element
                .child(SAML_NS, "SubjectConfirmationData")
                .map(SubjectConfirmationData::from_element)
                .transpose()?,
        })
    }
}

/// Subject confirmation data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubjectConfirmationData {
    /// The request ID that this assertion responds to.
    pub in_response_to: Option<String>,

    /// Time after which the subject can no longer be confirmed.
    pub not_on_or_after: Option<DateTime<Utc>>,

    /// The location to which the assertion can be presented.
    pub recipient: Option<String>,
}

impl SubjectConfirmationData {
    fn to_element(&self) -> Element {
        saml_element("SubjectConfirmationData")
            .with_optional_attribute("InResponseTo", self.in_response_to.as_deref())
            .with_optional_attribute("NotOnOrAfter", self.not_on_or_after.as_ref().map(format_instant))
            .with_optional_attribute("Recipient", self.recipient.as_deref())
    }

    fn from_element(element: &Element) -> SamlResult<Self> {
        Ok(Self {
            in_response_to: element.attribute("InResponseTo").map(str::to_string),
            not_on_or_after: optional_instant(element, "NotOnOrAfter")?,
            recipient: element.attribute("Recipient").map(str::to_string),
        })
    }
}

/// Conditions for assertion validity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Conditions {
    /// Time before which the assertion is not valid.
    pub not_before: Option<DateTime<Utc>>,

    /// Time at or after which the assertion is not valid.
    pub not_on_or_after: Option<DateTime<Utc>>,

    /// Audiences the assertion is restricted to.
    pub audiences: Vec<String>,
}

impl Conditions {
    /// Creates conditions valid from `now` for `validity`.
    #[must_use]
    pub fn valid_for(now: DateTime<Utc>, validity: Duration) -> Self {
        Self {
            not_before: Some(now),
            not_on_or_after: Some(now + validity),
            audiences: Vec::new(),
        }
    }

    /// Adds an audience.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audiences.push(audience.into());
        self
    }

    fn to_element(&self) -> Element {
        let mut element = saml_element("Conditions")
            .with_optional_attribute("NotBefore", self.not_before.as_ref().map(format_instant))
            .with_optional_attribute(
                "NotOnOrAfter",
                self.not_on_or_after.as_ref().map(format_instant),
            );
        if !self.audiences.is_empty() {
            let restriction = self.audiences.iter().fold(
                saml_element("AudienceRestriction"),
                |restriction, audience| {
                    restriction.with_child(saml_element("Audience").with_text(audience.as_str()))
                },
            );
            element = element.with_child(restriction);
        }
        element
    }

    fn from_element(element: &Element) -> SamlResult<Self> {
        let audiences = element
            .children_named(SAML_NS, "AudienceRestriction")
            .flat_map(|restriction| restriction.children_named(SAML_NS, "Audience"))
            .map(Element::text)
            .collect();
        Ok(Self {
            not_before: optional_instant(element, "NotBefore")?,
            not_on_or_after: optional_instant(element, "NotOnOrAfter")?,
            audiences,
        })
    }
}

/// Authentication statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthnStatement {
    /// The time of authentication.
    pub authn_instant: DateTime<Utc>,

    /// The session index.
    pub session_index: Option<String>,

    /// Authentication context class reference URI.
    pub authn_context_class_ref: Option<String>,
}

impl AuthnStatement {
    /// Creates an authentication statement with a context class reference.
    #[must_use]
    pub fn new(authn_instant: DateTime<Utc>, context_class_ref: impl Into<String>) -> Self {
        Self {
            authn_instant,
            session_index: None,
            authn_context_class_ref: Some(context_class_ref.into()),
        }
    }

    /// Sets the session index.
    #[must_use]
    pub fn with_session_index(mut self, index: impl Into<String>) -> Self {
        self.session_index = Some(index.into());
        self
    }

    fn to_element(&self) -> Element {
        let mut context = saml_element("AuthnContext");
        if let Some(class_ref) = &self.authn_context_class_ref {
            context = context.with_child(saml_element("AuthnContextClassRef").with_text(class_ref.as_str()));
        }
        saml_element("AuthnStatement")
            .with_attribute("AuthnInstant", format_instant(&self.authn_instant))
            .with_optional_attribute("SessionIndex", self.session_index.as_deref())
            .with_child(context)
    }

    fn from_element(element: &Element) -> SamlResult<Self> {
        Ok(Self {
            authn_instant: parse_instant(required_attribute(element, "AuthnInstant")?)?,
            session_index: element.attribute("SessionIndex").map(str::to_string),
            authn_context_class_ref: element
                .child(SAML_NS, "AuthnContext")
                .and_then(|context| context.child_text(SAML_NS, "AuthnContextClassRef")),
        })
    }
}

/// Attribute statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeStatement {
    /// List of attributes.
    pub attributes: Vec<Attribute>,
}

impl AttributeStatement {
    /// Creates a new empty attribute statement.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            attributes: Vec::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    fn to_element(&self) -> Element {
        self.attributes
            .iter()
            .fold(saml_element("AttributeStatement"), |element, attribute| {
                element.with_child(attribute.to_element())
            })
    }

    fn from_element(element: &Element) -> SamlResult<Self> {
        let attributes = element
            .children_named(SAML_NS, "Attribute")
            .map(Attribute::from_element)
            .collect::<SamlResult<Vec<_>>>()?;
        Ok(Self { attributes })
    }
}

/// SAML Attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// The attribute name.
    pub name: String,

    /// The format of the attribute name.
    pub name_format: Option<String>,

    /// A human-readable name for the attribute.
    pub friendly_name: Option<String>,

    /// The attribute values.
    pub values: Vec<AttributeValue>,
}

impl Attribute {
    /// Creates an attribute with text values.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            name_format: None,
            friendly_name: None,
            values: values
                .into_iter()
                .map(|v| AttributeValue::Text(v.into()))
                .collect(),
        }
    }

    /// Sets the friendly name.
    #[must_use]
    pub fn with_friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }

    /// Sets the name format.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.name_format = Some(format.into());
        self
    }

    /// Appends a value.
    #[must_use]
    pub fn with_value(mut self, value: AttributeValue) -> Self {
        self.values.push(value);
        self
    }

    /// Iterates over the plain text values.
    pub fn text_values(&self) -> impl Iterator<Item = &str> {
        self.values.iter().filter_map(|v| match v {
            AttributeValue::Text(text) => Some(text.as_str()),
            AttributeValue::Node(_) => None,
        })
    }

    fn to_element(&self) -> Element {
        let element = saml_element("Attribute")
            .with_attribute("Name", self.name.as_str())
            .with_optional_attribute("NameFormat", self.name_format.as_deref())
            .with_optional_attribute("FriendlyName", self.friendly_name.as_deref());
        self.values.iter().fold(element, |element, value| {
            let value_element = saml_element("AttributeValue");
            element.with_child(match value {
                AttributeValue::Text(text) => value_element.with_text(text.as_str()),
                AttributeValue::Node(node) => value_element.with_child(node.clone()),
            })
        })
    }

    fn from_element(element: &Element) -> SamlResult<Self> {
        let values = element
            .children_named(SAML_NS, "AttributeValue")
            .map(|value| match value.child_elements().next() {
                Some(node) => AttributeValue::Node(node.clone()),
                None => AttributeValue::Text(value.text()),
            })
            .collect();
        Ok(Self {
            name: required_attribute(element, "Name")?.to_string(),
            name_format: element.attribute("NameFormat").map(str::to_string),
            friendly_name: element.attribute("FriendlyName").map(str::to_string),
            values,
        })
    }
}

/// An attribute value: plain text, or a structured element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// Text content.
    Text(String),
    /// The first element nested inside the `AttributeValue`.
    Node(Element),
}

//! SAML Name ID types.
//!
//! Name identifiers identify the subject of an assertion.

use crate::xml::Element;

use super::{saml_element, NameIdFormat};

/// SAML Name ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameId {
    /// The identifier value.
    pub value: String,

    /// The format URI of the identifier.
    pub format: Option<String>,

    /// The security or administrative domain that qualifies the name.
    pub name_qualifier: Option<String>,

    /// The service provider's entity ID that qualifies the name.
    pub sp_name_qualifier: Option<String>,
}

impl NameId {
    /// Creates a name ID without a format.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            format: None,
            name_qualifier: None,
            sp_name_qualifier: None,
        }
    }

    /// Creates a persistent name ID.
    #[must_use]
    pub fn persistent(value: impl Into<String>) -> Self {
        Self::new(value).with_format(NameIdFormat::Persistent)
    }

    /// Sets the format.
    #[must_use]
    pub fn with_format(mut self, format: NameIdFormat) -> Self {
        self.format = Some(format.uri().to_string());
        self
    }

    /// Returns the parsed format, if it is a known one.
    #[must_use]
    pub fn format_enum(&self) -> Option<NameIdFormat> {
        self.format.as_deref().and_then(NameIdFormat::from_uri)
    }

    pub(crate) fn to_element(&self) -> Element {
        saml_element("NameID")
            .with_optional_attribute("Format", self.format.as_deref())
            .with_optional_attribute("NameQualifier", self.name_qualifier.as_deref())
            .with_optional_attribute("SPNameQualifier", self.sp_name_qualifier.as_deref())
            .with_text(self.value.as_str())
    }

    pub(crate) fn from_element(element: &Element) -> Self {
        Self {
            value: element.text(),
            format: element.attribute("Format").map(str::to_string),
            name_qualifier: element.attribute("NameQualifier").map(str::to_string),
            sp_name_qualifier: element.attribute("SPNameQualifier").map(str::to_string),
        }
    }
}

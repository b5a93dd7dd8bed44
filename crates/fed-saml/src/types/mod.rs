//! SAML 2.0 types and data structures.
//!
//! Requests, responses, assertions and metadata, each convertible to and
//! from the [`Element`](crate::xml::Element) tree.

mod assertion;
mod authn_request;
mod constants;
mod message;
mod metadata;
mod name_id;
mod response;
mod status;

pub use assertion::*;
pub use authn_request::*;
pub use constants::*;
pub use message::*;
pub use metadata::*;
pub use name_id::*;
pub use response::*;
pub use status::*;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{SamlError, SamlResult};
use crate::xml::Element;

/// Generates a protocol identifier (`ID_` followed by a UUID).
#[must_use]
pub fn generate_id() -> String {
    format!("ID_{}", uuid::Uuid::new_v4())
}

/// Formats an instant the way SAML expects (`xs:dateTime`, UTC, millis).
pub(crate) fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an `xs:dateTime` attribute value.
pub(crate) fn parse_instant(value: &str) -> SamlResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SamlError::XmlParse(format!("invalid instant '{value}': {e}")))
}

/// Reads a required attribute.
pub(crate) fn required_attribute<'a>(element: &'a Element, name: &str) -> SamlResult<&'a str> {
    element.attribute(name).ok_or_else(|| {
        SamlError::MissingElement(format!("{}@{name}", element.qualified_name()))
    })
}

/// Reads an optional instant attribute.
pub(crate) fn optional_instant(element: &Element, name: &str) -> SamlResult<Option<DateTime<Utc>>> {
    element.attribute(name).map(parse_instant).transpose()
}

/// Creates a `saml:` element.
pub(crate) fn saml_element(name: &str) -> Element {
    Element::new(Some("saml"), name, Some(SAML_NS))
}

/// Creates a `samlp:` element.
pub(crate) fn samlp_element(name: &str) -> Element {
    Element::new(Some("samlp"), name, Some(SAMLP_NS))
}

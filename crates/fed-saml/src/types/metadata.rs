//! SAML metadata for service providers.
//!
//! Only the parts the handlers consult are modelled: the entity ID, the
//! assertion consumer services and the single logout services.

use crate::error::{SamlError, SamlResult};
use crate::xml::Element;

use super::{required_attribute, SamlBinding, MD_NS};

/// An `SPSSODescriptor`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpSsoDescriptor {
    /// Entity ID of the enclosing `EntityDescriptor`, if known.
    pub entity_id: Option<String>,

    /// Assertion consumer service endpoints.
    pub assertion_consumer_services: Vec<Endpoint>,

    /// Single logout service endpoints.
    pub single_logout_services: Vec<Endpoint>,
}

impl SpSsoDescriptor {
    /// Adds a single logout service.
    #[must_use]
    pub fn with_single_logout_service(mut self, endpoint: Endpoint) -> Self {
        self.single_logout_services.push(endpoint);
        self
    }

    /// Adds an assertion consumer service.
    #[must_use]
    pub fn with_assertion_consumer_service(mut self, endpoint: Endpoint) -> Self {
        self.assertion_consumer_services.push(endpoint);
        self
    }

    /// Returns the `Location` of the first single logout service, where
    /// logout requests are sent.
    #[must_use]
    pub fn logout_url(&self) -> Option<&str> {
        self.single_logout_services
            .first()
            .map(|endpoint| endpoint.location.as_str())
    }

    /// Reads the descriptor from an `EntityDescriptor` or `SPSSODescriptor`.
    ///
    /// # Errors
    ///
    /// Returns an error if no `SPSSODescriptor` is found or an endpoint
    /// lacks its `Binding` or `Location`.
    pub fn from_element(element: &Element) -> SamlResult<Self> {
        let entity_id = element
            .is(MD_NS, "EntityDescriptor")
            .then(|| element.attribute("entityID").map(str::to_string))
            .flatten();
        let descriptor = element
            .find(MD_NS, "SPSSODescriptor")
            .ok_or_else(|| SamlError::MissingElement("SPSSODescriptor".to_string()))?;

        Ok(Self {
            entity_id,
            assertion_consumer_services: endpoints(descriptor, "AssertionConsumerService")?,
            single_logout_services: endpoints(descriptor, "SingleLogoutService")?,
        })
    }

    /// Parses a metadata document.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed XML or missing descriptor.
    pub fn from_xml(xml: &str) -> SamlResult<Self> {
        Self::from_element(&Element::parse(xml)?)
    }
}

/// A metadata endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Binding URI.
    pub binding: String,

    /// Endpoint URL.
    pub location: String,

    /// Optional URL responses are sent to.
    pub response_location: Option<String>,
}

impl Endpoint {
    /// Creates an endpoint.
    #[must_use]
    pub fn new(binding: SamlBinding, location: impl Into<String>) -> Self {
        Self {
            binding: binding.uri().to_string(),
            location: location.into(),
            response_location: None,
        }
    }

    /// Returns true if the endpoint uses the POST binding.
    #[must_use]
    pub fn is_post(&self) -> bool {
        SamlBinding::from_uri(&self.binding) == Some(SamlBinding::HttpPost)
    }
}

fn endpoints(descriptor: &Element, name: &str) -> SamlResult<Vec<Endpoint>> {
    descriptor
        .children_named(MD_NS, name)
        .map(|element| {
            Ok(Endpoint {
                binding: required_attribute(element, "Binding")?.to_string(),
                location: required_attribute(element, "Location")?.to_string(),
                response_location: element.attribute("ResponseLocation").map(str::to_string),
            })
        })
        .collect()
}

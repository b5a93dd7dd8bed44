//! User attributes: fetched from a directory on the identity provider,
//! copied from the received assertion on the service provider.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::SamlResult;
use crate::types::ProtocolMessage;

use super::config::{ChainConfig, HandlerConfig};
use super::request::HandlerRequest;
use super::response::HandlerResponse;
use super::session::{AttributeMap, Principal, SessionStore};
use super::SamlHandler;

/// Source of user attributes on the identity provider.
pub trait AttributeManager: Send + Sync {
    /// Returns the values of `keys` for `principal`. Unknown keys are
    /// left out of the map.
    fn attributes(&self, principal: &Principal, keys: &[String]) -> AttributeMap;
}

/// Attribute manager over an in-memory directory.
#[derive(Debug, Clone, Default)]
pub struct StaticAttributeManager {
    directory: HashMap<String, AttributeMap>,
}

impl StaticAttributeManager {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute value for a user.
    #[must_use]
    pub fn with_attribute(
        mut self,
        user: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.directory
            .entry(user.into())
            .or_default()
            .entry(key.into())
            .or_default()
            .push(value.into());
        self
    }
}

impl AttributeManager for StaticAttributeManager {
    fn attributes(&self, principal: &Principal, keys: &[String]) -> AttributeMap {
        let Some(entry) = self.directory.get(principal.name()) else {
            return AttributeMap::new();
        };
        keys.iter()
            .filter_map(|key| entry.get(key).map(|values| (key.clone(), values.clone())))
            .collect()
    }
}

/// Moves user attributes between the session and the assertion.
///
/// On an identity provider it must precede the authentication handler,
/// which embeds the attributes it leaves in the request options. On a
/// service provider it must follow the authentication handler, which
/// resolves the assertion.
pub struct AttributeHandler {
    is_idp: bool,
    config: HandlerConfig,
    manager: Option<Arc<dyn AttributeManager>>,
}

impl AttributeHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(chain: &ChainConfig, config: HandlerConfig) -> Self {
        Self {
            is_idp: chain.is_idp(),
            config,
            manager: None,
        }
    }

    /// Sets the attribute source used by an identity provider.
    #[must_use]
    pub fn with_manager(mut self, manager: Arc<dyn AttributeManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    fn collect_for_assertion(&self, request: &mut HandlerRequest, session: &dyn SessionStore) {
        if !matches!(request.message, Some(ProtocolMessage::AuthnRequest(_))) {
            return;
        }
        let attributes = match session.attributes() {
            Some(attributes) => attributes,
            None => {
                let Some(principal) = session.principal().or_else(|| request.user_principal.clone())
                else {
                    trace!("no principal, no attributes");
                    return;
                };
                let keys = self.config.attribute_keys();
                let attributes = match &self.manager {
                    Some(manager) if !keys.is_empty() => manager.attributes(&principal, &keys),
                    _ => AttributeMap::new(),
                };
                debug!(principal = %principal, count = attributes.len(), "fetched attributes");
                session.set_attributes(attributes.clone());
                attributes
            }
        };
        request.options.attributes = Some(attributes);
    }

    fn store_from_assertion(&self, request: &HandlerRequest, session: &dyn SessionStore) {
        let Some(assertion) = &request.options.assertion else {
            trace!("no assertion resolved, no attributes");
            return;
        };
        let mut attributes = AttributeMap::new();
        for attribute in assertion.attribute_statements().flat_map(|s| &s.attributes) {
            let key = if self.config.choose_friendly_name {
                attribute.friendly_name.as_deref().unwrap_or(&attribute.name)
            } else {
                &attribute.name
            };
            attributes
                .entry(key.to_string())
                .or_default()
                .extend(attribute.text_values().map(str::to_string));
        }
        debug!(count = attributes.len(), "stored attributes from assertion");
        session.set_attributes(attributes);
    }
}

impl SamlHandler for AttributeHandler {
    fn name(&self) -> &'static str {
        "attribute"
    }

    fn handle_request_type(
        &self,
        request: &mut HandlerRequest,
        _response: &mut HandlerResponse,
        session: &dyn SessionStore,
    ) -> SamlResult<()> {
        if self.is_idp {
            self.collect_for_assertion(request, session);
        }
        Ok(())
    }

    fn handle_status_response_type(
        &self,
        request: &mut HandlerRequest,
        _response: &mut HandlerResponse,
        session: &dyn SessionStore,
    ) -> SamlResult<()> {
        if !self.is_idp {
            self.store_from_assertion(request, session);
        }
        Ok(())
    }
}

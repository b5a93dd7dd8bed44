//! Deployment configuration.
//!
//! A deployment file holds the chain section and one optional section per
//! handler:
//!
//! ```toml
//! [chain]
//! issuer = "https://idp.example.com"
//!
//! [chain.role.idp]
//! trusted_domains = "example.com, partner.org"
//! encrypt = true
//!
//! [handlers.authentication]
//! clock_skew_ms = 2000
//! role_keys = "Role"
//! ```
//!
//! Key material is not part of the file; it is supplied as
//! [`ChainServices`] when the chain is built.

use std::path::Path;
use std::sync::Arc;

use fed_crypto::RsaSigningKeyPair;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{SamlError, SamlResult};
use crate::handler::{
    AttributeHandler, AttributeManager, AuthenticationHandler, ChainConfig, EncryptionHandler,
    HandlerChain, HandlerConfig, InResponseToHandler, IssuerTrustHandler, ParticipantRegistry,
    ProviderRole, RoleValidator, SignatureHandler, SignatureValidationHandler, SpConfig,
};

/// Federation deployment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FederationConfig {
    /// Role, issuer and trust settings shared by the chain.
    pub chain: ChainConfig,

    /// Per-handler settings.
    #[serde(default)]
    pub handlers: HandlerSections,
}

/// One optional settings section per handler kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandlerSections {
    /// Issuer trust handler.
    pub trust: Option<HandlerConfig>,
    /// Attribute handler.
    pub attribute: Option<HandlerConfig>,
    /// Authentication handler.
    pub authentication: Option<HandlerConfig>,
    /// Encryption handler (identity provider).
    pub encryption: Option<HandlerConfig>,
    /// Signature handler.
    pub signature: Option<HandlerConfig>,
}

impl HandlerSections {
    fn all(&self) -> impl Iterator<Item = (&'static str, &HandlerConfig)> {
        [
            ("trust", &self.trust),
            ("attribute", &self.attribute),
            ("authentication", &self.authentication),
            ("encryption", &self.encryption),
            ("signature", &self.signature),
        ]
        .into_iter()
        .filter_map(|(name, section)| section.as_ref().map(|config| (name, config)))
    }
}

/// Collaborators a chain needs that do not come from the file.
#[derive(Default, Clone)]
pub struct ChainServices {
    /// Key pair for signing outgoing messages.
    pub key_pair: Option<Arc<RsaSigningKeyPair>>,
    /// Participant registry for global logout (identity provider).
    pub registry: Option<Arc<ParticipantRegistry>>,
    /// Role validator (service provider).
    pub role_validator: Option<Arc<dyn RoleValidator>>,
    /// Attribute source (identity provider).
    pub attribute_manager: Option<Arc<dyn AttributeManager>>,
}

impl std::fmt::Debug for ChainServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainServices")
            .field("has_key_pair", &self.key_pair.is_some())
            .field("has_registry", &self.registry.is_some())
            .field("has_role_validator", &self.role_validator.is_some())
            .field("has_attribute_manager", &self.attribute_manager.is_some())
            .finish()
    }
}

fn handler_config(section: Option<&HandlerConfig>, services: &ChainServices) -> HandlerConfig {
    let mut config = section.cloned().unwrap_or_default();
    if let Some(key_pair) = &services.key_pair {
        config.key_pair = Some(key_pair.clone());
    }
    config
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            chain: ChainConfig::sp("", SpConfig::default()),
            handlers: HandlerSections::default(),
        }
    }
}

impl FederationConfig {
    /// Creates a configuration for a chain with default handler settings.
    #[must_use]
    pub fn new(chain: ChainConfig) -> Self {
        Self {
            chain,
            handlers: HandlerSections::default(),
        }
    }

    /// Parses and validates a TOML configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] for malformed TOML, unknown
    /// keys or invalid values.
    pub fn from_toml(content: &str) -> SamlResult<Self> {
        let config: Self = fed_core::config::from_toml_str(content)
            .map_err(|e| SamlError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] if the file cannot be read or
    /// is invalid.
    pub fn load(path: impl AsRef<Path>) -> SamlResult<Self> {
        let config: Self = fed_core::config::load_file(path)
            .map_err(|e| SamlError::Configuration(e.to_string()))?;
        config.validate()?;
        info!(issuer = %config.chain.issuer, idp = config.chain.is_idp(), "loaded federation configuration");
        Ok(config)
    }

    /// Checks the configuration for values that would only fail once a
    /// message is processed.
    ///
    /// # Errors
    ///
    /// Returns the first [`SamlError::Configuration`] found.
    pub fn validate(&self) -> SamlResult<()> {
        if self.chain.issuer.trim().is_empty() {
            return Err(SamlError::Configuration("issuer must not be empty".to_string()));
        }
        if self
            .chain
            .trusted_domains()
            .map_or(true, |domains| domains.trim().is_empty())
        {
            return Err(SamlError::Configuration("trust element missing".to_string()));
        }
        for (name, section) in self.handlers.all() {
            section
                .validate()
                .map_err(|e| SamlError::Configuration(format!("[handlers.{name}]: {e}")))?;
        }
        Ok(())
    }

    /// Builds the standard chain for the configured role.
    ///
    /// Identity provider: signature validation, issuer trust, attributes,
    /// authentication, then encryption or signing. Service provider:
    /// signature validation, issuer trust, authentication, attributes,
    /// InResponseTo verification, then signing.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] for invalid handler settings.
    pub fn build_chain(&self, services: &ChainServices) -> SamlResult<HandlerChain> {
        let chain = &self.chain;
        let sections = &self.handlers;

        let mut attribute = AttributeHandler::new(chain, handler_config(sections.attribute.as_ref(), services));
        if let Some(manager) = &services.attribute_manager {
            attribute = attribute.with_manager(manager.clone());
        }
        let mut authentication =
            AuthenticationHandler::new(chain, handler_config(sections.authentication.as_ref(), services));
        if let Some(registry) = &services.registry {
            authentication = authentication.with_registry(registry.clone());
        }
        if let Some(validator) = &services.role_validator {
            authentication = authentication.with_role_validator(validator.clone());
        }

        let handlers = HandlerChain::new()
            .with_handler(SignatureValidationHandler::new(chain))
            .with_handler(IssuerTrustHandler::new(chain, handler_config(sections.trust.as_ref(), services)));

        let handlers = match &chain.role {
            ProviderRole::Idp(idp) => {
                let handlers = handlers.with_handler(attribute).with_handler(authentication);
                if idp.encrypt {
                    let config = handler_config(sections.encryption.as_ref(), services);
                    handlers.with_handler(EncryptionHandler::new(chain, &config)?)
                } else {
                    let config = handler_config(sections.signature.as_ref(), services);
                    handlers.with_handler(SignatureHandler::new(chain, &config)?)
                }
            }
            ProviderRole::Sp(_) => {
                let config = handler_config(sections.signature.as_ref(), services);
                handlers
                    .with_handler(authentication)
                    .with_handler(attribute)
                    .with_handler(InResponseToHandler::new())
                    .with_handler(SignatureHandler::new(chain, &config)?)
            }
        };
        debug!(handlers = ?handlers.handler_names(), "built handler chain");
        Ok(handlers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const IDP: &str = r#"
[chain]
issuer = "https://idp.example.com"

[chain.role.idp]
trusted_domains = "example.com, partner.org"
encrypt = true

[handlers.authentication]
clock_skew_ms = 2000
role_keys = "Role"

[handlers.encryption]
encryption_key_size = 256
"#;

    #[test]
    fn parses_deployment_file() {
        let config = FederationConfig::from_toml(IDP).unwrap();
        assert!(config.chain.is_idp());
        assert!(config.chain.idp_config().unwrap().encrypt);
        let authentication = config.handlers.authentication.unwrap();
        assert_eq!(authentication.clock_skew_ms, Some(2000));
        assert_eq!(authentication.role_keys(), vec!["Role"]);
        assert!(config.handlers.signature.is_none());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(IDP.as_bytes()).unwrap();
        let config = FederationConfig::load(file.path()).unwrap();
        assert_eq!(config.chain.issuer, "https://idp.example.com");

        assert!(matches!(
            FederationConfig::load("/nonexistent/federation.toml"),
            Err(SamlError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        let unknown = IDP.replace("clock_skew_ms", "clock_skew_millis");
        assert!(matches!(
            FederationConfig::from_toml(&unknown),
            Err(SamlError::Configuration(_))
        ));

        let bad_size = IDP.replace("encryption_key_size = 256", "encryption_key_size = 192");
        let err = FederationConfig::from_toml(&bad_size).unwrap_err();
        assert!(err.to_string().contains("[handlers.encryption]"));

        let no_trust = IDP.replace("trusted_domains = \"example.com, partner.org\"", "");
        assert!(FederationConfig::from_toml(&no_trust).is_err());
    }

    #[test]
    fn default_does_not_validate() {
        assert!(FederationConfig::default().validate().is_err());
    }

    #[test]
    fn builds_role_specific_chains() {
        let idp = FederationConfig::from_toml(IDP).unwrap();
        let chain = idp.build_chain(&ChainServices::default()).unwrap();
        assert_eq!(
            chain.handler_names(),
            ["signature-validation", "issuer-trust", "attribute", "idp-authentication", "encryption"]
        );

        let sp = FederationConfig::new(ChainConfig::sp(
            "https://sp.example.com",
            SpConfig::default().with_trusted_domains("example.com"),
        ));
        let chain = sp.build_chain(&ChainServices::default()).unwrap();
        assert_eq!(
            chain.handler_names(),
            [
                "signature-validation",
                "issuer-trust",
                "sp-authentication",
                "attribute",
                "in-response-to",
                "signature-generation"
            ]
        );
    }
}

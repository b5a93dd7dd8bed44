//! Typed handler and chain configuration.
//!
//! [`HandlerConfig`] holds the options of one handler instance and
//! [`ChainConfig`] the options shared by a whole chain. Both deserialize
//! from TOML and reject unknown keys, so a misspelled option fails when the
//! configuration is loaded rather than being silently ignored.

use std::sync::Arc;

use chrono::Duration;
use fed_core::config::tokenize;
use fed_crypto::{ContentAlgorithm, RsaAlgorithm, RsaSigningKeyPair};
use serde::{Deserialize, Serialize};

use crate::error::{SamlError, SamlResult};
use crate::types::SamlBinding;

/// Largest accepted clock skew, one day.
pub const MAX_CLOCK_SKEW_MS: u64 = 86_400_000;

/// Options of a single handler instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandlerConfig {
    /// Tolerated clock difference when checking assertion validity.
    /// Without it the validity window is checked exactly.
    pub clock_skew_ms: Option<u64>,

    /// Do not add an AuthnStatement to issued assertions.
    #[serde(default)]
    pub disable_authn_statement: bool,

    /// Do not add the session roles to issued assertions.
    #[serde(default)]
    pub disable_sending_roles: bool,

    /// Do not read roles from received assertions.
    #[serde(default)]
    pub disable_role_picking: bool,

    /// Comma or whitespace separated attribute names that carry roles.
    pub role_keys: Option<String>,

    /// Assertion consumer URL put into generated AuthnRequests.
    pub assertion_consumer_url: Option<String>,

    /// Name ID format URI requested in generated AuthnRequests.
    pub nameid_format: Option<String>,

    /// Binding requested for the response: `POST` or `REDIRECT`.
    pub binding_type: Option<String>,

    /// AuthnContextClassRef of issued AuthnStatements.
    pub authentication_method: Option<String>,

    /// Comma or whitespace separated attribute names to release.
    pub attribute_keys: Option<String>,

    /// Key received attributes by friendly name instead of name.
    #[serde(default)]
    pub choose_friendly_name: bool,

    /// Content encryption algorithm; only `AES` is supported.
    pub encryption_algorithm: Option<String>,

    /// Content encryption key size in bits: 128 or 256.
    pub encryption_key_size: Option<u32>,

    /// Skip the role validator on the service provider.
    #[serde(default)]
    pub ignore_role_validator: bool,

    /// Application context path, reported as the auditing party.
    pub context_path: Option<String>,

    /// Signature algorithm URI; RSA-SHA256 when unset.
    pub signature_algorithm: Option<String>,

    /// Key pair used to sign outgoing documents.
    #[serde(skip)]
    pub key_pair: Option<Arc<RsaSigningKeyPair>>,
}

impl HandlerConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the signing key pair.
    #[must_use]
    pub fn with_key_pair(mut self, key_pair: Arc<RsaSigningKeyPair>) -> Self {
        self.key_pair = Some(key_pair);
        self
    }

    /// Sets the clock skew.
    #[must_use]
    pub const fn with_clock_skew_ms(mut self, millis: u64) -> Self {
        self.clock_skew_ms = Some(millis);
        self
    }

    /// Sets the role attribute allow-list.
    #[must_use]
    pub fn with_role_keys(mut self, keys: impl Into<String>) -> Self {
        self.role_keys = Some(keys.into());
        self
    }

    /// Sets the requested response binding.
    #[must_use]
    pub fn with_binding_type(mut self, binding: impl Into<String>) -> Self {
        self.binding_type = Some(binding.into());
        self
    }

    /// Returns the clock skew, zero when unset.
    #[must_use]
    pub fn clock_skew(&self) -> Duration {
        self.clock_skew_ms
            .map_or_else(Duration::zero, |ms| {
                Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX))
            })
    }

    /// Returns the role attribute allow-list; empty means every attribute.
    #[must_use]
    pub fn role_keys(&self) -> Vec<String> {
        self.role_keys.as_deref().map(tokenize).unwrap_or_default()
    }

    /// Returns the attribute names to release.
    #[must_use]
    pub fn attribute_keys(&self) -> Vec<String> {
        self.attribute_keys.as_deref().map(tokenize).unwrap_or_default()
    }

    /// Returns the configured response binding.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] for a value other than `POST`
    /// or `REDIRECT`.
    pub fn binding(&self) -> SamlResult<Option<SamlBinding>> {
        self.binding_type
            .as_deref()
            .map(|name| {
                SamlBinding::from_config_name(name).ok_or_else(|| {
                    SamlError::Configuration(format!("unsupported binding type: {name}"))
                })
            })
            .transpose()
    }

    /// Returns the content encryption algorithm, AES-128-GCM by default.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] for an algorithm other than
    /// AES or a key size other than 128 or 256.
    pub fn content_algorithm(&self) -> SamlResult<ContentAlgorithm> {
        if let Some(algorithm) = &self.encryption_algorithm {
            if !algorithm.eq_ignore_ascii_case("AES") {
                return Err(SamlError::Configuration(format!(
                    "unsupported encryption algorithm: {algorithm}"
                )));
            }
        }
        match self.encryption_key_size {
            None => Ok(ContentAlgorithm::default()),
            Some(bits) => ContentAlgorithm::from_key_size(bits).ok_or_else(|| {
                SamlError::Configuration(format!("unsupported encryption key size: {bits}"))
            }),
        }
    }

    /// Returns the signature algorithm, RSA-SHA256 by default.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] for an unknown algorithm URI.
    pub fn rsa_algorithm(&self) -> SamlResult<RsaAlgorithm> {
        match &self.signature_algorithm {
            None => Ok(RsaAlgorithm::default()),
            Some(uri) => RsaAlgorithm::from_uri(uri).ok_or_else(|| {
                SamlError::Configuration(format!("unsupported signature algorithm: {uri}"))
            }),
        }
    }

    /// Checks the values that are otherwise only read on demand.
    ///
    /// # Errors
    ///
    /// Returns the first [`SamlError::Configuration`] found.
    pub fn validate(&self) -> SamlResult<()> {
        if let Some(skew) = self.clock_skew_ms.filter(|ms| *ms > MAX_CLOCK_SKEW_MS) {
            return Err(SamlError::Configuration(format!(
                "clock skew of {skew} ms exceeds {MAX_CLOCK_SKEW_MS} ms"
            )));
        }
        self.binding()?;
        self.content_algorithm()?;
        self.rsa_algorithm()?;
        Ok(())
    }
}

/// Options shared by every handler of a chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainConfig {
    /// Entity ID of the local provider, the issuer of outgoing messages.
    pub issuer: String,

    /// Whether messages are signed and signatures checked.
    #[serde(default = "default_true")]
    pub supports_signature: bool,

    /// The role this chain plays.
    pub role: ProviderRole,
}

impl ChainConfig {
    /// Creates an identity provider chain configuration.
    #[must_use]
    pub fn idp(issuer: impl Into<String>, config: IdpConfig) -> Self {
        Self {
            issuer: issuer.into(),
            supports_signature: true,
            role: ProviderRole::Idp(config),
        }
    }

    /// Creates a service provider chain configuration.
    #[must_use]
    pub fn sp(issuer: impl Into<String>, config: SpConfig) -> Self {
        Self {
            issuer: issuer.into(),
            supports_signature: true,
            role: ProviderRole::Sp(config),
        }
    }

    /// Sets whether signatures are supported.
    #[must_use]
    pub const fn with_signatures(mut self, supported: bool) -> Self {
        self.supports_signature = supported;
        self
    }

    /// Returns true for an identity provider chain.
    #[must_use]
    pub const fn is_idp(&self) -> bool {
        matches!(self.role, ProviderRole::Idp(_))
    }

    /// Returns the identity provider options, if this is an IDP chain.
    #[must_use]
    pub const fn idp_config(&self) -> Option<&IdpConfig> {
        match &self.role {
            ProviderRole::Idp(config) => Some(config),
            ProviderRole::Sp(_) => None,
        }
    }

    /// Returns the comma separated trusted domains of either role.
    #[must_use]
    pub fn trusted_domains(&self) -> Option<&str> {
        match &self.role {
            ProviderRole::Idp(config) => config.trusted_domains.as_deref(),
            ProviderRole::Sp(config) => config.trusted_domains.as_deref(),
        }
    }
}

/// The role of a chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderRole {
    /// Identity provider.
    Idp(IdpConfig),
    /// Service provider.
    Sp(SpConfig),
}

/// Identity provider options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdpConfig {
    /// Comma separated domains whose service providers are trusted.
    pub trusted_domains: Option<String>,

    /// Always answer with the POST binding.
    #[serde(default)]
    pub strict_post_binding: bool,

    /// Encrypt issued assertions.
    #[serde(default)]
    pub encrypt: bool,

    /// Lifetime of issued assertions.
    #[serde(default = "default_assertion_validity_ms")]
    pub assertion_validity_ms: u64,
}

impl Default for IdpConfig {
    fn default() -> Self {
        Self {
            trusted_domains: None,
            strict_post_binding: false,
            encrypt: false,
            assertion_validity_ms: default_assertion_validity_ms(),
        }
    }
}

impl IdpConfig {
    /// Sets the trusted domains.
    #[must_use]
    pub fn with_trusted_domains(mut self, domains: impl Into<String>) -> Self {
        self.trusted_domains = Some(domains.into());
        self
    }

    /// Sets strict POST binding.
    #[must_use]
    pub const fn with_strict_post_binding(mut self, strict: bool) -> Self {
        self.strict_post_binding = strict;
        self
    }

    /// Enables assertion encryption.
    #[must_use]
    pub const fn with_encryption(mut self, encrypt: bool) -> Self {
        self.encrypt = encrypt;
        self
    }

    /// Returns the assertion lifetime.
    #[must_use]
    pub fn assertion_validity(&self) -> Duration {
        Duration::milliseconds(i64::try_from(self.assertion_validity_ms).unwrap_or(i64::MAX))
    }
}

/// Service provider options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpConfig {
    /// Comma separated domains whose identity providers are trusted.
    pub trusted_domains: Option<String>,

    /// SSO URL of the identity provider, the destination of AuthnRequests.
    pub identity_url: Option<String>,
}

impl SpConfig {
    /// Sets the trusted domains.
    #[must_use]
    pub fn with_trusted_domains(mut self, domains: impl Into<String>) -> Self {
        self.trusted_domains = Some(domains.into());
        self
    }

    /// Sets the identity provider URL.
    #[must_use]
    pub fn with_identity_url(mut self, url: impl Into<String>) -> Self {
        self.identity_url = Some(url.into());
        self
    }
}

const fn default_true() -> bool {
    true
}

const fn default_assertion_validity_ms() -> u64 {
    300_000
}

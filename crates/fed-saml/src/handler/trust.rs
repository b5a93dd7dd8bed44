//! Issuer trust checks.
//!
//! The host of the inbound issuer must match the deployment's trusted
//! domain list before any protocol processing happens.

use fed_core::{AuditEvent, AuditEventType, AuditLevel};
use tracing::{debug, warn};
use url::Url;

use crate::error::{SamlError, SamlResult};

use super::config::{ChainConfig, HandlerConfig};
use super::request::HandlerRequest;
use super::response::HandlerResponse;
use super::session::SessionStore;
use super::SamlHandler;

/// Returns the host of an issuer, reading bare domains as `http://` URLs.
fn issuer_host(issuer: &str) -> Option<String> {
    let parsed = Url::parse(issuer)
        .ok()
        .filter(|url| url.host_str().is_some())
        .or_else(|| Url::parse(&format!("http://{issuer}")).ok())?;
    parsed.host_str().map(str::to_string)
}

/// Checks an issuer against a comma separated trusted domain list.
///
/// The issuer is trusted when its host occurs in the list, or when one of
/// the list's entries occurs inside the host past its first character
/// (`partner.org` trusts `sso.partner.org`). Whitespace around entries
/// and empty entries are ignored.
#[must_use]
pub fn is_trusted(issuer: &str, trusted_domains: &str) -> bool {
    let Some(host) = issuer_host(issuer) else {
        return false;
    };
    if trusted_domains.contains(host.as_str()) {
        return true;
    }
    trusted_domains
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .any(|token| host.find(token).is_some_and(|index| index > 0))
}

/// Rejects messages from issuers outside the trusted domains.
#[derive(Debug, Clone)]
pub struct IssuerTrustHandler {
    is_idp: bool,
    trusted_domains: Option<String>,
    config: HandlerConfig,
}

impl IssuerTrustHandler {
    /// Creates the handler for a chain.
    #[must_use]
    pub fn new(chain: &ChainConfig, config: HandlerConfig) -> Self {
        Self {
            is_idp: chain.is_idp(),
            trusted_domains: chain.trusted_domains().map(str::to_string),
            config,
        }
    }

    fn trust_issuer(&self, issuer: Option<&str>, request: &HandlerRequest) -> SamlResult<()> {
        let issuer = issuer.ok_or_else(|| SamlError::MissingElement("Issuer".to_string()))?;
        let domains = self
            .trusted_domains
            .as_deref()
            .ok_or_else(|| SamlError::Configuration("trust element missing".to_string()))?;

        debug!(issuer, trusted_domains = domains, "checking issuer trust");
        if is_trusted(issuer, domains) {
            return Ok(());
        }

        warn!(issuer, "issuer not trusted");
        if !self.is_idp {
            if let Some(audit) = &request.options.audit {
                audit.audit(
                    AuditEvent::builder(AuditEventType::ErrorTrustedDomain)
                        .level(AuditLevel::Error)
                        .who_is_auditing(self.config.context_path.as_deref())
                        .detail("issuer", issuer)
                        .build(),
                );
            }
        }
        Err(SamlError::IssuerNotTrusted(issuer.to_string()))
    }
}

impl SamlHandler for IssuerTrustHandler {
    fn name(&self) -> &'static str {
        "issuer-trust"
    }

    fn handle_request_type(
        &self,
        request: &mut HandlerRequest,
        _response: &mut HandlerResponse,
        _session: &dyn SessionStore,
    ) -> SamlResult<()> {
        if self.is_idp {
            let message = request
                .message
                .as_ref()
                .ok_or_else(|| SamlError::Protocol("AuthnRequest is null".to_string()))?;
            self.trust_issuer(message.issuer(), request)
        } else {
            self.trust_issuer(request.issuer.as_deref(), request)
        }
    }

    fn handle_status_response_type(
        &self,
        request: &mut HandlerRequest,
        _response: &mut HandlerResponse,
        _session: &dyn SessionStore,
    ) -> SamlResult<()> {
        self.trust_issuer(request.issuer.as_deref(), request)
    }
}

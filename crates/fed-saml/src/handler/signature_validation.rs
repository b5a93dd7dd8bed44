//! Verification of inbound message signatures.

use tracing::{debug, trace};

use crate::error::{SamlError, SamlResult};
use crate::signature::SignatureValidator;

use super::config::ChainConfig;
use super::request::{HandlerRequest, HttpMethod};
use super::response::HandlerResponse;
use super::session::SessionStore;
use super::SamlHandler;

/// Rejects inbound messages whose signature does not verify against
/// `RequestOptions::validating_key`.
///
/// POST messages carry an enveloped signature in `HandlerRequest::document`;
/// HTTP-Redirect messages are checked over `RequestOptions::redirect_query`.
/// Belongs at the head of the chain.
#[derive(Debug, Clone)]
pub struct SignatureValidationHandler {
    supports_signature: bool,
    allow_sha1: bool,
}

impl SignatureValidationHandler {
    /// Creates the handler.
    #[must_use]
    pub const fn new(chain: &ChainConfig) -> Self {
        Self {
            supports_signature: chain.supports_signature,
            allow_sha1: false,
        }
    }

    /// Accepts SHA-1 signatures from legacy peers.
    #[must_use]
    pub const fn allow_sha1(mut self, allow: bool) -> Self {
        self.allow_sha1 = allow;
        self
    }

    fn validate(&self, request: &HandlerRequest) -> SamlResult<()> {
        if !request.supports_signature(self.supports_signature) {
            trace!("signatures not supported for this request");
            return Ok(());
        }
        let key = request.options.validating_key.as_deref().ok_or_else(|| {
            SamlError::Configuration("validating public key not found".to_string())
        })?;
        let validator = SignatureValidator::new(key).allow_sha1(self.allow_sha1);

        match request.method {
            HttpMethod::Post => {
                let document = request
                    .document
                    .as_ref()
                    .ok_or_else(|| SamlError::Protocol("inbound document missing".to_string()))?;
                validator.validate_document(document)?;
            }
            HttpMethod::Get => {
                let query = request.options.redirect_query.as_deref().ok_or_else(|| {
                    SamlError::Protocol("inbound redirect query missing".to_string())
                })?;
                validator.validate_redirect_query(query)?;
            }
        }
        debug!(method = ?request.method, issuer = ?request.issuer, "inbound signature verified");
        Ok(())
    }
}

impl SamlHandler for SignatureValidationHandler {
    fn name(&self) -> &'static str {
        "signature-validation"
    }

    fn handle_request_type(
        &self,
        request: &mut HandlerRequest,
        _response: &mut HandlerResponse,
        _session: &dyn SessionStore,
    ) -> SamlResult<()> {
        self.validate(request)
    }

    fn handle_status_response_type(
        &self,
        request: &mut HandlerRequest,
        _response: &mut HandlerResponse,
        _session: &dyn SessionStore,
    ) -> SamlResult<()> {
        self.validate(request)
    }
}

//! Assertion encryption on the identity provider.
//!
//! Replaces the plaintext assertion of the outgoing Response with an
//! `EncryptedAssertion`, then signs, so the signature covers the
//! encrypted form.

use fed_crypto::ContentAlgorithm;
use tracing::debug;

use crate::encryption::encrypt_element;
use crate::error::{SamlError, SamlResult};
use crate::types::{ProtocolMessage, SAML_NS};

use super::config::{ChainConfig, HandlerConfig};
use super::request::HandlerRequest;
use super::response::HandlerResponse;
use super::session::SessionStore;
use super::signature::OutgoingSigner;
use super::SamlHandler;

const ORDERING: &str =
    "no assertion in the response document: the encryption handler must follow the authentication handler";

/// Encrypts then signs the identity provider's Response.
///
/// Takes the place of the [`SignatureHandler`](super::SignatureHandler)
/// in an identity provider chain; when encryption does not apply it only
/// signs.
#[derive(Debug, Clone)]
pub struct EncryptionHandler {
    encrypt: bool,
    algorithm: ContentAlgorithm,
    signing: OutgoingSigner,
}

impl EncryptionHandler {
    /// Creates the handler.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] for unsupported encryption or
    /// signature settings.
    pub fn new(chain: &ChainConfig, config: &HandlerConfig) -> SamlResult<Self> {
        Ok(Self {
            encrypt: chain.idp_config().is_some_and(|idp| idp.encrypt),
            algorithm: config.content_algorithm()?,
            signing: OutgoingSigner::new(chain, config)?,
        })
    }

    fn encrypt_assertion(&self, request: &HandlerRequest, response: &mut HandlerResponse) -> SamlResult<()> {
        let document = response
            .document
            .as_mut()
            .ok_or_else(|| SamlError::IllegalState(ORDERING.to_string()))?;
        let path = document
            .find_path(SAML_NS, "Assertion")
            .filter(|path| !path.is_empty())
            .ok_or_else(|| SamlError::IllegalState(ORDERING.to_string()))?;
        let assertion = document
            .detached(&path)
            .ok_or_else(|| SamlError::IllegalState(ORDERING.to_string()))?;

        let recipient = request.options.sender_public_key.as_ref().ok_or_else(|| {
            SamlError::Configuration("sender public key is required for encryption".to_string())
        })?;

        let encrypted = encrypt_element(&assertion, "EncryptedAssertion", recipient, self.algorithm)
            .map_err(|e| SamlError::processing("encrypting assertion", e))?;
        document.replace_at(&path, encrypted);
        debug!(algorithm = self.algorithm.uri(), "encrypted assertion");
        Ok(())
    }
}

impl SamlHandler for EncryptionHandler {
    fn name(&self) -> &'static str {
        "encryption"
    }

    fn handle_request_type(
        &self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
        _session: &dyn SessionStore,
    ) -> SamlResult<()> {
        if self.encrypt && matches!(request.message, Some(ProtocolMessage::AuthnRequest(_))) {
            self.encrypt_assertion(request, response)?;
        }
        self.signing.sign(request, response)
    }

    fn handle_status_response_type(
        &self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
        _session: &dyn SessionStore,
    ) -> SamlResult<()> {
        self.signing.sign(request, response)
    }

    fn generate_saml_request(
        &self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
        _session: &dyn SessionStore,
    ) -> SamlResult<()> {
        self.signing.sign(request, response)
    }
}

//! Signing of outgoing documents.

use tracing::{debug, trace};

use crate::bindings::SamlMessageType;
use crate::error::{SamlError, SamlResult};
use crate::signature::Signer;

use super::config::{ChainConfig, HandlerConfig};
use super::request::HandlerRequest;
use super::response::HandlerResponse;
use super::session::SessionStore;
use super::SamlHandler;

/// The signing step shared by the signature and encryption handlers.
#[derive(Debug, Clone)]
pub(crate) struct OutgoingSigner {
    signer: Option<Signer>,
    supports_signature: bool,
}

impl OutgoingSigner {
    pub(crate) fn new(chain: &ChainConfig, config: &HandlerConfig) -> SamlResult<Self> {
        let algorithm = config.rsa_algorithm()?;
        Ok(Self {
            signer: config
                .key_pair
                .clone()
                .map(|key_pair| Signer::new(key_pair).with_algorithm(algorithm)),
            supports_signature: chain.supports_signature,
        })
    }

    /// Signs the response document for its binding.
    ///
    /// POST documents get an enveloped signature after the Issuer. For
    /// HTTP-Redirect the deflated document is signed as a query string,
    /// stored in `destination_query_string_with_signature`.
    pub(crate) fn sign(&self, request: &HandlerRequest, response: &mut HandlerResponse) -> SamlResult<()> {
        if !request.supports_signature(self.supports_signature) {
            trace!("signatures not supported for this request");
            return Ok(());
        }
        let Some(document) = response.document.as_mut() else {
            trace!("no document generated, nothing to sign");
            return Ok(());
        };
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| SamlError::Configuration("signing key pair not found".to_string()))?;

        if response.post_binding {
            signer
                .sign_document(document)
                .map_err(|e| SamlError::processing("signing document", e))?;
        } else {
            let message_type = if response.send_request {
                SamlMessageType::Request
            } else {
                SamlMessageType::Response
            };
            let query = signer
                .sign_redirect_query(&document.to_xml(), response.relay_state.as_deref(), message_type)
                .map_err(|e| SamlError::processing("signing redirect binding message", e))?;
            debug!(message = message_type.form_param(), "signed redirect query");
            response.destination_query_string_with_signature = Some(query);
        }
        Ok(())
    }
}

/// Signs the document produced earlier in the chain.
///
/// Must follow the handler that produces the document.
#[derive(Debug, Clone)]
pub struct SignatureHandler {
    signing: OutgoingSigner,
}

impl SignatureHandler {
    /// Creates the handler.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Configuration`] for an unknown signature
    /// algorithm.
    pub fn new(chain: &ChainConfig, config: &HandlerConfig) -> SamlResult<Self> {
        Ok(Self {
            signing: OutgoingSigner::new(chain, config)?,
        })
    }
}

impl SamlHandler for SignatureHandler {
    fn name(&self) -> &'static str {
        "signature-generation"
    }

    fn handle_request_type(
        &self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
        _session: &dyn SessionStore,
    ) -> SamlResult<()> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use fed_crypto::RsaSigningKeyPair;

    use crate::handler::{IdpConfig, InMemorySession};
    use crate::signature::SignatureValidator;
    use crate::types::{Response, XMLDSIG_NS};

    fn chain() -> ChainConfig {
        ChainConfig::idp("https://idp.example.com", IdpConfig::default())
    }

    fn keyed_config() -> (HandlerConfig, Arc<RsaSigningKeyPair>) {
        let key_pair = Arc::new(RsaSigningKeyPair::generate().unwrap());
        (HandlerConfig::new().with_key_pair(key_pair.clone()), key_pair)
    }

    fn response_with_document(post_binding: bool) -> HandlerResponse {
        HandlerResponse {
            document: Some(Response::success("https://idp.example.com").to_element()),
            post_binding,
            ..HandlerResponse::default()
        }
    }

    #[test]
    fn post_binding_embeds_signature() {
        let (config, key_pair) = keyed_config();
        let handler = SignatureHandler::new(&chain(), &config).unwrap();
        let mut response = response_with_document(true);

        handler
            .handle_request_type(&mut HandlerRequest::default(), &mut response, &InMemorySession::new())
            .unwrap();

        let document = response.document.unwrap();
        assert!(document.child(XMLDSIG_NS, "Signature").is_some());
        SignatureValidator::new(key_pair.public_key_der())
            .validate_document(&document)
            .unwrap();
        assert!(response.destination_query_string_with_signature.is_none());
    }

    #[test]
    fn redirect_binding_signs_query() {
        let (config, key_pair) = keyed_config();
        let handler = SignatureHandler::new(&chain(), &config).unwrap();
        let mut response = response_with_document(false);
        response.relay_state = Some("state 1".to_string());

        handler
            .handle_request_type(&mut HandlerRequest::default(), &mut response, &InMemorySession::new())
            .unwrap();

        let query = response.destination_query_string_with_signature.unwrap();
        assert!(query.starts_with("SAMLResponse="));
        assert!(query.contains("&RelayState=state%201"));
        SignatureValidator::new(key_pair.public_key_der())
            .validate_redirect_query(&query)
            .unwrap();
    }

    #[test]
    fn generated_requests_use_saml_request_parameter() {
        let (config, _) = keyed_config();
        let handler = SignatureHandler::new(&chain(), &config).unwrap();
        let mut response = response_with_document(false);
        response.send_request = true;

        handler
            .generate_saml_request(&mut HandlerRequest::default(), &mut response, &InMemorySession::new())
            .unwrap();
        assert!(response
            .destination_query_string_with_signature
            .unwrap()
            .starts_with("SAMLRequest="));
    }

    #[test]
    fn missing_key_pair_is_fatal() {
        let handler = SignatureHandler::new(&chain(), &HandlerConfig::default()).unwrap();
        let result = handler.handle_request_type(
            &mut HandlerRequest::default(),
            &mut response_with_document(true),
            &InMemorySession::new(),
        );
        assert!(matches!(result, Err(SamlError::Configuration(_))));
    }

    #[test]
    fn skipped_without_document_or_support() {
        let handler = SignatureHandler::new(&chain(), &HandlerConfig::default()).unwrap();
        let session = InMemorySession::new();
        handler
            .handle_request_type(&mut HandlerRequest::default(), &mut HandlerResponse::new(), &session)
            .unwrap();

        let mut request = HandlerRequest::default();
        request.options.supports_signature = Some(false);
        let mut response = response_with_document(true);
        handler.handle_request_type(&mut request, &mut response, &session).unwrap();
        assert!(response.document.unwrap().child(XMLDSIG_NS, "Signature").is_none());
    }
}

//! XML Signature creation.

use std::sync::Arc;

use base64::Engine;
use fed_crypto::{RsaAlgorithm, RsaSigningKeyPair};
use tracing::debug;

use crate::bindings::{HttpRedirectBinding, SamlMessageType};
use crate::error::{SamlError, SamlResult};
use crate::types::{SAML_NS, XMLDSIG_NS};
use crate::xml::Element;

use super::{build_signed_info, reference_digest};

/// Signs outgoing documents and redirect queries with one key pair.
///
/// Shared by the signature and encryption handlers, so an encrypted
/// document is signed with exactly the same logic as a plain one.
#[derive(Debug, Clone)]
pub struct Signer {
    key_pair: Arc<RsaSigningKeyPair>,
    algorithm: RsaAlgorithm,
}

impl Signer {
    /// Creates a signer using RSA-SHA256.
    #[must_use]
    pub fn new(key_pair: Arc<RsaSigningKeyPair>) -> Self {
        Self {
            key_pair,
            algorithm: RsaAlgorithm::RsaSha256,
        }
    }

    /// Sets the signature algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: RsaAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Returns the signature algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> RsaAlgorithm {
        self.algorithm
    }

    /// Returns the public key (PKCS#1 DER) peers verify with.
    #[must_use]
    pub fn public_key_der(&self) -> Vec<u8> {
        self.key_pair.public_key_der()
    }

    /// Signs the document root in place with an enveloped signature.
    ///
    /// The `ds:Signature` is inserted immediately after the root's
    /// `saml:Issuer`, or as the first child if there is none. An existing
    /// signature is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::SignatureCreation`] if the root has no `ID` or
    /// the key cannot sign.
    pub fn sign_document(&self, document: &mut Element) -> SamlResult<()> {
        let reference_id = document
            .attribute("ID")
            .ok_or_else(|| {
                SamlError::SignatureCreation(format!(
                    "{} has no ID to reference",
                    document.qualified_name()
                ))
            })?
            .to_string();

        document.remove_child(XMLDSIG_NS, "Signature");
        let digest = reference_digest(document, self.algorithm.digest());
        let signed_info = build_signed_info(&reference_id, &digest, self.algorithm);

        let signature_value = self
            .key_pair
            .sign(self.algorithm, signed_info.to_xml().as_bytes())
            .map_err(|e| SamlError::SignatureCreation(e.to_string()))?;

        let signature = Element::declared("ds", "Signature", XMLDSIG_NS)
            .with_child(signed_info)
            .with_child(
                Element::new(Some("ds"), "SignatureValue", Some(XMLDSIG_NS)).with_text(
                    base64::engine::general_purpose::STANDARD.encode(signature_value),
                ),
            );

        document.insert_after(SAML_NS, "Issuer", signature);
        debug!(reference = %reference_id, algorithm = self.algorithm.uri(), "signed document");
        Ok(())
    }

    /// Builds a signed HTTP-Redirect query string.
    ///
    /// The result is `SAMLRequest=...` or `SAMLResponse=...`, then
    /// `RelayState` when given, `SigAlg` and finally `Signature`.
    ///
    /// # Errors
    ///
    /// Returns an error if compression or signing fails.
    pub fn sign_redirect_query(
        &self,
        xml: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> SamlResult<String> {
        let query = HttpRedirectBinding::query(xml, relay_state, message_type)?;
        let signing_input = HttpRedirectBinding::signing_input(&query, self.algorithm.uri());
        let signature = self
            .key_pair
            .sign(self.algorithm, signing_input.as_bytes())
            .map_err(|e| SamlError::SignatureCreation(e.to_string()))?;
        Ok(HttpRedirectBinding::append_signature(&signing_input, &signature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Response, SAMLP_NS};

    fn signer() -> Signer {
        Signer::new(Arc::new(RsaSigningKeyPair::generate().unwrap()))
    }

    #[test]
    fn signature_follows_issuer() {
        let mut document = Response::success("https://idp.example.com").to_element();
        signer().sign_document(&mut document).unwrap();

        let names: Vec<_> = document.child_elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Issuer", "Signature", "Status"]);
        assert!(document.is(SAMLP_NS, "Response"));
    }

    #[test]
    fn resigning_replaces_signature() {
        let signer = signer();
        let mut document = Response::success("idp").to_element();
        signer.sign_document(&mut document).unwrap();
        signer.sign_document(&mut document).unwrap();
        assert_eq!(document.children_named(XMLDSIG_NS, "Signature").count(), 1);
    }

    #[test]
    fn document_without_id_cannot_be_signed() {
        let mut document = Element::declared("samlp", "Response", SAMLP_NS);
        assert!(matches!(
            signer().sign_document(&mut document),
            Err(SamlError::SignatureCreation(_))
        ));
    }

    #[test]
    fn redirect_query_layout() {
        let query = signer()
            .sign_redirect_query("<x/>", Some("state"), SamlMessageType::Response)
            .unwrap();
        assert!(query.starts_with("SAMLResponse="));
        let relay = query.find("&RelayState=state").unwrap();
        let sig_alg = query.find("&SigAlg=").unwrap();
        let signature = query.find("&Signature=").unwrap();
        assert!(relay < sig_alg && sig_alg < signature);
    }
}

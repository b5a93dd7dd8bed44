//! XML Signature validation.

use base64::Engine;
use fed_crypto::{rsa_verify, RsaAlgorithm};
use tracing::debug;

use crate::bindings::HttpRedirectBinding;
use crate::error::{SamlError, SamlResult};
use crate::types::XMLDSIG_NS;
use crate::xml::Element;

use super::{reference_digest, XmlSignature};

/// Validates signatures made by one peer.
#[derive(Debug, Clone)]
pub struct SignatureValidator {
    /// The peer's public key, PKCS#1 `RSAPublicKey` DER.
    public_key_der: Vec<u8>,
    /// Whether SHA-1 signatures are accepted.
    allow_sha1: bool,
}

impl SignatureValidator {
    /// Creates a validator for a peer's public key.
    #[must_use]
    pub fn new(public_key_der: impl Into<Vec<u8>>) -> Self {
        Self {
            public_key_der: public_key_der.into(),
            allow_sha1: false,
        }
    }

    /// Accepts SHA-1 based signatures from legacy peers.
    #[must_use]
    pub const fn allow_sha1(mut self, allow: bool) -> Self {
        self.allow_sha1 = allow;
        self
    }

    /// Validates the enveloped signature on the document root.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::SignatureInvalid`] if the signature is missing,
    /// references another element, or the digest or value do not verify.
    pub fn validate_document(&self, document: &Element) -> SamlResult<XmlSignature> {
        let element = document
            .child(XMLDSIG_NS, "Signature")
            .ok_or_else(|| SamlError::SignatureInvalid("document is not signed".to_string()))?;
        let signature = XmlSignature::from_element(element)?;
        self.check_algorithm(signature.algorithm)?;

        let expected_uri = document
            .attribute("ID")
            .map(|id| format!("#{id}"))
            .ok_or_else(|| SamlError::SignatureInvalid("signed element has no ID".to_string()))?;
        if signature.reference_uri != expected_uri {
            return Err(SamlError::SignatureInvalid(format!(
                "reference {} does not point at the document root",
                signature.reference_uri
            )));
        }

        if reference_digest(document, signature.digest_algorithm) != signature.digest_value {
            return Err(SamlError::SignatureInvalid("digest value mismatch".to_string()));
        }

        let value = base64::engine::general_purpose::STANDARD
            .decode(signature.signature_value.trim())
            .map_err(|e| SamlError::SignatureInvalid(format!("invalid signature encoding: {e}")))?;
        if !rsa_verify(
            &self.public_key_der,
            signature.signed_info.to_xml().as_bytes(),
            &value,
            signature.algorithm,
        ) {
            return Err(SamlError::SignatureInvalid(
                "signature value does not verify".to_string(),
            ));
        }

        debug!(reference = %signature.reference_uri, "document signature verified");
        Ok(signature)
    }

    /// Parses and validates a signed document.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed XML or an invalid signature.
    pub fn validate_xml(&self, xml: &str) -> SamlResult<XmlSignature> {
        self.validate_document(&Element::parse(xml)?)
    }

    /// Validates the detached signature of an HTTP-Redirect query string.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::SignatureInvalid`] if the signature is missing
    /// or does not verify over the signed portion of the query.
    pub fn validate_redirect_query(&self, query: &str) -> SamlResult<()> {
        let decoded = HttpRedirectBinding::decode_query(query)?;
        let (signature, sig_alg) = decoded
            .signature
            .as_deref()
            .zip(decoded.sig_alg.as_deref())
            .ok_or_else(|| SamlError::SignatureInvalid("query is not signed".to_string()))?;
        let signed = HttpRedirectBinding::extract_signed_query(query)?;
        self.validate_redirect(&signed, signature, sig_alg)
    }

    /// Validates a detached signature over `signed_query`.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::SignatureInvalid`] for an unknown or refused
    /// algorithm, bad encoding or a failed verification.
    pub fn validate_redirect(
        &self,
        signed_query: &str,
        signature_b64: &str,
        sig_alg: &str,
    ) -> SamlResult<()> {
        let algorithm = RsaAlgorithm::from_uri(sig_alg).ok_or_else(|| {
            SamlError::SignatureInvalid(format!("unknown signature algorithm: {sig_alg}"))
        })?;
        self.check_algorithm(algorithm)?;

        let signature = base64::engine::general_purpose::STANDARD
            .decode(signature_b64.trim())
            .map_err(|e| SamlError::SignatureInvalid(format!("invalid signature encoding: {e}")))?;

        if rsa_verify(&self.public_key_der, signed_query.as_bytes(), &signature, algorithm) {
            Ok(())
        } else {
            Err(SamlError::SignatureInvalid(
                "redirect signature does not verify".to_string(),
            ))
        }
    }

    fn check_algorithm(&self, algorithm: RsaAlgorithm) -> SamlResult<()> {
        if algorithm == RsaAlgorithm::RsaSha1 && !self.allow_sha1 {
            return Err(SamlError::SignatureInvalid(
                "SHA-1 signatures are not allowed".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fed_crypto::RsaSigningKeyPair;

    use super::*;
    use crate::bindings::SamlMessageType;
    use crate::signature::Signer;
    use crate::types::{Assertion, NameId, Response, Subject};

    fn pair() -> (Signer, SignatureValidator) {
        let key = Arc::new(RsaSigningKeyPair::generate().unwrap());
        let validator = SignatureValidator::new(key.public_key_der());
        (Signer::new(key), validator)
    }

    fn signed_response(signer: &Signer) -> String {
        let mut document = Response::success("https://idp.example.com")
            .with_assertion(
                Assertion::new("https://idp.example.com")
                    .with_subject(Subject::new(NameId::persistent("alice"))),
            )
            .to_element();
        signer.sign_document(&mut document).unwrap();
        document.to_xml()
    }

    #[test]
    fn signed_document_verifies_after_transport() {
        let (signer, validator) = pair();
        let xml = signed_response(&signer);
        let signature = validator.validate_xml(&xml).unwrap();
        assert!(signature.reference_uri.starts_with("#ID_"));
    }

    #[test]
    fn tampered_document_is_rejected() {
        let (signer, validator) = pair();
        let xml = signed_response(&signer).replace(">alice<", ">mallory<");
        assert!(matches!(
            validator.validate_xml(&xml),
            Err(SamlError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn other_key_is_rejected() {
        let (signer, _) = pair();
        let (_, other) = pair();
        assert!(other.validate_xml(&signed_response(&signer)).is_err());
    }

    #[test]
    fn unsigned_document_is_rejected() {
        let (_, validator) = pair();
        let document = Response::success("idp").to_element();
        assert!(validator.validate_document(&document).is_err());
    }

    #[test]
    fn redirect_signature_roundtrip() {
        let (signer, validator) = pair();
        let query = signer
            .sign_redirect_query("<samlp:AuthnRequest/>", Some("rs"), SamlMessageType::Request)
            .unwrap();
        validator.validate_redirect_query(&query).unwrap();

        let tampered = query.replace("RelayState=rs", "RelayState=xx");
        assert!(validator.validate_redirect_query(&tampered).is_err());
    }
}

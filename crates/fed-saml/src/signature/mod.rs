//! XML Signature support for SAML.
//!
//! Enveloped signatures over the [`Element`] tree for the POST binding and
//! detached query-string signatures for the Redirect binding.
//!
//! The reference digest is computed over the deterministic serialization
//! of the signed element with its `ds:Signature` removed, and the signature
//! value over the serialization of `ds:SignedInfo`. Both sides of an
//! exchange must use this crate's serializer for the digests to agree.

mod signer;
mod validator;

pub use signer::*;
pub use validator::*;

use base64::Engine;
use fed_crypto::{DigestAlgorithm, RsaAlgorithm};

use crate::error::{SamlError, SamlResult};
use crate::types::{ENVELOPED_SIGNATURE_TRANSFORM, EXCLUSIVE_C14N, XMLDSIG_NS};
use crate::xml::Element;

/// A parsed `ds:Signature` element.
#[derive(Debug, Clone)]
pub struct XmlSignature {
    /// The signature algorithm.
    pub algorithm: RsaAlgorithm,
    /// The digest algorithm of the reference.
    pub digest_algorithm: DigestAlgorithm,
    /// The reference URI (`#` followed by the signed element's ID).
    pub reference_uri: String,
    /// The digest value (base64).
    pub digest_value: String,
    /// The signature value (base64).
    pub signature_value: String,
    /// The `ds:SignedInfo` element as received.
    pub signed_info: Element,
}

impl XmlSignature {
    /// Reads a `ds:Signature` element.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::SignatureInvalid`] if required parts are missing
    /// or name unknown algorithms.
    pub fn from_element(signature: &Element) -> SamlResult<Self> {
        let invalid = |what: &str| SamlError::SignatureInvalid(format!("missing {what}"));

        let signed_info = signature
            .child(XMLDSIG_NS, "SignedInfo")
            .ok_or_else(|| invalid("SignedInfo"))?;
        let method = signed_info
            .child(XMLDSIG_NS, "SignatureMethod")
            .and_then(|m| m.attribute("Algorithm"))
            .ok_or_else(|| invalid("SignatureMethod"))?;
        let algorithm = RsaAlgorithm::from_uri(method).ok_or_else(|| {
            SamlError::SignatureInvalid(format!("unknown signature algorithm: {method}"))
        })?;

        let reference = signed_info
            .child(XMLDSIG_NS, "Reference")
            .ok_or_else(|| invalid("Reference"))?;
        let digest_method = reference
            .child(XMLDSIG_NS, "DigestMethod")
            .and_then(|m| m.attribute("Algorithm"))
            .ok_or_else(|| invalid("DigestMethod"))?;
        let digest_algorithm = DigestAlgorithm::from_uri(digest_method).ok_or_else(|| {
            SamlError::SignatureInvalid(format!("unknown digest algorithm: {digest_method}"))
        })?;

        Ok(Self {
            algorithm,
            digest_algorithm,
            reference_uri: reference.attribute("URI").unwrap_or_default().to_string(),
            digest_value: reference
                .child_text(XMLDSIG_NS, "DigestValue")
                .ok_or_else(|| invalid("DigestValue"))?,
            signature_value: signature
                .child_text(XMLDSIG_NS, "SignatureValue")
                .ok_or_else(|| invalid("SignatureValue"))?,
            signed_info: signed_info.clone(),
        })
    }
}

/// Builds `ds:SignedInfo` for an enveloped signature over `reference_id`.
fn build_signed_info(reference_id: &str, digest_b64: &str, algorithm: RsaAlgorithm) -> Element {
    let ds = |name: &str| Element::new(Some("ds"), name, Some(XMLDSIG_NS));

    let transforms = ds("Transforms")
        .with_child(ds("Transform").with_attribute("Algorithm", ENVELOPED_SIGNATURE_TRANSFORM))
        .with_child(ds("Transform").with_attribute("Algorithm", EXCLUSIVE_C14N));

    let reference = ds("Reference")
        .with_attribute("URI", format!("#{reference_id}"))
        .with_child(transforms)
        .with_child(ds("DigestMethod").with_attribute("Algorithm", algorithm.digest().uri()))
        .with_child(ds("DigestValue").with_text(digest_b64));

    Element::declared("ds", "SignedInfo", XMLDSIG_NS)
        .with_child(ds("CanonicalizationMethod").with_attribute("Algorithm", EXCLUSIVE_C14N))
        .with_child(ds("SignatureMethod").with_attribute("Algorithm", algorithm.uri()))
        .with_child(reference)
}

/// Digest of an element serialized without its `ds:Signature` child.
fn reference_digest(element: &Element, algorithm: DigestAlgorithm) -> String {
    let mut unsigned = element.clone();
    unsigned.remove_child(XMLDSIG_NS, "Signature");
    base64::engine::general_purpose::STANDARD.encode(algorithm.digest(unsigned.to_xml().as_bytes()))
}

/// Returns true if the element carries an enveloped signature.
#[must_use]
pub fn has_signature(element: &Element) -> bool {
    element.child(XMLDSIG_NS, "Signature").is_some()
}

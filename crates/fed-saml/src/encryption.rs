//! XML Encryption of SAML elements.
//!
//! An element is serialized with its in-scope namespace declarations,
//! encrypted under a fresh AES-GCM content key, and wrapped as
//!
//! ```text
//! <saml:EncryptedAssertion>
//!   <xenc:EncryptedData Type="...#Element">
//!     <xenc:EncryptionMethod Algorithm="aes128-gcm"/>
//!     <ds:KeyInfo>
//!       <xenc:EncryptedKey>
//!         <xenc:EncryptionMethod Algorithm="rsa-oaep-mgf1p"/>
//!         <xenc:CipherData><xenc:CipherValue>wrapped key</xenc:CipherValue></xenc:CipherData>
//!       </xenc:EncryptedKey>
//!     </ds:KeyInfo>
//!     <xenc:CipherData><xenc:CipherValue>IV || ciphertext || tag</xenc:CipherValue></xenc:CipherData>
//!   </xenc:EncryptedData>
//! </saml:EncryptedAssertion>
//! ```

use base64::Engine;
use fed_crypto::encryption::RSA_OAEP_MGF1P_URI;
use fed_crypto::{ContentAlgorithm, ContentKey, RsaDecryptionKey, RsaEncryptionKey};

use crate::error::{SamlError, SamlResult};
use crate::types::{generate_id, SAML_NS, XMLDSIG_NS, XMLENC_ELEMENT_TYPE, XMLENC_NS};
use crate::xml::Element;

fn xenc(name: &str) -> Element {
    Element::new(Some("xenc"), name, Some(XMLENC_NS))
}

fn cipher_data(value: &[u8]) -> Element {
    xenc("CipherData").with_child(
        xenc("CipherValue").with_text(base64::engine::general_purpose::STANDARD.encode(value)),
    )
}

fn cipher_value(parent: &Element) -> SamlResult<Vec<u8>> {
    let value = parent
        .child(XMLENC_NS, "CipherData")
        .and_then(|data| data.child_text(XMLENC_NS, "CipherValue"))
        .ok_or_else(|| SamlError::MissingElement("CipherValue".to_string()))?;
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(base64::engine::general_purpose::STANDARD.decode(compact)?)
}

/// Encrypts a standalone element into a wrapper named `wrapper_name` in
/// the SAML assertion namespace.
///
/// The wrapper takes the element's namespace prefix, so an encrypted
/// `saml:Assertion` becomes a `saml:EncryptedAssertion`.
///
/// # Errors
///
/// Returns [`SamlError::Crypto`] if encryption or key wrapping fails.
pub fn encrypt_element(
    element: &Element,
    wrapper_name: &str,
    recipient: &RsaEncryptionKey,
    algorithm: ContentAlgorithm,
) -> SamlResult<Element> {
    let content_key = ContentKey::generate(algorithm);
    let ciphertext = content_key.encrypt(element.to_xml().as_bytes())?;
    let wrapped_key = recipient.wrap_key(&content_key)?;

    let encrypted_key = xenc("EncryptedKey")
        .with_child(xenc("EncryptionMethod").with_attribute("Algorithm", recipient.algorithm_uri()))
        .with_child(cipher_data(&wrapped_key));

    let encrypted_data = Element::declared("xenc", "EncryptedData", XMLENC_NS)
        .with_attribute("Id", format!("ED{}", generate_id()))
        .with_attribute("Type", XMLENC_ELEMENT_TYPE)
        .with_child(xenc("EncryptionMethod").with_attribute("Algorithm", algorithm.uri()))
        .with_child(
            Element::declared("ds", "KeyInfo", XMLDSIG_NS).with_child(encrypted_key),
        )
        .with_child(cipher_data(&ciphertext));

    let wrapper = match element.prefix.as_deref() {
        Some(prefix) => Element::declared(prefix, wrapper_name, SAML_NS),
        None => Element::new(None, wrapper_name, Some(SAML_NS)).with_attribute("xmlns", SAML_NS),
    };
    Ok(wrapper.with_child(encrypted_data))
}

/// Decrypts the element carried by an encrypted wrapper.
///
/// The `xenc:EncryptedKey` may sit inside the `ds:KeyInfo` of the
/// `xenc:EncryptedData` or next to it in the wrapper.
///
/// # Errors
///
/// Returns an error if parts are missing, the algorithms are unknown, the
/// key cannot be unwrapped or the plaintext is not XML.
pub fn decrypt_element(wrapper: &Element, key: &RsaDecryptionKey) -> SamlResult<Element> {
    let encrypted_data = wrapper
        .child(XMLENC_NS, "EncryptedData")
        .ok_or_else(|| SamlError::MissingElement("EncryptedData".to_string()))?;

    let method = encrypted_data
        .child(XMLENC_NS, "EncryptionMethod")
        .and_then(|m| m.attribute("Algorithm"))
        .ok_or_else(|| SamlError::MissingElement("EncryptionMethod".to_string()))?;
    let algorithm = ContentAlgorithm::from_uri(method)
        .ok_or_else(|| SamlError::Crypto(format!("unsupported content encryption: {method}")))?;

    let encrypted_key = wrapper
        .find(XMLENC_NS, "EncryptedKey")
        .ok_or_else(|| SamlError::MissingElement("EncryptedKey".to_string()))?;
    if let Some(transport) = encrypted_key
        .child(XMLENC_NS, "EncryptionMethod")
        .and_then(|m| m.attribute("Algorithm"))
    {
        if transport != RSA_OAEP_MGF1P_URI {
            return Err(SamlError::Crypto(format!("unsupported key transport: {transport}")));
        }
    }

    let content_key = key.unwrap_key(&cipher_value(encrypted_key)?, algorithm)?;
    let plaintext = content_key.decrypt(&cipher_value(encrypted_data)?)?;
    let xml = std::str::from_utf8(&plaintext)?;
    Element::parse(xml)
}

//! HTTP-Redirect binding.
//!
//! The message travels in the query string as
//! `urlencode(base64(deflate(xml)))`. A signed message carries `SigAlg`
//! and `Signature` parameters; the signature covers the exact bytes
//! `SAMLRequest=...[&RelayState=...]&SigAlg=...` as they appear on the wire.

use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::error::{SamlError, SamlResult};

use super::{DecodedMessage, SamlMessageType};

/// HTTP-Redirect binding encoder/decoder.
pub struct HttpRedirectBinding;

impl HttpRedirectBinding {
    /// Builds the unsigned query string for a message.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Deflate`] if compression fails.
    pub fn query(
        xml: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> SamlResult<String> {
        let mut query = format!(
            "{}={}",
            message_type.form_param(),
            deflate_base64_url_encode(xml)?
        );
        if let Some(relay_state) = relay_state.filter(|rs| !rs.is_empty()) {
            query.push_str("&RelayState=");
            query.push_str(&urlencoding::encode(relay_state));
        }
        Ok(query)
    }

    /// Appends the `SigAlg` parameter, returning the bytes to be signed.
    #[must_use]
    pub fn signing_input(query: &str, sig_alg: &str) -> String {
        format!("{query}&SigAlg={}", urlencoding::encode(sig_alg))
    }

    /// Appends the `Signature` parameter to a signing input.
    #[must_use]
    pub fn append_signature(signing_input: &str, signature: &[u8]) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(signature);
        format!("{signing_input}&Signature={}", urlencoding::encode(&encoded))
    }

    /// Encodes a request into a URL for `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Deflate`] if compression fails.
    pub fn encode_request(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
    ) -> SamlResult<String> {
        let query = Self::query(xml, relay_state, SamlMessageType::Request)?;
        Ok(with_query(destination, &query))
    }

    /// Encodes a response into a URL for `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::Deflate`] if compression fails.
    pub fn encode_response(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
    ) -> SamlResult<String> {
        let query = Self::query(xml, relay_state, SamlMessageType::Response)?;
        Ok(with_query(destination, &query))
    }

    /// Decodes a message from a raw query string.
    ///
    /// # Errors
    ///
    /// Returns an error if neither `SAMLRequest` nor `SAMLResponse` is
    /// present or the payload cannot be decoded.
    pub fn decode_query(query: &str) -> SamlResult<DecodedMessage> {
        let mut message = None;
        let mut relay_state = None;
        let mut signature = None;
        let mut sig_alg = None;

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "SAMLRequest" => message = Some((value.into_owned(), SamlMessageType::Request)),
                "SAMLResponse" => message = Some((value.into_owned(), SamlMessageType::Response)),
                "RelayState" => relay_state = Some(value.into_owned()),
                "Signature" => signature = Some(value.into_owned()),
                "SigAlg" => sig_alg = Some(value.into_owned()),
                _ => {}
            }
        }

        let (encoded, message_type) = message.ok_or_else(|| {
            SamlError::Protocol("no SAMLRequest or SAMLResponse parameter".to_string())
        })?;

        Ok(DecodedMessage {
            xml: base64_inflate(&encoded)?,
            message_type,
            relay_state,
            signature,
            sig_alg,
        })
    }

    /// Decodes a message from a full URL.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid URL or undecodable payload.
    pub fn decode_url(url: &str) -> SamlResult<DecodedMessage> {
        let parsed =
            url::Url::parse(url).map_err(|e| SamlError::Protocol(format!("invalid URL: {e}")))?;
        Self::decode_query(parsed.query().unwrap_or_default())
    }

    /// Extracts the signed portion of a raw query string.
    ///
    /// Parameters are taken verbatim, in the canonical order
    /// `SAMLRequest`/`SAMLResponse`, `RelayState`, `SigAlg`.
    ///
    /// # Errors
    ///
    /// Returns an error if the message or `SigAlg` parameter is missing.
    pub fn extract_signed_query(query: &str) -> SamlResult<String> {
        let raw = |name: &str| {
            query
                .split('&')
                .find(|pair| pair.split('=').next() == Some(name))
        };

        let message = raw("SAMLRequest")
            .or_else(|| raw("SAMLResponse"))
            .ok_or_else(|| SamlError::Protocol("no SAML message in query".to_string()))?;
        let sig_alg =
            raw("SigAlg").ok_or_else(|| SamlError::MissingElement("SigAlg".to_string()))?;

        let mut signed = message.to_string();
        if let Some(relay_state) = raw("RelayState") {
            signed.push('&');
            signed.push_str(relay_state);
        }
        signed.push('&');
        signed.push_str(sig_alg);
        Ok(signed)
    }
}

/// Deflates, base64-encodes and URL-encodes a message.
///
/// # Errors
///
/// Returns [`SamlError::Deflate`] if compression fails.
pub fn deflate_base64_url_encode(xml: &str) -> SamlResult<String> {
    let compressed = deflate_compress(xml.as_bytes())?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(compressed);
    Ok(urlencoding::encode(&encoded).into_owned())
}

/// Reverses [`deflate_base64_url_encode`] for an already URL-decoded value.
///
/// # Errors
///
/// Returns an error for invalid base64, deflate data or UTF-8.
pub fn base64_inflate(encoded: &str) -> SamlResult<String> {
    let compressed = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
    let bytes = deflate_decompress(&compressed)?;
    String::from_utf8(bytes).map_err(|e| SamlError::XmlParse(format!("invalid UTF-8 in message: {e}")))
}

fn with_query(destination: &str, query: &str) -> String {
    let separator = if destination.contains('?') { '&' } else { '?' };
    format!("{destination}{separator}{query}")
}

/// Compresses data using DEFLATE (raw, no zlib header).
fn deflate_compress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| SamlError::Deflate(format!("compression error: {e}")))?;
    encoder
        .finish()
        .map_err(|e| SamlError::Deflate(format!("compression finish error: {e}")))
}

/// Decompresses DEFLATE data.
fn deflate_decompress(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| SamlError::Deflate(format!("decompression error: {e}")))?;
    Ok(decompressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_and_decode_request() {
        let xml = r#"<samlp:AuthnRequest>test content here</samlp:AuthnRequest>"#;
        let url =
            HttpRedirectBinding::encode_request(xml, "https://idp.example.com/sso", Some("state 123"))
                .unwrap();

        assert!(url.starts_with("https://idp.example.com/sso?SAMLRequest="));
        assert!(url.contains("&RelayState=state%20123"));

        let decoded = HttpRedirectBinding::decode_url(&url).unwrap();
        assert_eq!(decoded.xml, xml);
        assert_eq!(decoded.message_type, SamlMessageType::Request);
        assert_eq!(decoded.relay_state.as_deref(), Some("state 123"));
    }

    #[test]
    fn encode_and_decode_response() {
        let xml = r#"<samlp:Response>test response</samlp:Response>"#;
        let url =
            HttpRedirectBinding::encode_response(xml, "https://sp.example.com/acs", None).unwrap();

        assert!(url.contains("SAMLResponse="));
        assert!(!url.contains("RelayState"));

        let decoded = HttpRedirectBinding::decode_url(&url).unwrap();
        assert_eq!(decoded.xml, xml);
        assert_eq!(decoded.message_type, SamlMessageType::Response);
    }

    #[test]
    fn deflate_roundtrip() {
        let original = b"Test data for compression";
        let compressed = deflate_compress(original).unwrap();
        let decompressed = deflate_decompress(&compressed).unwrap();
        assert_eq!(decompressed, original);
    }

    #[test]
    fn signed_query_is_extracted_verbatim() {
        let query = HttpRedirectBinding::query("<Test/>", Some("a b"), SamlMessageType::Request)
            .unwrap();
        let input = HttpRedirectBinding::signing_input(
            &query,
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
        );
        let full = HttpRedirectBinding::append_signature(&input, b"sig");

        assert_eq!(HttpRedirectBinding::extract_signed_query(&full).unwrap(), input);
        let decoded = HttpRedirectBinding::decode_query(&full).unwrap();
        assert_eq!(decoded.signature.as_deref(), Some("c2ln"));
        assert_eq!(
            decoded.sig_alg.as_deref(),
            Some("http://www.w3.org/2001/04/xmldsig-more#rsa-sha256")
        );
    }

    #[test]
    fn missing_message_parameter() {
        assert!(matches!(
            HttpRedirectBinding::decode_query("RelayState=x"),
            Err(SamlError::Protocol(_))
        ));
    }

    #[test]
    fn url_with_existing_query() {
        let url = HttpRedirectBinding::encode_request(
            "<Test/>",
            "https://idp.example.com/sso?existing=param",
            None,
        )
        .unwrap();
        assert!(url.contains("?existing=param&SAMLRequest="));
    }
}

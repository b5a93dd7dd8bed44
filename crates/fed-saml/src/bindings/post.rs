//! HTTP-POST binding.
//!
//! The message is base64-encoded into a hidden form field that the browser
//! submits to the destination.

use base64::Engine;

use crate::error::{SamlError, SamlResult};

use super::{DecodedMessage, SamlMessageType};

/// HTTP-POST binding encoder/decoder.
pub struct HttpPostBinding;

impl HttpPostBinding {
    /// Base64-encodes a message for a form field.
    #[must_use]
    pub fn encode_message(xml: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(xml)
    }

    /// Renders an auto-submitting HTML form carrying the message.
    #[must_use]
    pub fn encode(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> String {
        let relay_state_input = relay_state
            .map(|rs| {
                format!(
                    r#"<input type="hidden" name="RelayState" value="{}"/>"#,
                    html_escape(rs)
                )
            })
            .unwrap_or_default();

        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="UTF-8"><title>SAML POST</title></head>
<body onload="document.forms[0].submit()">
    <form method="post" action="{}">
        <input type="hidden" name="{}" value="{}"/>
        {}
        <noscript><input type="submit" value="Continue"/></noscript>
    </form>
</body>
</html>"#,
            html_escape(destination),
            message_type.form_param(),
            Self::encode_message(xml),
            relay_state_input
        )
    }

    /// Decodes a message from form fields.
    ///
    /// # Errors
    ///
    /// Returns an error if neither field is present or the value is not
    /// base64-encoded UTF-8.
    pub fn decode(
        saml_request: Option<&str>,
        saml_response: Option<&str>,
        relay_state: Option<&str>,
    ) -> SamlResult<DecodedMessage> {
        let (encoded, message_type) = match (saml_request, saml_response) {
            (Some(request), _) => (request, SamlMessageType::Request),
            (None, Some(response)) => (response, SamlMessageType::Response),
            (None, None) => {
                return Err(SamlError::Protocol(
                    "no SAMLRequest or SAMLResponse parameter".to_string(),
                ));
            }
        };

        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let decoded = base64::engine::general_purpose::STANDARD.decode(compact)?;
        let xml = String::from_utf8(decoded)
            .map_err(|e| SamlError::XmlParse(format!("invalid UTF-8 in message: {e}")))?;

        Ok(DecodedMessage {
            xml,
            message_type,
            relay_state: relay_state.map(String::from),
            signature: None,
            sig_alg: None,
        })
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

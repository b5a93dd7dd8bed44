//! SAML Status types.

use crate::error::{SamlError, SamlResult};
use crate::xml::Element;

use super::{required_attribute, samlp_element, status_codes, SAMLP_NS};

/// SAML protocol status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// The status code.
    pub status_code: StatusCode,

    /// Optional status message.
    pub status_message: Option<String>,
}

impl Status {
    /// Creates a success status.
    #[must_use]
    pub fn success() -> Self {
        Self {
            status_code: StatusCode::new(status_codes::SUCCESS),
            status_message: None,
        }
    }

    /// Creates a responder error status with an AuthnFailed sub-status.
    #[must_use]
    pub fn authn_failed(message: impl Into<String>) -> Self {
        Self {
            status_code: StatusCode::new(status_codes::RESPONDER)
                .with_sub_code(StatusCode::new(status_codes::AUTHN_FAILED)),
            status_message: Some(message.into()),
        }
    }

    /// Returns true if this status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code.value == status_codes::SUCCESS
    }

    pub(crate) fn to_element(&self) -> Element {
        let mut element = samlp_element("Status").with_child(self.status_code.to_element());
        if let Some(message) = &self.status_message {
            element = element.with_child(samlp_element("StatusMessage").with_text(message.as_str()));
        }
        element
    }

    pub(crate) fn from_element(element: &Element) -> SamlResult<Self> {
        let code = element
            .child(SAMLP_NS, "StatusCode")
            .ok_or_else(|| SamlError::MissingElement("StatusCode".to_string()))?;
        Ok(Self {
            status_code: StatusCode::from_element(code)?,
            status_message: element.child_text(SAMLP_NS, "StatusMessage"),
        })
    }
}

/// SAML status code, optionally nesting a more specific code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCode {
    /// The status code URI.
    pub value: String,

    /// Optional nested status code.
    pub sub_code: Option<Box<StatusCode>>,
}

impl StatusCode {
    /// Creates a status code.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            sub_code: None,
        }
    }

    /// Sets the nested status code.
    #[must_use]
    pub fn with_sub_code(mut self, sub_code: StatusCode) -> Self {
        self.sub_code = Some(Box::new(sub_code));
        self
    }

    fn to_element(&self) -> Element {
        let element = samlp_element("StatusCode").with_attribute("Value", self.value.as_str());
        match &self.sub_code {
            Some(sub) => element.with_child(sub.to_element()),
            None => element,
        }
    }

    fn from_element(element: &Element) -> SamlResult<Self> {
        let sub_code = element
            .child(SAMLP_NS, "StatusCode")
            .map(StatusCode::from_element)
            .transpose()?
            .map(Box::new);
        Ok(Self {
            value: required_attribute(element, "Value")?.to_string(),
            sub_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_status() {
        let status = Status::success();
        assert!(status.is_success());
        assert!(status.status_message.is_none());
    }

    #[test]
    fn authn_failed_status_nests_code() {
        let status = Status::authn_failed("bad password");
        assert!(!status.is_success());
        let parsed = Status::from_element(&status.to_element()).unwrap();
        assert_eq!(parsed, status);
        assert_eq!(
            parsed.status_code.sub_code.unwrap().value,
            status_codes::AUTHN_FAILED
        );
    }

    #[test]
    fn missing_status_code_is_rejected() {
        let element = samlp_element("Status");
        assert!(matches!(
            Status::from_element(&element),
            Err(SamlError::MissingElement(_))
        ));
    }
}

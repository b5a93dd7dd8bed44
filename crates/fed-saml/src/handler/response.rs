//! The outbound side of a chain invocation.

use crate::xml::Element;

/// An HTTP error reported instead of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    /// HTTP status code.
    pub code: u16,
    /// Human readable message.
    pub message: String,
}

/// Output accumulated by the handlers of a chain.
#[derive(Debug, Clone, Default)]
pub struct HandlerResponse {
    /// The outgoing document.
    pub document: Option<Element>,

    /// Where the document is sent.
    pub destination: Option<String>,

    /// Relay state to send along.
    pub relay_state: Option<String>,

    /// Roles extracted from a received assertion.
    pub roles: Vec<String>,

    /// Send with the POST binding rather than HTTP-Redirect.
    pub post_binding: bool,

    /// The document is a request, not a response.
    pub send_request: bool,

    /// Error to report to the user agent.
    pub error: Option<HandlerError>,

    /// Signed HTTP-Redirect query string of the document.
    pub destination_query_string_with_signature: Option<String>,
}

impl HandlerResponse {
    /// Creates an empty response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the destination.
    #[must_use]
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Records an HTTP error.
    pub fn set_error(&mut self, code: u16, message: impl Into<String>) {
        self.error = Some(HandlerError {
            code,
            message: message.into(),
        });
    }

    /// Returns the document serialized, if any.
    #[must_use]
    pub fn document_xml(&self) -> Option<String> {
        self.document.as_ref().map(Element::to_xml)
    }
}

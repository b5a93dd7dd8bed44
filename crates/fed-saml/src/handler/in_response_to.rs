//! Correlation of responses with the AuthnRequest that asked for them.

use tracing::{debug, warn};

use crate::error::{SamlError, SamlResult};
use crate::types::ProtocolMessage;

use super::request::HandlerRequest;
use super::response::HandlerResponse;
use super::session::SessionStore;
use super::SamlHandler;

/// Checks that a received Response answers the last AuthnRequest sent from
/// this session.
///
/// Must follow the authentication handler when generating, since that is
/// where the request ID comes from. The stored ID is consumed by the check,
/// so a response cannot be replayed against the same session.
#[derive(Debug, Clone, Copy, Default)]
pub struct InResponseToHandler;

impl InResponseToHandler {
    /// Creates the handler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SamlHandler for InResponseToHandler {
    fn name(&self) -> &'static str {
        "in-response-to"
    }

    fn handle_status_response_type(
        &self,
        request: &mut HandlerRequest,
        _response: &mut HandlerResponse,
        session: &dyn SessionStore,
    ) -> SamlResult<()> {
        let Some(ProtocolMessage::Response(saml_response)) = &request.message else {
            return Err(SamlError::Protocol("expected a Response".to_string()));
        };
        let expected = session.take_auth_request_id();
        match (saml_response.in_response_to.as_deref(), expected.as_deref()) {
            (Some(received), Some(expected)) if received == expected => {
                debug!(request_id = %expected, "response matches AuthnRequest");
                Ok(())
            }
            (received, expected) => {
                warn!(?received, ?expected, "InResponseTo does not match");
                Err(SamlError::InResponseToMismatch(format!(
                    "expected {}, received {}",
                    expected.unwrap_or("no request"),
                    received.unwrap_or("none")
                )))
            }
        }
    }

    fn generate_saml_request(
        &self,
        request: &mut HandlerRequest,
        _response: &mut HandlerResponse,
        session: &dyn SessionStore,
    ) -> SamlResult<()> {
        if let Some(id) = &request.options.auth_request_id {
            debug!(request_id = %id, "remembering AuthnRequest");
            session.set_auth_request_id(id.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HttpMethod, InMemorySession};
    use crate::types::Response;

    fn response_to(id: Option<&str>) -> HandlerRequest {
        let mut saml_response = Response::success("https://idp.example.com");
        saml_response.in_response_to = id.map(str::to_string);
        HandlerRequest::inbound(ProtocolMessage::from(saml_response), HttpMethod::Post)
    }

    fn session_after_generate(id: &str) -> InMemorySession {
        let session = InMemorySession::new();
        let mut request = HandlerRequest::default();
        request.options.auth_request_id = Some(id.to_string());
        InResponseToHandler::new()
            .generate_saml_request(&mut request, &mut HandlerResponse::new(), &session)
            .unwrap();
        session
    }

    #[test]
    fn matching_response_passes_once() {
        let handler = InResponseToHandler::new();
        let session = session_after_generate("ID_req1");
        assert_eq!(session.auth_request_id().as_deref(), Some("ID_req1"));

        handler
            .handle_status_response_type(&mut response_to(Some("ID_req1")), &mut HandlerResponse::new(), &session)
            .unwrap();
        assert!(session.auth_request_id().is_none());

        let replay = handler.handle_status_response_type(
            &mut response_to(Some("ID_req1")),
            &mut HandlerResponse::new(),
            &session,
        );
        assert!(matches!(replay, Err(SamlError::InResponseToMismatch(_))));
    }

    #[test]
    fn mismatch_and_absence_are_fatal() {
        let handler = InResponseToHandler::new();

        let session = session_after_generate("ID_req1");
        let result = handler.handle_status_response_type(
            &mut response_to(Some("ID_other")),
            &mut HandlerResponse::new(),
            &session,
        );
        assert!(matches!(result, Err(SamlError::InResponseToMismatch(_))));

        let session = session_after_generate("ID_req1");
        let result =
            handler.handle_status_response_type(&mut response_to(None), &mut HandlerResponse::new(), &session);
        assert!(matches!(result, Err(SamlError::InResponseToMismatch(_))));
    }
}

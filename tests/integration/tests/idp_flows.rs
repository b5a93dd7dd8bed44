//! Identity provider behaviour: issuing, renewing and delivering
//! assertions.

use std::sync::Arc;

use fed_crypto::RsaSigningKeyPair;
use fed_saml::handler::{
    AuthenticationHandler, ChainConfig, HandlerChain, HandlerConfig, HandlerRequest, HandlerResponse,
    HttpMethod, IdpConfig, ParticipantRegistry, Principal, SessionStore,
    SignatureHandler,
};
use fed_saml::signature::SignatureValidator;
use fed_saml::types::{
    AuthnRequest, Endpoint, ProtocolMessage, Response, SamlBinding, SpSsoDescriptor,
    SubjectIdentifier, CONFIRMATION_BEARER, ROLE_ATTRIBUTE_NAME, XMLDSIG_NS,
};
use fed_saml::SamlError;

use crate::common::{idp_session, init_tracing, TestEnv};

const IDP: &str = "https://idp.example.com";

struct Idp {
    chain: HandlerChain,
    registry: Arc<ParticipantRegistry>,
    keys: Arc<RsaSigningKeyPair>,
}

fn idp(strict_post_binding: bool) -> anyhow::Result<Idp> {
    init_tracing();
    let keys = Arc::new(RsaSigningKeyPair::generate()?);
    let registry = Arc::new(ParticipantRegistry::new());
    let chain_config = ChainConfig::idp(IDP, IdpConfig::default().with_strict_post_binding(strict_post_binding));
    let config = HandlerConfig::new().with_key_pair(keys.clone());

    let chain = HandlerChain::new()
        .with_handler(AuthenticationHandler::new(&chain_config, config.clone()).with_registry(registry.clone()))
        .with_handler(SignatureHandler::new(&chain_config, &config)?);
    Ok(Idp { chain, registry, keys })
}

fn authn_request(authn_request: AuthnRequest, method: HttpMethod) -> HandlerRequest {
    HandlerRequest::inbound(ProtocolMessage::from(authn_request), method)
        .with_user_principal(Principal::new("alice"))
}

fn issued(response: &HandlerResponse) -> anyhow::Result<Response> {
    let document = response
        .document
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("no document"))?;
    Ok(Response::from_element(document)?)
}

/// A first AuthnRequest yields a fresh assertion addressed to the service
/// provider's consumer URL.
#[tokio::test]
async fn test_fresh_assertion_for_sp1() -> anyhow::Result<()> {
    let idp = idp(false)?;
    let session = idp_session(&["user"]);
    let request = AuthnRequest::new("sp1").with_acs_url("https://sp1/acs");
    let request_id = request.id.clone();

    let mut response = HandlerResponse::new();
    idp.chain
        .handle_request_type(&mut authn_request(request, HttpMethod::Post), &mut response, &session)?;

    assert_eq!(response.destination.as_deref(), Some("https://sp1/acs"));
    let saml_response = issued(&response)?;
    assert!(saml_response.is_success());
    assert_eq!(saml_response.in_response_to.as_deref(), Some(request_id.as_str()));

    let assertion = saml_response.first_assertion().expect("plain assertion");
    assert_eq!(assertion.issuer.as_deref(), Some(IDP));
    let subject = assertion.subject.as_ref().expect("subject");
    assert!(matches!(&subject.identifier, Some(SubjectIdentifier::NameId(n)) if n.value == "alice"));

    let confirmation = &subject.confirmations[0];
    assert_eq!(confirmation.method, CONFIRMATION_BEARER);
    let data = confirmation.data.as_ref().expect("confirmation data");
    assert_eq!(data.in_response_to.as_deref(), Some(request_id.as_str()));
    assert_eq!(data.recipient.as_deref(), Some("https://sp1/acs"));

    let conditions = assertion.conditions.as_ref().expect("conditions");
    assert_eq!(conditions.audiences, ["sp1"]);
    assert!(conditions.not_before < conditions.not_on_or_after);

    let authn = assertion.authn_statements().next().expect("authn statement");
    assert_eq!(authn.session_index.as_deref(), Some(session.id()));

    let roles: Vec<&str> = assertion
        .attribute_statements()
        .flat_map(|s| &s.attributes)
        .filter(|a| a.name == ROLE_ATTRIBUTE_NAME)
        .flat_map(|a| a.text_values())
        .collect();
    assert_eq!(roles, ["user"]);

    assert_eq!(session.assertion().map(|b| b.assertion_id), Some(assertion.id.clone()));
    assert_eq!(idp.registry.peek(session.id()).as_deref(), Some("https://sp1/acs"));
    Ok(())
}

/// A second AuthnRequest in the same session renews the assertion rather
/// than issuing a new one, and registers the participant once.
#[tokio::test]
async fn test_renewal_keeps_assertion_identity() -> anyhow::Result<()> {
    let idp = idp(false)?;
    let session = idp_session(&["user"]);

    let mut first = HandlerResponse::new();
    idp.chain.handle_request_type(
        &mut authn_request(AuthnRequest::new("sp1").with_acs_url("https://sp1/acs"), HttpMethod::Post),
        &mut first,
        &session,
    )?;
    let second_request = AuthnRequest::new("sp1").with_acs_url("https://sp1/acs");
    let second_id = second_request.id.clone();
    let mut second = HandlerResponse::new();
    idp.chain
        .handle_request_type(&mut authn_request(second_request, HttpMethod::Post), &mut second, &session)?;

    let first = issued(&first)?;
    let second = issued(&second)?;
    let (a, b) = (
        first.first_assertion().expect("first assertion"),
        second.first_assertion().expect("second assertion"),
    );
    assert_eq!(a.id, b.id);
    assert_eq!(a.statements.len(), b.statements.len());
    assert!(b.issue_instant >= a.issue_instant);

    let data = b.subject.as_ref().and_then(|s| s.confirmations[0].data.as_ref()).expect("data");
    assert_eq!(data.in_response_to.as_deref(), Some(second_id.as_str()));

    assert_eq!(idp.registry.participant_count(session.id()), 1);
    Ok(())
}

/// GET requests are answered over HTTP-Redirect with a signed query;
/// POST requests, and strict POST binding, get an enveloped signature.
#[tokio::test]
async fn test_binding_selection() -> anyhow::Result<()> {
    let idp_redirect = idp(false)?;
    let validator = SignatureValidator::new(idp_redirect.keys.public_key_der());

    let mut redirect = HandlerResponse::new();
    let mut request = authn_request(AuthnRequest::new("sp1").with_acs_url("https://sp1/acs"), HttpMethod::Get)
        .with_relay_state("token");
    idp_redirect
        .chain
        .handle_request_type(&mut request, &mut redirect, &idp_session(&["user"]))?;
    assert!(!redirect.post_binding);
    let query = redirect
        .destination_query_string_with_signature
        .as_deref()
        .expect("signed query");
    assert!(query.starts_with("SAMLResponse="));
    assert!(query.contains("RelayState=token"));
    validator.validate_redirect_query(query)?;
    assert!(redirect.document.as_ref().and_then(|d| d.child(XMLDSIG_NS, "Signature")).is_none());

    let mut post = HandlerResponse::new();
    idp_redirect.chain.handle_request_type(
        &mut authn_request(AuthnRequest::new("sp1").with_acs_url("https://sp1/acs"), HttpMethod::Post),
        &mut post,
        &idp_session(&["user"]),
    )?;
    assert!(post.post_binding);
    validator.validate_document(post.document.as_ref().expect("document"))?;

    let strict = idp(true)?;
    let mut strict_response = HandlerResponse::new();
    strict.chain.handle_request_type(
        &mut authn_request(AuthnRequest::new("sp1").with_acs_url("https://sp1/acs"), HttpMethod::Get),
        &mut strict_response,
        &idp_session(&["user"]),
    )?;
    assert!(strict_response.post_binding);
    assert!(strict_response.destination_query_string_with_signature.is_none());
    Ok(())
}

/// Participants are registered under the logout URL from their metadata;
/// a participant without one is not registered.
#[tokio::test]
async fn test_logout_url_from_metadata() -> anyhow::Result<()> {
    let idp = idp(false)?;

    let with_logout = SpSsoDescriptor::default()
        .with_assertion_consumer_service(Endpoint::new(SamlBinding::HttpPost, "https://sp2/acs"))
        .with_single_logout_service(Endpoint::new(SamlBinding::HttpRedirect, "https://sp2/slo"));
    let session = idp_session(&["user"]);
    let mut request = authn_request(AuthnRequest::new("sp2"), HttpMethod::Post);
    request.options.sp_metadata = Some(with_logout);
    let mut response = HandlerResponse::new();
    idp.chain.handle_request_type(&mut request, &mut response, &session)?;
    assert_eq!(response.destination.as_deref(), Some("https://sp2/acs"));
    assert_eq!(idp.registry.peek(session.id()).as_deref(), Some("https://sp2/slo"));
    assert_eq!(idp.registry.binding("https://sp2/slo"), Some(true));

    let without_logout = SpSsoDescriptor::default()
        .with_assertion_consumer_service(Endpoint::new(SamlBinding::HttpPost, "https://sp3/acs"));
    let session = idp_session(&["user"]);
    let mut request = authn_request(AuthnRequest::new("sp3"), HttpMethod::Post);
    request.options.sp_metadata = Some(without_logout);
    idp.chain.handle_request_type(&mut request, &mut HandlerResponse::new(), &session)?;
    assert_eq!(idp.registry.participant_count(session.id()), 0);
    Ok(())
}

/// Requests from outside the trusted domains never reach authentication.
#[tokio::test]
async fn test_untrusted_service_provider() -> anyhow::Result<()> {
    let env = TestEnv::new(false)?;
    let session = idp_session(&["user"]);
    let mut request = authn_request(
        AuthnRequest::new("https://attacker.net").with_acs_url("https://attacker.net/acs"),
        HttpMethod::Post,
    );
    request.options.supports_signature = Some(false);

    let mut response = HandlerResponse::new();
    let result = env.idp.handle_request_type(&mut request, &mut response, &session);
    assert!(matches!(result, Err(SamlError::IssuerNotTrusted(_))), "got {result:?}");
    assert!(response.document.is_none());
    assert!(session.assertion().is_none());
    assert_eq!(env.registry.total_sessions(), 0);
    Ok(())
}

//! Service provider checks on received Responses.

use std::sync::Arc;

use chrono::{Duration, Utc};
use fed_core::{AuditEventType, AuditLevel, MemoryAuditSink};
use fed_saml::handler::{
    is_trusted, AllowListRoleValidator, ChainConfig, HandlerChain, HandlerConfig, HandlerRequest,
    HandlerResponse, HttpMethod, InMemorySession, SessionStore, SpConfig,
};
use fed_saml::types::{
    Assertion, Attribute, AttributeStatement, Conditions, NameId, ProtocolMessage, Response,
    Statement, Status, Subject,
};
use fed_saml::{ChainServices, FederationConfig, SamlError, SamlResult};

use crate::common::init_tracing;

const IDP: &str = "https://idp.example.com";
const REQUEST_ID: &str = "ID_request";

struct Sp {
    chain: HandlerChain,
    audit: Arc<MemoryAuditSink>,
}

fn sp(clock_skew_ms: Option<u64>, allowed_roles: &[&str]) -> anyhow::Result<Sp> {
    init_tracing();
    let mut config = FederationConfig::new(
        ChainConfig::sp("https://sp.example.com", SpConfig::default().with_trusted_domains("example.com"))
            .with_signatures(false),
    );
    config.handlers.authentication = Some(HandlerConfig {
        clock_skew_ms,
        ..HandlerConfig::new().with_role_keys("Role")
    });
    config.validate()?;
    let chain = config.build_chain(&ChainServices {
        role_validator: Some(Arc::new(AllowListRoleValidator::new(allowed_roles.iter().copied()))),
        ..ChainServices::default()
    })?;
    Ok(Sp {
        chain,
        audit: Arc::new(MemoryAuditSink::new()),
    })
}

fn assertion(valid_from: Duration, valid_until: Duration, roles: &[&str]) -> Assertion {
    let now = Utc::now();
    Assertion::new(IDP)
        .with_subject(Subject::new(NameId::persistent("alice")))
        .with_conditions(Conditions {
            not_before: Some(now + valid_from),
            not_on_or_after: Some(now + valid_until),
            audiences: vec!["https://sp.example.com".to_string()],
        })
        .with_statement(Statement::Attribute(
            AttributeStatement::new().with_attribute(Attribute::new("Role", roles.iter().copied())),
        ))
}

fn current(roles: &[&str]) -> Assertion {
    assertion(Duration::minutes(-1), Duration::minutes(5), roles)
}

fn session() -> InMemorySession {
    let session = InMemorySession::new();
    session.set_auth_request_id(REQUEST_ID.to_string());
    session
}

impl Sp {
    fn consume(&self, saml_response: Response, session: &InMemorySession) -> SamlResult<HandlerResponse> {
        let mut request = HandlerRequest::inbound(ProtocolMessage::from(saml_response), HttpMethod::Post);
        request.options.audit = Some(self.audit.clone());
        let mut response = HandlerResponse::new();
        self.chain
            .handle_status_response_type(&mut request, &mut response, session)?;
        Ok(response)
    }
}

fn success(issuer: &str, assertion: Assertion) -> Response {
    Response::success(issuer)
        .in_response_to(REQUEST_ID)
        .with_assertion(assertion)
}

/// A Response from an issuer outside the trusted domains is rejected and
/// audited.
#[tokio::test]
async fn test_untrusted_issuer_is_audited() -> anyhow::Result<()> {
    let sp = sp(None, &["user"])?;
    let session = session();

    let result = sp.consume(success("https://attacker.net", current(&["user"])), &session);
    assert!(matches!(result, Err(SamlError::IssuerNotTrusted(ref issuer)) if issuer == "https://attacker.net"));
    assert!(session.principal().is_none());

    let events = sp.audit.events_of(AuditEventType::ErrorTrustedDomain);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].level, AuditLevel::Error);
    assert!(events[0]
        .details
        .contains(&("issuer".to_string(), "https://attacker.net".to_string())));
    Ok(())
}

/// Trust is decided on the issuer's host: exact membership, or a trusted
/// token found past the first character of the host.
#[test]
fn test_trust_rules() {
    assert!(is_trusted("https://example.com/idp", "example.com"));
    assert!(is_trusted("https://login.example.com/idp", "example.com"));
    assert!(is_trusted("idp.partner.org", "example.com, partner.org"));
    assert!(!is_trusted("https://example.com.evil.io", "example.com"));
    assert!(!is_trusted("https://attacker.net", "example.com, partner.org"));
}

/// The validity window is widened by the configured clock skew on both
/// ends.
#[tokio::test]
async fn test_expiry_with_clock_skew() -> anyhow::Result<()> {
    let expired = || assertion(Duration::minutes(-10), Duration::seconds(-1), &["user"]);
    let early = || assertion(Duration::seconds(2), Duration::minutes(5), &["user"]);

    let strict = sp(None, &["user"])?;
    for candidate in [expired(), early()] {
        let id = candidate.id.clone();
        let result = strict.consume(success(IDP, candidate), &session());
        assert!(
            matches!(&result, Err(SamlError::AssertionExpired { id: expired_id }) if *expired_id == id),
            "got {result:?}"
        );
    }
    let audited = strict.audit.events_of(AuditEventType::ExpiredAssertion);
    assert_eq!(audited.len(), 2);
    assert!(audited.iter().all(|e| e.level == AuditLevel::Error));

    let lenient = sp(Some(5_000), &["user"])?;
    for candidate in [expired(), early()] {
        let session = session();
        let response = lenient.consume(success(IDP, candidate), &session)?;
        assert!(response.error.is_none());
        assert_eq!(session.principal().map(|p| p.name().to_string()).as_deref(), Some("alice"));
    }
    Ok(())
}

/// Roles outside the allow-list leave the user unauthenticated with a 403.
#[tokio::test]
async fn test_role_allow_list() -> anyhow::Result<()> {
    let sp = sp(None, &["admin", "dev"])?;

    let session = session();
    let response = sp.consume(success(IDP, current(&["user"])), &session)?;
    let error = response.error.expect("403 expected");
    assert_eq!(error.code, 403);
    assert_eq!(error.message, "User Principal not determined: Forbidden");
    assert_eq!(response.roles, ["user"]);
    assert!(session.principal().is_none());
    assert_eq!(sp.audit.events_of(AuditEventType::InvalidRoles).len(), 1);

    let session = self::session();
    let response = sp.consume(success(IDP, current(&["user", "dev"])), &session)?;
    assert!(response.error.is_none());
    assert_eq!(session.roles(), ["user", "dev"]);
    Ok(())
}

/// A non-success status or an empty Response is a protocol failure.
#[tokio::test]
async fn test_identity_provider_failures() -> anyhow::Result<()> {
    let sp = sp(None, &["user"])?;

    let refused = Response::error(IDP, Status::authn_failed("account locked"))
        .in_response_to(REQUEST_ID)
        .with_assertion(current(&["user"]));
    let result = sp.consume(refused, &session());
    assert!(matches!(result, Err(SamlError::AuthenticationFailed(_))), "got {result:?}");

    let empty = Response::success(IDP).in_response_to(REQUEST_ID);
    let result = sp.consume(empty, &session());
    assert!(matches!(result, Err(SamlError::Protocol(_))), "got {result:?}");
    Ok(())
}

/// A Response to a request this session never sent is rejected.
#[tokio::test]
async fn test_unsolicited_response() -> anyhow::Result<()> {
    let sp = sp(None, &["user"])?;

    let session = InMemorySession::new();
    session.set_auth_request_id("ID_other".to_string());
    let result = sp.consume(success(IDP, current(&["user"])), &session);
    assert!(matches!(result, Err(SamlError::InResponseToMismatch(_))), "got {result:?}");

    let result = sp.consume(success(IDP, current(&["user"])), &InMemorySession::new());
    assert!(matches!(result, Err(SamlError::InResponseToMismatch(_))), "got {result:?}");
    Ok(())
}

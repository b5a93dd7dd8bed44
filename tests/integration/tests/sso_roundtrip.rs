//! Complete logins between the two providers.

use fed_core::AuditEventType;
use fed_saml::handler::{InMemorySession, SessionStore};
use fed_saml::signature::SignatureValidator;
use fed_saml::types::{Response, SAML_NS, XMLDSIG_NS, XMLENC_NS};

use crate::common::{idp_session, TestEnv, IDP_ISSUER, SP_ACS};

/// A plain login authenticates the principal with the roles the identity
/// provider sent.
#[tokio::test]
async fn test_login_with_plain_assertion() -> anyhow::Result<()> {
    let env = TestEnv::new(false)?;
    let idp = idp_session(&["user"]);
    let sp = InMemorySession::new();

    let (answered, consumed) = env.login("alice", &idp, &sp)?;

    assert_eq!(answered.destination.as_deref(), Some(SP_ACS));
    assert_eq!(answered.relay_state.as_deref(), Some("/app"));
    assert!(answered.post_binding, "strict POST binding should apply");

    assert!(consumed.error.is_none(), "unexpected error: {:?}", consumed.error);
    assert_eq!(consumed.roles, ["user"]);
    assert_eq!(sp.principal().map(|p| p.name().to_string()).as_deref(), Some("alice"));
    assert_eq!(sp.roles(), ["user"]);

    let attributes = sp.attributes().expect("attributes stored");
    assert_eq!(attributes["mail"], ["alice@example.com"]);

    assert!(sp.auth_request_id().is_none(), "request ID should be consumed");
    Ok(())
}

/// With encryption enabled the assertion travels encrypted and the
/// signature covers the encrypted form.
#[tokio::test]
async fn test_login_with_encrypted_assertion() -> anyhow::Result<()> {
    let env = TestEnv::new(true)?;
    let idp = idp_session(&["user"]);
    let sp = InMemorySession::new();

    let (answered, consumed) = env.login("alice", &idp, &sp)?;

    let document = answered.document.expect("response document");
    assert!(document.child(SAML_NS, "Assertion").is_none());
    assert!(document.child(SAML_NS, "EncryptedAssertion").is_some());
    assert!(document.find(XMLENC_NS, "EncryptedData").is_some());
    assert!(!document.to_xml().contains("alice@example.com"));

    assert!(document.child(XMLDSIG_NS, "Signature").is_some());
    SignatureValidator::new(env.idp_keys.public_key_der()).validate_document(&document)?;

    assert!(consumed.error.is_none());
    assert_eq!(sp.principal().map(|p| p.name().to_string()).as_deref(), Some("alice"));
    Ok(())
}

/// The issued Response answers the AuthnRequest and both sides are
/// audited.
#[tokio::test]
async fn test_response_correlates_and_audits() -> anyhow::Result<()> {
    let env = TestEnv::new(false)?;
    let idp = idp_session(&["user"]);
    let sp = InMemorySession::new();

    let generated = env.sp_generate(&sp)?;
    let request_id = sp.auth_request_id().expect("request ID remembered");
    let query = generated
        .destination_query_string_with_signature
        .expect("signed redirect query");
    assert!(query.starts_with("SAMLRequest="));
    assert_eq!(generated.destination.as_deref(), Some("https://idp.example.com/sso"));

    let answered = env.idp_answer(&query, "alice", &idp)?;
    let response = Response::from_element(answered.document.as_ref().expect("document"))?;
    assert_eq!(response.in_response_to.as_deref(), Some(request_id.as_str()));
    assert_eq!(response.issuer.as_deref(), Some(IDP_ISSUER));

    let assertion = response.first_assertion().expect("plain assertion");
    assert_eq!(
        idp.assertion().map(|binding| binding.assertion_id),
        Some(assertion.id.clone())
    );

    let created = env.audit.events_of(AuditEventType::CreatedAssertion);
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].assertion_id.as_deref(), Some(assertion.id.as_str()));
    assert_eq!(created[0].who_is_auditing.as_deref(), Some("/idp"));

    let requested = env.audit.events_of(AuditEventType::CreatedAssertionRequest);
    assert_eq!(requested.len(), 1);
    assert_eq!(requested[0].assertion_id.as_deref(), Some(request_id.as_str()));
    Ok(())
}

/// A Response replayed against the same service provider session is
/// rejected.
#[tokio::test]
async fn test_replayed_response_is_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new(false)?;
    let idp = idp_session(&["user"]);
    let sp = InMemorySession::new();

    let (answered, _) = env.login("alice", &idp, &sp)?;
    let document = answered.document.expect("document");

    let replay = env.sp_consume(&document, &sp);
    assert!(
        matches!(replay, Err(fed_saml::SamlError::InResponseToMismatch(_))),
        "replay should fail correlation, got {replay:?}"
    );
    Ok(())
}

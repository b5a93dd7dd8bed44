//! Common test utilities and fixtures.

use std::sync::Arc;

use fed_core::MemoryAuditSink;
use fed_crypto::{RsaDecryptionKey, RsaSigningKeyPair};
use fed_saml::bindings::HttpRedirectBinding;
use fed_saml::handler::{
    AllowListRoleValidator, GenerateRequestType, HandlerChain, HandlerRequest, HandlerResponse,
    HttpMethod, InMemorySession, ParticipantRegistry, Principal, SessionStore, StaticAttributeManager,
};
use fed_saml::xml::Element;
use fed_saml::{ChainServices, FederationConfig};
use tracing_subscriber::EnvFilter;

/// Entity ID of the identity provider.
pub const IDP_ISSUER: &str = "https://idp.example.com";
/// Entity ID of the service provider.
pub const SP_ISSUER: &str = "https://sp.example.com";
/// Assertion consumer service of the service provider.
pub const SP_ACS: &str = "https://sp.example.com/acs";

/// Installs a log subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fed_saml=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// An identity provider and a service provider that trust each other.
pub struct TestEnv {
    /// Signing keys of the identity provider.
    pub idp_keys: Arc<RsaSigningKeyPair>,
    /// Signing keys of the service provider.
    pub sp_keys: Arc<RsaSigningKeyPair>,
    /// Key the service provider decrypts assertions with.
    pub sp_decryption: Arc<RsaDecryptionKey>,
    /// Identity provider chain.
    pub idp: HandlerChain,
    /// Service provider chain.
    pub sp: HandlerChain,
    /// Participants registered by the identity provider.
    pub registry: Arc<ParticipantRegistry>,
    /// Audit events of both sides.
    pub audit: Arc<MemoryAuditSink>,
}

impl TestEnv {
    /// Creates both providers; `encrypt` enables assertion encryption.
    pub fn new(encrypt: bool) -> anyhow::Result<Self> {
        init_tracing();

        let idp_keys = Arc::new(RsaSigningKeyPair::generate()?);
        let sp_keys = Arc::new(RsaSigningKeyPair::generate()?);
        let sp_decryption = Arc::new(RsaDecryptionKey::generate()?);
        let registry = Arc::new(ParticipantRegistry::new());

        let idp_config = FederationConfig::from_toml(&format!(
            r#"
[chain]
issuer = "{IDP_ISSUER}"

[chain.role.idp]
trusted_domains = "example.com, partner.org"
strict_post_binding = true
encrypt = {encrypt}

[handlers.attribute]
attribute_keys = "mail"

[handlers.authentication]
context_path = "/idp"
"#
        ))?;
        let idp = idp_config.build_chain(&ChainServices {
            key_pair: Some(idp_keys.clone()),
            registry: Some(registry.clone()),
            attribute_manager: Some(Arc::new(
                StaticAttributeManager::new().with_attribute("alice", "mail", "alice@example.com"),
            )),
            ..ChainServices::default()
        })?;

        let sp_config = FederationConfig::from_toml(&format!(
            r#"
[chain]
issuer = "{SP_ISSUER}"

[chain.role.sp]
trusted_domains = "example.com"
identity_url = "{IDP_ISSUER}/sso"

[handlers.authentication]
role_keys = "Role"
assertion_consumer_url = "{SP_ACS}"
context_path = "/sp"
"#
        ))?;
        let sp = sp_config.build_chain(&ChainServices {
            key_pair: Some(sp_keys.clone()),
            role_validator: Some(Arc::new(AllowListRoleValidator::new(["user", "admin"]))),
            ..ChainServices::default()
        })?;

        Ok(Self {
            idp_keys,
            sp_keys,
            sp_decryption,
            idp,
            sp,
            registry,
            audit: Arc::new(MemoryAuditSink::new()),
        })
    }

    /// The service provider generates a signed HTTP-Redirect AuthnRequest.
    pub fn sp_generate(&self, session: &InMemorySession) -> anyhow::Result<HandlerResponse> {
        let mut request = HandlerRequest::generate(GenerateRequestType::Auth).with_relay_state("/app");
        request.options.audit = Some(self.audit.clone());
        let mut response = HandlerResponse::new();
        self.sp.generate_saml_request(&mut request, &mut response, session)?;
        Ok(response)
    }

    /// The identity provider answers the AuthnRequest carried by a signed
    /// redirect query, for a user the transport layer authenticated.
    pub fn idp_answer(
        &self,
        query: &str,
        principal: &str,
        session: &InMemorySession,
    ) -> fed_saml::SamlResult<HandlerResponse> {
        let decoded = HttpRedirectBinding::decode_query(query)?;
        let mut request = HandlerRequest::from_document(Element::parse(&decoded.xml)?, HttpMethod::Get)?
            .with_user_principal(Principal::new(principal));
        request.relay_state = decoded.relay_state;
        request.options.redirect_query = Some(query.to_string());
        request.options.validating_key = Some(self.sp_keys.public_key_der());
        request.options.sender_public_key = Some(Arc::new(self.sp_decryption.public_key()?));
        request.options.audit = Some(self.audit.clone());

        let mut response = HandlerResponse::new();
        self.idp.handle_request_type(&mut request, &mut response, session)?;
        Ok(response)
    }

    /// The service provider consumes a POSTed Response document.
    pub fn sp_consume(
        &self,
        document: &Element,
        session: &InMemorySession,
    ) -> fed_saml::SamlResult<(HandlerRequest, HandlerResponse)> {
        let received = Element::parse(&document.to_xml())?;
        let mut request = HandlerRequest::from_document(received, HttpMethod::Post)?;
        request.options.validating_key = Some(self.idp_keys.public_key_der());
        request.options.decrypting_key = Some(self.sp_decryption.clone());
        request.options.audit = Some(self.audit.clone());

        let mut response = HandlerResponse::new();
        self.sp.handle_status_response_type(&mut request, &mut response, session)?;
        Ok((request, response))
    }

    /// Runs a complete login: AuthnRequest, Response, consumption.
    pub fn login(
        &self,
        principal: &str,
        idp_session: &InMemorySession,
        sp_session: &InMemorySession,
    ) -> anyhow::Result<(HandlerResponse, HandlerResponse)> {
        let generated = self.sp_generate(sp_session)?;
        let query = generated
            .destination_query_string_with_signature
            .ok_or_else(|| anyhow::anyhow!("AuthnRequest was not signed"))?;
        let answered = self.idp_answer(&query, principal, idp_session)?;
        let document = answered
            .document
            .clone()
            .ok_or_else(|| anyhow::anyhow!("identity provider produced no document"))?;
        let (_, consumed) = self.sp_consume(&document, sp_session)?;
        Ok((answered, consumed))
    }
}

/// An identity provider session whose user holds `roles`.
pub fn idp_session(roles: &[&str]) -> InMemorySession {
    let session = InMemorySession::new();
    session.set_roles(roles.iter().map(|r| (*r).to_string()).collect());
    session
}

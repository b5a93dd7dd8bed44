//! The authentication handler.
//!
//! The identity provider answers AuthnRequests with a Response carrying a
//! new or renewed assertion for the session's principal. The service
//! provider generates AuthnRequests and turns the identity provider's
//! Response into an authenticated principal with roles.
//!
//! Which of the two runs is decided once, when the handler is built from
//! the chain configuration.

use std::sync::Arc;

use chrono::Utc;
use fed_core::{AuditEvent, AuditEventType, AuditLevel};
use tracing::{debug, info, warn};

use crate::encryption::decrypt_element;
use crate::error::{SamlError, SamlResult};
use crate::types::{
    Assertion, AssertionChoice, Attribute, AttributeStatement, AuthnContextClass, AuthnRequest,
    AuthnStatement, Conditions, NameId, NameIdPolicy, ProtocolMessage, Response, Statement,
    Subject, SubjectConfirmation, SubjectConfirmationData, SubjectIdentifier,
    ATTRIBUTE_FORMAT_BASIC, ROLE_ATTRIBUTE_NAME,
};

use super::config::{ChainConfig, HandlerConfig, IdpConfig, ProviderRole, SpConfig};
use super::registry::ParticipantRegistry;
use super::request::{GenerateRequestType, HandlerRequest, HttpMethod};
use super::response::HandlerResponse;
use super::role::{extract_roles, RoleValidator};
use super::session::{Principal, SessionAssertion, SessionStore};
use super::SamlHandler;

fn audit(
    request: &HandlerRequest,
    config: &HandlerConfig,
    event_type: AuditEventType,
    level: AuditLevel,
    assertion_id: &str,
) {
    if let Some(sink) = &request.options.audit {
        sink.audit(
            AuditEvent::builder(event_type)
                .level(level)
                .who_is_auditing(config.context_path.as_deref())
                .assertion_id(assertion_id)
                .build(),
        );
    }
}

/// Authentication handler, identity or service provider side.
pub enum AuthenticationHandler {
    /// Identity provider side.
    Idp(IdpAuthenticationHandler),
    /// Service provider side.
    Sp(SpAuthenticationHandler),
}

impl AuthenticationHandler {
    /// Creates the handler matching the chain's role.
    #[must_use]
    pub fn new(chain: &ChainConfig, config: HandlerConfig) -> Self {
        match &chain.role {
            ProviderRole::Idp(idp) => {
                Self::Idp(IdpAuthenticationHandler::new(&chain.issuer, idp.clone(), config))
            }
            ProviderRole::Sp(sp) => {
                Self::Sp(SpAuthenticationHandler::new(&chain.issuer, sp.clone(), config))
            }
        }
    }

    /// Sets the participant registry (identity provider only).
    #[must_use]
    pub fn with_registry(self, registry: Arc<ParticipantRegistry>) -> Self {
        match self {
            Self::Idp(handler) => Self::Idp(handler.with_registry(registry)),
            sp @ Self::Sp(_) => sp,
        }
    }

    /// Sets the role validator (service provider only).
    #[must_use]
    pub fn with_role_validator(self, validator: Arc<dyn RoleValidator>) -> Self {
        match self {
            Self::Sp(handler) => Self::Sp(handler.with_role_validator(validator)),
            idp @ Self::Idp(_) => idp,
        }
    }

    fn inner(&self) -> &dyn SamlHandler {
        match self {
            Self::Idp(handler) => handler,
            Self::Sp(handler) => handler,
        }
    }
}

impl SamlHandler for AuthenticationHandler {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn handle_request_type(
        &self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
        session: &dyn SessionStore,
    ) -> SamlResult<()> {
        self.inner().handle_request_type(request, response, session)
    }

    fn handle_status_response_type(
        &self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
        session: &dyn SessionStore,
    ) -> SamlResult<()> {
        self.inner().handle_status_response_type(request, response, session)
    }

    fn generate_saml_request(
        &self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
        session: &dyn SessionStore,
    ) -> SamlResult<()> {
        self.inner().generate_saml_request(request, response, session)
    }
}

/// Identity provider side of authentication.
pub struct IdpAuthenticationHandler {
    issuer: String,
    idp: IdpConfig,
    config: HandlerConfig,
    registry: Option<Arc<ParticipantRegistry>>,
}

impl IdpAuthenticationHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(issuer: impl Into<String>, idp: IdpConfig, config: HandlerConfig) -> Self {
        Self {
            issuer: issuer.into(),
            idp,
            config,
            registry: None,
        }
    }

    /// Sets the participant registry used for global logout.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<ParticipantRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Builds the assertion for a principal, renewing the session's
    /// assertion when it was issued to the same principal.
    fn build_assertion(
        &self,
        authn_request: &AuthnRequest,
        destination: &str,
        principal: &Principal,
        request: &HandlerRequest,
        session: &dyn SessionStore,
    ) -> SamlResult<Assertion> {
        let now = Utc::now();
        let validity = self.idp.assertion_validity();

        let mut assertion = match session.assertion() {
            Some(binding) if &binding.principal == principal => {
                debug!(assertion_id = %binding.assertion_id, "renewing session assertion");
                let mut assertion = binding.assertion;
                assertion.issue_instant = now;
                assertion.statements.clear();
                assertion
            }
            _ => Assertion::new(self.issuer.as_str())
                .with_subject(Subject::new(NameId::persistent(principal.name()))),
        };

        let subject = assertion
            .subject
            .as_mut()
            .ok_or_else(|| SamlError::IllegalState("session assertion has no subject".to_string()))?;
        subject.confirmations = vec![SubjectConfirmation::bearer().with_data(SubjectConfirmationData {
            in_response_to: Some(authn_request.id.clone()),
            not_on_or_after: Some(now + validity),
            recipient: Some(destination.to_string()),
        })];

        let mut conditions = Conditions::valid_for(now, validity);
        if let Some(audience) = &authn_request.issuer {
            conditions = conditions.with_audience(audience.as_str());
        }
        assertion.conditions = Some(conditions);

        if !self.config.disable_authn_statement {
            let class_ref = self
                .config
                .authentication_method
                .clone()
                .unwrap_or_else(|| AuthnContextClass::Password.uri().to_string());
            assertion.statements.push(Statement::Authn(
                AuthnStatement::new(now, class_ref).with_session_index(session.id()),
            ));
        }

        let roles = session.roles();
        if !self.config.disable_sending_roles && !roles.is_empty() {
            let statement = roles.iter().fold(AttributeStatement::new(), |statement, role| {
                statement.with_attribute(
                    Attribute::new(ROLE_ATTRIBUTE_NAME, [role.as_str()])
                        .with_format(ATTRIBUTE_FORMAT_BASIC),
                )
            });
            assertion.statements.push(Statement::Attribute(statement));
        }

        if let Some(attributes) = request.options.attributes.as_ref().filter(|a| !a.is_empty()) {
            let statement = attributes.iter().fold(AttributeStatement::new(), |statement, (name, values)| {
                statement.with_attribute(Attribute::new(name.as_str(), values.iter().map(String::as_str)))
            });
            assertion.statements.push(Statement::Attribute(statement));
        }

        Ok(assertion)
    }
}

impl SamlHandler for IdpAuthenticationHandler {
    fn name(&self) -> &'static str {
        "idp-authentication"
    }

    fn handle_request_type(
        &self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
        session: &dyn SessionStore,
    ) -> SamlResult<()> {
        let authn_request = match &request.message {
            Some(ProtocolMessage::AuthnRequest(authn_request)) => authn_request.clone(),
            Some(ProtocolMessage::Response(_)) => {
                return Err(SamlError::Protocol("expected an AuthnRequest".to_string()))
            }
            None => return Err(SamlError::Protocol("AuthnRequest is null".to_string())),
        };

        let principal = session
            .principal()
            .or_else(|| request.user_principal.clone())
            .ok_or_else(|| {
                SamlError::AuthenticationFailed("no authenticated principal".to_string())
            })?;

        let destination = authn_request
            .assertion_consumer_service_url
            .clone()
            .or_else(|| {
                request
                    .options
                    .sp_metadata
                    .as_ref()
                    .and_then(|metadata| metadata.assertion_consumer_services.first())
                    .map(|endpoint| endpoint.location.clone())
            })
            .ok_or_else(|| SamlError::MissingElement("AssertionConsumerServiceURL".to_string()))?;
        debug!(destination = %destination, principal = %principal, "handling AuthnRequest");

        let post_binding = request.method == HttpMethod::Post
            || request
                .options
                .strict_post_binding
                .unwrap_or(self.idp.strict_post_binding);

        let logout_url = match &request.options.sp_metadata {
            Some(metadata) => metadata.logout_url().map(str::to_string),
            None => Some(destination.clone()),
        };
        match (&self.registry, logout_url) {
            (Some(registry), Some(logout_url)) => {
                registry.register(session.id(), &logout_url, post_binding);
            }
            (_, None) => debug!("participant does not support global logout"),
            (None, Some(_)) => debug!("no participant registry configured"),
        }

        let assertion = self
            .build_assertion(&authn_request, &destination, &principal, request, session)
            .map_err(|e| SamlError::processing("authentication issue", e))?;

        session.set_assertion(SessionAssertion::new(principal.clone(), assertion.clone()));
        audit(
            request,
            &self.config,
            AuditEventType::CreatedAssertion,
            AuditLevel::Info,
            &assertion.id,
        );
        info!(assertion_id = %assertion.id, principal = %principal, "issued assertion");

        let saml_response = Response::success(self.issuer.as_str())
            .in_response_to(authn_request.id.as_str())
            .with_destination(destination.as_str())
            .with_assertion(assertion);

        response.document = Some(saml_response.to_element());
        response.destination = Some(destination);
        response.relay_state = request.relay_state.clone();
        response.post_binding = post_binding;
        Ok(())
    }
}

/// Service provider side of authentication.
pub struct SpAuthenticationHandler {
    issuer: String,
    sp: SpConfig,
    config: HandlerConfig,
    role_validator: Option<Arc<dyn RoleValidator>>,
}

impl SpAuthenticationHandler {
    /// Creates the handler.
    #[must_use]
    pub fn new(issuer: impl Into<String>, sp: SpConfig, config: HandlerConfig) -> Self {
        Self {
            issuer: issuer.into(),
            sp,
            config,
            role_validator: None,
        }
    }

    /// Sets the role validator.
    #[must_use]
    pub fn with_role_validator(mut self, validator: Arc<dyn RoleValidator>) -> Self {
        self.role_validator = Some(validator);
        self
    }

    /// Decrypts the first assertion if it is encrypted, replacing it in the
    /// response, and returns the plain assertion.
    fn resolve_assertion(
        saml_response: &mut Response,
        request: &HandlerRequest,
    ) -> SamlResult<Assertion> {
        let encrypted = match saml_response.first_assertion_choice() {
            None => {
                return Err(SamlError::Protocol(
                    "no assertions in reply from IDP".to_string(),
                ))
            }
            Some(AssertionChoice::Plain(assertion)) => return Ok(assertion.clone()),
            Some(AssertionChoice::Encrypted(encrypted)) => encrypted.clone(),
        };

        let key = request.options.decrypting_key.as_ref().ok_or_else(|| {
            SamlError::Configuration("decrypting key is required for encrypted assertions".to_string())
        })?;
        let assertion = decrypt_element(&encrypted.element, key)
            .and_then(|element| Assertion::from_element(&element))
            .map_err(|e| SamlError::processing("decrypting assertion", e))?;
        debug!(assertion_id = %assertion.id, "decrypted assertion");

        let old_id = encrypted.id().map(str::to_string);
        for choice in &mut saml_response.assertions {
            if let AssertionChoice::Encrypted(candidate) = choice {
                if candidate.id().map(str::to_string) == old_id {
                    *choice = AssertionChoice::Plain(assertion.clone());
                    break;
                }
            }
        }
        Ok(assertion)
    }

    fn username(assertion: &Assertion) -> SamlResult<String> {
        let subject = assertion
            .subject
            .as_ref()
            .ok_or_else(|| SamlError::MissingElement("Subject".to_string()))?;
        match &subject.identifier {
            Some(SubjectIdentifier::NameId(name_id)) => Ok(name_id.value.clone()),
            Some(_) => Err(SamlError::MissingElement("NameID".to_string())),
            None => Err(SamlError::MissingElement("Subject identifier".to_string())),
        }
    }
}

impl SamlHandler for SpAuthenticationHandler {
    fn name(&self) -> &'static str {
        "sp-authentication"
    }

    fn generate_saml_request(
        &self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
        _session: &dyn SessionStore,
    ) -> SamlResult<()> {
        if request.generate_type != Some(GenerateRequestType::Auth) {
            return Ok(());
        }

        let acs_url = self
            .config
            .assertion_consumer_url
            .clone()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.issuer.clone());

        let mut authn_request = AuthnRequest::new(self.issuer.as_str()).with_acs_url(acs_url);
        if let Some(destination) = response.destination.clone().or_else(|| self.sp.identity_url.clone()) {
            authn_request = authn_request.with_destination(destination.as_str());
            response.destination = Some(destination);
        }
        if let Some(format) = &self.config.nameid_format {
            authn_request = authn_request.with_name_id_policy(NameIdPolicy::format(format.as_str()));
        }
        if let Some(binding) = self.config.binding()? {
            authn_request = authn_request.with_binding(binding);
        }

        response.document = Some(authn_request.to_element());
        response.relay_state = request.relay_state.clone();
        response.send_request = true;

        audit(
            request,
            &self.config,
            AuditEventType::CreatedAssertionRequest,
            AuditLevel::Info,
            &authn_request.id,
        );
        info!(request_id = %authn_request.id, "created AuthnRequest");
        request.options.auth_request_id = Some(authn_request.id);
        Ok(())
    }

    fn handle_status_response_type(
        &self,
        request: &mut HandlerRequest,
        response: &mut HandlerResponse,
        session: &dyn SessionStore,
    ) -> SamlResult<()> {
        let Some(ProtocolMessage::Response(mut saml_response)) = request.message.take() else {
            return Ok(());
        };
        let resolved = Self::resolve_assertion(&mut saml_response, request);
        let status_ok = saml_response.is_success();
        request.message = Some(ProtocolMessage::Response(saml_response));
        let assertion = resolved?;
        request.options.assertion = Some(assertion.clone());

        if !status_ok {
            return Err(SamlError::AuthenticationFailed("IDP forbid the user".to_string()));
        }
        if assertion.has_expired(Utc::now(), self.config.clock_skew()) {
            warn!(assertion_id = %assertion.id, "assertion has expired");
            audit(
                request,
                &self.config,
                AuditEventType::ExpiredAssertion,
                AuditLevel::Error,
                &assertion.id,
            );
            return Err(SamlError::AssertionExpired { id: assertion.id });
        }

        let username = Self::username(&assertion)?;
        let roles = extract_roles(&assertion, &self.config)?;
        response.roles.clone_from(&roles);

        let mut principal = Some(Principal::new(username));
        if !self.config.ignore_role_validator {
            let validator = self.role_validator.as_ref().ok_or_else(|| {
                SamlError::Configuration("role validator not provided".to_string())
            })?;
            if let Some(candidate) = &principal {
                if !validator.user_in_role(candidate, &roles) {
                    warn!(principal = %candidate, ?roles, "invalid roles");
                    audit(
                        request,
                        &self.config,
                        AuditEventType::InvalidRoles,
                        AuditLevel::Error,
                        &assertion.id,
                    );
                    principal = None;
                }
            }
        }

        match principal {
            None => response.set_error(403, "User Principal not determined: Forbidden"),
            Some(principal) => {
                info!(principal = %principal, assertion_id = %assertion.id, "authenticated principal");
                session.set_principal(principal);
                session.set_roles(roles);
            }
        }
        Ok(())
    }
}

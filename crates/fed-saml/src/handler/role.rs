//! Role extraction and validation on the service provider.

use fed_core::config::tokenize;

use crate::error::{SamlError, SamlResult};
use crate::types::{Assertion, AttributeValue};

use super::config::HandlerConfig;
use super::session::Principal;

/// Decides whether a principal with the given roles may proceed.
pub trait RoleValidator: Send + Sync {
    /// Returns true if the principal is authorized.
    fn user_in_role(&self, principal: &Principal, roles: &[String]) -> bool;
}

/// Accepts a principal holding at least one of the configured roles.
#[derive(Debug, Clone, Default)]
pub struct AllowListRoleValidator {
    allowed: Vec<String>,
}

impl AllowListRoleValidator {
    /// Creates a validator for the given roles.
    #[must_use]
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a validator from a comma or whitespace separated list.
    #[must_use]
    pub fn from_list(list: &str) -> Self {
        Self {
            allowed: tokenize(list),
        }
    }
}

impl RoleValidator for AllowListRoleValidator {
    fn user_in_role(&self, _principal: &Principal, roles: &[String]) -> bool {
        roles.iter().any(|role| self.allowed.contains(role))
    }
}

/// Accepts every principal.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllRoleValidator;

impl RoleValidator for AcceptAllRoleValidator {
    fn user_in_role(&self, _principal: &Principal, _roles: &[String]) -> bool {
        true
    }
}

/// Extracts roles from the attribute statements of an assertion.
///
/// With role picking disabled no roles are returned. With role keys
/// configured only attributes of those names contribute; otherwise every
/// attribute does. A text value is a role name as is; for a structured
/// value the text of its first child is the role name.
///
/// # Errors
///
/// Returns [`SamlError::UnsupportedRoleType`] for a structured value whose
/// first child carries no text.
pub fn extract_roles(assertion: &Assertion, config: &HandlerConfig) -> SamlResult<Vec<String>> {
    if config.disable_role_picking {
        return Ok(Vec::new());
    }
    let role_keys = config.role_keys();

    let mut roles = Vec::new();
    for statement in assertion.attribute_statements() {
        for attribute in &statement.attributes {
            if !role_keys.is_empty() && !role_keys.contains(&attribute.name) {
                continue;
            }
            for value in &attribute.values {
                match value {
                    AttributeValue::Text(text) => roles.push(text.clone()),
                    AttributeValue::Node(node) => {
                        let role = node.first_child_text().ok_or_else(|| {
                            SamlError::UnsupportedRoleType(format!(
                                "{} in attribute {}",
                                node.qualified_name(),
                                attribute.name
                            ))
                        })?;
                        roles.push(role.to_string());
                    }
                }
            }
        }
    }
    Ok(roles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Attribute, AttributeStatement, Statement};
    use crate::xml::Element;

    fn assertion() -> Assertion {
        Assertion::new("idp").with_statement(Statement::Attribute(
            AttributeStatement::new()
                .with_attribute(Attribute::new("groups", ["admin", "dev"]))
                .with_attribute(Attribute::new("dept", ["eng"])),
        ))
    }

    #[test]
    fn all_attributes_without_role_keys() {
        let roles = extract_roles(&assertion(), &HandlerConfig::default()).unwrap();
        assert_eq!(roles, ["admin", "dev", "eng"]);
    }

    #[test]
    fn role_keys_restrict_attributes() {
        let config = HandlerConfig::new().with_role_keys("groups");
        let roles = extract_roles(&assertion(), &config).unwrap();
        assert_eq!(roles, ["admin", "dev"]);
    }

    #[test]
    fn role_picking_can_be_disabled() {
        let config = HandlerConfig {
            disable_role_picking: true,
            ..HandlerConfig::default()
        };
        assert!(extract_roles(&assertion(), &config).unwrap().is_empty());
    }

    #[test]
    fn structured_values_use_first_child_text() {
        let node = Element::new(Some("x"), "Role", Some("urn:example")).with_text("manager");
        let assertion = Assertion::new("idp").with_statement(Statement::Attribute(
            AttributeStatement::new().with_attribute(
                Attribute::new("Role", Vec::<String>::new()).with_value(AttributeValue::Node(node)),
            ),
        ));
        let roles = extract_roles(&assertion, &HandlerConfig::default()).unwrap();
        assert_eq!(roles, ["manager"]);

        let empty = Element::new(Some("x"), "Role", Some("urn:example"));
        let assertion = Assertion::new("idp").with_statement(Statement::Attribute(
            AttributeStatement::new().with_attribute(
                Attribute::new("Role", Vec::<String>::new()).with_value(AttributeValue::Node(empty)),
            ),
        ));
        assert!(matches!(
            extract_roles(&assertion, &HandlerConfig::default()),
            Err(SamlError::UnsupportedRoleType(_))
        ));
    }

    #[test]
    fn allow_list_validator() {
        let validator = AllowListRoleValidator::from_list("admin, manager");
        let alice = Principal::new("alice");
        assert!(validator.user_in_role(&alice, &["dev".to_string(), "admin".to_string()]));
        assert!(!validator.user_in_role(&alice, &["dev".to_string()]));
        assert!(AcceptAllRoleValidator.user_in_role(&alice, &[]));
    }
}

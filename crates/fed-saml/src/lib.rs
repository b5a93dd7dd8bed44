//! SAML 2.0 Web Browser SSO handler chain.
//!
//! This crate provides the message processing of both sides of SAML 2.0
//! Web Browser SSO:
//!
//! - **Identity provider** - answer AuthnRequests with a Response carrying
//!   a (renewed) assertion, optionally encrypted, then signed
//! - **Service provider** - generate AuthnRequests and turn the identity
//!   provider's Response into an authenticated principal with roles
//! - **XML signature** - enveloped signatures for POST, detached query
//!   signatures for HTTP-Redirect
//! - **XML encryption** - AES-GCM encrypted assertions with RSA-OAEP key
//!   transport
//!
//! # Architecture
//!
//! - [`types`] - SAML messages and their XML mapping
//! - [`xml`] - the namespace-aware element tree the messages map to
//! - [`signature`] - XML signature signing and validation
//! - [`encryption`] - XML encryption of elements
//! - [`bindings`] - POST and Redirect binding codecs
//! - [`handler`] - the handler chain
//! - [`config`] - deployment configuration and standard chains
//! - [`error`] - error types for SAML operations
//!
//! # Example
//!
//! ```rust,ignore
//! use fed_saml::config::{ChainServices, FederationConfig};
//! use fed_saml::handler::{HandlerRequest, HandlerResponse, HttpMethod, InMemorySession};
//!
//! let config = FederationConfig::load("federation.toml")?;
//! let chain = config.build_chain(&ChainServices { key_pair: Some(key_pair), ..Default::default() })?;
//!
//! let mut request = HandlerRequest::from_document(document, HttpMethod::Post)?;
//! let mut response = HandlerResponse::new();
//! chain.handle_request_type(&mut request, &mut response, &session)?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bindings;
pub mod config;
pub mod encryption;
pub mod error;
pub mod handler;
pub mod signature;
pub mod types;
pub mod xml;

pub use config::{ChainServices, FederationConfig};
pub use error::{SamlError, SamlResult};
pub use handler::{HandlerChain, SamlHandler};

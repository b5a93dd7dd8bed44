//! # fed-crypto
//!
//! Cryptographic primitives for the SAML handlers, built on aws-lc-rs.
//!
//! - [`signature`] - RSA PKCS#1 v1.5 key pairs, signing and verification
//! - [`encryption`] - AES-GCM content encryption with RSA-OAEP key transport
//! - [`hash`] - message digests for XML signature references
//! - [`random`] - secure random bytes
//!
//! SAML deployments still overwhelmingly use RSA with SHA-256, which is the
//! default everywhere in this crate.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod encryption;
pub mod error;
pub mod hash;
pub mod random;
pub mod signature;

pub use encryption::{ContentAlgorithm, ContentKey, RsaDecryptionKey, RsaEncryptionKey};
pub use error::{CryptoError, CryptoResult};
pub use hash::{sha1, sha256, sha384, sha512, DigestAlgorithm};
pub use random::random_bytes;
pub use signature::{rsa_verify, RsaAlgorithm, RsaSigningKeyPair};

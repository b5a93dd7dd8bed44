//! RSA signatures for XML-DSig and the HTTP-Redirect binding.
//!
//! Only RSA PKCS#1 v1.5 is supported; that is what SAML peers expect in
//! practice. SHA-1 is accepted for verification of documents produced by
//! older peers but never used for signing.

use std::fmt;

use aws_lc_rs::{
    rand::SystemRandom,
    rsa::KeySize,
    signature::{self, KeyPair, RsaKeyPair, UnparsedPublicKey},
};

use crate::error::{CryptoError, CryptoResult};
use crate::hash::DigestAlgorithm;

/// RSA signature algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RsaAlgorithm {
    /// RSA PKCS#1 v1.5 with SHA-1 (verification only).
    RsaSha1,
    /// RSA PKCS#1 v1.5 with SHA-256.
    #[default]
    RsaSha256,
    /// RSA PKCS#1 v1.5 with SHA-384.
    RsaSha384,
    /// RSA PKCS#1 v1.5 with SHA-512.
    RsaSha512,
}

impl RsaAlgorithm {
    /// Returns the XML-DSig signature method URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::RsaSha1 => "http://www.w3.org/2000/09/xmldsig#rsa-sha1",
            Self::RsaSha256 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
            Self::RsaSha384 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384",
            Self::RsaSha512 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512",
        }
    }

    /// Parses a signature method URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        [Self::RsaSha1, Self::RsaSha256, Self::RsaSha384, Self::RsaSha512]
            .into_iter()
            .find(|alg| alg.uri() == uri)
    }

    /// Returns the digest algorithm paired with this signature algorithm.
    #[must_use]
    pub const fn digest(self) -> DigestAlgorithm {
        match self {
            Self::RsaSha1 => DigestAlgorithm::Sha1,
            Self::RsaSha256 => DigestAlgorithm::Sha256,
            Self::RsaSha384 => DigestAlgorithm::Sha384,
            Self::RsaSha512 => DigestAlgorithm::Sha512,
        }
    }
}

/// RSA key pair used to sign outgoing SAML messages.
pub struct RsaSigningKeyPair {
    key_pair: RsaKeyPair,
}

impl RsaSigningKeyPair {
    /// Generates a fresh 2048-bit key pair.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation fails.
    pub fn generate() -> CryptoResult<Self> {
        let key_pair = RsaKeyPair::generate(KeySize::Rsa2048)
            .map_err(|e| CryptoError::KeyGeneration(format!("RSA key generation failed: {e}")))?;
        Ok(Self { key_pair })
    }

    /// Loads a key pair from a PKCS#8 DER-encoded private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid.
    pub fn from_pkcs8(pkcs8_der: &[u8]) -> CryptoResult<Self> {
        let key_pair = RsaKeyPair::from_pkcs8(pkcs8_der)
            .map_err(|e| CryptoError::InvalidKey(format!("Invalid RSA PKCS#8 key: {e}")))?;
        Ok(Self { key_pair })
    }

    /// Loads a key pair from a PKCS#1 (`RSAPrivateKey`) DER-encoded key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid.
    pub fn from_der(der: &[u8]) -> CryptoResult<Self> {
        let key_pair = RsaKeyPair::from_der(der)
            .map_err(|e| CryptoError::InvalidKey(format!("Invalid RSA DER key: {e}")))?;
        Ok(Self { key_pair })
    }

    /// Returns the public key as PKCS#1 `RSAPublicKey` DER.
    #[must_use]
    pub fn public_key_der(&self) -> Vec<u8> {
        self.key_pair.public_key().as_ref().to_vec()
    }

    /// Returns the modulus length in bytes.
    #[must_use]
    pub fn modulus_len(&self) -> usize {
        self.key_pair.public_modulus_len()
    }

    /// Signs `data`.
    ///
    /// # Errors
    ///
    /// Returns an error for SHA-1 or if signing fails.
    pub fn sign(&self, algorithm: RsaAlgorithm, data: &[u8]) -> CryptoResult<Vec<u8>> {
        let padding = match algorithm {
            RsaAlgorithm::RsaSha256 => &signature::RSA_PKCS1_SHA256,
            RsaAlgorithm::RsaSha384 => &signature::RSA_PKCS1_SHA384,
            RsaAlgorithm::RsaSha512 => &signature::RSA_PKCS1_SHA512,
            RsaAlgorithm::RsaSha1 => {
                return Err(CryptoError::UnsupportedAlgorithm(
                    "SHA-1 signatures are not produced".to_string(),
                ));
            }
        };

        let rng = SystemRandom::new();
        let mut sig = vec![0u8; self.key_pair.public_modulus_len()];
        self.key_pair
            .sign(padding, &rng, data, &mut sig)
            .map_err(|e| CryptoError::Signing(format!("RSA signing failed: {e}")))?;

        Ok(sig)
    }
}

impl fmt::Debug for RsaSigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaSigningKeyPair")
            .field("modulus_bits", &(self.modulus_len() * 8))
            .finish_non_exhaustive()
    }
}

/// Verifies an RSA signature.
///
/// `public_key_der` is a PKCS#1 `RSAPublicKey` as returned by
/// [`RsaSigningKeyPair::public_key_der`]. Returns `false` for any
/// verification failure without saying why.
#[must_use]
pub fn rsa_verify(public_key_der: &[u8], data: &[u8], sig: &[u8], algorithm: RsaAlgorithm) -> bool {
    let verification_alg: &dyn signature::VerificationAlgorithm = match algorithm {
        RsaAlgorithm::RsaSha1 => &signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
        RsaAlgorithm::RsaSha256 => &signature::RSA_PKCS1_2048_8192_SHA256,
        RsaAlgorithm::RsaSha384 => &signature::RSA_PKCS1_2048_8192_SHA384,
        RsaAlgorithm::RsaSha512 => &signature::RSA_PKCS1_2048_8192_SHA512,
    };

    UnparsedPublicKey::new(verification_alg, public_key_der)
        .verify(data, sig)
        .is_ok()
}

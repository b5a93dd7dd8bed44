//! Hybrid encryption for XML Encryption.
//!
//! Content is encrypted with a fresh AES-GCM key; that key is transported
//! to the recipient wrapped with RSA-OAEP (SHA-1, MGF1 with SHA-1), which
//! matches the `rsa-oaep-mgf1p` key transport of XML Encryption 1.0.
//!
//! AES-GCM output follows XML Encryption 1.1: `IV || ciphertext || tag`.

use std::fmt;

use aws_lc_rs::{
    aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_128_GCM, AES_256_GCM, NONCE_LEN},
    encoding::AsDer,
    rsa::{
        KeySize, OaepPrivateDecryptingKey, OaepPublicEncryptingKey, PrivateDecryptingKey,
        PublicEncryptingKey, OAEP_SHA1_MGF1SHA1,
    },
};

use crate::error::{CryptoError, CryptoResult};
use crate::random::random_bytes;

/// Key transport algorithm URI for RSA-OAEP with MGF1/SHA-1.
pub const RSA_OAEP_MGF1P_URI: &str = "http://www.w3.org/2001/04/xmlenc#rsa-oaep-mgf1p";

/// Symmetric content encryption algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentAlgorithm {
    /// AES-128 in GCM mode.
    #[default]
    Aes128Gcm,
    /// AES-256 in GCM mode.
    Aes256Gcm,
}

impl ContentAlgorithm {
    /// Returns the XML Encryption algorithm URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::Aes128Gcm => "http://www.w3.org/2009/xmlenc11#aes128-gcm",
            Self::Aes256Gcm => "http://www.w3.org/2009/xmlenc11#aes256-gcm",
        }
    }

    /// Parses an XML Encryption algorithm URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        [Self::Aes128Gcm, Self::Aes256Gcm]
            .into_iter()
            .find(|alg| alg.uri() == uri)
    }

    /// Selects the AES-GCM variant for a key size in bits.
    #[must_use]
    pub const fn from_key_size(bits: u32) -> Option<Self> {
        match bits {
            128 => Some(Self::Aes128Gcm),
            256 => Some(Self::Aes256Gcm),
            _ => None,
        }
    }

    /// Returns the key length in bytes.
    #[must_use]
    pub const fn key_len(self) -> usize {
        match self {
            Self::Aes128Gcm => 16,
            Self::Aes256Gcm => 32,
        }
    }

    fn aead(self) -> &'static aws_lc_rs::aead::Algorithm {
        match self {
            Self::Aes128Gcm => &AES_128_GCM,
            Self::Aes256Gcm => &AES_256_GCM,
        }
    }
}

/// A symmetric content encryption key.
pub struct ContentKey {
    algorithm: ContentAlgorithm,
    bytes: Vec<u8>,
}

impl ContentKey {
    /// Generates a fresh random key.
    #[must_use]
    pub fn generate(algorithm: ContentAlgorithm) -> Self {
        Self {
            algorithm,
            bytes: random_bytes(algorithm.key_len()),
        }
    }

    /// Wraps existing key bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the length does not match the algorithm.
    pub fn from_bytes(algorithm: ContentAlgorithm, bytes: Vec<u8>) -> CryptoResult<Self> {
        if bytes.len() != algorithm.key_len() {
            return Err(CryptoError::InvalidKey(format!(
                "expected {} key bytes for {:?}, got {}",
                algorithm.key_len(),
                algorithm,
                bytes.len()
            )));
        }
        Ok(Self { algorithm, bytes })
    }

    /// Returns the algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> ContentAlgorithm {
        self.algorithm
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn sealing_key(&self) -> CryptoResult<LessSafeKey> {
        let unbound = UnboundKey::new(self.algorithm.aead(), &self.bytes)
            .map_err(|e| CryptoError::InvalidKey(format!("AES key rejected: {e}")))?;
        Ok(LessSafeKey::new(unbound))
    }

    /// Encrypts `plaintext`, returning `IV || ciphertext || tag`.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails.
    pub fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let key = self.sealing_key()?;
        let iv = random_bytes(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(&iv)
            .map_err(|e| CryptoError::Encryption(format!("invalid nonce: {e}")))?;

        let mut in_out = plaintext.to_vec();
        key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|e| CryptoError::Encryption(format!("AES-GCM seal failed: {e}")))?;

        let mut output = iv;
        output.extend_from_slice(&in_out);
        Ok(output)
    }

    /// Decrypts `IV || ciphertext || tag`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Decryption`] if the data is truncated or the
    /// tag does not verify.
    pub fn decrypt(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        if data.len() < NONCE_LEN {
            return Err(CryptoError::Decryption);
        }
        let key = self.sealing_key()?;
        let (iv, ciphertext) = data.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(iv).map_err(|_| CryptoError::Decryption)?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::Decryption)?;
        Ok(plaintext.to_vec())
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Recipient public key used to wrap content keys.
pub struct RsaEncryptionKey {
    key: OaepPublicEncryptingKey,
}

impl RsaEncryptionKey {
    /// Loads a public key from X.509 `SubjectPublicKeyInfo` DER.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid.
    pub fn from_der(der: &[u8]) -> CryptoResult<Self> {
        let public = PublicEncryptingKey::from_der(der)
            .map_err(|e| CryptoError::InvalidKey(format!("Invalid RSA public key: {e}")))?;
        Self::from_public(public)
    }

    fn from_public(public: PublicEncryptingKey) -> CryptoResult<Self> {
        let key = OaepPublicEncryptingKey::new(public)
            .map_err(|e| CryptoError::InvalidKey(format!("RSA key unusable for OAEP: {e}")))?;
        Ok(Self { key })
    }

    /// Returns the key transport algorithm URI.
    #[must_use]
    pub const fn algorithm_uri(&self) -> &'static str {
        RSA_OAEP_MGF1P_URI
    }

    /// Wraps a content key for this recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails.
    pub fn wrap_key(&self, content_key: &ContentKey) -> CryptoResult<Vec<u8>> {
        let mut output = vec![0u8; self.key.ciphertext_size()];
        let ciphertext = self
            .key
            .encrypt(&OAEP_SHA1_MGF1SHA1, content_key.as_bytes(), &mut output, None)
            .map_err(|e| CryptoError::Encryption(format!("RSA-OAEP encryption failed: {e}")))?;
        Ok(ciphertext.to_vec())
    }
}

impl fmt::Debug for RsaEncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaEncryptionKey").finish_non_exhaustive()
    }
}

/// Recipient private key used to unwrap content keys.
pub struct RsaDecryptionKey {
    key: OaepPrivateDecryptingKey,
    public_der: Vec<u8>,
}

impl RsaDecryptionKey {
    /// Generates a fresh 2048-bit key.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation fails.
    pub fn generate() -> CryptoResult<Self> {
        let private = PrivateDecryptingKey::generate(KeySize::Rsa2048)
            .map_err(|e| CryptoError::KeyGeneration(format!("RSA key generation failed: {e}")))?;
        Self::from_private(private)
    }

    /// Loads a private key from PKCS#8 DER.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid.
    pub fn from_pkcs8(pkcs8_der: &[u8]) -> CryptoResult<Self> {
        let private = PrivateDecryptingKey::from_pkcs8(pkcs8_der)
            .map_err(|e| CryptoError::InvalidKey(format!("Invalid RSA PKCS#8 key: {e}")))?;
        Self::from_private(private)
    }

    fn from_private(private: PrivateDecryptingKey) -> CryptoResult<Self> {
        let public_der = private
            .public_key()
            .as_der()
            .map_err(|e| CryptoError::InvalidKey(format!("RSA public key encoding failed: {e}")))?
            .as_ref()
            .to_vec();
        let key = OaepPrivateDecryptingKey::new(private)
            .map_err(|e| CryptoError::InvalidKey(format!("RSA key unusable for OAEP: {e}")))?;
        Ok(Self { key, public_der })
    }

    /// Returns the matching public key as X.509 `SubjectPublicKeyInfo` DER.
    #[must_use]
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_der
    }

    /// Returns the matching public key for wrapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored public key cannot be loaded.
    pub fn public_key(&self) -> CryptoResult<RsaEncryptionKey> {
        RsaEncryptionKey::from_der(&self.public_der)
    }

    /// Unwraps a content key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Decryption`] if the key cannot be unwrapped.
    pub fn unwrap_key(&self, wrapped: &[u8], algorithm: ContentAlgorithm) -> CryptoResult<ContentKey> {
        let mut output = vec![0u8; self.key.min_output_size()];
        let plaintext = self
            .key
            .decrypt(&OAEP_SHA1_MGF1SHA1, wrapped, &mut output, None)
            .map_err(|_| CryptoError::Decryption)?;
        ContentKey::from_bytes(algorithm, plaintext.to_vec())
    }
}

impl fmt::Debug for RsaDecryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaDecryptionKey").finish_non_exhaustive()
    }
}

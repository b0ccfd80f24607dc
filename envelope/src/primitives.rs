//! # Key primitives
//!
//! Module dedicated to the collaborator performing the actual
//! cryptography. The sealer only decides which primitive to call and
//! how to lay out the resulting bytes.

use tracing::debug;

use crate::Result;

/// The algorithm token selecting RSA OAEP (SHA-1) padding.
pub const DEFAULT_ALGORITHM: &str = "RSAEncryptionOAEPAESCBC";

/// The RSA padding scheme used to protect content keys.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum RsaPadding {
    /// RSA OAEP with SHA-1.
    #[default]
    OaepSha1,

    /// RSA PKCS#1 v1.5.
    Pkcs1v15,
}

impl RsaPadding {
    /// Select the padding scheme matching the given algorithm token.
    ///
    /// The default token (and the empty token) select OAEP, any other
    /// token falls back to PKCS#1 v1.5.
    pub fn from_algorithm(algorithm: impl AsRef<str>) -> Self {
        match algorithm.as_ref() {
            "" | DEFAULT_ALGORITHM => Self::OaepSha1,
            algorithm => {
                debug!("algorithm {algorithm} is not the default one, falling back to pkcs1 v1.5");
                Self::Pkcs1v15
            }
        }
    }
}

/// The key primitives collaborator.
///
/// Implementations own the key material. They are shared between
/// threads, any synchronization is up to them.
pub trait KeyPrimitives: Send + Sync {
    /// Generate a random symmetric content key.
    fn generate_symmetric_key(&self) -> Result<Vec<u8>>;

    /// Encrypt data using the public key of the stored key pair
    /// matching the given identifier.
    fn encrypt_with_public_key_id(
        &self,
        key_id: &str,
        data: &[u8],
        padding: RsaPadding,
    ) -> Result<Vec<u8>>;

    /// Encrypt data using the given DER-encoded public key.
    fn encrypt_with_public_key(
        &self,
        public_key: &[u8],
        data: &[u8],
        padding: RsaPadding,
    ) -> Result<Vec<u8>>;

    /// Decrypt data using the stored private key matching the given
    /// identifier.
    fn decrypt_with_private_key(
        &self,
        key_id: &str,
        data: &[u8],
        padding: RsaPadding,
    ) -> Result<Vec<u8>>;

    /// Encrypt data using the stored symmetric key matching the given
    /// identifier.
    fn encrypt_with_symmetric_key_id(&self, key_id: &str, data: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt data using the stored symmetric key matching the given
    /// identifier.
    fn decrypt_with_symmetric_key_id(&self, key_id: &str, data: &[u8]) -> Result<Vec<u8>>;

    /// Encrypt data using the given raw symmetric key.
    fn encrypt_with_symmetric_key(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt data using the given raw symmetric key.
    fn decrypt_with_symmetric_key(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>>;
}

//! # Sealed attribute
//!
//! Module dedicated to sealed values carried as text, like email
//! aliases, folder names, blocklist entries or notifications. Those
//! values declare the symmetric algorithm they were sealed with,
//! which must be validated before any decryption happens.

use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::debug;

use crate::{Error, KeyInfo, KeyType, Result, Sealer};

/// The symmetric algorithms sealed attributes can be sealed with.
pub const SUPPORTED_SYMMETRIC_ALGORITHMS: [&str; 1] = ["AES/CBC/PKCS7Padding"];

/// The plain text type of string attributes.
pub const PLAIN_TEXT_TYPE_STRING: &str = "string";

/// Check that the given symmetric algorithm is supported.
pub fn check_symmetric_algorithm(algorithm: impl AsRef<str>) -> Result<()> {
    let algorithm = algorithm.as_ref();

    if SUPPORTED_SYMMETRIC_ALGORITHMS.contains(&algorithm) {
        Ok(())
    } else {
        debug!("rejecting unsupported symmetric algorithm {algorithm}");
        Err(Error::UnsupportedAlgorithmError(algorithm.to_owned()))
    }
}

/// A sealed value, as carried by service payloads.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct SealedAttribute {
    /// The identifier of the key the value was sealed with.
    pub key_id: String,

    /// The symmetric algorithm used to encrypt the value.
    pub algorithm: String,

    /// The type of the plain value, usually `string`.
    pub plain_text_type: String,

    /// The sealed envelope, base64-encoded.
    pub base64_encoded_sealed_data: String,
}

impl SealedAttribute {
    /// Seal the given string value into a new attribute.
    pub fn seal_string(sealer: &Sealer, key_info: &KeyInfo, value: &str) -> Result<Self> {
        let sealed = sealer.seal(key_info, value.as_bytes())?;

        Ok(Self {
            key_id: key_info.key_id.clone(),
            algorithm: SUPPORTED_SYMMETRIC_ALGORITHMS[0].to_owned(),
            plain_text_type: PLAIN_TEXT_TYPE_STRING.to_owned(),
            base64_encoded_sealed_data: sealed.to_base64(),
        })
    }

    /// Unseal the attribute as a string.
    ///
    /// The algorithm is checked first: an unsupported algorithm fails
    /// without touching the sealed data.
    ///
    /// The key algorithm is the one the attribute key was used with,
    /// it selects the RSA padding scheme of private keys.
    pub fn unseal_string(
        &self,
        sealer: &Sealer,
        key_type: KeyType,
        key_algorithm: impl ToString,
    ) -> Result<String> {
        check_symmetric_algorithm(&self.algorithm)?;

        let key_info = KeyInfo {
            key_id: self.key_id.clone(),
            key_type,
            algorithm: key_algorithm.to_string(),
        };

        let sealed = STANDARD
            .decode(&self.base64_encoded_sealed_data)
            .map_err(Error::DecodeBase64Error)?;

        sealer.unseal_string(&key_info, &sealed)
    }
}

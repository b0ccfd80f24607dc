//! # Native key primitives
//!
//! Module dedicated to the native, in-memory implementation of
//! [`KeyPrimitives`], based on the RustCrypto [`rsa`], [`aes`] and
//! [`cbc`] crates.
//!
//! Symmetric ciphertexts are laid out as `IV || AES-256-CBC/PKCS7`,
//! where the IV is 16 random bytes generated for each encryption.

use std::{collections::HashMap, fmt};

use aes::{
    cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit},
    Aes256,
};
use rand::{thread_rng, RngCore};
use rsa::{
    pkcs8::{spki, DecodePublicKey, EncodePublicKey},
    Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey,
};
use sha1::Sha1;
use thiserror::Error;
use tracing::{debug, trace};

use crate::{KeyPrimitives, PublicKeyInfo, Result, RsaPadding};

/// The size of generated RSA keys, in bits.
pub const RSA_KEY_BITS: usize = 2048;

/// The size of symmetric keys, in bytes.
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// The size of the AES-CBC initialization vector, in bytes.
pub const IV_SIZE: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Errors related to the native key primitives.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot generate rsa key pair")]
    GenerateKeyPairError(#[source] rsa::Error),
    #[error("cannot encrypt data using rsa")]
    EncryptRsaError(#[source] rsa::Error),
    #[error("cannot decrypt data using rsa")]
    DecryptRsaError(#[source] rsa::Error),
    #[error("cannot export rsa public key as der")]
    ExportPublicKeyError(#[source] spki::Error),
    #[error("cannot import rsa public key from der")]
    ImportPublicKeyError(#[source] spki::Error),
    #[error("cannot use symmetric key: expected {SYMMETRIC_KEY_SIZE} bytes, got {0}")]
    InvalidSymmetricKeyError(usize),
    #[error("cannot decrypt data using aes: ciphertext is too short ({0} bytes)")]
    CiphertextTooShortError(usize),
    #[error("cannot decrypt data using aes: invalid padding")]
    DecryptAesError,
}

/// The native key primitives.
///
/// Keys are registered using the `&mut self` methods. Once shared
/// (for example behind an [`std::sync::Arc`]), the key store is
/// read-only.
#[derive(Clone, Default)]
pub struct NativeKeyPrimitives {
    private_keys: HashMap<String, RsaPrivateKey>,
    symmetric_keys: HashMap<String, Vec<u8>>,
}

impl fmt::Debug for NativeKeyPrimitives {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeKeyPrimitives")
            .field("private_keys", &self.private_keys.keys().collect::<Vec<_>>())
            .field(
                "symmetric_keys",
                &self.symmetric_keys.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl NativeKeyPrimitives {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a RSA key pair and store it under the given
    /// identifier.
    pub fn generate_key_pair(&mut self, key_id: impl ToString) -> Result<()> {
        let key_id = key_id.to_string();
        debug!("generating rsa key pair {key_id}");

        let key = RsaPrivateKey::new(&mut thread_rng(), RSA_KEY_BITS)
            .map_err(Error::GenerateKeyPairError)?;
        self.private_keys.insert(key_id, key);

        Ok(())
    }

    pub fn insert_private_key(&mut self, key_id: impl ToString, key: RsaPrivateKey) {
        self.private_keys.insert(key_id.to_string(), key);
    }

    /// Generate a symmetric key and store it under the given
    /// identifier.
    pub fn generate_symmetric_key_with_id(&mut self, key_id: impl ToString) {
        let key_id = key_id.to_string();
        debug!("generating symmetric key {key_id}");
        self.symmetric_keys.insert(key_id, random_bytes(SYMMETRIC_KEY_SIZE));
    }

    pub fn insert_symmetric_key(&mut self, key_id: impl ToString, key: Vec<u8>) -> Result<()> {
        if key.len() != SYMMETRIC_KEY_SIZE {
            return Err(Error::InvalidSymmetricKeyError(key.len()).into());
        }

        self.symmetric_keys.insert(key_id.to_string(), key);
        Ok(())
    }

    /// Export the public key of the given key pair as DER
    /// (SubjectPublicKeyInfo).
    pub fn public_key_der(&self, key_id: &str) -> Result<Vec<u8>> {
        let key = RsaPublicKey::from(self.private_key(key_id)?);
        let der = key
            .to_public_key_der()
            .map_err(Error::ExportPublicKeyError)?;
        Ok(der.as_bytes().to_vec())
    }

    /// Build the recipient key information of the given key pair.
    pub fn public_key_info(
        &self,
        key_id: &str,
        algorithm: impl ToString,
    ) -> Result<PublicKeyInfo> {
        Ok(PublicKeyInfo {
            key_id: key_id.to_owned(),
            public_key: self.public_key_der(key_id)?,
            algorithm: algorithm.to_string(),
        })
    }

    fn private_key(&self, key_id: &str) -> Result<&RsaPrivateKey> {
        self.private_keys
            .get(key_id)
            .ok_or_else(|| crate::Error::KeyNotFoundError(key_id.to_owned()))
    }

    fn symmetric_key(&self, key_id: &str) -> Result<&[u8]> {
        self.symmetric_keys
            .get(key_id)
            .map(Vec::as_slice)
            .ok_or_else(|| crate::Error::KeyNotFoundError(key_id.to_owned()))
    }
}

impl KeyPrimitives for NativeKeyPrimitives {
    fn generate_symmetric_key(&self) -> Result<Vec<u8>> {
        Ok(random_bytes(SYMMETRIC_KEY_SIZE))
    }

    fn encrypt_with_public_key_id(
        &self,
        key_id: &str,
        data: &[u8],
        padding: RsaPadding,
    ) -> Result<Vec<u8>> {
        let key = RsaPublicKey::from(self.private_key(key_id)?);
        Ok(rsa_encrypt(&key, data, padding)?)
    }

    fn encrypt_with_public_key(
        &self,
        public_key: &[u8],
        data: &[u8],
        padding: RsaPadding,
    ) -> Result<Vec<u8>> {
        let key =
            RsaPublicKey::from_public_key_der(public_key).map_err(Error::ImportPublicKeyError)?;
        Ok(rsa_encrypt(&key, data, padding)?)
    }

    fn decrypt_with_private_key(
        &self,
        key_id: &str,
        data: &[u8],
        padding: RsaPadding,
    ) -> Result<Vec<u8>> {
        let key = self.private_key(key_id)?;
        trace!("decrypting {} bytes using rsa {padding:?}", data.len());

        let plain = match padding {
            RsaPadding::OaepSha1 => key.decrypt(Oaep::new::<Sha1>(), data),
            RsaPadding::Pkcs1v15 => key.decrypt(Pkcs1v15Encrypt, data),
        };

        Ok(plain.map_err(Error::DecryptRsaError)?)
    }

    fn encrypt_with_symmetric_key_id(&self, key_id: &str, data: &[u8]) -> Result<Vec<u8>> {
        let key = self.symmetric_key(key_id)?;
        Ok(aes_encrypt(key, data)?)
    }

    fn decrypt_with_symmetric_key_id(&self, key_id: &str, data: &[u8]) -> Result<Vec<u8>> {
        let key = self.symmetric_key(key_id)?;
        Ok(aes_decrypt(key, data)?)
    }

    fn encrypt_with_symmetric_key(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        Ok(aes_encrypt(key, data)?)
    }

    fn decrypt_with_symmetric_key(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        Ok(aes_decrypt(key, data)?)
    }
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0; len];
    thread_rng().fill_bytes(&mut bytes);
    bytes
}

fn rsa_encrypt(
    key: &RsaPublicKey,
    data: &[u8],
    padding: RsaPadding,
) -> std::result::Result<Vec<u8>, Error> {
    trace!("encrypting {} bytes using rsa {padding:?}", data.len());
    let mut rng = thread_rng();

    let encrypted = match padding {
        RsaPadding::OaepSha1 => key.encrypt(&mut rng, Oaep::new::<Sha1>(), data),
        RsaPadding::Pkcs1v15 => key.encrypt(&mut rng, Pkcs1v15Encrypt, data),
    };

    encrypted.map_err(Error::EncryptRsaError)
}

fn aes_encrypt(key: &[u8], data: &[u8]) -> std::result::Result<Vec<u8>, Error> {
    if key.len() != SYMMETRIC_KEY_SIZE {
        return Err(Error::InvalidSymmetricKeyError(key.len()));
    }

    let iv = random_bytes(IV_SIZE);
    let cipher = Aes256CbcEnc::new_from_slices(key, &iv)
        .map_err(|_| Error::InvalidSymmetricKeyError(key.len()))?;

    let mut encrypted = iv;
    encrypted.extend(cipher.encrypt_padded_vec_mut::<Pkcs7>(data));
    trace!("encrypted {} bytes into {}", data.len(), encrypted.len());

    Ok(encrypted)
}

fn aes_decrypt(key: &[u8], data: &[u8]) -> std::result::Result<Vec<u8>, Error> {
    if key.len() != SYMMETRIC_KEY_SIZE {
        return Err(Error::InvalidSymmetricKeyError(key.len()));
    }

    if data.len() < IV_SIZE {
        return Err(Error::CiphertextTooShortError(data.len()));
    }

    let (iv, encrypted) = data.split_at(IV_SIZE);
    let cipher = Aes256CbcDec::new_from_slices(key, iv)
        .map_err(|_| Error::InvalidSymmetricKeyError(key.len()))?;

    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(encrypted)
        .map_err(|_| Error::DecryptAesError)
}

#[cfg(test)]
mod tests {
    use crate::{KeyPrimitives, RsaPadding};

    use super::{NativeKeyPrimitives, IV_SIZE, SYMMETRIC_KEY_SIZE};

    #[test]
    fn symmetric_key_id_round_trip() {
        let mut keys = NativeKeyPrimitives::new();
        keys.generate_symmetric_key_with_id("sym");

        let encrypted = keys.encrypt_with_symmetric_key_id("sym", b"hello").unwrap();
        assert_eq!(encrypted.len(), IV_SIZE + 16);

        let plain = keys.decrypt_with_symmetric_key_id("sym", &encrypted).unwrap();
        assert_eq!(plain, b"hello");
    }

    #[test]
    fn symmetric_encryption_uses_random_iv() {
        let keys = NativeKeyPrimitives::new();
        let key = keys.generate_symmetric_key().unwrap();
        assert_eq!(key.len(), SYMMETRIC_KEY_SIZE);

        let a = keys.encrypt_with_symmetric_key(&key, b"same").unwrap();
        let b = keys.encrypt_with_symmetric_key(&key, b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn invalid_symmetric_key() {
        let mut keys = NativeKeyPrimitives::new();
        assert!(keys.insert_symmetric_key("short", vec![0; 8]).is_err());
        assert!(keys.encrypt_with_symmetric_key(&[0; 8], b"data").is_err());
    }

    #[test]
    fn missing_keys() {
        let keys = NativeKeyPrimitives::new();

        let err = keys
            .decrypt_with_private_key("unknown", &[0; 256], RsaPadding::OaepSha1)
            .unwrap_err();
        assert!(matches!(err, crate::Error::KeyNotFoundError(id) if id == "unknown"));

        let err = keys
            .decrypt_with_symmetric_key_id("unknown", &[0; 32])
            .unwrap_err();
        assert!(matches!(err, crate::Error::KeyNotFoundError(id) if id == "unknown"));
    }

    #[test]
    fn rsa_round_trip_both_paddings() {
        let mut keys = NativeKeyPrimitives::new();
        keys.generate_key_pair("pair").unwrap();
        let der = keys.public_key_der("pair").unwrap();

        for padding in [RsaPadding::OaepSha1, RsaPadding::Pkcs1v15] {
            let encrypted = keys
                .encrypt_with_public_key(&der, b"content key", padding)
                .unwrap();
            assert_eq!(encrypted.len(), 256);

            let plain = keys
                .decrypt_with_private_key("pair", &encrypted, padding)
                .unwrap();
            assert_eq!(plain, b"content key");
        }
    }
}

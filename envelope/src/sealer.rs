//! # Sealer
//!
//! Module dedicated to sealing and unsealing. The [`Sealer`] turns
//! plain bytes into a [`SealedEnvelope`] and back, delegating the
//! cryptography to a [`KeyPrimitives`] implementation.

use std::{fmt, sync::Arc};

use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::{debug, trace};

use crate::{Error, KeyPrimitives, Result, RsaPadding};

/// The size of the protected content key block, matching the block
/// size of RSA-2048.
pub const KEY_BLOCK_SIZE: usize = 256;

/// The type of key used to unseal data.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum KeyType {
    /// The content key is protected by a RSA key pair.
    PrivateKey,

    /// The whole payload is protected by a stored symmetric key.
    SymmetricKey,
}

/// Information about the key used to seal or unseal data.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub struct KeyInfo {
    /// The identifier of the key, as known by the key primitives.
    pub key_id: String,

    /// The type of the key.
    pub key_type: KeyType,

    /// The algorithm token. For private keys, it selects the RSA
    /// padding scheme (see [`RsaPadding::from_algorithm`]).
    pub algorithm: String,
}

impl KeyInfo {
    pub fn private_key(key_id: impl ToString, algorithm: impl ToString) -> Self {
        Self {
            key_id: key_id.to_string(),
            key_type: KeyType::PrivateKey,
            algorithm: algorithm.to_string(),
        }
    }

    pub fn symmetric_key(key_id: impl ToString, algorithm: impl ToString) -> Self {
        Self {
            key_id: key_id.to_string(),
            key_type: KeyType::SymmetricKey,
            algorithm: algorithm.to_string(),
        }
    }

    /// The RSA padding scheme selected by the algorithm token.
    pub fn padding(&self) -> RsaPadding {
        RsaPadding::from_algorithm(&self.algorithm)
    }
}

/// Information about the public key of a recipient.
#[derive(Clone, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub struct PublicKeyInfo {
    /// The identifier of the recipient key pair.
    pub key_id: String,

    /// The DER-encoded (SubjectPublicKeyInfo) public key.
    pub public_key: Vec<u8>,

    /// The algorithm token selecting the RSA padding scheme.
    pub algorithm: String,
}

impl fmt::Debug for PublicKeyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKeyInfo")
            .field("key_id", &self.key_id)
            .field("public_key", &format_args!("{} bytes", self.public_key.len()))
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// A sealed envelope.
///
/// Always at least [`KEY_BLOCK_SIZE`] bytes long.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SealedEnvelope(Vec<u8>);

impl SealedEnvelope {
    /// The protected content key block.
    pub fn key_block(&self) -> &[u8] {
        &self.0[..KEY_BLOCK_SIZE]
    }

    /// The encrypted payload following the key block.
    pub fn ciphertext(&self) -> &[u8] {
        &self.0[KEY_BLOCK_SIZE..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn from_base64(data: impl AsRef<[u8]>) -> Result<Self> {
        let bytes = STANDARD.decode(data).map_err(Error::DecodeBase64Error)?;
        Self::try_from(bytes)
    }
}

impl TryFrom<Vec<u8>> for SealedEnvelope {
    type Error = Error;

    fn try_from(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < KEY_BLOCK_SIZE {
            return Err(Error::SealedDataTooShortError(bytes.len()));
        }

        Ok(Self(bytes))
    }
}

impl AsRef<[u8]> for SealedEnvelope {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<SealedEnvelope> for Vec<u8> {
    fn from(envelope: SealedEnvelope) -> Self {
        envelope.0
    }
}

/// The envelope sealer and unsealer.
///
/// The sealer holds no state of its own, it can be cloned and shared
/// freely between threads.
#[derive(Clone)]
pub struct Sealer {
    primitives: Arc<dyn KeyPrimitives>,
}

impl fmt::Debug for Sealer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sealer").finish_non_exhaustive()
    }
}

impl Sealer {
    pub fn new(primitives: Arc<dyn KeyPrimitives>) -> Self {
        Self { primitives }
    }

    /// Seal the given plain bytes using the given key.
    pub fn seal(&self, key_info: &KeyInfo, plain: &[u8]) -> Result<SealedEnvelope> {
        debug!("sealing data using {:?} {}", key_info.key_type, key_info.key_id);

        match key_info.key_type {
            KeyType::PrivateKey => {
                let content_key = self.primitives.generate_symmetric_key()?;
                let key_block = self.primitives.encrypt_with_public_key_id(
                    &key_info.key_id,
                    &content_key,
                    key_info.padding(),
                )?;
                self.assemble(key_block, &content_key, plain)
            }
            KeyType::SymmetricKey => {
                let sealed = self
                    .primitives
                    .encrypt_with_symmetric_key_id(&key_info.key_id, plain)?;
                SealedEnvelope::try_from(sealed)
            }
        }
    }

    /// Seal the given plain bytes for the given recipient public key.
    pub fn seal_for_recipient(
        &self,
        recipient: &PublicKeyInfo,
        plain: &[u8],
    ) -> Result<SealedEnvelope> {
        debug!("sealing data for recipient key {}", recipient.key_id);

        let content_key = self.primitives.generate_symmetric_key()?;
        let key_block = self.primitives.encrypt_with_public_key(
            &recipient.public_key,
            &content_key,
            RsaPadding::from_algorithm(&recipient.algorithm),
        )?;

        self.assemble(key_block, &content_key, plain)
    }

    fn assemble(
        &self,
        key_block: Vec<u8>,
        content_key: &[u8],
        plain: &[u8],
    ) -> Result<SealedEnvelope> {
        if key_block.len() != KEY_BLOCK_SIZE {
            return Err(Error::InvalidKeyBlockSizeError(
                key_block.len(),
                KEY_BLOCK_SIZE,
            ));
        }

        let ciphertext = self
            .primitives
            .encrypt_with_symmetric_key(content_key, plain)?;
        trace!("sealed {} plain bytes into {}", plain.len(), ciphertext.len());

        let mut sealed = key_block;
        sealed.extend(ciphertext);
        SealedEnvelope::try_from(sealed)
    }

    /// Unseal the given sealed bytes using the given key.
    pub fn unseal(&self, key_info: &KeyInfo, sealed: &[u8]) -> Result<Vec<u8>> {
        debug!("unsealing data using {:?} {}", key_info.key_type, key_info.key_id);
        trace!("sealed data: {} bytes", sealed.len());

        if sealed.len() < KEY_BLOCK_SIZE {
            return Err(Error::SealedDataTooShortError(sealed.len()));
        }

        match key_info.key_type {
            KeyType::PrivateKey => {
                let (key_block, ciphertext) = sealed.split_at(KEY_BLOCK_SIZE);
                let content_key = self.primitives.decrypt_with_private_key(
                    &key_info.key_id,
                    key_block,
                    key_info.padding(),
                )?;
                self.primitives
                    .decrypt_with_symmetric_key(&content_key, ciphertext)
            }
            KeyType::SymmetricKey => self
                .primitives
                .decrypt_with_symmetric_key_id(&key_info.key_id, sealed),
        }
    }

    /// Unseal the given sealed bytes as an UTF-8 string.
    pub fn unseal_string(&self, key_info: &KeyInfo, sealed: &[u8]) -> Result<String> {
        let plain = self.unseal(key_info, sealed)?;
        String::from_utf8(plain).map_err(Error::DecodeUtf8Error)
    }

    /// Unseal the given base64-encoded sealed data.
    pub fn unseal_base64(&self, key_info: &KeyInfo, sealed: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        let sealed = STANDARD.decode(sealed).map_err(Error::DecodeBase64Error)?;
        self.unseal(key_info, &sealed)
    }

    /// Encrypt the given plain bytes with a raw content key.
    pub fn seal_with_content_key(&self, content_key: &[u8], plain: &[u8]) -> Result<Vec<u8>> {
        self.primitives
            .encrypt_with_symmetric_key(content_key, plain)
    }

    /// Decrypt the given bytes with a raw content key.
    pub fn unseal_with_content_key(&self, content_key: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
        self.primitives
            .decrypt_with_symmetric_key(content_key, sealed)
    }

    /// Generate a fresh content key.
    pub fn generate_content_key(&self) -> Result<Vec<u8>> {
        self.primitives.generate_symmetric_key()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use crate::{Error, KeyPrimitives, Result, RsaPadding};

    use super::{KeyInfo, SealedEnvelope, Sealer, KEY_BLOCK_SIZE};

    /// Reversible, non-cryptographic primitives exposing the layout
    /// decisions of the sealer.
    ///
    /// The "asymmetric" block stores the padding tag, the data length
    /// and the data, zero-filled up to 256 bytes. The "symmetric"
    /// cipher XORs data with the first key byte.
    pub(crate) struct XorPrimitives;

    impl XorPrimitives {
        fn block(data: &[u8], padding: RsaPadding) -> Vec<u8> {
            let mut block = vec![padding as u8, data.len() as u8];
            block.extend(data);
            block.resize(KEY_BLOCK_SIZE, 0);
            block
        }

        fn xor(key: u8, data: &[u8]) -> Vec<u8> {
            data.iter().map(|b| b ^ key).collect()
        }
    }

    impl KeyPrimitives for XorPrimitives {
        fn generate_symmetric_key(&self) -> Result<Vec<u8>> {
            Ok(vec![0x5a; 32])
        }

        fn encrypt_with_public_key_id(
            &self,
            _key_id: &str,
            data: &[u8],
            padding: RsaPadding,
        ) -> Result<Vec<u8>> {
            Ok(Self::block(data, padding))
        }

        fn encrypt_with_public_key(
            &self,
            _public_key: &[u8],
            data: &[u8],
            padding: RsaPadding,
        ) -> Result<Vec<u8>> {
            Ok(Self::block(data, padding))
        }

        fn decrypt_with_private_key(
            &self,
            key_id: &str,
            data: &[u8],
            padding: RsaPadding,
        ) -> Result<Vec<u8>> {
            if key_id == "unknown" {
                return Err(Error::KeyNotFoundError(key_id.to_owned()));
            }
            assert_eq!(data[0], padding as u8);
            let len = data[1] as usize;
            Ok(data[2..2 + len].to_vec())
        }

        fn encrypt_with_symmetric_key_id(&self, _key_id: &str, data: &[u8]) -> Result<Vec<u8>> {
            Ok(Self::xor(0x42, data))
        }

        fn decrypt_with_symmetric_key_id(&self, _key_id: &str, data: &[u8]) -> Result<Vec<u8>> {
            Ok(Self::xor(0x42, data))
        }

        fn encrypt_with_symmetric_key(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
            Ok(Self::xor(key[0], data))
        }

        fn decrypt_with_symmetric_key(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
            Ok(Self::xor(key[0], data))
        }
    }

    fn sealer() -> Sealer {
        Sealer::new(Arc::new(XorPrimitives))
    }

    #[test_log::test]
    fn private_key_layout() {
        let key = KeyInfo::private_key("key", "RSAEncryptionOAEPAESCBC");
        let sealed = sealer().seal(&key, b"hello").unwrap();

        assert_eq!(sealed.as_bytes().len(), KEY_BLOCK_SIZE + 5);
        assert_eq!(sealed.key_block()[0], RsaPadding::OaepSha1 as u8);
        assert_eq!(sealed.ciphertext(), &[0x32, 0x3f, 0x36, 0x36, 0x35]);

        let plain = sealer().unseal(&key, sealed.as_bytes()).unwrap();
        assert_eq!(plain, b"hello");
    }

    #[test_log::test]
    fn private_key_fallback_padding() {
        let key = KeyInfo::private_key("key", "RSAEncryptionPKCS1AESCBC");
        let sealed = sealer().seal(&key, b"hello").unwrap();
        assert_eq!(sealed.key_block()[0], RsaPadding::Pkcs1v15 as u8);

        let plain = sealer().unseal_string(&key, sealed.as_bytes()).unwrap();
        assert_eq!(plain, "hello");
    }

    #[test_log::test]
    fn too_short() {
        let key = KeyInfo::private_key("key", "");

        for len in [0, 1, 255] {
            match sealer().unseal(&key, &vec![0; len]).unwrap_err() {
                Error::SealedDataTooShortError(n) => assert_eq!(n, len),
                err => panic!("unexpected error: {err:?}"),
            }
        }

        let key = KeyInfo::symmetric_key("key", "");
        assert!(matches!(
            sealer().unseal(&key, &[0; 10]).unwrap_err(),
            Error::SealedDataTooShortError(10)
        ));
    }

    #[test_log::test]
    fn symmetric_key_whole_payload() {
        let key = KeyInfo::symmetric_key("sym", "AES/CBC/PKCS7Padding");
        let plain = vec![7; 300];

        let sealed = sealer().seal(&key, &plain).unwrap();
        assert_eq!(sealed.as_bytes(), &vec![7 ^ 0x42; 300][..]);
        assert_eq!(sealer().unseal(&key, sealed.as_bytes()).unwrap(), plain);

        // the envelope invariant is enforced when sealing too
        assert!(matches!(
            sealer().seal(&key, b"short").unwrap_err(),
            Error::SealedDataTooShortError(5)
        ));
    }

    #[test_log::test]
    fn unknown_private_key() {
        let key = KeyInfo::private_key("unknown", "");
        let sealed = vec![0; KEY_BLOCK_SIZE + 16];
        assert!(matches!(
            sealer().unseal(&key, &sealed).unwrap_err(),
            Error::KeyNotFoundError(id) if id == "unknown"
        ));
    }

    #[test_log::test]
    fn envelope_base64() {
        let key = KeyInfo::private_key("key", "");
        let sealed = sealer().seal(&key, b"alias@example.com").unwrap();

        let base64 = sealed.to_base64();
        assert_eq!(SealedEnvelope::from_base64(&base64).unwrap(), sealed);

        let plain = sealer().unseal_base64(&key, &base64).unwrap();
        assert_eq!(plain, b"alias@example.com");

        assert!(matches!(
            SealedEnvelope::from_base64("AAAA").unwrap_err(),
            Error::SealedDataTooShortError(3)
        ));
        assert!(matches!(
            SealedEnvelope::from_base64("not base64!").unwrap_err(),
            Error::DecodeBase64Error(_)
        ));
    }
}

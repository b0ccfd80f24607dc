//! Rust library to seal and unseal data using hybrid envelopes.
//!
//! A sealed envelope is a byte sequence made of two parts: a content
//! key protected by an asymmetric (or stored symmetric) key, followed
//! by the payload encrypted with that content key:
//!
//! ```text
//! [0, 256)    protected content key (RSA-2048 block)
//! [256, len)  AES-CBC/PKCS7 ciphertext of the payload
//! ```
//!
//! The cryptographic primitives themselves are provided by a
//! [`KeyPrimitives`] implementation. This crate only defines the byte
//! layout and the way primitives are invoked. A native in-memory
//! implementation is available behind the `native` cargo feature.

pub mod attribute;
mod error;
#[cfg(feature = "native")]
pub mod native;
pub mod primitives;
pub mod sealer;

#[doc(inline)]
pub use self::{
    attribute::{check_symmetric_algorithm, SealedAttribute, SUPPORTED_SYMMETRIC_ALGORITHMS},
    error::{Error, Result},
    primitives::{KeyPrimitives, RsaPadding, DEFAULT_ALGORITHM},
    sealer::{KeyInfo, KeyType, PublicKeyInfo, SealedEnvelope, Sealer, KEY_BLOCK_SIZE},
};
#[cfg(feature = "native")]
#[doc(inline)]
pub use self::native::NativeKeyPrimitives;

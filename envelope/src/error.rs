use std::{result, string::FromUtf8Error};

use thiserror::Error;

/// The global `Result` alias of the library.
pub type Result<T> = result::Result<T, Error>;

/// The global `Error` enum of the library.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot unseal data: sealed data is too short ({0} bytes)")]
    SealedDataTooShortError(usize),
    #[error("cannot unseal data: unsupported algorithm {0}")]
    UnsupportedAlgorithmError(String),
    #[error("cannot find key {0}")]
    KeyNotFoundError(String),
    #[error("cannot seal data: protected content key is {0} bytes, expected {1}")]
    InvalidKeyBlockSizeError(usize, usize),

    #[error("cannot decode base64 sealed data")]
    DecodeBase64Error(#[source] base64::DecodeError),
    #[error("cannot decode unsealed data as utf-8")]
    DecodeUtf8Error(#[source] FromUtf8Error),

    #[cfg(feature = "native")]
    #[error(transparent)]
    NativeError(#[from] crate::native::Error),
}

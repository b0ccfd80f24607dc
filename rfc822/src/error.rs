use std::{io, result};

use thiserror::Error;

/// The global `Result` alias of the library.
pub type Result<T> = result::Result<T, Error>;

/// The reason why a message has been considered malformed.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum Malformed {
    #[error("message has no header")]
    NoHeader,
    #[error("header line {0:?} is not a valid header")]
    UnreadableHeader(String),
    #[error("multipart {0} does not declare any boundary")]
    MissingBoundary(String),
    #[error("multipart boundary {0:?} is never closed")]
    UnclosedBoundary(String),
    #[error("message parts are nested deeper than {0} levels")]
    TooDeep(usize),
}

/// The global `Error` enum of the library.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot parse malformed message")]
    MalformedMessageError(#[source] Malformed),
    #[error("EmailCryptoService is required to encrypt email message data")]
    MissingCryptoCollaboratorError,
    #[error("cannot find key exchange attachment for key {0}")]
    KeyNotFoundError(String),
    #[error("cannot build secure package: no recipient public key given")]
    EmptyRecipientsError,
    #[error("cannot open encrypted message: missing secure body attachment")]
    MissingSecureBodyError,
    #[error("cannot write message to bytes")]
    WriteMessageError(#[source] io::Error),

    #[error(transparent)]
    EnvelopeError(#[from] envelope::Error),
}

impl From<Malformed> for Error {
    fn from(reason: Malformed) -> Self {
        Self::MalformedMessageError(reason)
    }
}

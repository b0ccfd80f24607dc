//! Rust library to encode and parse RFC 822 messages, with support
//! for end-to-end encrypted bodies.
//!
//! The entry point is the [`Rfc822Codec`]:
//!
//! ```rust
//! use rfc822::{EmailAddress, InternetMessageFields, Rfc822Codec};
//!
//! let codec = Rfc822Codec::new();
//!
//! let fields = InternetMessageFields::new()
//!     .with_from([EmailAddress::new("foo@bar.com").with_display_name("Foo Bar")])
//!     .with_to([EmailAddress::new("ted.bear@toys.org")])
//!     .with_subject("Greetings")
//!     .with_body("Hello");
//!
//! let bytes = codec.encode_to_internet_message_data(&fields).unwrap();
//! let parsed = codec.parse_internet_message_data(&bytes).unwrap();
//!
//! assert_eq!(parsed.subject.as_deref(), Some("Greetings"));
//! assert_eq!(parsed.body, "Hello");
//! ```
//!
//! Encrypted messages carry the clear message inside a
//! [`SecurePackage`], sealed using the [`envelope`] crate. See
//! [`Rfc822Codec::process_message_data`] and
//! [`Rfc822Codec::open_message_data`].

pub mod address;
pub mod codec;
pub mod config;
mod error;
pub mod message;
pub mod mime;
pub mod secure_package;

#[doc(inline)]
pub use self::{
    address::{format, format_list, parse_address_list, tokenize, AddressList, EmailAddress},
    codec::Rfc822Codec,
    config::CodecConfig,
    error::{Error, Malformed, Result},
    message::{EmailAttachment, EncryptionStatus, InternetMessageFields, ENCRYPTED_BODY_PLACEHOLDER},
    secure_package::{SecurePackage, SecurePackageBuilder},
};

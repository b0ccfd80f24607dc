//! # Codec
//!
//! Module dedicated to the RFC 822 codec, the entry point of the
//! library. The codec encodes message fields into raw messages and
//! parses them back, optionally wrapping the message into a
//! [`SecurePackage`].

use std::sync::Arc;

use envelope::{KeyInfo, KeyPrimitives, PublicKeyInfo};
use tracing::debug;

use crate::{
    mime::{compiler, interpreter},
    secure_package::{SecurePackage, SecurePackageBuilder, SECURE_PACKAGE_MIME_TYPE},
    CodecConfig, EmailAttachment, EncryptionStatus, Error, InternetMessageFields, Result,
};

/// The RFC 822 codec.
///
/// The codec holds no mutable state: it can be cloned and shared
/// between threads.
#[derive(Clone, Debug, Default)]
pub struct Rfc822Codec {
    config: CodecConfig,
    secure_package_builder: Option<SecurePackageBuilder>,
}

impl Rfc822Codec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: CodecConfig) -> Self {
        self.config = config;
        self
    }

    pub fn set_secure_package_builder(&mut self, builder: SecurePackageBuilder) {
        self.secure_package_builder = Some(builder);
    }

    pub fn with_secure_package_builder(mut self, builder: SecurePackageBuilder) -> Self {
        self.set_secure_package_builder(builder);
        self
    }

    pub fn set_some_secure_package_builder(&mut self, builder: Option<SecurePackageBuilder>) {
        self.secure_package_builder = builder;
    }

    pub fn with_some_secure_package_builder(mut self, builder: Option<SecurePackageBuilder>) -> Self {
        self.set_some_secure_package_builder(builder);
        self
    }

    /// Configure a secure package builder backed by the given key
    /// primitives.
    pub fn with_key_primitives(self, primitives: Arc<dyn KeyPrimitives>) -> Self {
        self.with_secure_package_builder(SecurePackageBuilder::new(primitives))
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn secure_package_builder(&self) -> Result<&SecurePackageBuilder> {
        self.secure_package_builder
            .as_ref()
            .ok_or(Error::MissingCryptoCollaboratorError)
    }

    /// Encode the given fields into a raw message.
    ///
    /// Encrypted fields require a secure package builder. Their body
    /// is replaced by a placeholder, their inline attachments are
    /// dropped and their attachments are written as opaque regular
    /// attachments: they are expected to be the secure package parts.
    pub fn encode_to_internet_message_data(&self, fields: &InternetMessageFields) -> Result<Vec<u8>> {
        match fields.encryption_status {
            EncryptionStatus::Unencrypted => compiler::compile(fields),
            EncryptionStatus::Encrypted => {
                self.secure_package_builder()?;

                if !fields.inline_attachments.is_empty() {
                    debug!(
                        "dropping {} inline attachment(s) of encrypted message",
                        fields.inline_attachments.len()
                    );
                }

                let attachments = fields.attachments.iter().map(opaque_attachment).collect();
                compiler::compile(&fields.to_encrypted_outer(attachments))
            }
        }
    }

    /// Parse the given raw message into fields.
    ///
    /// Encrypted messages are not opened, see
    /// [`Self::open_message_data`].
    pub fn parse_internet_message_data(&self, data: &[u8]) -> Result<InternetMessageFields> {
        interpreter::interpret(&self.config, data)
    }

    /// Encode the given fields into a raw message, encrypting it for
    /// the given recipients when requested.
    ///
    /// An encrypted message carries the complete clear message,
    /// attachments included, inside its secure package.
    pub fn process_message_data(
        &self,
        fields: &InternetMessageFields,
        status: EncryptionStatus,
        recipients: &[PublicKeyInfo],
    ) -> Result<Vec<u8>> {
        match status {
            EncryptionStatus::Unencrypted => {
                let fields = fields.clone().with_encryption_status(status);
                self.encode_to_internet_message_data(&fields)
            }
            EncryptionStatus::Encrypted => {
                let builder = self.secure_package_builder()?;

                let clear = fields
                    .clone()
                    .with_encryption_status(EncryptionStatus::Unencrypted);
                let clear = compiler::compile(&clear)?;

                let package = builder.build(&clear, recipients)?;
                debug!(
                    "encrypted message of {} bytes for {} recipient(s)",
                    clear.len(),
                    package.key_attachments.len()
                );

                compiler::compile(&fields.to_encrypted_outer(package.into_attachments()))
            }
        }
    }

    /// Parse the given raw message, opening its secure package with
    /// the given key if any.
    ///
    /// Opened messages keep the [`EncryptionStatus::Encrypted`]
    /// status.
    pub fn open_message_data(&self, data: &[u8], key_info: &KeyInfo) -> Result<InternetMessageFields> {
        let fields = self.parse_internet_message_data(data)?;

        if fields.encryption_status == EncryptionStatus::Unencrypted {
            return Ok(fields);
        }

        let package = SecurePackage::from_attachments(&fields.attachments)
            .ok_or(Error::MissingSecureBodyError)?;

        let clear = self.secure_package_builder()?.open(&package, key_info)?;

        let fields = self
            .parse_internet_message_data(&clear)?
            .with_encryption_status(EncryptionStatus::Encrypted);

        Ok(fields)
    }
}

fn opaque_attachment(attachment: &EmailAttachment) -> EmailAttachment {
    EmailAttachment {
        mime_type: SECURE_PACKAGE_MIME_TYPE.to_owned(),
        inline_attachment: false,
        ..attachment.clone()
    }
}

#[cfg(test)]
mod tests {
    use crate::{EmailAddress, EncryptionStatus, Error, InternetMessageFields};

    use super::Rfc822Codec;

    #[test_log::test]
    fn encrypted_requires_crypto_collaborator() {
        let codec = Rfc822Codec::new();
        let fields = InternetMessageFields::new()
            .with_from([EmailAddress::new("from@localhost")])
            .with_body("secret")
            .with_encryption_status(EncryptionStatus::Encrypted);

        let err = codec.encode_to_internet_message_data(&fields).unwrap_err();
        assert!(matches!(err, Error::MissingCryptoCollaboratorError));
        assert_eq!(
            err.to_string(),
            "EmailCryptoService is required to encrypt email message data"
        );

        let err = codec
            .process_message_data(&fields, EncryptionStatus::Encrypted, &[])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "EmailCryptoService is required to encrypt email message data"
        );
    }

    #[test_log::test]
    fn unencrypted_ignores_fields_status() {
        let codec = Rfc822Codec::new();
        let fields = InternetMessageFields::new()
            .with_body("Hello")
            .with_encryption_status(EncryptionStatus::Encrypted);

        let bytes = codec
            .process_message_data(&fields, EncryptionStatus::Unencrypted, &[])
            .unwrap();
        let parsed = codec.parse_internet_message_data(&bytes).unwrap();

        assert_eq!(parsed.body, "Hello");
        assert_eq!(parsed.encryption_status, EncryptionStatus::Unencrypted);
    }
}

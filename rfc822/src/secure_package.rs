//! # Secure package
//!
//! Module dedicated to end-to-end encrypted message bodies. A secure
//! package is a set of ordinary attachments: one key exchange per
//! recipient, carrying the message content key sealed for that
//! recipient, and one body, carrying the message sealed with the
//! content key.

use std::{collections::HashSet, sync::Arc};

use envelope::{KeyInfo, KeyPrimitives, PublicKeyInfo, Sealer};
use tracing::{debug, trace};

use crate::{EmailAttachment, Error, Result};

/// The content id of key exchange attachments.
pub const KEY_EXCHANGE_CONTENT_ID: &str = "securekeyexchangedata@sudomail.com";

/// The content id of the body attachment.
pub const BODY_CONTENT_ID: &str = "securebody@sudomail.com";

/// The file name extension of key exchange attachments, appended to
/// the recipient key id.
pub const KEY_EXCHANGE_EXTENSION: &str = ".key-exchange";

/// The file name of the body attachment.
pub const BODY_FILE_NAME: &str = "secure-body";

/// The MIME type of secure package attachments.
pub const SECURE_PACKAGE_MIME_TYPE: &str = "application/octet-stream";

/// The attachments of an end-to-end encrypted message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SecurePackage {
    pub key_attachments: Vec<EmailAttachment>,
    pub body_attachment: EmailAttachment,
}

impl SecurePackage {
    /// Find the secure package among the given attachments.
    ///
    /// Returns `None` when no body attachment is found.
    pub fn from_attachments(attachments: &[EmailAttachment]) -> Option<Self> {
        let body_attachment = attachments
            .iter()
            .find(|attachment| attachment.content_id == BODY_CONTENT_ID)?
            .clone();

        let key_attachments = attachments
            .iter()
            .filter(|attachment| attachment.content_id == KEY_EXCHANGE_CONTENT_ID)
            .cloned()
            .collect();

        Some(Self {
            key_attachments,
            body_attachment,
        })
    }

    /// Turn the package into attachments, key exchanges first.
    pub fn into_attachments(self) -> Vec<EmailAttachment> {
        let mut attachments = self.key_attachments;
        attachments.push(self.body_attachment);
        attachments
    }

    /// The key ids of the recipients able to open the package.
    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.key_attachments.iter().filter_map(key_id)
    }

    fn key_attachment(&self, id: &str) -> Option<&EmailAttachment> {
        self.key_attachments
            .iter()
            .find(|attachment| key_id(attachment) == Some(id))
    }
}

fn key_id(attachment: &EmailAttachment) -> Option<&str> {
    attachment.file_name.strip_suffix(KEY_EXCHANGE_EXTENSION)
}

fn package_attachment(file_name: String, content_id: &str, data: Vec<u8>) -> EmailAttachment {
    EmailAttachment {
        file_name,
        content_id: content_id.to_owned(),
        mime_type: SECURE_PACKAGE_MIME_TYPE.to_owned(),
        inline_attachment: false,
        data,
    }
}

/// The builder and opener of secure packages.
#[derive(Clone, Debug)]
pub struct SecurePackageBuilder {
    sealer: Sealer,
}

impl SecurePackageBuilder {
    pub fn new(primitives: Arc<dyn KeyPrimitives>) -> Self {
        Self::from_sealer(Sealer::new(primitives))
    }

    pub fn from_sealer(sealer: Sealer) -> Self {
        Self { sealer }
    }

    /// Build a secure package containing the given body, readable by
    /// the given recipients.
    ///
    /// Recipients sharing the same key id get a single key exchange.
    pub fn build(&self, body: &[u8], recipients: &[PublicKeyInfo]) -> Result<SecurePackage> {
        if recipients.is_empty() {
            return Err(Error::EmptyRecipientsError);
        }

        debug!("building secure package for {} recipient(s)", recipients.len());

        let content_key = self.sealer.generate_content_key()?;

        let mut key_ids = HashSet::new();
        let mut key_attachments = Vec::with_capacity(recipients.len());

        for recipient in recipients {
            if !key_ids.insert(recipient.key_id.as_str()) {
                debug!("skipping duplicate recipient key {}", recipient.key_id);
                continue;
            }

            let sealed = self.sealer.seal_for_recipient(recipient, &content_key)?;
            let file_name = format!("{}{KEY_EXCHANGE_EXTENSION}", recipient.key_id);
            key_attachments.push(package_attachment(
                file_name,
                KEY_EXCHANGE_CONTENT_ID,
                sealed.into_bytes(),
            ));
        }

        let sealed_body = self.sealer.seal_with_content_key(&content_key, body)?;
        trace!("sealed body of {} bytes", sealed_body.len());

        Ok(SecurePackage {
            key_attachments,
            body_attachment: package_attachment(
                BODY_FILE_NAME.to_owned(),
                BODY_CONTENT_ID,
                sealed_body,
            ),
        })
    }

    /// Open the given secure package using the given key, and return
    /// the body.
    pub fn open(&self, package: &SecurePackage, key_info: &KeyInfo) -> Result<Vec<u8>> {
        debug!("opening secure package with key {}", key_info.key_id);

        let key_attachment = package
            .key_attachment(&key_info.key_id)
            .ok_or_else(|| Error::KeyNotFoundError(key_info.key_id.clone()))?;

        let content_key = self.sealer.unseal(key_info, &key_attachment.data)?;
        let body = self
            .sealer
            .unseal_with_content_key(&content_key, &package.body_attachment.data)?;

        Ok(body)
    }
}

//! # Message
//!
//! Module dedicated to the message fields exchanged with the codec.

use crate::address::EmailAddress;

/// The body of encrypted messages, as transmitted.
pub const ENCRYPTED_BODY_PLACEHOLDER: &str = "Encrypted message attached";

/// An attachment of a message, regular or inline.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub struct EmailAttachment {
    pub file_name: String,

    /// The content id, without angle brackets. May be empty.
    pub content_id: String,

    /// The MIME type. When empty, the type is guessed from the data
    /// while encoding.
    pub mime_type: String,

    /// Whether the attachment is referenced from the body (for
    /// example an image displayed by the HTML body).
    pub inline_attachment: bool,

    pub data: Vec<u8>,
}

impl EmailAttachment {
    /// Create a new regular attachment.
    pub fn new(file_name: impl ToString, mime_type: impl ToString, data: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.to_string(),
            content_id: String::new(),
            mime_type: mime_type.to_string(),
            inline_attachment: false,
            data: data.into(),
        }
    }

    /// Create a new inline attachment.
    pub fn inline(
        file_name: impl ToString,
        content_id: impl ToString,
        mime_type: impl ToString,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.to_string(),
            content_id: content_id.to_string(),
            mime_type: mime_type.to_string(),
            inline_attachment: true,
            data: data.into(),
        }
    }

    pub fn with_content_id(mut self, id: impl ToString) -> Self {
        self.content_id = id.to_string();
        self
    }
}

/// The encryption status of a message.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum EncryptionStatus {
    #[default]
    Unencrypted,
    Encrypted,
}

/// The fields of an internet message.
///
/// Missing address headers are represented by empty lists, a missing
/// subject by `None`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case", default)
)]
pub struct InternetMessageFields {
    pub from: Vec<EmailAddress>,
    pub to: Vec<EmailAddress>,
    pub cc: Vec<EmailAddress>,
    pub bcc: Vec<EmailAddress>,
    pub reply_to: Vec<EmailAddress>,
    pub subject: Option<String>,
    pub body: String,
    pub is_html: bool,
    pub attachments: Vec<EmailAttachment>,
    pub inline_attachments: Vec<EmailAttachment>,
    pub encryption_status: EncryptionStatus,
}

impl InternetMessageFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty() || !self.inline_attachments.is_empty()
    }

    pub fn with_from(mut self, addrs: impl IntoIterator<Item = EmailAddress>) -> Self {
        self.from = addrs.into_iter().collect();
        self
    }

    pub fn with_to(mut self, addrs: impl IntoIterator<Item = EmailAddress>) -> Self {
        self.to = addrs.into_iter().collect();
        self
    }

    pub fn with_cc(mut self, addrs: impl IntoIterator<Item = EmailAddress>) -> Self {
        self.cc = addrs.into_iter().collect();
        self
    }

    pub fn with_bcc(mut self, addrs: impl IntoIterator<Item = EmailAddress>) -> Self {
        self.bcc = addrs.into_iter().collect();
        self
    }

    pub fn with_reply_to(mut self, addrs: impl IntoIterator<Item = EmailAddress>) -> Self {
        self.reply_to = addrs.into_iter().collect();
        self
    }

    pub fn with_subject(mut self, subject: impl ToString) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    /// Set a plain text body.
    pub fn with_body(mut self, body: impl ToString) -> Self {
        self.body = body.to_string();
        self.is_html = false;
        self
    }

    /// Set an HTML body.
    pub fn with_html_body(mut self, body: impl ToString) -> Self {
        self.body = body.to_string();
        self.is_html = true;
        self
    }

    pub fn with_attachment(mut self, attachment: EmailAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn with_inline_attachment(mut self, attachment: EmailAttachment) -> Self {
        self.inline_attachments.push(attachment);
        self
    }

    pub fn with_encryption_status(mut self, status: EncryptionStatus) -> Self {
        self.encryption_status = status;
        self
    }

    /// Build the fields of the outer message carrying the given
    /// secure package attachments in place of the body.
    pub(crate) fn to_encrypted_outer(&self, attachments: Vec<EmailAttachment>) -> Self {
        Self {
            from: self.from.clone(),
            to: self.to.clone(),
            cc: self.cc.clone(),
            bcc: self.bcc.clone(),
            reply_to: self.reply_to.clone(),
            subject: self.subject.clone(),
            body: ENCRYPTED_BODY_PLACEHOLDER.to_owned(),
            is_html: false,
            attachments,
            inline_attachments: Vec::new(),
            encryption_status: EncryptionStatus::Encrypted,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::EmailAddress;

    use super::{EmailAttachment, EncryptionStatus, InternetMessageFields};

    #[test]
    fn has_attachments() {
        let fields = InternetMessageFields::new().with_body("Hello");
        assert!(!fields.has_attachments());

        let fields = fields
            .clone()
            .with_inline_attachment(EmailAttachment::inline("a.png", "a", "image/png", b"png".to_vec()));
        assert!(fields.has_attachments());
    }

    #[test]
    fn encrypted_outer() {
        let fields = InternetMessageFields::new()
            .with_from([EmailAddress::new("from@localhost")])
            .with_subject("Secret")
            .with_html_body("<b>secret</b>")
            .with_inline_attachment(EmailAttachment::inline("a.png", "a", "image/png", b"png".to_vec()));

        let outer = fields.to_encrypted_outer(vec![]);
        assert_eq!(outer.from, fields.from);
        assert_eq!(outer.subject.as_deref(), Some("Secret"));
        assert_eq!(outer.body, "Encrypted message attached");
        assert!(!outer.is_html);
        assert!(!outer.has_attachments());
        assert_eq!(outer.encryption_status, EncryptionStatus::Encrypted);
    }
}

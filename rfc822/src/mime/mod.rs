//! # MIME tree
//!
//! Module dedicated to the MIME structure of messages. Messages are
//! represented as a tree of tagged nodes, built from message fields
//! by the [compiler] and read from parsed messages by the
//! [interpreter].

pub mod compiler;
pub mod header;
pub mod interpreter;

#[doc(inline)]
pub use self::{
    compiler::{build_tree, render},
    header::{RawHeaders, ENCRYPTION_HEADER, ENCRYPTION_HEADER_VALUE},
    interpreter::{collect, read_tree, Collected},
};
use crate::EmailAttachment;

/// A node of the MIME tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MimeNode {
    /// A text part, candidate for the message body.
    Text(TextPart),

    /// A multipart node and its children.
    Multipart(MultipartNode),

    /// A leaf part carrying an attachment.
    Attachment(AttachmentPart),

    /// An embedded message, like the original message of a delivery
    /// failure report.
    Embedded(EmbeddedMessage),
}

/// A `text/plain` or `text/html` part.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TextPart {
    pub content: String,
    pub is_html: bool,
}

impl TextPart {
    pub fn new(content: impl ToString, is_html: bool) -> Self {
        Self {
            content: content.to_string(),
            is_html,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        if self.is_html {
            "text/html"
        } else {
            "text/plain"
        }
    }
}

/// A `multipart/*` node.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MultipartNode {
    /// The subtype, for example `mixed` or `related`.
    pub subtype: String,
    pub children: Vec<MimeNode>,
}

impl MultipartNode {
    pub fn new(subtype: impl ToString, children: Vec<MimeNode>) -> Self {
        Self {
            subtype: subtype.to_string(),
            children,
        }
    }

    pub fn mixed(children: Vec<MimeNode>) -> Self {
        Self::new("mixed", children)
    }

    pub fn related(children: Vec<MimeNode>) -> Self {
        Self::new("related", children)
    }
}

/// A leaf part carrying an attachment. The inline flag of the
/// attachment decides its `Content-Disposition`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AttachmentPart {
    pub attachment: EmailAttachment,
}

/// A `message/rfc822` part.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EmbeddedMessage {
    pub subject: Option<String>,
    pub root: Box<MimeNode>,
}

//! # Codec configuration
//!
//! The configuration is immutable once given to a
//! [`crate::Rfc822Codec`], so a codec can be shared between threads.

/// The default maximum nesting depth of MIME parts.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// The default file name of attachments that declare none.
pub const DEFAULT_ATTACHMENT_NAME: &str = "noname";

/// The configuration of the RFC 822 codec.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case", default)
)]
pub struct CodecConfig {
    /// The maximum nesting depth of parts (multiparts and embedded
    /// messages) accepted while parsing. Deeper messages are
    /// considered malformed.
    pub max_depth: usize,

    /// The file name given to parsed attachments that have neither a
    /// file name nor a content id.
    pub default_attachment_name: String,

    /// Consider parts declared `inline` but without any `Content-ID`
    /// directly under a `multipart/mixed` as regular attachments.
    ///
    /// Some mail clients mark every attachment as inline, even when
    /// nothing in the body refers to it.
    pub demote_uncited_inline: bool,
}

impl CodecConfig {
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_default_attachment_name(mut self, name: impl ToString) -> Self {
        self.default_attachment_name = name.to_string();
        self
    }

    pub fn with_demote_uncited_inline(mut self, demote: bool) -> Self {
        self.demote_uncited_inline = demote;
        self
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            default_attachment_name: DEFAULT_ATTACHMENT_NAME.to_owned(),
            demote_uncited_inline: true,
        }
    }
}

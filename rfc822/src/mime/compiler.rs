//! # MIME compiler
//!
//! Module dedicated to compilation of message fields into raw
//! messages. Fields are first turned into a [`MimeNode`] tree, which
//! is then rendered using [`mail_builder`].

use base64::{engine::general_purpose::STANDARD, Engine};
use mail_builder::{
    headers::{content_type::ContentType, raw::Raw},
    mime::{BodyPart, MimePart},
    MessageBuilder,
};
use tracing::{debug, trace};

use super::{
    AttachmentPart, EmbeddedMessage, MimeNode, MultipartNode, TextPart, ENCRYPTION_HEADER,
    ENCRYPTION_HEADER_VALUE,
};
use crate::{address, EmailAttachment, EncryptionStatus, Error, InternetMessageFields, Result};

const BASE64_LINE_LEN: usize = 76;

/// Build the MIME tree of the given message fields.
///
/// The body alone gives a single-part message. Inline attachments
/// wrap the body into a `multipart/related`, regular attachments wrap
/// the result into a `multipart/mixed`.
pub fn build_tree(fields: &InternetMessageFields) -> MimeNode {
    let mut node = MimeNode::Text(TextPart::new(&fields.body, fields.is_html));

    if !fields.inline_attachments.is_empty() {
        let mut children = vec![node];
        children.extend(
            fields
                .inline_attachments
                .iter()
                .map(|attachment| attachment_node(attachment, true)),
        );
        node = MimeNode::Multipart(MultipartNode::related(children));
    }

    if !fields.attachments.is_empty() {
        let mut children = vec![node];
        children.extend(
            fields
                .attachments
                .iter()
                .map(|attachment| attachment_node(attachment, false)),
        );
        node = MimeNode::Multipart(MultipartNode::mixed(children));
    }

    node
}

fn attachment_node(attachment: &EmailAttachment, inline: bool) -> MimeNode {
    let mut attachment = attachment.clone();
    attachment.inline_attachment = inline;
    MimeNode::Attachment(AttachmentPart { attachment })
}

/// Render the given MIME tree into a [`MimePart`].
pub fn render(node: MimeNode) -> Result<MimePart<'static>> {
    match node {
        MimeNode::Text(text) => Ok(render_text(text)),
        MimeNode::Multipart(multi) => {
            let ctype = format!("multipart/{}", multi.subtype);
            let mut part = MimePart::new(ContentType::new(ctype), BodyPart::Multipart(Vec::new()));

            for child in multi.children {
                part.add_part(render(child)?)
            }

            Ok(part)
        }
        MimeNode::Attachment(part) => Ok(render_attachment(part.attachment)),
        MimeNode::Embedded(embedded) => {
            let bytes = write_message(MessageBuilder::new(), embedded)?;
            Ok(MimePart::new("message/rfc822", bytes).transfer_encoding("8bit"))
        }
    }
}

/// Text containing line breaks is base64-encoded, so that its line
/// endings are not normalized on the way.
fn render_text(text: TextPart) -> MimePart<'static> {
    if !text.content.contains(['\r', '\n']) {
        return MimePart::new(text.mime_type(), text.content);
    }

    trace!("encoding multiline {} part as base64", text.mime_type());
    let ctype = ContentType::new(text.mime_type()).attribute("charset", "utf-8");
    MimePart::new(ctype, encode_base64_lines(text.content.as_bytes())).transfer_encoding("base64")
}

fn write_message(mut builder: MessageBuilder<'_>, embedded: EmbeddedMessage) -> Result<Vec<u8>> {
    if let Some(subject) = embedded.subject {
        builder = builder.subject(subject);
    }

    builder
        .body(render(*embedded.root)?)
        .write_to_vec()
        .map_err(Error::WriteMessageError)
}

/// Attachments are always base64-encoded so that their bytes survive
/// transport unchanged.
fn render_attachment(attachment: EmailAttachment) -> MimePart<'static> {
    let EmailAttachment {
        file_name,
        content_id,
        mime_type,
        inline_attachment,
        data,
    } = attachment;

    let mime_type = if mime_type.trim().is_empty() {
        let guess = tree_magic_mini::from_u8(&data);
        debug!("guessed mime type {guess} for attachment {file_name:?}");
        guess.to_owned()
    } else {
        mime_type
    };

    let mut ctype = ContentType::new(mime_type);
    if !file_name.is_empty() {
        ctype = ctype.attribute("name", file_name.clone());
    }

    let mut part = MimePart::new(ctype, encode_base64_lines(&data)).transfer_encoding("base64");

    let mut disposition = ContentType::new(if inline_attachment {
        "inline"
    } else {
        "attachment"
    });
    if !file_name.is_empty() {
        disposition = disposition.attribute("filename", file_name);
    }
    part = part.header("Content-Disposition", disposition);

    if !content_id.is_empty() {
        part = part.cid(content_id);
    }

    part
}

fn encode_base64_lines(data: &[u8]) -> Vec<u8> {
    let encoded = STANDARD.encode(data);
    let mut lines = Vec::with_capacity(encoded.len() + encoded.len() / BASE64_LINE_LEN * 2);

    for (n, chunk) in encoded.as_bytes().chunks(BASE64_LINE_LEN).enumerate() {
        if n > 0 {
            lines.extend_from_slice(b"\r\n");
        }
        lines.extend_from_slice(chunk);
    }

    lines
}

/// Compile the given message fields into a raw message.
///
/// Address headers are written as they are encoded by
/// [`address::encode_list`]. The encryption header is only written
/// for encrypted fields, whose content is expected to already be the
/// secure package.
pub(crate) fn compile(fields: &InternetMessageFields) -> Result<Vec<u8>> {
    let mut builder = MessageBuilder::new();

    let address_headers = [
        ("From", &fields.from),
        ("Reply-To", &fields.reply_to),
        ("To", &fields.to),
        ("Cc", &fields.cc),
        ("Bcc", &fields.bcc),
    ];

    for (name, addrs) in address_headers {
        if !addrs.is_empty() {
            builder = builder.header(name, Raw::new(address::encode_list(addrs)));
        }
    }

    if let Some(subject) = &fields.subject {
        builder = builder.subject(subject.as_str());
    }

    if fields.encryption_status == EncryptionStatus::Encrypted {
        builder = builder.header(ENCRYPTION_HEADER, Raw::new(ENCRYPTION_HEADER_VALUE));
    }

    trace!(
        "compiling message with {} attachment(s) and {} inline attachment(s)",
        fields.attachments.len(),
        fields.inline_attachments.len(),
    );
    let tree = build_tree(fields);

    let bytes = builder
        .body(render(tree)?)
        .write_to_vec()
        .map_err(Error::WriteMessageError)?;

    debug!("compiled message of {} bytes", bytes.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use crate::{
        mime::{MimeNode, MultipartNode, TextPart},
        EmailAttachment, InternetMessageFields,
    };

    use super::{build_tree, encode_base64_lines, render};

    fn text(content: &str) -> MimeNode {
        MimeNode::Text(TextPart::new(content, false))
    }

    #[test]
    fn single_part() {
        let fields = InternetMessageFields::new().with_body("Hello");
        assert_eq!(build_tree(&fields), text("Hello"));
    }

    #[test]
    fn related_only() {
        let fields = InternetMessageFields::new()
            .with_html_body("<img src=\"cid:logo\">")
            .with_inline_attachment(EmailAttachment::inline("logo.png", "logo", "image/png", b"png".to_vec()));

        match build_tree(&fields) {
            MimeNode::Multipart(MultipartNode { subtype, children }) => {
                assert_eq!(subtype, "related");
                assert_eq!(children.len(), 2);
                assert!(matches!(&children[0], MimeNode::Text(t) if t.is_html));
                assert!(matches!(&children[1], MimeNode::Attachment(a) if a.attachment.inline_attachment));
            }
            node => panic!("unexpected node {node:?}"),
        }
    }

    #[test]
    fn mixed_wraps_related() {
        let fields = InternetMessageFields::new()
            .with_body("Hello")
            .with_inline_attachment(EmailAttachment::inline("logo.png", "logo", "image/png", b"png".to_vec()))
            .with_attachment(EmailAttachment::new("doc.pdf", "application/pdf", b"pdf".to_vec()))
            .with_attachment(EmailAttachment::new("data.bin", "", vec![0, 1, 2]));

        match build_tree(&fields) {
            MimeNode::Multipart(MultipartNode { subtype, children }) => {
                assert_eq!(subtype, "mixed");
                assert_eq!(children.len(), 3);
                assert!(matches!(&children[0], MimeNode::Multipart(m) if m.subtype == "related"));
                assert!(children[1..].iter().all(|child| matches!(
                    child,
                    MimeNode::Attachment(a) if !a.attachment.inline_attachment
                )));
            }
            node => panic!("unexpected node {node:?}"),
        }
    }

    #[test]
    fn multiline_text_as_base64() {
        let write = |content: &str| {
            let mut bytes = Vec::new();
            render(text(content)).unwrap().write_part(&mut bytes).unwrap();
            String::from_utf8(bytes).unwrap()
        };

        let part = write("one line");
        assert!(part.contains("one line"));
        assert!(!part.contains("base64"));

        let part = write("line one\nline two");
        assert!(part.contains("Content-Transfer-Encoding: base64\r\n"));
        assert!(part.contains("charset="));
        assert!(part.contains("utf-8"));
        assert!(part.contains("bGluZSBvbmUKbGluZSB0d28="));
    }

    #[test]
    fn base64_lines() {
        assert_eq!(encode_base64_lines(b""), b"");
        assert_eq!(encode_base64_lines(b"Hello"), b"SGVsbG8=");

        let lines = encode_base64_lines(&[0; 120]);
        let lines = String::from_utf8(lines).unwrap();
        let lines: Vec<_> = lines.split("\r\n").collect();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|line| line.len() <= 76));
    }
}

//! # MIME interpreter
//!
//! Module dedicated to interpretation of raw messages. Messages are
//! parsed using [`mail_parser`], validated, turned into a
//! [`MimeNode`] tree, then collected into message fields.

use base64::{engine::general_purpose::STANDARD, Engine};
use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::{debug, trace};

use super::{AttachmentPart, EmbeddedMessage, MimeNode, MultipartNode, RawHeaders, TextPart};
use crate::{
    address, CodecConfig, EmailAddress, EmailAttachment, EncryptionStatus, InternetMessageFields,
    Malformed, Result,
};

/// The message fields gathered from a MIME tree.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Collected {
    pub body: Option<TextPart>,
    pub attachments: Vec<EmailAttachment>,
    pub inline_attachments: Vec<EmailAttachment>,
}

/// Read the MIME tree of the given parsed message.
///
/// Every multipart must declare a boundary, and its closing delimiter
/// must be present in the raw message.
pub fn read_tree(config: &CodecConfig, msg: &Message) -> Result<MimeNode> {
    read_part(config, msg, msg.root_part(), None, 0)
}

fn read_part(
    config: &CodecConfig,
    msg: &Message,
    part: &MessagePart,
    parent: Option<&str>,
    depth: usize,
) -> Result<MimeNode> {
    if depth > config.max_depth {
        return Err(Malformed::TooDeep(config.max_depth).into());
    }

    let ctype = get_ctype(part);

    if let Some(subtype) = ctype.strip_prefix("multipart/") {
        let boundary = part
            .content_type()
            .and_then(|ctype| ctype.attribute("boundary"))
            .filter(|boundary| !boundary.is_empty())
            .ok_or_else(|| Malformed::MissingBoundary(ctype.clone()))?;

        let closing = format!("--{boundary}--");
        if !contains(msg.raw_message(), closing.as_bytes()) {
            return Err(Malformed::UnclosedBoundary(boundary.to_owned()).into());
        }

        let ids = match &part.body {
            PartType::Multipart(ids) => ids.as_slice(),
            _ => &[],
        };

        let mut children = Vec::with_capacity(ids.len());
        for id in ids {
            match msg.part(*id) {
                Some(child) => {
                    children.push(read_part(config, msg, child, Some(ctype.as_str()), depth + 1)?)
                }
                None => debug!("cannot find part {id} of {ctype}, skipping it"),
            }
        }

        return Ok(MimeNode::Multipart(MultipartNode::new(subtype, children)));
    }

    if let PartType::Message(embedded) = &part.body {
        trace!("reading embedded message at depth {depth}");
        let root = read_part(config, embedded, embedded.root_part(), None, depth + 1)?;
        return Ok(MimeNode::Embedded(EmbeddedMessage {
            subject: embedded.subject().map(ToOwned::to_owned),
            root: Box::new(root),
        }));
    }

    let disposition = part
        .content_disposition()
        .map(|disposition| disposition.ctype().to_ascii_lowercase());

    let content_id = part
        .content_id()
        .map(|id| id.trim().trim_start_matches('<').trim_end_matches('>'))
        .filter(|id| !id.is_empty());

    let is_text = ctype == "text/plain" || ctype == "text/html";
    let is_attachment = disposition.as_deref() == Some("attachment");

    if is_text && !is_attachment && part.attachment_name().is_none() {
        let content = match part.text_contents() {
            Some(text) => text.to_owned(),
            None => String::from_utf8_lossy(part.contents()).into_owned(),
        };
        return Ok(MimeNode::Text(TextPart::new(content, ctype == "text/html")));
    }

    let inline = match disposition.as_deref() {
        // inline images labelled as attachments
        Some("attachment") => content_id.is_some() && parent == Some("multipart/related"),
        Some("inline") => {
            let uncited = content_id.is_none() && parent == Some("multipart/mixed");
            !(uncited && config.demote_uncited_inline)
        }
        _ => content_id.is_some(),
    };

    let file_name = part
        .attachment_name()
        .or(content_id)
        .unwrap_or(config.default_attachment_name.as_str())
        .to_owned();

    trace!("reading {ctype} attachment {file_name:?} (inline: {inline})");

    Ok(MimeNode::Attachment(AttachmentPart {
        attachment: EmailAttachment {
            file_name,
            content_id: content_id.unwrap_or_default().to_owned(),
            mime_type: ctype,
            inline_attachment: inline,
            data: get_data(msg, part),
        },
    }))
}

/// Get the exact bytes carried by the given leaf part.
///
/// The parser turns text parts into UTF-8 strings, which loses bytes
/// of text attachments. Their content is decoded again from the raw
/// part instead, falling back to the parsed content when the transfer
/// encoding cannot be undone.
fn get_data(msg: &Message, part: &MessagePart) -> Vec<u8> {
    if !matches!(part.body, PartType::Text(_) | PartType::Html(_)) {
        return part.contents().to_vec();
    }

    let raw = msg
        .raw_message()
        .get(part.raw_body_offset()..part.raw_end_offset());

    let Some(raw) = raw else {
        debug!("cannot locate raw text part, using parsed content");
        return part.contents().to_vec();
    };

    let encoding = part
        .content_transfer_encoding()
        .map(|encoding| encoding.trim().to_ascii_lowercase());

    let data = match encoding.as_deref() {
        Some("base64") => decode_base64(raw),
        Some("quoted-printable") => decode_quoted_printable(raw),
        _ => Some(raw.to_vec()),
    };

    data.unwrap_or_else(|| {
        debug!("cannot decode raw text part, using parsed content");
        part.contents().to_vec()
    })
}

fn decode_base64(raw: &[u8]) -> Option<Vec<u8>> {
    let raw: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|byte| !byte.is_ascii_whitespace())
        .collect();

    STANDARD.decode(raw).ok()
}

fn decode_quoted_printable(raw: &[u8]) -> Option<Vec<u8>> {
    let mut data = Vec::with_capacity(raw.len());
    let mut bytes = raw.iter().copied().peekable();

    while let Some(byte) = bytes.next() {
        if byte != b'=' {
            data.push(byte);
            continue;
        }

        match bytes.next()? {
            // soft line breaks
            b'\r' if bytes.peek() == Some(&b'\n') => {
                bytes.next();
            }
            b'\n' => (),
            hi => {
                let lo = bytes.next()?;
                let hex = [hi, lo];
                let hex = std::str::from_utf8(&hex).ok()?;
                data.push(u8::from_str_radix(hex, 16).ok()?);
            }
        }
    }

    Some(data)
}

/// A text leaf met while walking the tree.
#[derive(Debug)]
struct Candidate {
    text: TextPart,
    embedded: bool,
    alternative: bool,

    /// The number of regular attachments collected before this
    /// candidate, so that leftovers keep their place in the message.
    position: usize,
}

#[derive(Debug, Default)]
struct Collector {
    candidates: Vec<Candidate>,
    attachments: Vec<EmailAttachment>,
    inline_attachments: Vec<EmailAttachment>,
}

impl Collector {
    fn walk(&mut self, node: &MimeNode, embedded: bool, alternative: bool) {
        match node {
            MimeNode::Text(text) => self.candidates.push(Candidate {
                text: text.clone(),
                embedded,
                alternative,
                position: self.attachments.len(),
            }),
            MimeNode::Multipart(multi) => {
                let alternative = alternative || multi.subtype == "alternative";
                for child in &multi.children {
                    self.walk(child, embedded, alternative)
                }
            }
            MimeNode::Attachment(part) if part.attachment.inline_attachment => {
                self.inline_attachments.push(part.attachment.clone())
            }
            MimeNode::Attachment(part) => self.attachments.push(part.attachment.clone()),
            MimeNode::Embedded(msg) => self.walk(&msg.root, true, false),
        }
    }

    fn find_body(&self, embedded: bool) -> Option<usize> {
        let find = |is_html: bool| {
            self.candidates
                .iter()
                .position(|c| c.embedded == embedded && c.text.is_html == is_html)
        };

        find(true).or_else(|| find(false))
    }
}

/// Collect the body and the attachments of the given MIME tree.
///
/// Text parts found outside embedded messages take precedence over
/// the ones found inside. Then HTML takes precedence over plain text,
/// then the first part found wins.
///
/// Text parts that are not the body become regular attachments,
/// unless they are alternatives of another text part.
pub fn collect(config: &CodecConfig, node: &MimeNode) -> Collected {
    let mut collector = Collector::default();
    collector.walk(node, false, false);

    let body = collector
        .find_body(false)
        .or_else(|| collector.find_body(true));

    let Collector {
        candidates,
        mut attachments,
        inline_attachments,
    } = collector;

    let mut leftovers = Vec::new();
    let mut body_part = None;

    for (index, candidate) in candidates.into_iter().enumerate() {
        if Some(index) == body {
            body_part = Some(candidate.text);
        } else if candidate.alternative {
            trace!("skipping alternative {} part", candidate.text.mime_type());
        } else {
            leftovers.push(candidate);
        }
    }

    for candidate in leftovers.into_iter().rev() {
        trace!("keeping extra {} part as attachment", candidate.text.mime_type());
        let attachment = EmailAttachment::new(
            &config.default_attachment_name,
            candidate.text.mime_type(),
            candidate.text.content,
        );
        attachments.insert(candidate.position, attachment);
    }

    Collected {
        body: body_part,
        attachments,
        inline_attachments,
    }
}

/// Interpret the given raw message as message fields.
pub(crate) fn interpret(config: &CodecConfig, bytes: &[u8]) -> Result<InternetMessageFields> {
    let headers = RawHeaders::read(bytes)?;

    let msg = MessageParser::new()
        .parse(bytes)
        .ok_or(Malformed::NoHeader)?;

    let tree = read_tree(config, &msg)?;
    let Collected {
        body,
        attachments,
        inline_attachments,
    } = collect(config, &tree);

    let body = body.unwrap_or_default();

    let encryption_status = if headers.is_encrypted() {
        EncryptionStatus::Encrypted
    } else {
        EncryptionStatus::Unencrypted
    };

    debug!(
        "interpreted {encryption_status:?} message with {} attachment(s) and {} inline attachment(s)",
        attachments.len(),
        inline_attachments.len(),
    );

    Ok(InternetMessageFields {
        from: get_addresses(&headers, "From"),
        to: get_addresses(&headers, "To"),
        cc: get_addresses(&headers, "Cc"),
        bcc: get_addresses(&headers, "Bcc"),
        reply_to: get_addresses(&headers, "Reply-To"),
        subject: msg.subject().map(ToOwned::to_owned),
        body: body.content,
        is_html: body.is_html,
        attachments,
        inline_attachments,
        encryption_status,
    })
}

fn get_addresses(headers: &RawHeaders, name: &str) -> Vec<EmailAddress> {
    match headers.get_joined(name) {
        Some(value) => {
            let list = address::parse_address_list(&value);
            if list.dropped > 0 {
                debug!("dropped {} invalid address(es) from {name} header", list.dropped);
            }
            list.addresses
        }
        None => Vec::new(),
    }
}

/// Get the lowercased `type/subtype` of the given part.
///
/// Parts without content type are text parts, unless the parser
/// decided otherwise.
fn get_ctype(part: &MessagePart) -> String {
    let ctype = part.content_type().map(|ctype| match ctype.subtype() {
        Some(stype) => format!("{}/{stype}", ctype.ctype()),
        None => ctype.ctype().to_owned(),
    });

    match ctype {
        Some(ctype) => ctype.to_ascii_lowercase(),
        None => match &part.body {
            PartType::Text(_) => String::from("text/plain"),
            PartType::Html(_) => String::from("text/html"),
            PartType::Message(_) => String::from("message/rfc822"),
            _ => String::from("application/octet-stream"),
        },
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}

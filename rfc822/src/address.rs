//! # Address module
//!
//! Module dedicated to RFC 822 / RFC 6854 address header values. It
//! contains a small, pure parser for address lists and the matching
//! formatter.
//!
//! Entries without a usable address are dropped instead of failing
//! the whole list. The number of dropped entries is available through
//! [`parse_address_list`].

use std::fmt;

use base64::{
    engine::general_purpose::{STANDARD, STANDARD_NO_PAD},
    Engine,
};
use tracing::debug;

/// The maximum number of bytes carried by an encoded word, which keeps
/// words under the 75 characters allowed by RFC 2047.
const ENCODED_WORD_CHUNK_LEN: usize = 45;

/// An email address with its optional display name.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub struct EmailAddress {
    /// The address itself, for example `foo@bar.com`.
    pub address: String,

    /// The optional display name, for example `Foo Bar`.
    pub display_name: Option<String>,
}

impl EmailAddress {
    pub fn new(address: impl ToString) -> Self {
        Self {
            address: address.to_string(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl ToString) -> Self {
        self.display_name = Some(name.to_string());
        self
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format(self))
    }
}

/// The result of parsing an address list.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AddressList {
    /// The successfully parsed addresses, in header order.
    pub addresses: Vec<EmailAddress>,

    /// The number of entries dropped because their address was blank
    /// or could not be parsed.
    pub dropped: usize,
}

/// Parse the given header value into a list of addresses, silently
/// dropping unparsable entries.
pub fn tokenize(value: &str) -> Vec<EmailAddress> {
    parse_address_list(value).addresses
}

/// Parse the given header value into a list of addresses, keeping
/// track of dropped entries.
pub fn parse_address_list(value: &str) -> AddressList {
    let mut list = AddressList::default();
    let mut entry = Entry::default();

    for token in Lexer::new(value) {
        match token {
            Token::Word(word) => entry.phrase.push(word),
            Token::Angle(addr) => entry.angle = Some(addr),
            Token::Comment(comment) => entry.comment = Some(comment),
            // the phrase before a colon is a group name
            Token::Colon => entry = Entry::default(),
            Token::Comma | Token::Semicolon => entry.finish(&mut list),
        }
    }

    entry.finish(&mut list);
    list
}

/// Format the given address as a header value.
///
/// Non-blank display names are quoted, with backslashes and double
/// quotes escaped.
pub fn format(addr: &EmailAddress) -> String {
    let address = strip_line_breaks(&addr.address);

    match addr.display_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => {
            let name = strip_line_breaks(name)
                .replace('\\', "\\\\")
                .replace('"', "\\\"");
            format!("\"{name}\" <{address}>")
        }
        _ => address,
    }
}

/// Format the given addresses as a comma-separated header value.
pub fn format_list(addrs: &[EmailAddress]) -> String {
    addrs.iter().map(format).collect::<Vec<_>>().join(", ")
}

/// Format the given address as an ASCII header value.
///
/// Same as [`format`], except that non-ASCII display names are written
/// as RFC 2047 encoded words instead of quoted strings.
pub fn encode(addr: &EmailAddress) -> String {
    let name = addr
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty() && !name.is_ascii());

    match name {
        Some(name) => {
            let name = encode_words(&strip_line_breaks(name));
            let address = strip_line_breaks(&addr.address);
            format!("{name} <{address}>")
        }
        None => format(addr),
    }
}

/// Format the given addresses as a comma-separated ASCII header
/// value.
pub fn encode_list(addrs: &[EmailAddress]) -> String {
    addrs.iter().map(encode).collect::<Vec<_>>().join(", ")
}

/// Encode the given text as space-separated UTF-8 base64 encoded
/// words. Words never split a character, so each one decodes on its
/// own.
fn encode_words(text: &str) -> String {
    let mut words = Vec::new();
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if i + c.len_utf8() - start > ENCODED_WORD_CHUNK_LEN {
            words.push(&text[start..i]);
            start = i;
        }
    }
    words.push(&text[start..]);

    words
        .into_iter()
        .map(|chunk| format!("=?utf-8?B?{}?=", STANDARD.encode(chunk)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_line_breaks(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct Word {
    text: String,
    quoted: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum Token {
    Word(Word),
    Angle(String),
    Comment(String),
    Comma,
    Colon,
    Semicolon,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(value: &'a str) -> Self {
        Self {
            chars: value.chars().peekable(),
        }
    }

    fn quoted(&mut self) -> String {
        let mut text = String::new();

        while let Some(c) = self.chars.next() {
            match c {
                '"' => break,
                '\\' => text.extend(self.chars.next()),
                '\r' | '\n' => (),
                c => text.push(c),
            }
        }

        text
    }

    fn comment(&mut self) -> String {
        let mut text = String::new();
        let mut depth = 1;

        while let Some(c) = self.chars.next() {
            match c {
                '(' => {
                    depth += 1;
                    text.push(c);
                }
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    text.push(c);
                }
                '\\' => text.extend(self.chars.next()),
                c => text.push(c),
            }
        }

        text
    }

    fn angle(&mut self) -> String {
        let mut text = String::new();
        let mut in_quote = false;

        while let Some(c) = self.chars.next() {
            match c {
                '"' => {
                    in_quote = !in_quote;
                    text.push(c);
                }
                '\\' if in_quote => {
                    text.push(c);
                    text.extend(self.chars.next());
                }
                '\r' | '\n' => (),
                '>' if !in_quote => break,
                c if c.is_whitespace() && !in_quote => (),
                c => text.push(c),
            }
        }

        text
    }

    fn atom(&mut self, first: char) -> String {
        let mut text = String::from(first);

        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() || "\"(),:;<>".contains(c) {
                break;
            }
            text.push(c);
            self.chars.next();
        }

        text
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let c = self.chars.next()?;

            let token = match c {
                c if c.is_whitespace() => continue,
                '"' => Token::Word(Word {
                    text: self.quoted(),
                    quoted: true,
                }),
                '(' => Token::Comment(self.comment()),
                '<' => Token::Angle(self.angle()),
                ',' => Token::Comma,
                ':' => Token::Colon,
                ';' => Token::Semicolon,
                // stray closing brackets carry no information
                ')' | '>' => continue,
                c => Token::Word(Word {
                    text: self.atom(c),
                    quoted: false,
                }),
            };

            return Some(token);
        }
    }
}

#[derive(Debug, Default)]
struct Entry {
    phrase: Vec<Word>,
    angle: Option<String>,
    comment: Option<String>,
}

impl Entry {
    fn is_empty(&self) -> bool {
        self.phrase.is_empty() && self.angle.is_none() && self.comment.is_none()
    }

    fn finish(&mut self, list: &mut AddressList) {
        let entry = std::mem::take(self);

        if entry.is_empty() {
            return;
        }

        let (address, display_name) = match entry.angle {
            Some(address) => {
                let name = decode_phrase(&entry.phrase);
                let name = if name.trim().is_empty() {
                    entry.comment
                } else {
                    Some(name)
                };
                (address, name)
            }
            None => {
                let address = entry
                    .phrase
                    .iter()
                    .map(|word| {
                        if word.quoted {
                            let text = word.text.replace('\\', "\\\\").replace('"', "\\\"");
                            format!("\"{text}\"")
                        } else {
                            word.text.clone()
                        }
                    })
                    .collect::<String>();
                (address, entry.comment)
            }
        };

        if !is_valid_address(&address) {
            debug!("dropping address entry with invalid address {address:?}");
            list.dropped += 1;
            return;
        }

        let display_name = display_name
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty());

        list.addresses.push(EmailAddress {
            address,
            display_name,
        });
    }
}

fn is_valid_address(address: &str) -> bool {
    let is_atext = |text: &str| {
        !text.is_empty()
            && !text
                .chars()
                .any(|c| c.is_whitespace() || c.is_control() || "<>(),;\"@".contains(c))
    };

    match address.rsplit_once('@') {
        // quoted local parts may hold any printable character
        Some((local, domain))
            if local.len() >= 2 && local.starts_with('"') && local.ends_with('"') =>
        {
            !local.chars().any(char::is_control) && is_atext(domain)
        }
        Some((local, domain)) => is_atext(local) && is_atext(domain),
        None => false,
    }
}

/// Join phrase words, decoding RFC 2047 encoded words.
///
/// Whitespace between two adjacent encoded words is not part of the
/// decoded text. Quoted strings are never decoded.
fn decode_phrase(words: &[Word]) -> String {
    let mut phrase = String::new();
    let mut prev_encoded = false;

    for word in words {
        let decoded = if word.quoted {
            None
        } else {
            decode_encoded_word(&word.text)
        };
        let encoded = decoded.is_some();

        if !phrase.is_empty() && !(prev_encoded && encoded) {
            phrase.push(' ');
        }

        match decoded {
            Some(text) => phrase.push_str(&text),
            None => phrase.push_str(&word.text),
        }

        prev_encoded = encoded;
    }

    phrase
}

/// Decode a single RFC 2047 encoded word `=?charset?encoding?text?=`.
///
/// Only UTF-8, US-ASCII and ISO-8859-1 charsets are supported; other
/// words are kept as they are.
fn decode_encoded_word(word: &str) -> Option<String> {
    let inner = word.strip_prefix("=?")?.strip_suffix("?=")?;
    let mut parts = inner.splitn(3, '?');
    let charset = parts.next()?.to_ascii_lowercase();
    let encoding = parts.next()?.to_ascii_lowercase();
    let text = parts.next()?;

    // strip the RFC 2231 language suffix
    let charset = charset.split('*').next().unwrap_or_default();

    let bytes = match encoding.as_str() {
        "b" => STANDARD
            .decode(text)
            .or_else(|_| STANDARD_NO_PAD.decode(text.trim_end_matches('=')))
            .ok()?,
        "q" => decode_q(text)?,
        _ => return None,
    };

    match charset {
        "utf-8" | "utf8" | "us-ascii" => String::from_utf8(bytes).ok(),
        "iso-8859-1" | "latin1" => Some(bytes.into_iter().map(char::from).collect()),
        charset => {
            debug!("cannot decode encoded word with unsupported charset {charset}");
            None
        }
    }
}

fn decode_q(text: &str) -> Option<Vec<u8>> {
    let mut bytes = Vec::with_capacity(text.len());
    let mut chars = text.bytes();

    while let Some(b) = chars.next() {
        match b {
            b'_' => bytes.push(b' '),
            b'=' => {
                let hi = chars.next()?;
                let lo = chars.next()?;
                let hex = [hi, lo];
                let hex = std::str::from_utf8(&hex).ok()?;
                bytes.push(u8::from_str_radix(hex, 16).ok()?);
            }
            b => bytes.push(b),
        }
    }

    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::{
        encode, encode_list, format, format_list, parse_address_list, tokenize, EmailAddress,
    };

    fn addr(address: &str, name: Option<&str>) -> EmailAddress {
        EmailAddress {
            address: address.into(),
            display_name: name.map(Into::into),
        }
    }

    #[test]
    fn bare_and_named() {
        assert_eq!(
            tokenize("Foo Bar <foo@bar.com>, ted.bear@toys.org"),
            vec![
                addr("foo@bar.com", Some("Foo Bar")),
                addr("ted.bear@toys.org", None),
            ]
        );
    }

    #[test]
    fn quoted_display_names() {
        assert_eq!(
            tokenize(r#""Bear, Ted" <ted@toys.org>, "Say \"hi\"" <hi@toys.org>"#),
            vec![
                addr("ted@toys.org", Some("Bear, Ted")),
                addr("hi@toys.org", Some("Say \"hi\"")),
            ]
        );
    }

    #[test]
    fn comments_and_folding() {
        assert_eq!(
            tokenize("foo@bar.com (Foo Bar),\r\n\t<baz@bar.com>"),
            vec![
                addr("foo@bar.com", Some("Foo Bar")),
                addr("baz@bar.com", None),
            ]
        );
    }

    #[test]
    fn groups() {
        assert_eq!(
            tokenize("Friends: a@x.org, B <b@x.org>;, c@x.org, Empty:;"),
            vec![
                addr("a@x.org", None),
                addr("b@x.org", Some("B")),
                addr("c@x.org", None),
            ]
        );
    }

    #[test]
    fn encoded_words() {
        assert_eq!(
            tokenize("=?UTF-8?B?RnLIr20=?= <from@localhost>, =?utf-8?q?T=C3=B3?= =?utf-8?q?_2?= <to@localhost>"),
            vec![
                addr("from@localhost", Some("Frȯm")),
                addr("to@localhost", Some("Tó 2")),
            ]
        );
    }

    #[test]
    fn invalid_entries_are_dropped() {
        let list = parse_address_list("nobody, <>, Foo <foo@bar.com>, \"Name\" <not an address>, @bar.com");
        assert_eq!(list.addresses, vec![addr("foo@bar.com", Some("Foo"))]);
        assert_eq!(list.dropped, 4);
    }

    #[test]
    fn empty_values() {
        for value in ["", "   ", ",", " , ,"] {
            let list = parse_address_list(value);
            assert!(list.addresses.is_empty());
            assert_eq!(list.dropped, 0);
        }
    }

    #[test]
    fn format_addresses() {
        assert_eq!(format(&addr("foo@bar.com", None)), "foo@bar.com");
        assert_eq!(format(&addr("foo@bar.com", Some("  "))), "foo@bar.com");
        assert_eq!(
            format(&addr("foo@bar.com", Some("Foo Bar"))),
            "\"Foo Bar\" <foo@bar.com>"
        );
        assert_eq!(
            format(&addr("foo@bar.com", Some(r#"a"b\c"#))),
            r#""a\"b\\c" <foo@bar.com>"#
        );
        assert_eq!(
            format_list(&[addr("a@x.org", None), addr("b@x.org", Some("B"))]),
            "a@x.org, \"B\" <b@x.org>"
        );
    }

    #[test]
    fn special_display_names_round_trip() {
        let addrs = vec![
            addr("a@x.org", Some(r#"Quote " and \ backslash"#)),
            addr("b@x.org", Some("<angle> & ampersand")),
            addr("c@x.org", Some("comma, semicolon; colon:")),
            addr("d@x.org", Some("(not a comment)")),
            addr("e@x.org", Some("Ünïcødé 名前")),
        ];

        assert_eq!(tokenize(&format_list(&addrs)), addrs);
    }

    #[test]
    fn quoted_encoded_words_are_literal() {
        let addrs = vec![
            addr("a@x.org", Some("=?utf-8?B?Zm9v?=")),
            addr("b@x.org", Some("=?utf-8?q?a?= =?utf-8?q?b?=")),
        ];

        assert_eq!(tokenize(&format_list(&addrs)), addrs);
        assert_eq!(
            tokenize("=?utf-8?B?Zm9v?= <a@x.org>"),
            vec![addr("a@x.org", Some("foo"))]
        );
    }

    #[test]
    fn quoted_local_parts() {
        assert_eq!(
            tokenize(r#""john doe"@x.org, John <"john doe"@x.org>, "a\"b"@x.org"#),
            vec![
                addr(r#""john doe"@x.org"#, None),
                addr(r#""john doe"@x.org"#, Some("John")),
                addr(r#""a\"b"@x.org"#, None),
            ]
        );

        let addrs = vec![
            addr(r#""john doe"@x.org"#, None),
            addr(r#""john doe"@x.org"#, Some("John Doe")),
        ];
        assert_eq!(tokenize(&format_list(&addrs)), addrs);

        let list = parse_address_list(r#"<a@b@x.org>, <"open@x.org>"#);
        assert!(list.addresses.is_empty());
        assert_eq!(list.dropped, 2);
    }

    #[test]
    fn encode_addresses() {
        assert_eq!(
            encode(&addr("foo@bar.com", Some("Foo Bar"))),
            "\"Foo Bar\" <foo@bar.com>"
        );
        assert_eq!(
            encode(&addr("from@localhost", Some("Frȯm"))),
            "=?utf-8?B?RnLIr20=?= <from@localhost>"
        );

        let addrs = vec![
            addr("a@x.org", Some("Ünïcødé 名前")),
            addr("b@x.org", Some("Ünï, \"cødé\" ".repeat(10).as_str())),
            addr("c@x.org", Some("Plain")),
            addr("d@x.org", None),
        ];

        let value = encode_list(&addrs);
        assert!(value.is_ascii());
        assert!(value
            .split_whitespace()
            .all(|word| word.len() <= 75));

        let expected: Vec<_> = addrs
            .iter()
            .map(|a| EmailAddress {
                display_name: a.display_name.as_ref().map(|name| name.trim().to_owned()),
                ..a.clone()
            })
            .collect();
        assert_eq!(tokenize(&value), expected);
    }
}

//! # Raw header
//!
//! Module dedicated to the top-level header block of a message, read
//! directly from its raw bytes.

use std::borrow::Cow;

use tracing::trace;

use crate::Malformed;

/// The header marking a message as end-to-end encrypted.
pub const ENCRYPTION_HEADER: &str = "X-Sudoplatform-Encryption";

/// The value of the [`ENCRYPTION_HEADER`].
pub const ENCRYPTION_HEADER_VALUE: &str = "sudoplatform";

/// The unfolded top-level headers of a message, in order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RawHeaders(Vec<(String, String)>);

impl RawHeaders {
    /// Read the header block of the given message.
    ///
    /// Reading stops at the first empty line. Continuation lines are
    /// unfolded into the previous header.
    pub fn read(bytes: &[u8]) -> Result<Self, Malformed> {
        let mut headers: Vec<(String, String)> = Vec::new();

        for (n, line) in bytes.split(|b| *b == b'\n').enumerate() {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            let line = String::from_utf8_lossy(line);

            if line.is_empty() {
                break;
            }

            // mbox separator
            if n == 0 && line.starts_with("From ") {
                continue;
            }

            if line.starts_with([' ', '\t']) {
                match headers.last_mut() {
                    Some((_, value)) => {
                        value.push(' ');
                        value.push_str(line.trim());
                        continue;
                    }
                    None => return Err(Malformed::UnreadableHeader(line.into_owned())),
                }
            }

            match parse_header_line(&line) {
                Some(header) => headers.push(header),
                None => return Err(Malformed::UnreadableHeader(line.into_owned())),
            }
        }

        if headers.is_empty() {
            return Err(Malformed::NoHeader);
        }

        trace!("read {} top-level headers", headers.len());
        Ok(Self(headers))
    }

    /// Get the values of all headers matching the given name, joined
    /// by commas.
    pub fn get_joined(&self, name: &str) -> Option<Cow<'_, str>> {
        let mut values = self
            .0
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str());

        let first = values.next()?;
        let rest: Vec<_> = values.collect();

        if rest.is_empty() {
            Some(Cow::Borrowed(first))
        } else {
            let mut joined = first.to_owned();
            for value in rest {
                joined.push_str(", ");
                joined.push_str(value);
            }
            Some(Cow::Owned(joined))
        }
    }

    /// Whether the message carries the encryption header.
    pub fn is_encrypted(&self) -> bool {
        self.0.iter().any(|(key, value)| {
            key.eq_ignore_ascii_case(ENCRYPTION_HEADER)
                && value.trim().eq_ignore_ascii_case(ENCRYPTION_HEADER_VALUE)
        })
    }
}

fn parse_header_line(line: &str) -> Option<(String, String)> {
    let (name, value) = line.split_once(':')?;

    let valid_name = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_graphic() && b != b':');

    if valid_name {
        Some((name.to_owned(), value.trim().to_owned()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use concat_with::concat_line;

    use crate::Malformed;

    use super::RawHeaders;

    #[test]
    fn unfold_and_join() {
        let msg = concat_line!(
            "From: from@localhost",
            "To: a@localhost,",
            "  b@localhost",
            "to: c@localhost",
            "X-Sudoplatform-Encryption: sudoplatform",
            "",
            "To: not-a-header@localhost",
        );

        let headers = RawHeaders::read(msg.as_bytes()).unwrap();
        assert_eq!(headers.get_joined("from").unwrap(), "from@localhost");
        assert_eq!(
            headers.get_joined("TO").unwrap(),
            "a@localhost, b@localhost, c@localhost"
        );
        assert_eq!(headers.get_joined("Cc"), None);
        assert!(headers.is_encrypted());
    }

    #[test]
    fn crlf_and_mbox_separator() {
        let msg = "From someone Mon Jan 1 00:00:00 2024\r\nSubject: hi\r\n\r\nbody";
        let headers = RawHeaders::read(msg.as_bytes()).unwrap();
        assert_eq!(headers.get_joined("subject").unwrap(), "hi");
        assert!(!headers.is_encrypted());
    }

    #[test]
    fn unreadable_headers() {
        assert_eq!(RawHeaders::read(b""), Err(Malformed::NoHeader));
        assert_eq!(RawHeaders::read(b"\r\nbody"), Err(Malformed::NoHeader));
        assert_eq!(
            RawHeaders::read(b"  folded: first\r\n\r\n"),
            Err(Malformed::UnreadableHeader("  folded: first".into()))
        );
        assert_eq!(
            RawHeaders::read(b"Subject: hi\r\nthis is not a header\r\n\r\n"),
            Err(Malformed::UnreadableHeader("this is not a header".into()))
        );
    }
}

//! Wire framing for usage notifications.

/// Upper bound on the bytes read from one connection.
pub const MAX_FRAME_BYTES: usize = 4096;

/// One decoded notification: who ran what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub user: String,
    pub command: String,
}

impl Frame {
    /// Decodes `<user> NUL <command>`.
    ///
    /// Exactly one NUL separator is accepted. Both parts are trimmed and
    /// decoded as UTF-8 with invalid sequences replaced.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let mut parts = bytes.split(|b| *b == 0);
        let user = parts.next()?;
        let command = parts.next()?;
        if parts.next().is_some() {
            return None;
        }

        Some(Self {
            user: decode(user),
            command: decode(command),
        })
    }
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_user_and_command() {
        let frame = Frame::parse(b"userA\0/software/bin/python script.py").unwrap();
        assert_eq!(frame.user, "userA");
        assert_eq!(frame.command, "/software/bin/python script.py");
    }

    #[test]
    fn trims_both_parts() {
        let frame = Frame::parse(b"  userA \n\0\t/bin/ls  \r\n").unwrap();
        assert_eq!(frame.user, "userA");
        assert_eq!(frame.command, "/bin/ls");
    }

    #[test]
    fn rejects_missing_separator() {
        assert_eq!(Frame::parse(b"userA /bin/ls"), None);
        assert_eq!(Frame::parse(b""), None);
    }

    #[test]
    fn rejects_extra_separators() {
        assert_eq!(Frame::parse(b"userA\0/bin/ls\0"), None);
        assert_eq!(Frame::parse(b"a\0b\0c"), None);
    }

    #[test]
    fn empty_parts_are_kept() {
        let frame = Frame::parse(b"\0").unwrap();
        assert_eq!(frame.user, "");
        assert_eq!(frame.command, "");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let frame = Frame::parse(b"user\xff\0cmd").unwrap();
        assert_eq!(frame.user, "user\u{fffd}");
    }
}

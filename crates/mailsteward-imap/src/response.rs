//! Structured parsing of raw IMAP response buffers.
//!
//! A response buffer holds every line the server sent for one command:
//! zero or more untagged lines followed by the tagged status line. The
//! parser classifies the status, keeps the untagged payload in receive
//! order, and never guesses when the tagged line is missing from a
//! multi-line buffer.

use crate::Error;

/// Status of the tagged line that completes a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed (operational error).
    No,
    /// Command failed (protocol/syntax error).
    Bad,
    /// The response could not be classified.
    Undefined,
}

/// A parsed IMAP response.
///
/// `lines` holds the untagged lines in the order received, each with
/// its leading `* ` (or `+ `) marker stripped; `status_line` is the
/// text following the status word on the tagged line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Classification of the tagged status line.
    pub status: Status,
    /// Trailing text of the tagged status line.
    pub status_line: String,
    /// Untagged lines, markers stripped, in receive order.
    pub lines: Vec<String>,
}

impl Response {
    /// Returns true when the server completed the command with OK.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Synthesizes the error matching a non-OK status.
    #[must_use]
    pub fn error(&self) -> Option<Error> {
        match self.status {
            Status::Ok => None,
            Status::No => Some(Error::No(self.status_line.clone())),
            Status::Bad => Some(Error::Bad(self.status_line.clone())),
            Status::Undefined => Some(Error::Undefined(self.status_line.clone())),
        }
    }

    fn undefined(reason: &str) -> Self {
        Self {
            status: Status::Undefined,
            status_line: reason.to_string(),
            lines: Vec::new(),
        }
    }
}

/// Parses a raw response buffer.
///
/// When `expected_tag` is given, the line starting with it is the
/// status line. Without a tag (the greeting), or when the tag does not
/// match, a buffer with exactly one non-empty line treats that line as
/// the status line; a multi-line buffer without the tag is ambiguous
/// and classified `Undefined` rather than guessing which line is
/// authoritative.
#[must_use]
pub fn parse_response(raw: &[u8], expected_tag: Option<&str>) -> Response {
    let text = String::from_utf8_lossy(raw);
    let mut lines: Vec<String> = Vec::new();
    for line in text.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let line = line
            .strip_prefix("* ")
            .or_else(|| line.strip_prefix("+ "))
            .unwrap_or(line);
        lines.push(line.to_string());
    }

    if lines.is_empty() {
        return Response::undefined("empty response");
    }

    let tagged_index = expected_tag.and_then(|tag| {
        lines.iter().position(|line| {
            line.strip_prefix(tag)
                .is_some_and(|rest| rest.starts_with(' '))
        })
    });

    let status_index = match tagged_index {
        Some(index) => index,
        None if lines.len() == 1 => 0,
        None => return Response::undefined("no tagged status line in response"),
    };

    let status_line = lines.remove(status_index);
    let rest = match expected_tag {
        Some(tag) if tagged_index.is_some() => status_line[tag.len()..].trim_start(),
        _ => status_line.as_str(),
    };

    let (word, remainder) = match rest.split_once(' ') {
        Some((word, remainder)) => (word, remainder.trim_start()),
        None => (rest, ""),
    };

    let status = if word.eq_ignore_ascii_case("OK") {
        Status::Ok
    } else if word.eq_ignore_ascii_case("NO") {
        Status::No
    } else if word.eq_ignore_ascii_case("BAD") {
        Status::Bad
    } else {
        Status::Undefined
    };

    // For an unclassifiable status keep the whole line as context.
    let status_line = if status == Status::Undefined {
        rest.to_string()
    } else {
        remainder.to_string()
    };

    Response {
        status,
        status_line,
        lines,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn tagged_ok_with_trailing_text() {
        let response = parse_response(b"a000001 OK done\r\n", Some("a000001"));
        assert_eq!(response.status, Status::Ok);
        assert_eq!(response.status_line, "done");
        assert!(response.lines.is_empty());
        assert!(response.is_ok());
        assert!(response.error().is_none());
    }

    #[test]
    fn tagged_no_carries_detail_text() {
        let response = parse_response(b"a000001 NO quota exceeded\r\n", Some("a000001"));
        assert_eq!(response.status, Status::No);
        let err = response.error().unwrap();
        assert_eq!(err.kind(), ErrorKind::NoResponse);
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn tagged_bad_is_bad_response() {
        let response = parse_response(b"a000001 BAD parse error\r\n", Some("a000001"));
        assert_eq!(response.status, Status::Bad);
        assert_eq!(response.error().unwrap().kind(), ErrorKind::BadResponse);
    }

    #[test]
    fn empty_input_is_undefined() {
        let response = parse_response(b"", Some("a000001"));
        assert_eq!(response.status, Status::Undefined);
        assert_eq!(
            response.error().unwrap().kind(),
            ErrorKind::UndefinedResponse
        );
    }

    #[test]
    fn status_word_is_case_insensitive() {
        let response = parse_response(b"a000001 ok Done\r\n", Some("a000001"));
        assert_eq!(response.status, Status::Ok);
    }

    #[test]
    fn untagged_lines_keep_order_and_lose_markers() {
        let raw = b"* CAPABILITY IMAP4rev1 STARTTLS\r\n* LIST (\\HasNoChildren) \".\" user.bob\r\na000002 OK Completed\r\n";
        let response = parse_response(raw, Some("a000002"));
        assert_eq!(response.status, Status::Ok);
        assert_eq!(
            response.lines,
            vec![
                "CAPABILITY IMAP4rev1 STARTTLS",
                "LIST (\\HasNoChildren) \".\" user.bob",
            ]
        );
    }

    #[test]
    fn greeting_without_tag_is_single_status_line() {
        let response = parse_response(b"* OK Dovecot ready.\r\n", None);
        assert_eq!(response.status, Status::Ok);
        assert_eq!(response.status_line, "Dovecot ready.");
    }

    #[test]
    fn preauth_greeting_is_undefined() {
        let response = parse_response(b"* PREAUTH logged in\r\n", None);
        assert_eq!(response.status, Status::Undefined);
        assert!(response.status_line.contains("PREAUTH"));
    }

    #[test]
    fn missing_tag_with_multiple_lines_is_ambiguous() {
        let raw = b"* CAPABILITY IMAP4rev1\r\n* OK still going\r\n";
        let response = parse_response(raw, Some("a000009"));
        assert_eq!(response.status, Status::Undefined);
        assert_eq!(
            response.error().unwrap().kind(),
            ErrorKind::UndefinedResponse
        );
    }

    #[test]
    fn tag_must_match_exactly() {
        // A longer token sharing the prefix is not our status line.
        let response = parse_response(b"a0000011 OK other\r\n", Some("a000001"));
        assert_eq!(response.status, Status::Undefined);
    }

    #[test]
    fn single_mismatched_line_is_treated_as_status_line() {
        // One line, no matching tag: classified from its first token.
        let response = parse_response(b"* BYE shutting down\r\n", Some("a000001"));
        assert_eq!(response.status, Status::Undefined);
        assert!(response.status_line.contains("BYE"));
    }
}

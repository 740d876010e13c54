//! IMAP command building and tag generation.
//!
//! Commands serialize to `TAG SP VERB [SP args] CRLF`. String arguments
//! are always sent as quoted strings with `"` and `\` escaped, so
//! user-supplied names and credentials cannot break out of the quoting.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::types::SpecialUse;

/// Tag generator for IMAP commands.
///
/// Tags correlate a command with the final status line of its response.
/// The sequence starts at 1 and renders as `a000001`, `a000002`, …;
/// it resets only when the session fully logs out.
#[derive(Debug, Default)]
pub struct TagGenerator {
    counter: AtomicU32,
}

impl TagGenerator {
    /// Creates a new tag generator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            counter: AtomicU32::new(0),
        }
    }

    /// Generates the next tag.
    ///
    /// # Panics
    ///
    /// Panics if the tag counter would overflow `u32::MAX`, which would
    /// require four billion commands in a single session.
    #[must_use]
    pub fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        if n == u32::MAX {
            panic!("tag counter overflow: generated {n} tags in this session");
        }
        format!("a{:06}", n + 1)
    }

    /// Returns how many tags have been handed out since the last reset.
    #[must_use]
    pub fn issued(&self) -> u32 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Resets the sequence to zero.
    pub fn reset(&self) {
        self.counter.store(0, Ordering::Relaxed);
    }
}

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// CAPABILITY command.
    Capability,
    /// STARTTLS command.
    StartTls,
    /// LOGIN command (plaintext credentials inside the session stream).
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// AUTHENTICATE command; continuation data is sent separately via
    /// [`continuation_line`].
    Authenticate {
        /// SASL mechanism name.
        mechanism: &'static str,
    },
    /// LOGOUT command.
    Logout,
    /// GETQUOTA command.
    GetQuota {
        /// Quota root, e.g. `user.bob`.
        root: String,
    },
    /// SETQUOTA command with a STORAGE resource limit.
    SetQuota {
        /// Quota root, e.g. `user.bob`.
        root: String,
        /// Storage limit in KiB.
        limit_kib: u64,
    },
    /// CREATE command, optionally with an RFC 6154 special-use attribute.
    Create {
        /// Full mailbox name.
        mailbox: String,
        /// Special-use attribute for the CREATE parameters.
        special_use: Option<SpecialUse>,
    },
    /// DELETE command.
    Delete {
        /// Full mailbox name.
        mailbox: String,
    },
    /// SUBSCRIBE command.
    Subscribe {
        /// Full mailbox name.
        mailbox: String,
    },
    /// SETACL command.
    SetAcl {
        /// Full mailbox name.
        mailbox: String,
        /// Identifier the rights are granted to.
        identifier: String,
        /// Rights string, e.g. `lrswipkxtecda`.
        rights: String,
    },
    /// DELETEACL command.
    DeleteAcl {
        /// Full mailbox name.
        mailbox: String,
        /// Identifier whose rights are removed.
        identifier: String,
    },
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern (sent verbatim).
        pattern: String,
    },
    /// ID command (RFC 2971) - client identification.
    Id {
        /// Field-value pairs; `None` sends `ID NIL`.
        parameters: Option<Vec<(String, String)>>,
    },
}

impl Command {
    /// Returns the command verb, for logging.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Authenticate { .. } => "AUTHENTICATE",
            Self::Logout => "LOGOUT",
            Self::GetQuota { .. } => "GETQUOTA",
            Self::SetQuota { .. } => "SETQUOTA",
            Self::Create { .. } => "CREATE",
            Self::Delete { .. } => "DELETE",
            Self::Subscribe { .. } => "SUBSCRIBE",
            Self::SetAcl { .. } => "SETACL",
            Self::DeleteAcl { .. } => "DELETEACL",
            Self::List { .. } => "LIST",
            Self::Id { .. } => "ID",
        }
    }

    /// Serializes the command to bytes with the given tag.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(tag.as_bytes());
        buf.push(b' ');

        match self {
            Self::Capability | Self::StartTls | Self::Logout => {
                buf.extend_from_slice(self.verb().as_bytes());
            }

            Self::Login { username, password } => {
                buf.extend_from_slice(b"LOGIN ");
                write_quoted(&mut buf, username);
                buf.push(b' ');
                write_quoted(&mut buf, password);
            }

            Self::Authenticate { mechanism } => {
                buf.extend_from_slice(b"AUTHENTICATE ");
                buf.extend_from_slice(mechanism.as_bytes());
            }

            Self::GetQuota { root } => {
                buf.extend_from_slice(b"GETQUOTA ");
                write_quoted(&mut buf, root);
            }

            Self::SetQuota { root, limit_kib } => {
                buf.extend_from_slice(b"SETQUOTA ");
                write_quoted(&mut buf, root);
                buf.extend_from_slice(format!(" (STORAGE {limit_kib})").as_bytes());
            }

            Self::Create {
                mailbox,
                special_use,
            } => {
                buf.extend_from_slice(b"CREATE ");
                write_quoted(&mut buf, mailbox);
                if let Some(attribute) = special_use {
                    buf.extend_from_slice(format!(" (USE ({}))", attribute.as_str()).as_bytes());
                }
            }

            Self::Delete { mailbox } => {
                buf.extend_from_slice(b"DELETE ");
                write_quoted(&mut buf, mailbox);
            }

            Self::Subscribe { mailbox } => {
                buf.extend_from_slice(b"SUBSCRIBE ");
                write_quoted(&mut buf, mailbox);
            }

            Self::SetAcl {
                mailbox,
                identifier,
                rights,
            } => {
                buf.extend_from_slice(b"SETACL ");
                write_quoted(&mut buf, mailbox);
                buf.push(b' ');
                write_quoted(&mut buf, identifier);
                buf.push(b' ');
                write_quoted(&mut buf, rights);
            }

            Self::DeleteAcl {
                mailbox,
                identifier,
            } => {
                buf.extend_from_slice(b"DELETEACL ");
                write_quoted(&mut buf, mailbox);
                buf.push(b' ');
                write_quoted(&mut buf, identifier);
            }

            Self::List { reference, pattern } => {
                buf.extend_from_slice(b"LIST ");
                write_quoted(&mut buf, reference);
                buf.push(b' ');
                buf.extend_from_slice(pattern.as_bytes());
            }

            Self::Id { parameters } => {
                buf.extend_from_slice(b"ID ");
                if let Some(params) = parameters {
                    buf.push(b'(');
                    for (i, (key, value)) in params.iter().enumerate() {
                        if i > 0 {
                            buf.push(b' ');
                        }
                        write_quoted(&mut buf, key);
                        buf.push(b' ');
                        write_quoted(&mut buf, value);
                    }
                    buf.push(b')');
                } else {
                    buf.extend_from_slice(b"NIL");
                }
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }
}

/// Builds a tag-less continuation line (base64 blobs during
/// authentication).
#[must_use]
pub fn continuation_line(data: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len() + 2);
    buf.extend_from_slice(data.as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf
}

/// Writes a quoted string with `"` and `\` escaped.
fn write_quoted(buf: &mut Vec<u8>, s: &str) {
    buf.push(b'"');
    for b in s.bytes() {
        if b == b'"' || b == b'\\' {
            buf.push(b'\\');
        }
        buf.push(b);
    }
    buf.push(b'"');
}

//! Core value types shared across the crate.

/// Storage quota of a mailbox, in kibibytes.
///
/// Both fields zero means no quota data is available for the account;
/// a successful GETQUOTA fills them in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quota {
    /// Storage currently in use.
    pub used_kib: u64,
    /// Storage limit.
    pub limit_kib: u64,
}

/// RFC 6154 special-use attribute for folder creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialUse {
    /// `\Archive` - archived messages.
    Archive,
    /// `\Drafts` - unfinished messages.
    Drafts,
    /// `\Junk` - spam.
    Junk,
    /// `\Sent` - sent messages.
    Sent,
    /// `\Trash` - deleted messages.
    Trash,
}

impl SpecialUse {
    /// Returns the wire form of the attribute.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Archive => "\\Archive",
            Self::Drafts => "\\Drafts",
            Self::Junk => "\\Junk",
            Self::Sent => "\\Sent",
            Self::Trash => "\\Trash",
        }
    }
}

impl std::fmt::Display for SpecialUse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

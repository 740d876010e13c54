//! # mailsteward-imap
//!
//! IMAP provisioning client for mail-account administration: quota
//! management, mailbox and folder creation, ACL grants and mailbox
//! listing against an IMAP4rev1 server (Cyrus, Dovecot).
//!
//! This is the plumbing an admin console drives when it turns a row in
//! its account database into an actual mailbox on the IMAP server. It
//! is not a mail reader: there is no SELECT, FETCH or IDLE here.
//!
//! ## Features
//!
//! - **Strictly sequential protocol driver**: one command in flight per
//!   session, tagged responses correlated and fully consumed before the
//!   next command is issued
//! - **TLS via rustls**: implicit TLS or mid-stream STARTTLS upgrade,
//!   with the post-handshake encrypted state verified
//! - **Negotiated authentication**: CRAM-MD5, SASL PLAIN, SASL LOGIN or
//!   the plaintext LOGIN command, strongest first
//! - **Modified UTF-7 folder names**: RFC 3501 section 5.1.3 encoding
//!   for non-ASCII folder names
//! - **Session-owned state**: capability cache, tag sequence and last
//!   error live on the session, never in globals
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailsteward_imap::{Config, Security, Session, SpecialUse};
//!
//! #[tokio::main]
//! async fn main() -> mailsteward_imap::Result<()> {
//!     let config = Config::builder("imap.example.com")
//!         .security(Security::Implicit)
//!         .credentials("admin", "secret")
//!         .build();
//!
//!     let mut session = Session::new(config);
//!     session.login().await?;
//!
//!     // Provision an account
//!     session.create_mailbox("bob").await?;
//!     session.set_quota("bob", 102_400).await?;
//!     session.set_acl("bob", "bob", "lrswipkxtecda").await?;
//!
//!     // Default folders with special-use attributes
//!     session.login_as("bob", "bobs-password").await?;
//!     session.create_folder("Entwürfe", Some(SpecialUse::Drafts)).await?;
//!
//!     session.logout().await
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//! Disconnected ── login() ──→ Connected ──(STARTTLS)──→ Authenticating
//!       ↑                                                     │
//!       └───────────────── logout() ←────────── LoggedIn ←────┘
//! ```
//!
//! ## Modules
//!
//! - [`config`]: host, security mode, separator and credential settings
//! - [`command`]: command builders and the tag sequence
//! - [`response`]: raw-buffer parsing into status plus data lines
//! - [`auth`]: SASL and plaintext authentication strategies
//! - [`session`]: the stateful client driving it all
//! - [`utf7`]: mailbox-name codec for non-ASCII folder names

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod command;
pub mod config;
mod error;
mod framed;
pub mod response;
pub mod session;
pub mod stream;
pub mod types;
pub mod utf7;

pub use auth::Mechanism;
pub use command::{Command, TagGenerator};
pub use config::{
    AuthPreference, Config, ConfigBuilder, HierarchySeparator, NetworkProtocol, Security,
};
pub use error::{Error, ErrorKind, Result};
pub use response::{Response, Status, parse_response};
pub use session::Session;
pub use stream::{ImapStream, connect_plain, connect_tls, create_tls_connector};
pub use types::{Quota, SpecialUse};

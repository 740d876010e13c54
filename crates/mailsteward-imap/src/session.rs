//! Stateful IMAP session driving connect, STARTTLS, authentication and
//! the provisioning command set.
//!
//! A session owns exactly one connection and is driven by one logical
//! thread of control: every operation takes `&mut self`, sends one
//! command and fully consumes its tagged response before returning.
//! There is no pipelining. Callers needing concurrent IMAP access use
//! one session per task.

#![allow(clippy::missing_errors_doc)]

use tracing::{debug, warn};

use crate::auth::Mechanism;
use crate::command::{Command, TagGenerator};
use crate::config::{Config, Security};
use crate::framed::FramedConnection;
use crate::response::{Response, Status, parse_response};
use crate::stream::{ImapStream, connect_plain, connect_tls};
use crate::types::{Quota, SpecialUse};
use crate::utf7;
use crate::{Error, Result};

/// IMAP provisioning session.
///
/// Lifecycle: `login()` connects, negotiates encryption and
/// authenticates; the provisioning operations require a completed
/// login; `logout()` releases the connection and resets the tag
/// sequence. Any transport failure aborts the connection, so a later
/// operation fails fast instead of working a half-open stream.
pub struct Session {
    config: Config,
    conn: Option<FramedConnection<ImapStream>>,
    tags: TagGenerator,
    logged_in: bool,
    capabilities: Vec<String>,
    last_error: Option<Error>,
}

impl Session {
    /// Creates a disconnected session for the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            conn: None,
            tags: TagGenerator::new(),
            logged_in: false,
            capabilities: Vec::new(),
            last_error: None,
        }
    }

    /// Returns the session configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns true once a login has completed and the connection is
    /// still alive.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.logged_in && self.conn.is_some()
    }

    /// Returns the most recent failure, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// Logs in with the administrator credentials from the
    /// configuration. Idempotent while logged in.
    pub async fn login(&mut self) -> Result<()> {
        let username = self.config.username.clone();
        let password = self.config.password.clone();
        self.login_as(&username, &password).await
    }

    /// Logs in with explicit credentials. Idempotent while logged in.
    ///
    /// Connects (plain or implicit TLS), validates the greeting,
    /// upgrades via STARTTLS when configured, negotiates the strongest
    /// advertised SASL mechanism and runs the credential exchange. Any
    /// failure aborts the connection and leaves the session logged out
    /// with the error recorded.
    pub async fn login_as(&mut self, username: &str, password: &str) -> Result<()> {
        if self.is_logged_in() {
            return Ok(());
        }

        match self.try_login(username, password).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.conn = None;
                self.logged_in = false;
                self.fail(err)
            }
        }
    }

    /// Logs out and disconnects.
    ///
    /// A no-op when not logged in. The LOGOUT command is best-effort:
    /// server-side failures are logged and the session still releases
    /// the connection, resets the tag sequence and clears the
    /// logged-in flag.
    pub async fn logout(&mut self) -> Result<()> {
        if !self.is_logged_in() {
            return Ok(());
        }

        match self.roundtrip(Command::Logout).await {
            Ok(response) if response.is_ok() => {}
            Ok(response) => {
                warn!(status_line = %response.status_line, "server complained about LOGOUT");
            }
            Err(err) => warn!(error = %err, "LOGOUT failed, releasing connection anyway"),
        }

        if let Some(conn) = self.conn.take() {
            conn.shutdown().await;
        }
        self.tags.reset();
        self.logged_in = false;
        Ok(())
    }

    /// Returns the cached capability set, reloading it from the server
    /// when empty or when `reload` is set.
    ///
    /// Tokens are uppercased; the literal `CAPABILITY` token is
    /// dropped. The cache is per-session, never shared.
    pub async fn capabilities(&mut self, reload: bool) -> Result<Vec<String>> {
        if !self.capabilities.is_empty() && !reload {
            return Ok(self.capabilities.clone());
        }
        self.load_capabilities().await?;
        Ok(self.capabilities.clone())
    }

    /// Checks a single capability, optionally reloading the set first.
    pub async fn has_capability(&mut self, name: &str, reload: bool) -> Result<bool> {
        let wanted = name.to_uppercase();
        let capabilities = self.capabilities(reload).await?;
        Ok(capabilities.iter().any(|token| *token == wanted))
    }

    /// Fetches the storage quota of a user mailbox.
    ///
    /// A response without a STORAGE resource is not an error: some
    /// accounts legitimately have no quota root, and the result is
    /// reported as zero usage and zero limit.
    pub async fn quota(&mut self, user: &str) -> Result<Quota> {
        self.require_login()?;
        let root = self.user_mailbox(user);
        let response = self.command_ok(Command::GetQuota { root }).await?;

        let quota = response.lines.first().and_then(|line| parse_quota_line(line));
        Ok(quota.unwrap_or_else(|| {
            warn!(user, "quota response carried no STORAGE resource");
            Quota::default()
        }))
    }

    /// Sets the storage quota of a user mailbox, in KiB.
    pub async fn set_quota(&mut self, user: &str, limit_kib: u64) -> Result<()> {
        self.require_login()?;
        let root = self.user_mailbox(user);
        self.command_ok(Command::SetQuota { root, limit_kib })
            .await
            .map(drop)
    }

    /// Creates the mailbox of a user account.
    pub async fn create_mailbox(&mut self, user: &str) -> Result<()> {
        self.require_login()?;
        let mailbox = self.user_mailbox(user);
        self.command_ok(Command::Create {
            mailbox,
            special_use: None,
        })
        .await
        .map(drop)
    }

    /// Deletes the mailbox of a user account.
    pub async fn delete_mailbox(&mut self, user: &str) -> Result<()> {
        self.require_login()?;
        let mailbox = self.user_mailbox(user);
        self.command_ok(Command::Delete { mailbox }).await.map(drop)
    }

    /// Creates and subscribes a folder below the logged-in account's
    /// INBOX, encoding the display name as modified UTF-7.
    ///
    /// The special-use attribute is only sent when the server
    /// advertises `SPECIAL-USE`.
    pub async fn create_folder(
        &mut self,
        name: &str,
        special_use: Option<SpecialUse>,
    ) -> Result<()> {
        self.require_login()?;

        let encoded = utf7::encode(name);
        if encoded.is_empty() && !name.is_empty() {
            return self.fail(Error::Internal(format!(
                "folder name {name:?} could not be encoded as modified UTF-7"
            )));
        }

        let separator = self.config.separator.as_char();
        let mailbox = format!("INBOX{separator}{encoded}");
        let special_use = special_use.filter(|_| {
            self.capabilities
                .iter()
                .any(|token| token == "SPECIAL-USE")
        });

        self.command_ok(Command::Create {
            mailbox: mailbox.clone(),
            special_use,
        })
        .await?;
        self.command_ok(Command::Subscribe { mailbox })
            .await
            .map(drop)
    }

    /// Grants rights on a user mailbox to an identifier.
    pub async fn set_acl(&mut self, user: &str, identifier: &str, rights: &str) -> Result<()> {
        self.require_login()?;
        let mailbox = self.user_mailbox(user);
        self.command_ok(Command::SetAcl {
            mailbox,
            identifier: identifier.to_string(),
            rights: rights.to_string(),
        })
        .await
        .map(drop)
    }

    /// Removes an identifier's rights from a user mailbox.
    pub async fn delete_acl(&mut self, user: &str, identifier: &str) -> Result<()> {
        self.require_login()?;
        let mailbox = self.user_mailbox(user);
        self.command_ok(Command::DeleteAcl {
            mailbox,
            identifier: identifier.to_string(),
        })
        .await
        .map(drop)
    }

    /// Lists user mailboxes, returning the names below the `user`
    /// hierarchy prefix.
    pub async fn list_mailboxes(&mut self) -> Result<Vec<String>> {
        self.require_login()?;
        let prefix = format!("user{}", self.config.separator.as_char());
        let response = self
            .command_ok(Command::List {
                reference: prefix.clone(),
                pattern: "%".to_string(),
            })
            .await?;

        let mut mailboxes = Vec::new();
        for line in &response.lines {
            if let Some(pos) = line.rfind(&prefix) {
                let name = line[pos + prefix.len()..].trim().trim_matches('"');
                if !name.is_empty() {
                    mailboxes.push(name.to_string());
                }
            }
        }
        Ok(mailboxes)
    }

    // --- internals ---------------------------------------------------

    async fn try_login(&mut self, username: &str, password: &str) -> Result<()> {
        let stream = match self.config.security {
            Security::Implicit => connect_tls(&self.config).await?,
            Security::StartTls | Security::None => connect_plain(&self.config).await?,
        };
        self.conn = Some(FramedConnection::new(
            stream,
            self.config.response_timeout,
        ));
        debug!(host = %self.config.host, port = self.config.port, "connected");

        self.read_greeting().await?;

        if self.config.security == Security::StartTls {
            self.starttls().await?;
        }

        self.load_capabilities().await?;
        let mechanism = Mechanism::negotiate(self.config.auth, &self.capabilities)?;
        debug!(?mechanism, "authenticating");

        let tag = self.tags.next();
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| Error::Internal("connection lost before authentication".to_string()))?;
        let response = mechanism.authenticate(conn, &tag, username, password).await?;
        if let Some(err) = response.error() {
            return Err(err);
        }

        self.logged_in = true;
        debug!(username, "logged in");

        if self.capabilities.iter().any(|token| token == "ID") {
            self.identify().await;
        }
        Ok(())
    }

    /// The unsolicited greeting must classify as OK; anything else
    /// aborts the session.
    async fn read_greeting(&mut self) -> Result<()> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| Error::Internal("not connected".to_string()))?;
        let line = conn.read_line().await?;
        let greeting = parse_response(&line, None);
        if greeting.status == Status::Ok {
            Ok(())
        } else {
            Err(Error::Undefined(format!(
                "unexpected greeting: {}",
                greeting.status_line
            )))
        }
    }

    async fn starttls(&mut self) -> Result<()> {
        self.load_capabilities().await?;
        if !self.capabilities.iter().any(|token| token == "STARTTLS") {
            return Err(Error::Encryption("STARTTLS is not supported".to_string()));
        }

        self.command_ok(Command::StartTls).await?;

        let conn = self
            .conn
            .take()
            .ok_or_else(|| Error::Internal("connection lost during STARTTLS".to_string()))?;
        let stream = conn.into_stream().upgrade_to_tls(&self.config).await?;
        self.conn = Some(FramedConnection::new(
            stream,
            self.config.response_timeout,
        ));
        debug!("connection upgraded to TLS");
        Ok(())
    }

    async fn load_capabilities(&mut self) -> Result<()> {
        let response = self.command_ok(Command::Capability).await?;
        let Some(line) = response.lines.first() else {
            return self.fail(Error::Response(
                "CAPABILITY response carried no data lines".to_string(),
            ));
        };

        self.capabilities = line
            .split_whitespace()
            .map(str::to_uppercase)
            .filter(|token| token != "CAPABILITY")
            .collect();
        Ok(())
    }

    /// Best-effort RFC 2971 client identification; failures are logged
    /// and never fail the login.
    async fn identify(&mut self) {
        let parameters = vec![
            ("name".to_string(), "mailsteward".to_string()),
            ("version".to_string(), env!("CARGO_PKG_VERSION").to_string()),
        ];
        match self
            .roundtrip(Command::Id {
                parameters: Some(parameters),
            })
            .await
        {
            Ok(response) if response.is_ok() => {}
            Ok(response) => {
                warn!(status_line = %response.status_line, "server rejected ID");
            }
            Err(err) => warn!(error = %err, "ID command failed"),
        }
    }

    /// One command/response exchange. Transport failures abort the
    /// connection so no half-open state survives.
    async fn roundtrip(&mut self, command: Command) -> Result<Response> {
        let tag = self.tags.next();
        debug!(tag = %tag, verb = command.verb(), "sending command");

        let result = match self.conn.as_mut() {
            Some(conn) => Self::exchange(conn, &command, &tag).await,
            None => Err(Error::Socket("not connected".to_string())),
        };
        match result {
            Ok(raw) => Ok(parse_response(&raw, Some(&tag))),
            Err(err) => {
                self.conn = None;
                self.logged_in = false;
                Err(err)
            }
        }
    }

    async fn exchange(
        conn: &mut FramedConnection<ImapStream>,
        command: &Command,
        tag: &str,
    ) -> Result<Vec<u8>> {
        conn.write_command(&command.serialize(tag)).await?;
        conn.read_until_tag(tag).await
    }

    /// Round-trip that also fails on a non-OK status, recording the
    /// error.
    async fn command_ok(&mut self, command: Command) -> Result<Response> {
        match self.roundtrip(command).await {
            Ok(response) => match response.error() {
                None => Ok(response),
                Some(err) => self.fail(err),
            },
            Err(err) => self.fail(err),
        }
    }

    fn require_login(&mut self) -> Result<()> {
        if self.is_logged_in() {
            Ok(())
        } else {
            self.fail(Error::Internal(
                "operation requires a logged-in session".to_string(),
            ))
        }
    }

    fn fail<T>(&mut self, err: Error) -> Result<T> {
        self.last_error = Some(err.clone());
        Err(err)
    }

    fn user_mailbox(&self, user: &str) -> String {
        format!("user{}{user}", self.config.separator.as_char())
    }
}

/// Scans a quota line for the STORAGE resource and the two integers
/// following it. Tokenization tolerates extra whitespace and differing
/// field order; parentheses are insignificant.
fn parse_quota_line(line: &str) -> Option<Quota> {
    let mut tokens = line
        .split_whitespace()
        .map(|token| token.trim_matches(|c| c == '(' || c == ')'));

    while let Some(token) = tokens.next() {
        if token.eq_ignore_ascii_case("STORAGE") {
            let used_kib = tokens.next()?.parse().ok()?;
            let limit_kib = tokens.next()?.parse().ok()?;
            return Some(Quota {
                used_kib,
                limit_kib,
            });
        }
    }
    None
}

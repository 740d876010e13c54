//! Connection and session configuration types.

use std::net::SocketAddr;
use std::time::Duration;

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption (port 143). **Not recommended for production.**
    None,
    /// Start with plaintext, upgrade with STARTTLS (port 143).
    StartTls,
    /// TLS from the start (port 993). **Recommended.**
    #[default]
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None | Self::StartTls => 143,
            Self::Implicit => 993,
        }
    }
}

/// Address-family preference for connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkProtocol {
    /// Use whatever the resolver returns.
    #[default]
    Any,
    /// IPv4 only.
    V4,
    /// IPv6 only.
    V6,
}

impl NetworkProtocol {
    /// Returns true if the address matches this preference.
    #[must_use]
    pub const fn matches(self, addr: &SocketAddr) -> bool {
        match self {
            Self::Any => true,
            Self::V4 => addr.is_ipv4(),
            Self::V6 => addr.is_ipv6(),
        }
    }
}

/// Mailbox hierarchy separator used by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HierarchySeparator {
    /// Netnews style, `user.name` (Cyrus default).
    #[default]
    Dot,
    /// UNIX style, `user/name`.
    Slash,
}

impl HierarchySeparator {
    /// Returns the separator character.
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Dot => '.',
            Self::Slash => '/',
        }
    }
}

/// Authentication mechanism preference.
///
/// `Auto` negotiates the strongest mechanism the server advertises;
/// forcing a specific SASL mechanism fails the login when the server
/// does not offer it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthPreference {
    /// Negotiate: CRAM-MD5, then PLAIN, then LOGIN, then the plaintext
    /// LOGIN command as a last resort.
    #[default]
    Auto,
    /// Force SASL CRAM-MD5.
    CramMd5,
    /// Force SASL PLAIN.
    Plain,
    /// Force SASL LOGIN.
    Login,
    /// Force the plaintext LOGIN command (no SASL).
    ClearText,
}

/// IMAP session configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Address-family preference.
    pub network_protocol: NetworkProtocol,
    /// Name the server certificate is verified against; defaults to
    /// `host` when unset.
    pub peer_name: Option<String>,
    /// Hierarchy separator the server uses. Fixed per session.
    pub separator: HierarchySeparator,
    /// Administrator account used by [`login`](crate::Session::login).
    pub username: String,
    /// Administrator password.
    pub password: String,
    /// Authentication mechanism preference.
    pub auth: AuthPreference,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Per-response read timeout.
    pub response_timeout: Duration,
}

impl Config {
    /// Creates a new configuration with implicit TLS on port 993.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self::builder(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }

    /// Returns the name used for TLS server-name verification.
    #[must_use]
    pub fn tls_peer_name(&self) -> &str {
        self.peer_name.as_deref().unwrap_or(&self.host)
    }
}

/// Builder for session configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Security,
    network_protocol: NetworkProtocol,
    peer_name: Option<String>,
    separator: HierarchySeparator,
    username: String,
    password: String,
    auth: AuthPreference,
    connect_timeout: Duration,
    response_timeout: Duration,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: Security::Implicit,
            network_protocol: NetworkProtocol::Any,
            peer_name: None,
            separator: HierarchySeparator::Dot,
            username: String::new(),
            password: String::new(),
            auth: AuthPreference::Auto,
            connect_timeout: Duration::from_secs(30),
            response_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Sets the address-family preference.
    #[must_use]
    pub const fn network_protocol(mut self, protocol: NetworkProtocol) -> Self {
        self.network_protocol = protocol;
        self
    }

    /// Sets the name the server certificate is verified against.
    #[must_use]
    pub fn peer_name(mut self, name: impl Into<String>) -> Self {
        self.peer_name = Some(name.into());
        self
    }

    /// Sets the mailbox hierarchy separator.
    #[must_use]
    pub const fn separator(mut self, separator: HierarchySeparator) -> Self {
        self.separator = separator;
        self
    }

    /// Sets the administrator credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Sets the authentication mechanism preference.
    #[must_use]
    pub const fn auth(mut self, auth: AuthPreference) -> Self {
        self.auth = auth;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-response read timeout.
    #[must_use]
    pub const fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        Config {
            port: self.port.unwrap_or_else(|| self.security.default_port()),
            host: self.host,
            security: self.security,
            network_protocol: self.network_protocol,
            peer_name: self.peer_name,
            separator: self.separator,
            username: self.username,
            password: self.password,
            auth: self.auth,
            connect_timeout: self.connect_timeout,
            response_timeout: self.response_timeout,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_ports() {
        assert_eq!(Security::None.default_port(), 143);
        assert_eq!(Security::StartTls.default_port(), 143);
        assert_eq!(Security::Implicit.default_port(), 993);
    }

    #[test]
    fn config_new() {
        let config = Config::new("imap.example.com");
        assert_eq!(config.host, "imap.example.com");
        assert_eq!(config.port, 993);
        assert_eq!(config.security, Security::Implicit);
        assert_eq!(config.separator, HierarchySeparator::Dot);
    }

    #[test]
    fn builder_defaults_port_from_security() {
        let config = Config::builder("imap.example.com")
            .security(Security::StartTls)
            .build();
        assert_eq!(config.port, 143);
    }

    #[test]
    fn builder_explicit_port_wins() {
        let config = Config::builder("imap.example.com")
            .security(Security::None)
            .port(10143)
            .build();
        assert_eq!(config.port, 10143);
    }

    #[test]
    fn peer_name_falls_back_to_host() {
        let config = Config::new("imap.example.com");
        assert_eq!(config.tls_peer_name(), "imap.example.com");

        let config = Config::builder("192.0.2.7")
            .peer_name("imap.example.com")
            .build();
        assert_eq!(config.tls_peer_name(), "imap.example.com");
    }

    #[test]
    fn network_protocol_matching() {
        let v4: SocketAddr = "192.0.2.1:143".parse().unwrap();
        let v6: SocketAddr = "[2001:db8::1]:143".parse().unwrap();
        assert!(NetworkProtocol::Any.matches(&v4));
        assert!(NetworkProtocol::Any.matches(&v6));
        assert!(NetworkProtocol::V4.matches(&v4));
        assert!(!NetworkProtocol::V4.matches(&v6));
        assert!(NetworkProtocol::V6.matches(&v6));
        assert!(!NetworkProtocol::V6.matches(&v4));
    }

    #[test]
    fn separator_chars() {
        assert_eq!(HierarchySeparator::Dot.as_char(), '.');
        assert_eq!(HierarchySeparator::Slash.as_char(), '/');
    }
}

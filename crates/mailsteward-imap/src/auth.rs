//! SASL and plaintext authentication strategies.
//!
//! Each mechanism is a short challenge/response sub-protocol layered on
//! the command codec. A server reply that is not a `+` continuation
//! aborts the exchange; the caller tears the connection down.

#![allow(clippy::missing_errors_doc)]

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::command::{Command, continuation_line};
use crate::config::AuthPreference;
use crate::framed::FramedConnection;
use crate::response::{Response, parse_response};
use crate::{Error, Result};

/// A concrete authentication mechanism, chosen once per login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mechanism {
    /// Plaintext `LOGIN user pass` command.
    ClearText,
    /// SASL LOGIN: base64 username and password on two continuations.
    Login,
    /// SASL PLAIN: one continuation carrying `\0user\0pass`.
    Plain,
    /// SASL CRAM-MD5: HMAC-MD5 over a server challenge.
    CramMd5,
}

impl Mechanism {
    /// Returns the SASL mechanism name, or `None` for the plaintext
    /// LOGIN command.
    #[must_use]
    pub const fn sasl_name(self) -> Option<&'static str> {
        match self {
            Self::ClearText => None,
            Self::Login => Some("LOGIN"),
            Self::Plain => Some("PLAIN"),
            Self::CramMd5 => Some("CRAM-MD5"),
        }
    }

    /// Selects the mechanism for this login.
    ///
    /// `Auto` picks the strongest advertised SASL mechanism, falling
    /// back to the plaintext LOGIN command when the server offers none
    /// of them. Forcing a SASL mechanism the server does not advertise
    /// is a configuration error.
    pub fn negotiate(preference: AuthPreference, capabilities: &[String]) -> Result<Self> {
        let advertised = |mechanism: Self| {
            mechanism.sasl_name().is_some_and(|name| {
                capabilities
                    .iter()
                    .any(|capability| capability == &format!("AUTH={name}"))
            })
        };

        match preference {
            AuthPreference::Auto => Ok([Self::CramMd5, Self::Plain, Self::Login]
                .into_iter()
                .find(|&mechanism| advertised(mechanism))
                .unwrap_or(Self::ClearText)),
            AuthPreference::ClearText => Ok(Self::ClearText),
            AuthPreference::CramMd5 if advertised(Self::CramMd5) => Ok(Self::CramMd5),
            AuthPreference::Plain if advertised(Self::Plain) => Ok(Self::Plain),
            AuthPreference::Login if advertised(Self::Login) => Ok(Self::Login),
            AuthPreference::CramMd5 | AuthPreference::Plain | AuthPreference::Login => {
                Err(Error::Config(
                    "server does not support the selected authentication mechanism".to_string(),
                ))
            }
        }
    }

    /// Runs the credential exchange and returns the final tagged
    /// response.
    pub async fn authenticate<S>(
        self,
        conn: &mut FramedConnection<S>,
        tag: &str,
        username: &str,
        password: &str,
    ) -> Result<Response>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self {
            Self::ClearText => {
                let cmd = Command::Login {
                    username: username.to_string(),
                    password: password.to_string(),
                };
                conn.write_command(&cmd.serialize(tag)).await?;
            }
            Self::Login => {
                let cmd = Command::Authenticate { mechanism: "LOGIN" };
                conn.write_command(&cmd.serialize(tag)).await?;
                expect_continuation(conn).await?;
                let user = STANDARD.encode(username.as_bytes());
                conn.write_command(&continuation_line(&user)).await?;
                expect_continuation(conn).await?;
                let pass = STANDARD.encode(password.as_bytes());
                conn.write_command(&continuation_line(&pass)).await?;
            }
            Self::Plain => {
                let cmd = Command::Authenticate { mechanism: "PLAIN" };
                conn.write_command(&cmd.serialize(tag)).await?;
                expect_continuation(conn).await?;
                let credentials = format!("\0{username}\0{password}");
                let encoded = STANDARD.encode(credentials.as_bytes());
                conn.write_command(&continuation_line(&encoded)).await?;
            }
            Self::CramMd5 => {
                let cmd = Command::Authenticate {
                    mechanism: "CRAM-MD5",
                };
                conn.write_command(&cmd.serialize(tag)).await?;
                let challenge = expect_continuation(conn).await?;
                let response = cram_md5_response(&challenge, username, password)?;
                conn.write_command(&continuation_line(&response)).await?;
            }
        }

        let raw = conn.read_until_tag(tag).await?;
        Ok(parse_response(&raw, Some(tag)))
    }
}

/// Reads one line and requires it to be a `+` continuation; returns the
/// text after the marker.
async fn expect_continuation<S>(conn: &mut FramedConnection<S>) -> Result<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let line = conn.read_line().await?;
    let text = String::from_utf8_lossy(&line);
    let text = text.trim();
    text.strip_prefix('+')
        .map(|rest| rest.trim().to_string())
        .ok_or_else(|| Error::Response(format!("expected continuation, got \"{text}\"")))
}

/// Builds the CRAM-MD5 continuation payload for a base64 challenge.
fn cram_md5_response(challenge_b64: &str, username: &str, password: &str) -> Result<String> {
    let challenge = STANDARD
        .decode(challenge_b64.as_bytes())
        .map_err(|err| Error::Response(format!("invalid CRAM-MD5 challenge: {err}")))?;

    use std::fmt::Write as _;
    let digest = hmac_md5(password.as_bytes(), &challenge);
    let mut hex = String::with_capacity(32);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }

    Ok(STANDARD.encode(format!("{username} {hex}").as_bytes()))
}

/// HMAC-MD5 per RFC 2104 (MD5 block size 64; long keys are pre-hashed).
fn hmac_md5(key: &[u8], message: &[u8]) -> [u8; 16] {
    const BLOCK: usize = 64;

    let mut key_block = [0u8; BLOCK];
    if key.len() > BLOCK {
        key_block[..16].copy_from_slice(&md5::compute(key).0);
    } else {
        key_block[..key.len()].copy_from_slice(key);
    }

    let mut inner = Vec::with_capacity(BLOCK + message.len());
    inner.extend(key_block.iter().map(|b| b ^ 0x36));
    inner.extend_from_slice(message);
    let inner_digest = md5::compute(&inner);

    let mut outer = Vec::with_capacity(BLOCK + 16);
    outer.extend(key_block.iter().map(|b| b ^ 0x5c));
    outer.extend_from_slice(&inner_digest.0);
    md5::compute(&outer).0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

    fn caps(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn negotiate_prefers_cram_md5() {
        let capabilities = caps(&["IMAP4REV1", "AUTH=PLAIN", "AUTH=CRAM-MD5", "AUTH=LOGIN"]);
        let mechanism = Mechanism::negotiate(AuthPreference::Auto, &capabilities).unwrap();
        assert_eq!(mechanism, Mechanism::CramMd5);
    }

    #[test]
    fn negotiate_priority_order() {
        let plain_login = caps(&["AUTH=PLAIN", "AUTH=LOGIN"]);
        assert_eq!(
            Mechanism::negotiate(AuthPreference::Auto, &plain_login).unwrap(),
            Mechanism::Plain
        );

        let login_only = caps(&["AUTH=LOGIN"]);
        assert_eq!(
            Mechanism::negotiate(AuthPreference::Auto, &login_only).unwrap(),
            Mechanism::Login
        );
    }

    #[test]
    fn negotiate_falls_back_to_clear_text() {
        let capabilities = caps(&["IMAP4REV1", "STARTTLS"]);
        assert_eq!(
            Mechanism::negotiate(AuthPreference::Auto, &capabilities).unwrap(),
            Mechanism::ClearText
        );
    }

    #[test]
    fn forcing_unadvertised_mechanism_is_config_error() {
        let capabilities = caps(&["AUTH=PLAIN"]);
        let err = Mechanism::negotiate(AuthPreference::CramMd5, &capabilities).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ConfigError);
    }

    #[test]
    fn hmac_md5_rfc2104_vectors() {
        // Test case 2 from RFC 2202.
        let digest = hmac_md5(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            digest,
            [
                0x75, 0x0c, 0x78, 0x3e, 0x6a, 0xb0, 0xb5, 0x03, 0xea, 0xa8, 0x6e, 0x31, 0x0a,
                0x5d, 0xb7, 0x38,
            ]
        );
    }

    #[test]
    fn cram_md5_rfc2195_example() {
        // The worked example from RFC 2195 section 2.
        let challenge = STANDARD.encode("<1896.697170952@postoffice.reston.mci.net>");
        let response = cram_md5_response(&challenge, "tim", "tanstaaftanstaaf").unwrap();
        let decoded = String::from_utf8(STANDARD.decode(response).unwrap()).unwrap();
        assert_eq!(decoded, "tim b913a602c7eda7a495b4e6e7334d3890");
    }

    #[test]
    fn cram_md5_rejects_bad_challenge() {
        let err = cram_md5_response("not base64!!!", "tim", "pass").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ResponseError);
    }

    #[tokio::test]
    async fn sasl_plain_exchange() {
        let expected = STANDARD.encode("\0bob\0hunter2");
        let mock = tokio_test::io::Builder::new()
            .write(b"a000001 AUTHENTICATE PLAIN\r\n")
            .read(b"+ \r\n")
            .write(format!("{expected}\r\n").as_bytes())
            .read(b"a000001 OK Logged in\r\n")
            .build();
        let mut conn = FramedConnection::new(mock, TIMEOUT);

        let response = Mechanism::Plain
            .authenticate(&mut conn, "a000001", "bob", "hunter2")
            .await
            .unwrap();
        assert!(response.is_ok());
    }

    #[tokio::test]
    async fn sasl_login_exchange() {
        let user = STANDARD.encode("bob");
        let pass = STANDARD.encode("hunter2");
        let mock = tokio_test::io::Builder::new()
            .write(b"a000001 AUTHENTICATE LOGIN\r\n")
            .read(b"+ VXNlcm5hbWU6\r\n")
            .write(format!("{user}\r\n").as_bytes())
            .read(b"+ UGFzc3dvcmQ6\r\n")
            .write(format!("{pass}\r\n").as_bytes())
            .read(b"a000001 OK Logged in\r\n")
            .build();
        let mut conn = FramedConnection::new(mock, TIMEOUT);

        let response = Mechanism::Login
            .authenticate(&mut conn, "a000001", "bob", "hunter2")
            .await
            .unwrap();
        assert!(response.is_ok());
    }

    #[tokio::test]
    async fn missing_continuation_aborts() {
        let mock = tokio_test::io::Builder::new()
            .write(b"a000001 AUTHENTICATE PLAIN\r\n")
            .read(b"a000001 NO as you were\r\n")
            .build();
        let mut conn = FramedConnection::new(mock, TIMEOUT);

        let err = Mechanism::Plain
            .authenticate(&mut conn, "a000001", "bob", "hunter2")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ResponseError);
    }

    #[tokio::test]
    async fn clear_text_sends_quoted_login() {
        let mock = tokio_test::io::Builder::new()
            .write(b"a000001 LOGIN \"bob\" \"hunter2\"\r\n")
            .read(b"a000001 OK Logged in\r\n")
            .build();
        let mut conn = FramedConnection::new(mock, TIMEOUT);

        let response = Mechanism::ClearText
            .authenticate(&mut conn, "a000001", "bob", "hunter2")
            .await
            .unwrap();
        assert!(response.is_ok());
    }
}

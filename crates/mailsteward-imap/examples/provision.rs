#![allow(clippy::expect_used, clippy::uninlined_format_args)]
//! Example: Provision a mail account end to end
//!
//! Connects to an IMAP server as the administrator, creates a user
//! mailbox, assigns a storage quota and grants the user full rights.
//!
//! ## Running
//!
//! ```bash
//! IMAP_HOST=imap.example.com IMAP_ADMIN=admin IMAP_PASSWORD=secret \
//!     cargo run --package mailsteward-imap --example provision -- bob
//! ```

use mailsteward_imap::{Config, Security, Session};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailsteward_imap=debug".into()),
        )
        .init();

    let user = std::env::args()
        .nth(1)
        .expect("usage: provision <username>");
    let host = std::env::var("IMAP_HOST").expect("IMAP_HOST not set");
    let admin = std::env::var("IMAP_ADMIN").expect("IMAP_ADMIN not set");
    let password = std::env::var("IMAP_PASSWORD").expect("IMAP_PASSWORD not set");

    let config = Config::builder(host)
        .security(Security::Implicit)
        .credentials(admin, password)
        .build();
    let mut session = Session::new(config);

    println!("Logging in...");
    session.login().await?;

    println!("Creating mailbox for {}...", user);
    session.create_mailbox(&user).await?;
    session.set_quota(&user, 102_400).await?;
    session.set_acl(&user, &user, "lrswipkxtecda").await?;

    let quota = session.quota(&user).await?;
    println!(
        "Provisioned {}: {} KiB used of {} KiB",
        user, quota.used_kib, quota.limit_kib
    );

    session.logout().await?;
    Ok(())
}

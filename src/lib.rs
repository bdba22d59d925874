//! # Warden
//!
//! `warden` authenticates people against either an LDAP directory or locally
//! stored bcrypt hashes, hands out sliding bearer sessions, runs the
//! password-change email flow for supervisors and keeps an audit trail of
//! every identity event.
//!
//! ## Layers
//!
//! - [`pool`]: fixed-capacity, fail-fast pools for the blocking directory and
//!   SMTP clients.
//! - [`directory`] and [`mail`]: the two external services, each behind a
//!   small connection trait so tests can swap in fakes.
//! - [`store`]: `PostgreSQL` transactions with a `db.query` span per statement.
//! - [`identity`]: users, roles, sessions, password changes, the audit trail
//!   and the [`identity::Identity`] workflows that tie them together.
//! - [`api`] and [`cli`]: the HTTP surface and the server binary wiring.
//!
//! ## Cancellation
//!
//! Every workflow takes a `CancellationToken`. The HTTP layer cancels it when a
//! request is dropped; blocking directory and mail work observes it through
//! [`cancel::run_blocking`] and always returns its pooled connection.

pub mod api;
pub mod cancel;
pub mod cli;
pub mod directory;
pub mod error;
pub mod identity;
pub mod mail;
pub mod pool;
pub mod store;

pub use error::{Error, Result};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

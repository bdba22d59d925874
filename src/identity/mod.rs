//! Users, sessions, password changes and the audit trail.
//!
//! Each workflow in [`Identity`] pings the store, opens one transaction, runs
//! its store steps and at most one directory or mail exchange, appends at most
//! one audit entry and then settles: commit on success, rollback (joined with
//! any rollback failure) otherwise.
//!
//! Sessions and password-change tokens share the same lifecycle rules:
//! - at most one row per user, enforced by `UNIQUE(user_id)`
//! - a row is expired when its expiry is strictly before now
//! - an expired row is deleted before a replacement is issued

pub mod audit;
pub mod batch;
pub mod config;
pub mod password_change;
pub mod role;
pub mod service;
pub mod session;
pub mod supervisor;
pub mod user;

pub use self::{
    audit::{AuditQuery, AuditSort, AuditView},
    batch::Batch,
    config::{IdentityConfig, Mode},
    password_change::{PasswordChange, PasswordChangeManager},
    role::{Authentication, Role, RoleKind, RoleView},
    service::Identity,
    session::{Session, SessionManager, SessionView},
    supervisor::Supervisor,
    user::{User, UserView},
};

use chrono::{DateTime, Utc};

/// Expiring exactly now is still valid.
#[must_use]
pub fn expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at < now
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn expiry_is_strictly_before_now() {
        let now = Utc::now();
        assert!(!expired(now, now));
        assert!(!expired(now + TimeDelta::seconds(1), now));
        assert!(expired(now - TimeDelta::microseconds(1), now));
    }
}

//! Directory authentication.
//!
//! A login against the directory is a two-phase exchange on one pooled
//! connection: the service account searches for the identity's DN, then the
//! same connection binds as that DN with the supplied password. The
//! connection is closed on release, so it is never reused while bound as a
//! user.

mod ldap;

pub use self::ldap::{LdapConnection, LdapConnector};

use secrecy::{ExposeSecret, SecretString};
use std::{fmt, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::{
    cancel::run_blocking,
    error::{Error, Result},
    pool::{Connector, Pool},
};

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Operations needed on an open, service-bound directory connection.
pub trait DirectoryConnection: Send + 'static {
    /// Subtree search under `base_dn` returning the DN of every match.
    ///
    /// # Errors
    /// Returns a directory error when the search fails.
    fn search(&mut self, base_dn: &str, filter: &str) -> Result<Vec<String>>;

    /// Bind as `dn`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCredentials`] when the directory rejects the
    /// password, a directory error otherwise.
    fn bind(&mut self, dn: &str, password: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct DirectoryConfig {
    url: String,
    base_dn: String,
    bind_dn: String,
    bind_password: SecretString,
    timeout: Duration,
}

impl fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("url", &self.url)
            .field("base_dn", &self.base_dn)
            .field("bind_dn", &self.bind_dn)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl DirectoryConfig {
    #[must_use]
    pub fn new(url: String) -> Self {
        Self {
            url,
            base_dn: String::new(),
            bind_dn: String::new(),
            bind_password: SecretString::from(String::new()),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }

    #[must_use]
    pub fn with_base_dn(mut self, base_dn: String) -> Self {
        self.base_dn = base_dn;
        self
    }

    #[must_use]
    pub fn with_bind_dn(mut self, bind_dn: String) -> Self {
        self.bind_dn = bind_dn;
        self
    }

    #[must_use]
    pub fn with_bind_password(mut self, bind_password: SecretString) -> Self {
        self.bind_password = bind_password;
        self
    }

    #[must_use]
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn base_dn(&self) -> &str {
        &self.base_dn
    }

    #[must_use]
    pub fn bind_dn(&self) -> &str {
        &self.bind_dn
    }

    #[must_use]
    pub fn bind_password(&self) -> &SecretString {
        &self.bind_password
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Search filter matching exactly one person entry by `uid`.
#[must_use]
pub fn identity_filter(identity: &str) -> String {
    format!(
        "(&(objectClass=organizationalPerson)(uid={}))",
        ldap3::ldap_escape(identity)
    )
}

pub struct Directory<C: Connector> {
    pool: Pool<C>,
    base_dn: String,
}

impl<C: Connector> Clone for Directory<C> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            base_dn: self.base_dn.clone(),
        }
    }
}

impl<C> Directory<C>
where
    C: Connector,
    C::Connection: DirectoryConnection,
{
    #[must_use]
    pub fn new(pool: Pool<C>, base_dn: String) -> Self {
        Self { pool, base_dn }
    }

    #[must_use]
    pub fn pool(&self) -> &Pool<C> {
        &self.pool
    }

    /// Verify `identity` and `password` against the directory.
    ///
    /// # Errors
    /// - [`Error::NoConnectionsAvailable`] when the pool is exhausted
    /// - [`Error::UserNotFound`] when the search matches zero or several entries
    /// - [`Error::InvalidCredentials`] when the bind is rejected
    /// - [`Error::Cancelled`] when `cancel` fires before the directory answers
    #[instrument(skip(self, password, cancel))]
    pub async fn authenticate(
        &self,
        identity: &str,
        password: &SecretString,
        cancel: &CancellationToken,
    ) -> Result<()> {
        // An empty password is an unauthenticated bind, which directories accept.
        if password.expose_secret().is_empty() {
            return Err(Error::InvalidCredentials);
        }

        let pool = self.pool.clone();
        let base_dn = self.base_dn.clone();
        let filter = identity_filter(identity);
        let password = SecretString::from(password.expose_secret().to_owned());

        // Search and bind share one blocking task, so the guard is only ever
        // dropped on the blocking pool.
        run_blocking(cancel, move || {
            let mut connection = pool.acquire()?;
            let mut found = connection.search(&base_dn, &filter)?;
            if found.len() != 1 {
                debug!(matches = found.len(), "identity search did not match one entry");
                return Err(Error::UserNotFound);
            }
            let dn = found.remove(0);
            debug!(%dn, "identity resolved");

            connection.bind(&dn, password.expose_secret())
        })
        .await
    }
}

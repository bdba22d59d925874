use ldap3::{LdapConn, LdapConnSettings, Scope, SearchEntry};
use secrecy::ExposeSecret;
use tracing::debug;

use super::{DirectoryConfig, DirectoryConnection};
use crate::{
    error::{Error, Result},
    pool::Connector,
};

// LDAP result code for a rejected simple bind.
const INVALID_CREDENTIALS: u32 = 49;

/// Opens LDAP connections bound as the service account.
#[derive(Debug, Clone)]
pub struct LdapConnector {
    config: DirectoryConfig,
}

impl LdapConnector {
    #[must_use]
    pub fn new(config: DirectoryConfig) -> Self {
        Self { config }
    }
}

pub struct LdapConnection {
    conn: LdapConn,
}

impl Connector for LdapConnector {
    type Connection = LdapConnection;

    fn open(&self) -> Result<LdapConnection> {
        let settings = LdapConnSettings::new().set_conn_timeout(self.config.timeout());
        let mut conn =
            LdapConn::with_settings(settings, self.config.url()).map_err(Error::directory)?;

        conn.simple_bind(
            self.config.bind_dn(),
            self.config.bind_password().expose_secret(),
        )
        .and_then(ldap3::LdapResult::success)
        .map_err(Error::directory)?;

        debug!(url = self.config.url(), "directory connection opened");

        Ok(LdapConnection { conn })
    }

    fn close(&self, connection: &mut LdapConnection) -> Result<()> {
        connection.conn.unbind().map_err(Error::directory)
    }
}

impl DirectoryConnection for LdapConnection {
    fn search(&mut self, base_dn: &str, filter: &str) -> Result<Vec<String>> {
        let (entries, _) = self
            .conn
            .search(base_dn, Scope::Subtree, filter, vec!["dn"])
            .and_then(ldap3::SearchResult::success)
            .map_err(Error::directory)?;

        Ok(entries
            .into_iter()
            .map(|entry| SearchEntry::construct(entry).dn)
            .collect())
    }

    fn bind(&mut self, dn: &str, password: &str) -> Result<()> {
        let outcome = self.conn.simple_bind(dn, password).map_err(Error::directory)?;

        if outcome.rc == INVALID_CREDENTIALS {
            return Err(Error::InvalidCredentials);
        }

        outcome.success().map(|_| ()).map_err(Error::directory)
    }
}

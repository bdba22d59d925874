use secrecy::SecretString;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    audit::{self, AuditQuery, AuditView},
    batch::Batch,
    config::IdentityConfig,
    password_change::PasswordChangeManager,
    role::Authentication,
    session::{Session, SessionManager},
    supervisor::Supervisor,
    user::User,
};
use crate::{
    directory::{Directory, DirectoryConnection},
    error::{Error, Result},
    mail::{self, MailConnection, Mailer, PASSWORD_CHANGE_REQUEST},
    pool::Connector,
    store::{Store, Transaction},
};

/// The application context: store, pools and the workflows built on them.
pub struct Identity<D: Connector, M: Connector> {
    store: Store,
    directory: Directory<D>,
    mailer: Mailer<M>,
    sessions: SessionManager,
    password_changes: PasswordChangeManager,
    config: IdentityConfig,
}

impl<D, M> Identity<D, M>
where
    D: Connector,
    D::Connection: DirectoryConnection,
    M: Connector,
    M::Connection: MailConnection,
{
    #[must_use]
    pub fn new(
        store: Store,
        directory: Directory<D>,
        mailer: Mailer<M>,
        config: IdentityConfig,
    ) -> Self {
        Self {
            store,
            directory,
            mailer,
            sessions: SessionManager::new(config.session_ttl()),
            password_changes: PasswordChangeManager::new(config.password_change_ttl()),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub fn directory(&self) -> &Directory<D> {
        &self.directory
    }

    #[must_use]
    pub fn mailer(&self) -> &Mailer<M> {
        &self.mailer
    }

    /// # Errors
    /// Returns a database error or [`Error::Cancelled`].
    pub async fn ping(&self, cancel: &CancellationToken) -> Result<()> {
        self.store.ping(cancel).await
    }

    // Every workflow pings before it opens its transaction.
    async fn begin(&self, cancel: &CancellationToken) -> Result<Transaction> {
        self.store.ping(cancel).await?;
        self.store.begin(cancel).await
    }

    /// Authenticate `identity` and issue (or refresh) its session.
    ///
    /// # Errors
    /// [`Error::UserNotFound`], [`Error::InvalidCredentials`],
    /// [`Error::NoConnectionsAvailable`], [`Error::Cancelled`] or an
    /// infrastructure error; the transaction is rolled back in every case.
    #[instrument(skip(self, password, cancel))]
    pub async fn login(
        &self,
        identity: &str,
        password: &SecretString,
        cancel: &CancellationToken,
    ) -> Result<(User, Session)> {
        let mut tx = self.begin(cancel).await?;
        let outcome = self.login_steps(&mut tx, identity, password, cancel).await;
        let (user, session) = tx.settle(outcome).await?;

        info!(user = user.id, "logged in");
        Ok((user, session))
    }

    async fn login_steps(
        &self,
        tx: &mut Transaction,
        identity: &str,
        password: &SecretString,
        cancel: &CancellationToken,
    ) -> Result<(User, Session)> {
        let user = User::find_by_identity(tx, identity).await?;

        match user.authentication() {
            Authentication::Directory => {
                self.directory
                    .authenticate(&user.identity, password, cancel)
                    .await?;
            }
            Authentication::Local => user.verify_password(password).await?,
        }

        let session = self.sessions.begin(tx, &user).await?;
        audit::record(tx, audit::LOGGED_IN, &user).await?;

        Ok((user, session))
    }

    /// Resolve a bearer token into its user and session, sliding the expiry.
    ///
    /// An expired session is deleted and the delete is committed before
    /// [`Error::SessionExpired`] is returned.
    ///
    /// # Errors
    /// [`Error::SessionInvalid`], [`Error::SessionExpired`] or an
    /// infrastructure error.
    pub async fn authenticate_session(
        &self,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<(User, Session)> {
        let token = Uuid::parse_str(token).map_err(|_| Error::SessionInvalid)?;

        let mut tx = self.begin(cancel).await?;
        let outcome = self.authenticate_session_steps(&mut tx, token).await;

        match outcome {
            Err(err) if matches!(err.cause(), Error::SessionExpired) => match tx.commit().await {
                Ok(()) => Err(err),
                Err(commit) => Err(err.join(commit)),
            },
            outcome => tx.settle(outcome).await,
        }
    }

    async fn authenticate_session_steps(
        &self,
        tx: &mut Transaction,
        token: Uuid,
    ) -> Result<(User, Session)> {
        let session = self.sessions.resume(tx, token).await?;
        let user = User::find_by_id(tx, session.user_id()).await?;
        Ok((user, session))
    }

    /// End `session` on behalf of `user`.
    ///
    /// # Errors
    /// [`Error::SessionInvalid`] when the session already ended, or an
    /// infrastructure error.
    pub async fn logout(
        &self,
        user: &User,
        session: &mut Session,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut tx = self.begin(cancel).await?;
        let outcome = async {
            self.sessions.end(&mut tx, session).await?;
            audit::record(&mut tx, audit::LOGGED_OUT, user).await?;
            Ok::<_, Error>(())
        }
        .await;
        tx.settle(outcome).await?;

        info!(user = user.id, "logged out");
        Ok(())
    }

    /// Issue a password-change token for the supervisor using `email` and
    /// mail them the link.
    ///
    /// # Errors
    /// [`Error::UserNotFound`], [`Error::PasswordChangeExists`],
    /// [`Error::NoConnectionsAvailable`], [`Error::Cancelled`], a template or
    /// mail error; nothing is stored unless the mail went out.
    #[instrument(skip(self, cancel))]
    pub async fn create_password_change(&self, email: &str, cancel: &CancellationToken) -> Result<()> {
        let mut tx = self.begin(cancel).await?;
        let outcome = self.create_password_change_steps(&mut tx, email, cancel).await;
        tx.settle(outcome).await
    }

    async fn create_password_change_steps(
        &self,
        tx: &mut Transaction,
        email: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let supervisor = Supervisor::find_by_email(tx, email).await?;
        let user = User::find_by_id(tx, supervisor.user_id).await?;
        let change = self.password_changes.begin(tx, &user).await?;

        let token = change.token.to_string();
        let link = mail::link(self.config.public_url(), &["password_change", &token]);
        let payload = json!({
            "firstName": supervisor.first_name,
            "passwordChangeURL": link.as_str(),
        });
        self.mailer
            .send(&supervisor.email, PASSWORD_CHANGE_REQUEST, &payload, cancel)
            .await?;

        audit::record(tx, audit::REQUESTED_PASSWORD_CHANGE, &user).await?;
        Ok(())
    }

    /// Consume `token` and set the new password.
    ///
    /// # Errors
    /// [`Error::PasswordChangeInvalid`], [`Error::UsesExternalDirectory`] or an
    /// infrastructure error.
    pub async fn fulfill_password_change(
        &self,
        token: &str,
        new_password: &SecretString,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let token = Uuid::parse_str(token).map_err(|_| Error::PasswordChangeInvalid)?;

        let mut tx = self.begin(cancel).await?;
        let outcome = async {
            let user = self
                .password_changes
                .fulfill(&mut tx, token, new_password)
                .await?;
            audit::record(&mut tx, audit::FULFILLED_PASSWORD_CHANGE, &user).await?;
            Ok::<_, Error>(user)
        }
        .await;
        let user = tx.settle(outcome).await?;

        info!(user = user.id, "password changed");
        Ok(())
    }

    /// # Errors
    /// Returns a database error or [`Error::Cancelled`].
    pub async fn audit_batch(
        &self,
        query: &AuditQuery,
        cancel: &CancellationToken,
    ) -> Result<Batch<AuditView>> {
        let mut tx = self.begin(cancel).await?;
        let outcome = audit::batch(&mut tx, query).await;
        tx.settle(outcome).await
    }
}

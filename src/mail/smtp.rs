use lettre::{
    Message, SmtpTransport, Transport,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use secrecy::{ExposeSecret, SecretString};
use std::{fmt, time::Duration};
use tracing::debug;

use super::{MailConnection, OutgoingMessage};
use crate::{
    error::{Error, Result},
    pool::Connector,
};

pub const DEFAULT_PORT: u16 = 587;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

#[derive(Clone)]
pub struct MailConfig {
    host: String,
    port: u16,
    user: String,
    password: SecretString,
    from: String,
    timeout: Duration,
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("from", &self.from)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl MailConfig {
    #[must_use]
    pub fn new(host: String, from: String) -> Self {
        Self {
            host,
            port: DEFAULT_PORT,
            user: String::new(),
            password: SecretString::from(String::new()),
            from,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: String) -> Self {
        self.user = user;
        self
    }

    #[must_use]
    pub fn with_password(mut self, password: SecretString) -> Self {
        self.password = password;
        self
    }

    #[must_use]
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    #[must_use]
    pub fn password(&self) -> &SecretString {
        &self.password
    }

    #[must_use]
    pub fn sender(&self) -> &str {
        &self.from
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Opens STARTTLS relay transports and checks the server answers.
#[derive(Debug, Clone)]
pub struct SmtpConnector {
    config: MailConfig,
}

impl SmtpConnector {
    #[must_use]
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }
}

pub struct SmtpConnection {
    transport: SmtpTransport,
}

impl Connector for SmtpConnector {
    type Connection = SmtpConnection;

    fn open(&self) -> Result<SmtpConnection> {
        let mut builder = SmtpTransport::starttls_relay(self.config.host())
            .map_err(Error::mail)?
            .port(self.config.port())
            .timeout(Some(self.config.timeout()));

        if !self.config.user().is_empty() {
            builder = builder.credentials(Credentials::new(
                self.config.user().to_string(),
                self.config.password().expose_secret().to_string(),
            ));
        }

        let transport = builder.build();
        if !transport.test_connection().map_err(Error::mail)? {
            return Err(Error::mail(anyhow::anyhow!(
                "smtp server {} did not accept the connection",
                self.config.host()
            )));
        }

        debug!(host = self.config.host(), "mail connection opened");

        Ok(SmtpConnection { transport })
    }

    fn close(&self, _connection: &mut SmtpConnection) -> Result<()> {
        // The transport holds no open session between sends.
        Ok(())
    }
}

impl MailConnection for SmtpConnection {
    fn send(&mut self, message: &OutgoingMessage) -> Result<()> {
        let message = build_message(message)?;
        self.transport.send(&message).map_err(Error::mail)?;
        Ok(())
    }
}

fn build_message(message: &OutgoingMessage) -> Result<Message> {
    let from: Mailbox = message.from.parse().map_err(Error::mail)?;
    let to: Mailbox = message.to.parse().map_err(Error::mail)?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(message.subject.as_str())
        .header(ContentType::TEXT_HTML)
        .body(message.html.clone())
        .map_err(Error::mail)
}

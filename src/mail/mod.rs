//! Templated mail dispatch over pooled SMTP connections.

pub mod smtp;
mod templates;

pub use self::smtp::{MailConfig, SmtpConnection, SmtpConnector};
pub use self::templates::{PASSWORD_CHANGE_REQUEST, Template, Templates};

use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use crate::{
    cancel::run_blocking,
    error::Result,
    pool::{Connector, Pool},
};

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Delivery over an open mail connection.
pub trait MailConnection: Send + 'static {
    /// Deliver one message.
    ///
    /// # Errors
    /// Returns a mail error when the server refuses the message.
    fn send(&mut self, message: &OutgoingMessage) -> Result<()>;
}

pub struct Mailer<C: Connector> {
    pool: Pool<C>,
    templates: Arc<Templates>,
    from: String,
    // Development mode delivers every message to `from`.
    redirect_to_sender: bool,
}

impl<C: Connector> Clone for Mailer<C> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            templates: Arc::clone(&self.templates),
            from: self.from.clone(),
            redirect_to_sender: self.redirect_to_sender,
        }
    }
}

impl<C> Mailer<C>
where
    C: Connector,
    C::Connection: MailConnection,
{
    #[must_use]
    pub fn new(pool: Pool<C>, templates: Templates, from: String) -> Self {
        Self {
            pool,
            templates: Arc::new(templates),
            from,
            redirect_to_sender: false,
        }
    }

    #[must_use]
    pub fn with_redirect_to_sender(mut self, redirect: bool) -> Self {
        self.redirect_to_sender = redirect;
        self
    }

    #[must_use]
    pub fn pool(&self) -> &Pool<C> {
        &self.pool
    }

    /// Render `template` with `payload` and deliver it to `recipient`.
    ///
    /// The message may still be delivered after `cancel` fires; only the wait
    /// is abandoned.
    ///
    /// # Errors
    /// Returns [`crate::Error::NoConnectionsAvailable`], the template error
    /// (nothing is sent), the delivery error, or [`crate::Error::Cancelled`].
    #[instrument(skip(self, payload, cancel), fields(template = template.name))]
    pub async fn send<P: Serialize>(
        &self,
        recipient: &str,
        template: Template,
        payload: &P,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let context = minijinja::Value::from_serialize(payload);
        let pool = self.pool.clone();
        let templates = Arc::clone(&self.templates);
        let from = self.from.clone();
        let to = if self.redirect_to_sender {
            debug!(recipient, "development mode, redirecting mail to sender");
            self.from.clone()
        } else {
            recipient.to_string()
        };

        run_blocking(cancel, move || {
            let mut connection = pool.acquire()?;
            let html = templates.render(template, context)?;
            let message = OutgoingMessage {
                from,
                to,
                subject: template.subject.to_string(),
                html,
            };
            connection.send(&message)?;
            debug!(to = %message.to, "mail delivered");
            connection.release()
        })
        .await
    }
}

/// Public link to `segments` under `base`.
#[must_use]
pub fn link(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

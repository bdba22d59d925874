use crate::{
    api,
    cli::{
        commands::{directory, identity, mail},
        telemetry,
    },
    directory::{Directory, DirectoryConfig, LdapConnector},
    identity::{Identity, IdentityConfig},
    mail::{MailConfig, Mailer, SmtpConnector, Templates},
    pool::Pool,
    store::{self, Store},
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub connections: u16,
    pub identity: identity::Options,
    pub directory: directory::Options,
    pub mail: mail::Options,
}

/// Execute the server action.
/// # Errors
/// Returns an error if configuration is invalid, the database is unreachable
/// or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let public_url = Url::parse(&args.identity.public_url).context("invalid public URL")?;
    let config = IdentityConfig::new(public_url)
        .with_mode(args.identity.mode)
        .with_session_ttl_seconds(args.identity.session_ttl_seconds)
        .with_password_change_ttl_seconds(args.identity.password_change_ttl_seconds);

    let store = Store::connect(&args.dsn, store::DEFAULT_MAX_CONNECTIONS)
        .await
        .context("Failed to connect to database")?;

    let capacity = usize::from(args.connections);

    let directory_config = DirectoryConfig::new(args.directory.url)
        .with_base_dn(args.directory.base_dn)
        .with_bind_dn(args.directory.bind_dn)
        .with_bind_password(args.directory.bind_password)
        .with_timeout_seconds(args.directory.timeout_seconds);
    let base_dn = directory_config.base_dn().to_string();
    let directory = Directory::new(
        Pool::new("ldap", LdapConnector::new(directory_config), capacity),
        base_dn,
    );

    let mut mail_config = MailConfig::new(args.mail.host, args.mail.from)
        .with_port(args.mail.port)
        .with_timeout_seconds(args.mail.timeout_seconds);
    if let Some(user) = args.mail.user {
        mail_config = mail_config.with_user(user);
    }
    if let Some(password) = args.mail.password {
        mail_config = mail_config.with_password(password);
    }
    let sender = mail_config.sender().to_string();
    let templates = Templates::new().context("Failed to load mail templates")?;
    let mailer = Mailer::new(
        Pool::new("smtp", SmtpConnector::new(mail_config), capacity),
        templates,
        sender,
    )
    .with_redirect_to_sender(config.mode().is_development());

    let service = Arc::new(Identity::new(store, directory, mailer, config));

    let result = api::serve(args.port, service).await;

    telemetry::shutdown_tracer();

    result
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        ("mode", args.identity.mode.to_string()),
        ("public_url", args.identity.public_url.clone()),
        ("connections", args.connections.to_string()),
        (
            "session_ttl_seconds",
            args.identity.session_ttl_seconds.to_string(),
        ),
        (
            "password_change_ttl_seconds",
            args.identity.password_change_ttl_seconds.to_string(),
        ),
        ("ldap_url", args.directory.url.clone()),
        ("ldap_base_dn", args.directory.base_dn.clone()),
        ("smtp", format!("{}:{}", args.mail.host, args.mail.port)),
        ("smtp_from", args.mail.from.clone()),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}

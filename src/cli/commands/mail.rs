use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::mail::smtp::{DEFAULT_PORT, DEFAULT_TIMEOUT_SECONDS};

pub const ARG_SMTP_HOST: &str = "smtp-host";
pub const ARG_SMTP_PORT: &str = "smtp-port";
pub const ARG_SMTP_USER: &str = "smtp-user";
pub const ARG_SMTP_PASSWORD: &str = "smtp-password";
pub const ARG_SMTP_FROM: &str = "smtp-from";
pub const ARG_SMTP_TIMEOUT_SECONDS: &str = "smtp-timeout-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<SecretString>,
    pub from: String,
    pub timeout_seconds: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if the relay host or sender is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let Some(host) = get_non_empty(ARG_SMTP_HOST) else {
            anyhow::bail!("missing required argument: --{ARG_SMTP_HOST}");
        };
        let Some(from) = get_non_empty(ARG_SMTP_FROM) else {
            anyhow::bail!("missing required argument: --{ARG_SMTP_FROM}");
        };

        Ok(Self {
            host,
            port: matches
                .get_one::<u16>(ARG_SMTP_PORT)
                .copied()
                .unwrap_or(DEFAULT_PORT),
            user: get_non_empty(ARG_SMTP_USER),
            password: get_non_empty(ARG_SMTP_PASSWORD).map(SecretString::from),
            from,
            timeout_seconds: matches
                .get_one::<u64>(ARG_SMTP_TIMEOUT_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SMTP_HOST)
                .long(ARG_SMTP_HOST)
                .help("SMTP relay host (STARTTLS)")
                .env("WARDEN_SMTP_HOST")
                .required(true),
        )
        .arg(
            Arg::new(ARG_SMTP_PORT)
                .long(ARG_SMTP_PORT)
                .help("SMTP relay port")
                .env("WARDEN_SMTP_PORT")
                .default_value("587")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_SMTP_USER)
                .long(ARG_SMTP_USER)
                .help("SMTP username")
                .env("WARDEN_SMTP_USER"),
        )
        .arg(
            Arg::new(ARG_SMTP_PASSWORD)
                .long(ARG_SMTP_PASSWORD)
                .help("SMTP password")
                .env("WARDEN_SMTP_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SMTP_FROM)
                .long(ARG_SMTP_FROM)
                .help("Sender mailbox, e.g. \"Warden <noreply@example.org>\"")
                .env("WARDEN_SMTP_FROM")
                .required(true),
        )
        .arg(
            Arg::new(ARG_SMTP_TIMEOUT_SECONDS)
                .long(ARG_SMTP_TIMEOUT_SECONDS)
                .help("SMTP connection and command timeout, in seconds")
                .env("WARDEN_SMTP_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

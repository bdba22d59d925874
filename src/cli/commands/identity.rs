use clap::{Arg, ArgMatches, Command};

use crate::identity::{
    Mode,
    config::{DEFAULT_PASSWORD_CHANGE_TTL_SECONDS, DEFAULT_SESSION_TTL_SECONDS},
};

pub const ARG_MODE: &str = "mode";
pub const ARG_PUBLIC_URL: &str = "public-url";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_PASSWORD_CHANGE_TTL_SECONDS: &str = "password-change-ttl-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub mode: Mode,
    pub public_url: String,
    pub session_ttl_seconds: u32,
    pub password_change_ttl_seconds: u32,
}

impl Options {
    /// # Errors
    /// Returns an error if required arguments are missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let public_url = match matches.get_one::<String>(ARG_PUBLIC_URL).cloned() {
            Some(value) if !value.trim().is_empty() => value,
            _ => anyhow::bail!("missing required argument: --{ARG_PUBLIC_URL}"),
        };

        Ok(Self {
            mode: matches.get_one::<Mode>(ARG_MODE).copied().unwrap_or_default(),
            public_url,
            session_ttl_seconds: matches
                .get_one::<u32>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_SESSION_TTL_SECONDS),
            password_change_ttl_seconds: matches
                .get_one::<u32>(ARG_PASSWORD_CHANGE_TTL_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_PASSWORD_CHANGE_TTL_SECONDS),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_MODE)
                .long(ARG_MODE)
                .help("Run mode: development or production")
                .long_help(
                    "Run mode. Development redirects every email to the sender and adds error details to API responses.",
                )
                .env("WARDEN_MODE")
                .default_value("production")
                .value_parser(|value: &str| value.parse::<Mode>()),
        )
        .arg(
            Arg::new(ARG_PUBLIC_URL)
                .long(ARG_PUBLIC_URL)
                .help("Public base URL used for emailed links")
                .env("WARDEN_PUBLIC_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Sliding session lifetime in seconds")
                .env("WARDEN_SESSION_TTL_SECONDS")
                .default_value("1200")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_PASSWORD_CHANGE_TTL_SECONDS)
                .long(ARG_PASSWORD_CHANGE_TTL_SECONDS)
                .help("Password change token lifetime in seconds")
                .env("WARDEN_PASSWORD_CHANGE_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
}

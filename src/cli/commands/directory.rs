use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::directory::DEFAULT_TIMEOUT_SECONDS;

pub const ARG_LDAP_URL: &str = "ldap-url";
pub const ARG_LDAP_BASE_DN: &str = "ldap-base-dn";
pub const ARG_LDAP_BIND_DN: &str = "ldap-bind-dn";
pub const ARG_LDAP_BIND_PASSWORD: &str = "ldap-bind-password";
pub const ARG_LDAP_TIMEOUT_SECONDS: &str = "ldap-timeout-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub url: String,
    pub base_dn: String,
    pub bind_dn: String,
    pub bind_password: SecretString,
    pub timeout_seconds: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if the directory URL is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let url = match matches.get_one::<String>(ARG_LDAP_URL).cloned() {
            Some(value) if !value.trim().is_empty() => value,
            _ => anyhow::bail!("missing required argument: --{ARG_LDAP_URL}"),
        };

        let get = |id: &str| matches.get_one::<String>(id).cloned().unwrap_or_default();

        Ok(Self {
            url,
            base_dn: get(ARG_LDAP_BASE_DN),
            bind_dn: get(ARG_LDAP_BIND_DN),
            bind_password: SecretString::from(get(ARG_LDAP_BIND_PASSWORD)),
            timeout_seconds: matches
                .get_one::<u64>(ARG_LDAP_TIMEOUT_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_LDAP_URL)
                .long(ARG_LDAP_URL)
                .help("LDAP server URL, e.g. ldaps://ldap.example.org:636")
                .env("WARDEN_LDAP_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_LDAP_BASE_DN)
                .long(ARG_LDAP_BASE_DN)
                .help("Search base for user lookups")
                .env("WARDEN_LDAP_BASE_DN"),
        )
        .arg(
            Arg::new(ARG_LDAP_BIND_DN)
                .long(ARG_LDAP_BIND_DN)
                .help("Service account DN used for searches")
                .env("WARDEN_LDAP_BIND_DN"),
        )
        .arg(
            Arg::new(ARG_LDAP_BIND_PASSWORD)
                .long(ARG_LDAP_BIND_PASSWORD)
                .help("Service account password")
                .env("WARDEN_LDAP_BIND_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_LDAP_TIMEOUT_SECONDS)
                .long(ARG_LDAP_TIMEOUT_SECONDS)
                .help("Connect timeout for directory connections, in seconds")
                .env("WARDEN_LDAP_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

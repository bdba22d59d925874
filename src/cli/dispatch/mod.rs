//! Maps validated CLI matches to the action to run.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_CONNECTIONS, ARG_DSN, ARG_PORT, directory, identity, mail};
use anyhow::{Context, Result};

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let connections = matches.get_one::<u16>(ARG_CONNECTIONS).copied().unwrap_or(3);

    Ok(Action::Server(Args {
        port,
        dsn,
        connections,
        identity: identity::Options::parse(matches)?,
        directory: directory::Options::parse(matches)?,
        mail: mail::Options::parse(matches)?,
    }))
}

//! Command-line argument dispatch.
//!
//! This module maps validated CLI arguments to the appropriate action, such
//! as starting the API server with its full configuration state.

use crate::cli::actions::{server::Args, Action};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let base_url = matches
        .get_one::<String>("base-url")
        .cloned()
        .context("missing required argument: --base-url")?;

    let token_secret = matches
        .get_one::<String>("token-secret")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --token-secret")?;

    let session_ttl_seconds = matches
        .get_one::<i64>("session-ttl-seconds")
        .copied()
        .context("missing required argument: --session-ttl-seconds")?;

    let session_sliding = matches.get_flag("session-sliding");

    Ok(Action::Server(Args {
        port,
        dsn,
        base_url,
        token_secret,
        session_ttl_seconds,
        session_sliding,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::actions::Action;

    #[test]
    fn maps_matches_to_server_action() -> Result<()> {
        temp_env::with_vars(
            [
                ("ENSALUTI_BASE_URL", None::<&str>),
                ("ENSALUTI_SESSION_TTL_SECONDS", None::<&str>),
                ("ENSALUTI_SESSION_SLIDING", None::<&str>),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec![
                    "ensaluti",
                    "--port",
                    "9000",
                    "--dsn",
                    "postgres://user@localhost:5432/ensaluti",
                    "--token-secret",
                    "sekreta",
                ]);
                let Action::Server(args) = handler(&matches)?;
                assert_eq!(args.port, 9000);
                assert_eq!(args.dsn, "postgres://user@localhost:5432/ensaluti");
                assert_eq!(args.base_url, "http://localhost:8080");
                assert_eq!(args.session_ttl_seconds, 2_592_000);
                assert!(!args.session_sliding);
                Ok(())
            },
        )
    }
}

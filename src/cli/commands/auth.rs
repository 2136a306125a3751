use clap::{Arg, ArgAction, Command};

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .help("Public base URL of the service, used for cookie security and CORS")
                .env("ENSALUTI_BASE_URL")
                .default_value("http://localhost:8080"),
        )
        .arg(
            Arg::new("token-secret")
                .long("token-secret")
                .help("Secret mixed into session token digests before storage")
                .env("ENSALUTI_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("session-ttl-seconds")
                .long("session-ttl-seconds")
                .help("Session TTL in seconds")
                .env("ENSALUTI_SESSION_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("session-sliding")
                .long("session-sliding")
                .help("Extend the session TTL on each successful validation")
                .env("ENSALUTI_SESSION_SLIDING")
                .action(ArgAction::SetTrue),
        )
}

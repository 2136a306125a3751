use crate::api;
use anyhow::Result;
use secrecy::SecretString;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub base_url: String,
    pub token_secret: SecretString,
    pub session_ttl_seconds: i64,
    pub session_sliding: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = api::handlers::auth::AuthConfig::new(args.base_url, args.token_secret)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_session_sliding(args.session_sliding);

    api::new(args.port, args.dsn, auth_config).await
}

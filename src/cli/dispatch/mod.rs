use crate::{
    api::AuthConfig,
    cli::{actions::Action, commands},
};
use anyhow::{Context, Result};
use secrecy::SecretString;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let jwt_secret = matches
        .get_one::<String>(commands::ARG_JWT_SECRET)
        .context("missing required argument: --jwt-secret")?
        .clone();

    let mut config = AuthConfig::new(SecretString::from(jwt_secret));

    if let Some(issuer) = matches.get_one::<String>(commands::ARG_TOTP_ISSUER) {
        config = config.with_totp_issuer(issuer.clone());
    }
    if let Some(ttl) = matches.get_one::<i64>(commands::ARG_ACCESS_TTL) {
        config = config.with_access_ttl_seconds(*ttl);
    }
    if let Some(ttl) = matches.get_one::<i64>(commands::ARG_REFRESH_TTL) {
        config = config.with_refresh_ttl_seconds(*ttl);
    }
    if let Some(limit) = matches.get_one::<u32>(commands::ARG_AUTH_RATE_LIMIT) {
        config = config.with_rate_limit_max_attempts(*limit);
    }
    if let Some(window) = matches.get_one::<u64>(commands::ARG_AUTH_RATE_WINDOW) {
        config = config.with_rate_limit_window_seconds(*window);
    }

    Ok(Action::Server {
        port: matches
            .get_one::<u16>(commands::ARG_PORT)
            .copied()
            .unwrap_or(8080),
        dsn: matches
            .get_one::<String>(commands::ARG_DSN)
            .map(String::to_string)
            .context("missing required argument: --dsn")?,
        config,
    })
}

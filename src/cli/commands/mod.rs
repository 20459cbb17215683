pub mod logging;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const ARG_PORT: &str = "port";
pub const ARG_DSN: &str = "dsn";
pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_TOTP_ISSUER: &str = "totp-issuer";
pub const ARG_ACCESS_TTL: &str = "access-ttl";
pub const ARG_REFRESH_TTL: &str = "refresh-ttl";
pub const ARG_AUTH_RATE_LIMIT: &str = "auth-rate-limit";
pub const ARG_AUTH_RATE_WINDOW: &str = "auth-rate-window";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("folio")
        .about("Portfolio backend API - identity, MFA and role-based access")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("FOLIO_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Database connection string")
                .env("FOLIO_DSN")
                .required(true),
        )
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("Secret used to sign access and refresh tokens")
                .env("FOLIO_JWT_SECRET")
                .required(true),
        )
        .arg(
            Arg::new(ARG_TOTP_ISSUER)
                .long(ARG_TOTP_ISSUER)
                .help("Issuer shown in authenticator apps for TOTP enrollment")
                .default_value("Folio Portfolio")
                .env("FOLIO_TOTP_ISSUER"),
        )
        .arg(
            Arg::new(ARG_ACCESS_TTL)
                .long(ARG_ACCESS_TTL)
                .help("Access token lifetime in seconds")
                .default_value("1800")
                .env("FOLIO_ACCESS_TTL")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TTL)
                .long(ARG_REFRESH_TTL)
                .help("Refresh token lifetime in seconds")
                .default_value("604800")
                .env("FOLIO_REFRESH_TTL")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_AUTH_RATE_LIMIT)
                .long(ARG_AUTH_RATE_LIMIT)
                .help("Maximum register/login attempts per source IP per window")
                .default_value("10")
                .env("FOLIO_AUTH_RATE_LIMIT")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_AUTH_RATE_WINDOW)
                .long(ARG_AUTH_RATE_WINDOW)
                .help("Rate-limit window for auth endpoints in seconds")
                .default_value("3600")
                .env("FOLIO_AUTH_RATE_WINDOW")
                .value_parser(clap::value_parser!(u64)),
        );

    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::new;

    #[test]
    fn command_parses_minimal_args() {
        let matches = new().try_get_matches_from([
            "folio",
            "--dsn",
            "postgres://localhost/folio",
            "--jwt-secret",
            "sekret",
        ]);
        let matches = match matches {
            Ok(matches) => matches,
            Err(err) => panic!("expected parse to succeed: {err}"),
        };
        assert_eq!(matches.get_one::<u16>(super::ARG_PORT).copied(), Some(8080));
        assert_eq!(
            matches.get_one::<i64>(super::ARG_ACCESS_TTL).copied(),
            Some(1800)
        );
        assert_eq!(
            matches.get_one::<u32>(super::ARG_AUTH_RATE_LIMIT).copied(),
            Some(10)
        );
    }

    #[test]
    fn command_requires_dsn() {
        let result = new().try_get_matches_from(["folio", "--jwt-secret", "sekret"]);
        assert!(result.is_err());
    }
}

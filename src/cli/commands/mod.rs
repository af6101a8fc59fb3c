pub mod billing;
pub mod identity;
pub mod logging;

use clap::{
    Arg, ArgAction, ArgMatches, ColorChoice, Command,
    builder::{
        PossibleValuesParser,
        styling::{AnsiColor, Effects, Styles},
    },
};

pub const ARG_PORT: &str = "port";
pub const ARG_DSN: &str = "dsn";
pub const ARG_ENVIRONMENT: &str = "environment";
pub const ARG_TRUST_PROXY_HEADERS: &str = "trust-proxy-headers";

/// Deployment environment, selecting cookie hardening, log format and error
/// detail in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    #[must_use]
    pub fn from_matches(matches: &ArgMatches) -> Self {
        match matches.get_one::<String>(ARG_ENVIRONMENT).map(String::as_str) {
            Some("production") => Self::Production,
            _ => Self::Development,
        }
    }

    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

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

    let command = Command::new("gatehouse")
        .about("Session and subscription-tier gateway")
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
                .env("GATEHOUSE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Database connection string for the profiles table")
                .long_help(
                    "Database connection string. When set, profile roles are read from Postgres directly, otherwise through the identity backend's REST interface.",
                )
                .env("GATEHOUSE_DSN"),
        )
        .arg(
            Arg::new(ARG_ENVIRONMENT)
                .short('e')
                .long(ARG_ENVIRONMENT)
                .help("Deployment environment")
                .env("GATEHOUSE_ENV")
                .default_value("development")
                .value_parser(PossibleValuesParser::new(["development", "production"])),
        )
        .arg(
            Arg::new(ARG_TRUST_PROXY_HEADERS)
                .long(ARG_TRUST_PROXY_HEADERS)
                .help("Key rate limits on X-Forwarded-For / X-Real-IP")
                .long_help(
                    "Key rate limits on the X-Forwarded-For / X-Real-IP headers instead of the peer address. Enable only behind a reverse proxy that overwrites them.",
                )
                .env("GATEHOUSE_TRUST_PROXY_HEADERS")
                .action(ArgAction::SetTrue),
        );

    let command = identity::with_args(command);
    let command = billing::with_args(command);
    logging::with_args(command)
}

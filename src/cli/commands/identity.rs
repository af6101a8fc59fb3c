use clap::{Arg, ArgMatches, Command, builder::ValueParser};
use secrecy::SecretString;
use url::Url;

pub const ARG_IDENTITY_URL: &str = "identity-url";
pub const ARG_IDENTITY_ANON_KEY: &str = "identity-anon-key";
pub const ARG_IDENTITY_TIMEOUT_SECONDS: &str = "identity-timeout-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub url: Url,
    pub anon_key: SecretString,
    pub timeout_seconds: u64,
}

impl Options {
    /// Parse identity backend arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the URL or key is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let Some(url) = matches.get_one::<Url>(ARG_IDENTITY_URL).cloned() else {
            anyhow::bail!("missing required argument: --{ARG_IDENTITY_URL}");
        };
        let anon_key = match matches.get_one::<String>(ARG_IDENTITY_ANON_KEY) {
            Some(value) if !value.trim().is_empty() => SecretString::from(value.clone()),
            _ => anyhow::bail!("missing required argument: --{ARG_IDENTITY_ANON_KEY}"),
        };
        let timeout_seconds = matches
            .get_one::<u64>(ARG_IDENTITY_TIMEOUT_SECONDS)
            .copied()
            .unwrap_or(5);

        Ok(Self {
            url,
            anon_key,
            timeout_seconds,
        })
    }
}

fn validator_url() -> ValueParser {
    ValueParser::from(|value: &str| -> Result<Url, String> {
        let url = Url::parse(value).map_err(|err| format!("invalid URL: {err}"))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(format!("unsupported URL scheme: {scheme}")),
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_IDENTITY_URL)
                .long(ARG_IDENTITY_URL)
                .help("Base URL of the GoTrue-compatible identity backend")
                .env("GATEHOUSE_IDENTITY_URL")
                .required(true)
                .value_parser(validator_url()),
        )
        .arg(
            Arg::new(ARG_IDENTITY_ANON_KEY)
                .long(ARG_IDENTITY_ANON_KEY)
                .help("Anonymous API key sent to the identity backend")
                .env("GATEHOUSE_IDENTITY_ANON_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_IDENTITY_TIMEOUT_SECONDS)
                .long(ARG_IDENTITY_TIMEOUT_SECONDS)
                .help("Timeout for identity backend and profile store calls")
                .env("GATEHOUSE_IDENTITY_TIMEOUT_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

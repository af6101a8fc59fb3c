use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_PAYMENT_SECRET_KEY: &str = "payment-secret-key";
pub const ARG_PAYMENT_WEBHOOK_SECRET: &str = "payment-webhook-secret";

#[derive(Debug, Clone, Default)]
pub struct Options {
    pub secret_key: Option<SecretString>,
    pub webhook_secret: Option<SecretString>,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        // Empty env values count as unset.
        let get_secret = |id: &str| {
            matches
                .get_one::<String>(id)
                .filter(|v| !v.trim().is_empty())
                .map(|v| SecretString::from(v.clone()))
        };

        Self {
            secret_key: get_secret(ARG_PAYMENT_SECRET_KEY),
            webhook_secret: get_secret(ARG_PAYMENT_WEBHOOK_SECRET),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PAYMENT_SECRET_KEY)
                .long(ARG_PAYMENT_SECRET_KEY)
                .help("Payment processor secret key")
                .env("GATEHOUSE_PAYMENT_SECRET_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_PAYMENT_WEBHOOK_SECRET)
                .long(ARG_PAYMENT_WEBHOOK_SECRET)
                .help("Payment webhook signing secret")
                .long_help(
                    "Payment webhook signing secret. Billing routes are mounted only when both the secret key and the webhook secret are set.",
                )
                .env("GATEHOUSE_PAYMENT_WEBHOOK_SECRET")
                .hide_env_values(true),
        )
}

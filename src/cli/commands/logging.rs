use clap::{Arg, Command, builder::ValueParser};

pub const ARG_VERBOSITY: &str = "verbosity";

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("GATEHOUSE_LOG_LEVEL")
            .global(true)
            .action(clap::ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(level: &str) -> Result<u8, String> {
        let command = Command::new("test").arg(
            Arg::new("level")
                .long("level")
                .value_parser(validator_log_level()),
        );
        command
            .try_get_matches_from(["test", "--level", level])
            .map(|matches| matches.get_one::<u8>("level").copied().unwrap_or(0))
            .map_err(|err| err.to_string())
    }

    #[test]
    fn accepts_names_and_numbers() {
        assert_eq!(parse("error"), Ok(0));
        assert_eq!(parse("INFO"), Ok(2));
        assert_eq!(parse("trace"), Ok(4));
        assert_eq!(parse("3"), Ok(3));
    }

    #[test]
    fn rejects_unknown_levels() {
        assert!(parse("loud").is_err());
        assert!(parse("9").is_err());
    }
}

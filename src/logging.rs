use tracing_subscriber::{
    field::MakeExt,
    filter::{EnvFilter, ParseError},
};

use crate::config;

/// Errors that can occur when installing the logger
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid log filter")]
    Filter(#[from] ParseError),

    #[error("a global logger is already installed")]
    AlreadyInstalled,
}

/// Install a global logger.
///
/// Other crates log warnings only; this application and its core library log
/// at the level given by `verbosity`.
///
/// # Errors
///
/// Fails if a global logger has already been installed
pub fn set_up(verbosity: u8) -> Result<(), Error> {
    let formatter = tracing_subscriber::fmt::format::debug_fn(|writer, field, value| {
        if field.name() == "message" {
            write!(writer, "{:?}", value)
        } else {
            write!(writer, "{}={:?}", field, value)
        }
    })
    .delimited(" ");

    let level = max_level(verbosity);
    let filter = EnvFilter::try_new("warn")?
        .add_directive(format!("{}={}", config::BIN_NAME, level).parse()?)
        .add_directive(format!("{}_lib={}", config::BIN_NAME, level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(true)
        .fmt_fields(formatter)
        .try_init()
        .map_err(|_| Error::AlreadyInstalled)
}

fn max_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    #[test_case(0 => "warn")]
    #[test_case(1 => "info")]
    #[test_case(2 => "debug")]
    #[test_case(7 => "trace")]
    fn max_level(verbosity: u8) -> &'static str {
        super::super::max_level(verbosity)
    }

    #[test]
    fn second_install_fails() {
        let _ = super::set_up(1);
        assert!(matches!(super::set_up(1), Err(super::Error::AlreadyInstalled)));
    }
}

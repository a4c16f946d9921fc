//! Logging initialisation via tracing-subscriber.
//!
//! Log output goes to stderr; stdout belongs to the console channel.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Check a `log_level` setting without installing anything.
///
/// A bare word must be one of `off`, `error`, `warn`, `info`, `debug`,
/// `trace`. Anything containing `=` or `,` is taken as `EnvFilter`
/// directives, e.g. `"info,lesson_hub::orchestrator=debug"`.
pub fn parse_filter(spec: &str) -> Result<EnvFilter, String> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err("log level must not be empty".into());
    }
    if spec.contains(['=', ',']) {
        return EnvFilter::try_new(spec).map_err(|e| format!("invalid filter '{spec}': {e}"));
    }
    let level = spec
        .parse::<LevelFilter>()
        .map_err(|_| format!("unrecognised log level: '{spec}'"))?;
    EnvFilter::try_new(level.to_string()).map_err(|e| format!("invalid log level '{spec}': {e}"))
}

/// Install the global subscriber.
///
/// With `prefer_level` the given `level` wins and `RUST_LOG` is the fallback;
/// otherwise `RUST_LOG` wins when set and parseable.
pub fn init(level: &str, prefer_level: bool) -> Result<(), AppError> {
    let from_env = || EnvFilter::try_from_default_env().map_err(|e| format!("RUST_LOG: {e}"));
    let filter = if prefer_level {
        parse_filter(level).or_else(|level_err| {
            from_env().map_err(|env_err| format!("{level_err}; {env_err}"))
        })
    } else {
        from_env().or_else(|_| parse_filter(level))
    }
    .map_err(AppError::Logger)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))
}

//! Centralised tracing initialisation for the qctl binary.
//!
//! Call [`init_tracing`] once at program start to configure the global
//! subscriber with an `EnvFilter` and optional JSON formatting.
//!
//! Subsequent calls are silently ignored (the global subscriber can only be
//! set once per process).

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Map the CLI verbosity scale to a tracing level.
///
/// `0` silences output (`None`); `1`=error, `2`=warn, `3`=info, `4`=debug,
/// `5` and above = trace.
pub fn level_from_verbosity(verbosity: u8) -> Option<Level> {
    match verbosity {
        0 => None,
        1 => Some(Level::ERROR),
        2 => Some(Level::WARN),
        3 => Some(Level::INFO),
        4 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

/// Initialise the global tracing subscriber.
///
/// * `json`: when `true`, emit newline-delimited JSON log lines.
/// * `level`: default verbosity when `RUST_LOG` is not set; `None` turns
///   logging off.
pub fn init_tracing(json: bool, level: Option<Level>) {
    let default_directive = level
        .map(|l| l.as_str().to_lowercase())
        .unwrap_or_else(|| "off".to_string());
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_scale() {
        assert_eq!(level_from_verbosity(0), None);
        assert_eq!(level_from_verbosity(1), Some(Level::ERROR));
        assert_eq!(level_from_verbosity(3), Some(Level::INFO));
        assert_eq!(level_from_verbosity(4), Some(Level::DEBUG));
        assert_eq!(level_from_verbosity(9), Some(Level::TRACE));
    }

    #[test]
    fn init_twice_is_harmless() {
        init_tracing(false, Some(Level::WARN));
        init_tracing(true, Some(Level::DEBUG));
    }
}

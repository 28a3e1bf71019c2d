use stagecrypt_core::STAGECRYPT_LOG_VAR;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, trace, warn, Level};

/// Initialize the tracing system
///
/// The filter comes from `STAGECRYPT_LOG` when set, otherwise from the
/// number of `-v` flags. Output goes to stderr so rendered configs on stdout
/// stay clean; ANSI colors are only used when stderr is a terminal.
pub fn init(verbosity: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = match EnvFilter::try_from_env(STAGECRYPT_LOG_VAR) {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive(verbosity))?,
    };

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(is_tty())
        .compact()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Filter directive for a `-v` count
#[must_use]
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Check if stderr is attached to a terminal
fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(default_directive(0), "warn");
        assert_eq!(default_directive(1), "info");
        assert_eq!(default_directive(2), "debug");
        assert_eq!(default_directive(9), "trace");
    }
}

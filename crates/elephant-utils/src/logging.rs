//! Structured logging setup, mirroring `xchecker_utils::logging`.

use std::io::IsTerminal;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Returns true when colored terminal output should be used: stdout is a
/// TTY and `NO_COLOR` is unset.
#[must_use]
pub fn use_color() -> bool {
    std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Initialize the global tracing subscriber.
///
/// Respects `RUST_LOG` if set; otherwise defaults to `elephant_cli=info,warn`,
/// or `elephant_cli=debug,info` when `verbose` is requested.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| {
        if verbose {
            EnvFilter::try_new("elephant_cli=debug,info")
        } else {
            EnvFilter::try_new("elephant_cli=info,warn")
        }
    })?;

    let fmt_layer = fmt::layer()
        .with_target(verbose)
        .with_ansi(use_color())
        .with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

use crate::constants::{DEFAULT_LOG_FILTER, LOG_DIR, LOG_FILE_PREFIX};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Human-readable run progress on stdout plus one JSON event per line in
/// `logs/price_tracker.log.<date>`, rolled daily.
///
/// `RUST_LOG` replaces the default filter, e.g.
/// `RUST_LOG=price_tracker::parser=debug` to see skipped product cards.
pub fn init_logging() {
    if let Err(e) = std::fs::create_dir_all(LOG_DIR) {
        eprintln!("cannot create {}: {}; file logging disabled", LOG_DIR, e);
    }

    let (json_writer, flush_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(LOG_DIR, LOG_FILE_PREFIX));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_current_span(false).with_writer(json_writer))
        .with(fmt::layer().compact().with_target(false).with_writer(std::io::stdout))
        .init();

    // Buffered JSON lines are lost if this is dropped before exit
    std::mem::forget(flush_guard);
}

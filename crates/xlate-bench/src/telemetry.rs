//! Tracing initialisation for the pipeline binary.
//!
//! Log output goes to stderr so that stdout stays free for the run summary.
//! Pipeline spans carry `program`, `side` and `flags` fields; in JSON mode
//! they are attached to every line so one program's stages can be filtered
//! out of a long run.

use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Initialise the global tracing subscriber.
///
/// `level` is the default verbosity when `RUST_LOG` is not set. At `DEBUG`
/// and below, span close events are logged too, which reports how long each
/// program and flag combination took.
///
/// Only the first call takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let verbose = level >= Level::DEBUG;
    let span_events = if verbose { FmtSpan::CLOSE } else { FmtSpan::NONE };

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_span_events(span_events);
    let layer = if json {
        layer.json().flatten_event(true).with_current_span(true).boxed()
    } else {
        layer.compact().boxed()
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(env_filter(level))
        .try_init()
        .ok();
}

/// `RUST_LOG` when set and valid, otherwise `level`.
fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_follows_level() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert_eq!(env_filter(Level::WARN).max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(env_filter(Level::DEBUG).max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_repeated_init_is_ignored() {
        init_tracing(false, Level::DEBUG);
        init_tracing(true, Level::INFO);
        tracing::info!(stage = "build", "subscriber installed");
    }
}

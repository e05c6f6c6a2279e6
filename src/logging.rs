//! Structured logging setup.
//!
//! Port of `logging.py`'s `setup_logging()`: JSON-formatted log lines on
//! stdout, level driven by configuration, noisy dependency crates quieted
//! down. Built on `tracing`/`tracing-subscriber` the way the pack's other
//! `tokio` services (e.g. `forge`'s `main.rs`) wire up their subscriber.

use crate::config::IrisConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global `tracing` subscriber. Call once, at process start.
pub fn init(config: &IrisConfig) {
    let filter = EnvFilter::try_new(directive_for(&config.log_level)).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().json().with_target(true))
        .with(filter)
        .init();
}

/// Build an `EnvFilter` directive string that applies `level` to this crate
/// and quiets the noisy dependencies the original silences explicitly
/// (`uvicorn.access`, `httpx`, `httpcore`, `playwright`).
fn directive_for(level: &str) -> String {
    let level = level.to_lowercase();
    format!("{level},hyper=warn,h2=warn,tower=warn,chromiumoxide=warn")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_includes_configured_level_and_quiets_dependencies() {
        let directive = directive_for("DEBUG");
        assert!(directive.starts_with("debug,"));
        assert!(directive.contains("chromiumoxide=warn"));
    }
}

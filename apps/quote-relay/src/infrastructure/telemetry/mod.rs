//! Tracing Setup
//!
//! Structured logging via `tracing` with an environment-driven filter.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Standard filter directives; when unset, sensible
//!   per-crate defaults apply.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the tracing subscriber.
///
/// Honors `RUST_LOG` when set; otherwise logs the relay at info and
/// quiets the HTTP stack internals.
#[allow(clippy::expect_used)]
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("")
            .add_directive(
                "quote_relay=info"
                    .parse()
                    .expect("static directive 'quote_relay=info' is valid"),
            )
            .add_directive(
                "hyper=warn"
                    .parse()
                    .expect("static directive 'hyper=warn' is valid"),
            )
    });

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

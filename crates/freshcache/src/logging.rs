//! Helpers to initialize the `tracing` subscriber.
//!
//! The cache itself only emits [`tracing`] events; embedders that already run
//! their own subscriber can ignore this module entirely.

use tracing_subscriber::fmt::fmt;
use tracing_subscriber::fmt::MakeWriter;

/// Initializes a human-readable subscriber writing to stderr.
///
/// `env_filter` uses the usual `tracing_subscriber` directive syntax, for
/// example `"info,freshcache=debug"`.
pub fn init_logging(env_filter: &str) {
    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Initializes a subscriber that dumps out JSON lines.
pub fn init_json_logging<W>(env_filter: &str, make_writer: W)
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    fmt()
        .with_env_filter(env_filter)
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(make_writer)
        .init();
}

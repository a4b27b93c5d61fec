//! Tracing setup and log formatting.
//!
//! All forwarder log lines are prefixed with `FORWARDER` so they can be
//! filtered out of a shared CloudWatch-style log stream that also carries
//! the function's own output.
//!
//! # Format
//!
//! ```text
//! FORWARDER | LEVEL | message field=value
//! ```

use std::fmt;
use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

/// Log formatter prefixing every line with `FORWARDER | LEVEL |`.
#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(writer, "FORWARDER | {} | ", event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Installs the global tracing subscriber.
///
/// `log_level` follows the `EnvFilter` directive syntax; an invalid value
/// falls back to `info`. Calling this twice is a no-op past the first call.
pub fn init(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(Formatter)
        .try_init();
}

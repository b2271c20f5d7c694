//! Structured logging setup (`tracing` + `tracing-subscriber`).
//!
//! A custom [`FormatEvent`] renders WARN-level events as bare
//! `[WARN] <message>` lines on stderr, matching spec §6's exact output
//! contract, while other levels fall back to a compact `[LEVEL] message`
//! line gated by `RUST_LOG` — mirrors the custom `Layer`/formatter wiring in
//! `cooprefr-bettersys/rust-backend/src/performance/tracing_layer.rs`.

use std::fmt;

use tracing::Level;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

struct BareWarnFormatter;

impl<S, N> FormatEvent<S, N> for BareWarnFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        let level = *event.metadata().level();
        if level == Level::WARN {
            write!(writer, "[WARN] ")?;
        } else {
            write!(writer, "[{level}] ")?;
        }
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Installs the global subscriber. Safe to call once at process start;
/// panics (via `tracing`'s own guard) if called twice, same as the rest of
/// the ecosystem's `init()` convention.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .event_format(BareWarnFormatter)
        .with_env_filter(env_filter)
        .init();
}

// Logging - emoji-prefixed event format and subscriber setup

use chrono::Local;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Default filter when `RUST_LOG` is unset
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "allurectl=debug,warn"
    } else {
        "allurectl=warn,error"
    }
}

fn level_prefix(level: &Level) -> (&'static str, &'static str) {
    match *level {
        Level::TRACE => ("🔬", "TRACE"),
        Level::DEBUG => ("🐛", "DEBUG"),
        Level::INFO => ("ℹ️ ", "INFO"),
        Level::WARN => ("⚠️ ", "WARN"),
        Level::ERROR => ("❌", "ERROR"),
    }
}

/// `❌ ERROR [12:00:00]: message`, with the event target for debug and trace
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomFormatter {
    pub with_target: bool,
}

impl<S, N> FormatEvent<S, N> for CustomFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let level = metadata.level();
        let timestamp = Local::now().format("%H:%M:%S");
        let (emoji, level_str) = level_prefix(level);

        write!(writer, "{} {} [{}]", emoji, level_str, timestamp)?;
        if self.with_target && *level >= Level::DEBUG {
            write!(writer, " {}", metadata.target())?;
        }
        write!(writer, ": ")?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Installs the global subscriber. Returns false when one was already set.
pub fn init(verbose: bool) -> bool {
    tracing_subscriber::fmt()
        .event_format(CustomFormatter {
            with_target: verbose,
        })
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose))),
        )
        .try_init()
        .is_ok()
}

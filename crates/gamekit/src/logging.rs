//! Tracing setup and the log sink bridge.
//!
//! Library code only emits `tracing` events. An embedding application
//! that wants the messages handed to its own logger installs a
//! [`LogSinkLayer`] with a `(LogLevel, &str)` callback.

use std::fmt::{self, Write as _};
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// Directives used when `RUST_LOG` is not set.
pub const DEFAULT_DIRECTIVES: &str = "info,gamekit=debug";

/// Severity handed to the log sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum LogLevel {
    Verbose = 0,
    Info = 1,
    Warning = 2,
    Error = 3,
}

impl From<&Level> for LogLevel {
    fn from(level: &Level) -> Self {
        match *level {
            Level::ERROR => LogLevel::Error,
            Level::WARN => LogLevel::Warning,
            Level::INFO => LogLevel::Info,
            _ => LogLevel::Verbose,
        }
    }
}

type LogCallback = dyn Fn(LogLevel, &str) + Send + Sync;

/// Forwards every event to a callback as one formatted line.
///
/// The line is the event message followed by its fields as
/// `name=value`.
#[derive(Clone)]
pub struct LogSinkLayer {
    callback: Arc<LogCallback>,
}

impl LogSinkLayer {
    pub fn new(callback: impl Fn(LogLevel, &str) + Send + Sync + 'static) -> Self {
        Self {
            callback: Arc::new(callback),
        }
    }
}

impl fmt::Debug for LogSinkLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSinkLayer").finish_non_exhaustive()
    }
}

impl<S: Subscriber> Layer<S> for LogSinkLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut line = LineVisitor::default();
        event.record(&mut line);
        (self.callback)(LogLevel::from(event.metadata().level()), &line.finish());
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields
        } else {
            format!("{} {}", self.message, self.fields)
        }
    }

    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }
}

fn env_filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `default_directives`.
///
/// Returns false if a global subscriber was already set.
pub fn init_tracing(default_directives: &str) -> bool {
    tracing_subscriber::registry()
        .with(env_filter(default_directives))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

/// Like [`init_tracing`], but sends events to `sink` instead of the
/// console.
pub fn init_tracing_with_sink(default_directives: &str, sink: LogSinkLayer) -> bool {
    tracing_subscriber::registry()
        .with(env_filter(default_directives))
        .with(sink)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn capture(f: impl FnOnce()) -> Vec<(LogLevel, String)> {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let lines = lines.clone();
            LogSinkLayer::new(move |level, msg| lines.lock().unwrap().push((level, msg.into())))
        };
        let subscriber = tracing_subscriber::registry().with(sink);
        tracing::subscriber::with_default(subscriber, f);
        lines.lock().unwrap().clone()
    }

    #[test]
    fn levels_map_to_sink_levels() {
        let lines = capture(|| {
            tracing::trace!("t");
            tracing::debug!("d");
            tracing::info!("i");
            tracing::warn!("w");
            tracing::error!("e");
        });
        let levels: Vec<LogLevel> = lines.iter().map(|(l, _)| *l).collect();
        assert_eq!(
            levels,
            vec![
                LogLevel::Verbose,
                LogLevel::Verbose,
                LogLevel::Info,
                LogLevel::Warning,
                LogLevel::Error,
            ]
        );
        assert_eq!(LogLevel::Error as u32, 3);
    }

    #[test]
    fn message_and_fields_are_joined() {
        let lines = capture(|| {
            tracing::warn!(feature = "main", attempts = 3, "retry failed");
        });
        assert_eq!(
            lines,
            vec![(
                LogLevel::Warning,
                "retry failed feature=main attempts=3".to_string()
            )]
        );
    }

    #[test]
    fn display_fields_are_unquoted() {
        let name = "Achievements";
        let lines = capture(|| tracing::info!(feature = %name, "deployed"));
        assert_eq!(lines[0].1, "deployed feature=Achievements");
    }
}

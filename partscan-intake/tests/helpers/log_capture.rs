//! Scoped tracing capture for asserting on emitted log lines

use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

#[derive(Debug, Clone)]
pub struct CapturedLine {
    pub level: Level,
    pub message: String,
}

/// Layer that keeps the message of every event it sees
#[derive(Clone, Default)]
pub struct LogCapture {
    lines: Arc<Mutex<Vec<CapturedLine>>>,
}

impl LogCapture {
    pub fn lines(&self) -> Vec<CapturedLine> {
        self.lines.lock().unwrap().clone()
    }

    pub fn at_level(&self, level: Level) -> Vec<CapturedLine> {
        self.lines()
            .into_iter()
            .filter(|line| line.level == level)
            .collect()
    }

    pub fn assert_contains(&self, needle: &str) {
        let lines = self.lines();
        assert!(
            lines.iter().any(|line| line.message.contains(needle)),
            "no log line contains {:?}; captured: {:#?}",
            needle,
            lines
        );
    }

    pub fn assert_no_match(&self, needle: &str) {
        let hits: Vec<_> = self
            .lines()
            .into_iter()
            .filter(|line| line.message.contains(needle))
            .collect();
        assert!(hits.is_empty(), "unexpected log lines for {:?}: {:#?}", needle, hits);
    }
}

struct MessageField(String);

impl Visit for MessageField {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0 = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        if field.name() == "message" {
            self.0 = format!("{:?}", value);
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut message = MessageField(String::new());
        event.record(&mut message);
        self.lines.lock().unwrap().push(CapturedLine {
            level: *event.metadata().level(),
            message: message.0,
        });
    }
}

/// Run `f` with a capturing subscriber installed for the current thread
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, LogCapture) {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new("partscan_intake=debug"))
        .with(capture.clone());

    let result = tracing::subscriber::with_default(subscriber, f);
    (result, capture)
}

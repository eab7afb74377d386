use std::fmt::Write as _;
use std::io::Write as _;
use std::sync::Arc;

use crate::alert::AlertEvent;
use crate::metrics::StatsRecord;

/// Consumer of finished windows.
pub trait OutputSink: Send + Sync {
    fn emit(&self, record: &StatsRecord);
}

/// Consumer of alert and recovery notices.
pub trait AlertSink: Send + Sync {
    fn alert(&self, event: &AlertEvent);
    fn recover(&self, event: &AlertEvent);
}

pub type OutputFn = dyn Fn(&StatsRecord) + Send + Sync;
pub type AlertFn = dyn Fn(&AlertEvent) + Send + Sync;

// ─── Output sinks ────────────────────────────────────────────────

/// Prints every window as one JSON object per line on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutJsonSink;

impl OutputSink for StdoutJsonSink {
    fn emit(&self, record: &StatsRecord) {
        match serde_json::to_string(record) {
            Ok(line) => {
                let mut out = std::io::stdout().lock();
                if let Err(e) = writeln!(out, "{line}") {
                    tracing::error!(error = %e, "failed to write stats line");
                }
            }
            Err(e) => {
                tracing::error!(entry = %record.interface_name, error = %e, "failed to serialize stats");
            }
        }
    }
}

/// Hands every window to a caller closure.
pub struct FnOutputSink(Arc<OutputFn>);

impl FnOutputSink {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&StatsRecord) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }
}

impl OutputSink for FnOutputSink {
    fn emit(&self, record: &StatsRecord) {
        (self.0)(record)
    }
}

// ─── Alert sinks ─────────────────────────────────────────────────

/// Writes a multi-line notice to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrAlertSink;

impl AlertSink for StderrAlertSink {
    fn alert(&self, event: &AlertEvent) {
        eprintln!("{}", format_notice("Alert", event));
    }

    fn recover(&self, event: &AlertEvent) {
        eprintln!("{}", format_notice("Recovery notice", event));
    }
}

/// Caller-supplied alert and/or recovery handlers; whichever is not
/// given falls back to [`StderrAlertSink`].
#[derive(Default, Clone)]
pub struct CallbackAlertSink {
    pub on_alert: Option<Arc<AlertFn>>,
    pub on_recover: Option<Arc<AlertFn>>,
}

impl AlertSink for CallbackAlertSink {
    fn alert(&self, event: &AlertEvent) {
        match &self.on_alert {
            Some(f) => f(event),
            None => StderrAlertSink.alert(event),
        }
    }

    fn recover(&self, event: &AlertEvent) {
        match &self.on_recover {
            Some(f) => f(event),
            None => StderrAlertSink.recover(event),
        }
    }
}

/// Default text block for an alert or recovery.
pub fn format_notice(heading: &str, event: &AlertEvent) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "\n {heading}:\n   Client: {}\n   Interface: {}\n   Type: {}\n   Last {} windows:",
        event.client_name,
        event.entry,
        event.kind,
        event.windows.len(),
    );
    for (i, w) in event.windows.iter().enumerate() {
        let _ = write!(
            out,
            "\n     {}. {} calls, {} {:.2}%",
            i + 1,
            w.count,
            event.kind,
            event.kind.rate(w) * 100.0,
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertKind;
    use parking_lot::Mutex;

    fn event(kind: AlertKind) -> AlertEvent {
        let windows = [(40, 0.5, 0.25), (10, 0.9, 0.125)]
            .into_iter()
            .map(|(count, success_rate, fast_rate)| StatsRecord {
                count,
                success_rate,
                fast_rate,
                ..StatsRecord::default()
            })
            .collect();
        AlertEvent {
            client_name: "svc".into(),
            entry: "GET /users".into(),
            kind,
            windows,
        }
    }

    #[test]
    fn notice_lists_each_window_rate() {
        let text = format_notice("Alert", &event(AlertKind::SuccessRate));
        assert!(text.contains("Alert:"));
        assert!(text.contains("Client: svc"));
        assert!(text.contains("Interface: GET /users"));
        assert!(text.contains("Last 2 windows:"));
        assert!(text.contains("1. 40 calls, Access success rate 50.00%"));
        assert!(text.contains("2. 10 calls, Access success rate 90.00%"));
    }

    #[test]
    fn latency_notice_uses_fast_rate() {
        let text = format_notice("Recovery notice", &event(AlertKind::LatencyCompliance));
        assert!(text.contains("Latency compliance rate 25.00%"));
        assert!(text.contains("Latency compliance rate 12.50%"));
    }

    #[test]
    fn callbacks_receive_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let alerts = seen.clone();
        let sink = CallbackAlertSink {
            on_alert: Some(Arc::new(move |e: &AlertEvent| alerts.lock().push(e.kind))),
            on_recover: None,
        };
        sink.alert(&event(AlertKind::LatencyCompliance));
        assert_eq!(*seen.lock(), [AlertKind::LatencyCompliance]);
    }

    #[test]
    fn fn_output_sink_forwards_records() {
        let seen = Arc::new(Mutex::new(0u32));
        let counter = seen.clone();
        let sink = FnOutputSink::new(move |r| *counter.lock() += r.count);
        sink.emit(&StatsRecord {
            count: 7,
            ..StatsRecord::default()
        });
        assert_eq!(*seen.lock(), 7);
    }
}

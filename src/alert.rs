//! Alert / recovery hysteresis.
//!
//! Each (entry, metric) pair keeps its own [`AlertState`]:
//!
//! - **Alert**: `bad_windows_to_alert` consecutive bad windows while
//!   healthy fire one alert and flip the state to alerting.
//! - **Recovery**: `good_windows_to_recover` consecutive non-bad windows
//!   while alerting fire one recovery and flip back to healthy.
//! - A window where the metric is not applicable (latency with zero
//!   successes) is treated as non-bad.
//!
//! Evaluation for one entry runs on a dedicated task fed in window order,
//! so its states are never touched concurrently.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::config::MonitorConfig;
use crate::metrics::StatsRecord;
use crate::sink::AlertSink;

// ─── Kinds & policy ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AlertKind {
    /// Share of calls that succeeded
    SuccessRate,
    /// Share of calls that succeeded within the fast threshold
    LatencyCompliance,
}

impl AlertKind {
    pub fn rate(self, record: &StatsRecord) -> f64 {
        match self {
            Self::SuccessRate => record.success_rate,
            Self::LatencyCompliance => record.fast_rate,
        }
    }

    /// Latency compliance means nothing without a single success.
    pub fn applicable(self, record: &StatsRecord) -> bool {
        match self {
            Self::SuccessRate => true,
            Self::LatencyCompliance => record.success_count > 0,
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SuccessRate => "Access success rate",
            Self::LatencyCompliance => "Latency compliance rate",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertPolicy {
    /// Rates strictly below this make a bad window
    pub threshold: f64,
    pub bad_windows_to_alert: usize,
    pub good_windows_to_recover: usize,
}

/// Policies for both metrics, taken from a normalized config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertPolicies {
    pub success: AlertPolicy,
    pub latency: AlertPolicy,
}

impl AlertPolicies {
    pub fn from_config(cfg: &MonitorConfig) -> Self {
        Self {
            success: AlertPolicy {
                threshold: cfg.success_rate,
                bad_windows_to_alert: cfg.alert_for_bad_success_rate_times,
                good_windows_to_recover: cfg.recover_for_good_success_rate_times,
            },
            latency: AlertPolicy {
                threshold: cfg.fast_rate,
                bad_windows_to_alert: cfg.alert_for_bad_fast_rate_times,
                good_windows_to_recover: cfg.recover_for_good_fast_rate_times,
            },
        }
    }
}

// ─── State machine ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlertStatus {
    #[default]
    Healthy,
    Alerting,
}

/// Result of one window that changed the status.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The bad windows that triggered the alert, oldest first
    Alert(Vec<StatsRecord>),
    /// The good windows that confirmed recovery, oldest first
    Recover(Vec<StatsRecord>),
}

#[derive(Debug, Clone, Default)]
pub struct AlertState {
    status: AlertStatus,
    bad: Vec<StatsRecord>,
    good: Vec<StatsRecord>,
}

impl AlertState {
    pub fn status(&self) -> AlertStatus {
        self.status
    }

    pub fn bad_streak(&self) -> usize {
        self.bad.len()
    }

    pub fn good_streak(&self) -> usize {
        self.good.len()
    }

    pub fn observe(
        &mut self,
        record: &StatsRecord,
        rate: f64,
        applicable: bool,
        policy: &AlertPolicy,
    ) -> Option<Transition> {
        if applicable && rate < policy.threshold {
            self.good.clear();
            self.bad.push(record.clone());
            if self.status == AlertStatus::Healthy
                && self.bad.len() >= policy.bad_windows_to_alert
            {
                self.status = AlertStatus::Alerting;
                return Some(Transition::Alert(std::mem::take(&mut self.bad)));
            }
            return None;
        }

        self.bad.clear();
        if self.status == AlertStatus::Alerting {
            self.good.push(record.clone());
            if self.good.len() >= policy.good_windows_to_recover {
                self.status = AlertStatus::Healthy;
                return Some(Transition::Recover(std::mem::take(&mut self.good)));
            }
        }
        None
    }
}

// ─── Per-entry evaluation ────────────────────────────────────────

/// What the alert sink receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub client_name: String,
    pub entry: String,
    pub kind: AlertKind,
    pub windows: Vec<StatsRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Alert(AlertEvent),
    Recovery(AlertEvent),
}

/// Both metric states for one entry.
pub struct EntryAlerts {
    client_name: Arc<str>,
    entry: String,
    policies: AlertPolicies,
    success: AlertState,
    latency: AlertState,
}

impl EntryAlerts {
    pub fn new(client_name: Arc<str>, entry: String, policies: AlertPolicies) -> Self {
        Self {
            client_name,
            entry,
            policies,
            success: AlertState::default(),
            latency: AlertState::default(),
        }
    }

    pub fn state(&self, kind: AlertKind) -> &AlertState {
        match kind {
            AlertKind::SuccessRate => &self.success,
            AlertKind::LatencyCompliance => &self.latency,
        }
    }

    /// Feed one window through both machines, latency first.
    pub fn evaluate(&mut self, record: &StatsRecord) -> Vec<Notice> {
        let mut notices = Vec::new();
        for kind in [AlertKind::LatencyCompliance, AlertKind::SuccessRate] {
            let (state, policy) = match kind {
                AlertKind::SuccessRate => (&mut self.success, &self.policies.success),
                AlertKind::LatencyCompliance => (&mut self.latency, &self.policies.latency),
            };
            let transition =
                state.observe(record, kind.rate(record), kind.applicable(record), policy);
            let Some(transition) = transition else {
                continue;
            };
            let event = |windows| AlertEvent {
                client_name: self.client_name.to_string(),
                entry: self.entry.clone(),
                kind,
                windows,
            };
            notices.push(match transition {
                Transition::Alert(windows) => Notice::Alert(event(windows)),
                Transition::Recover(windows) => Notice::Recovery(event(windows)),
            });
        }
        notices
    }

    pub async fn run(
        mut self,
        mut records: mpsc::UnboundedReceiver<StatsRecord>,
        sink: Arc<dyn AlertSink>,
    ) {
        while let Some(record) = records.recv().await {
            for notice in self.evaluate(&record) {
                // Handlers are caller code and may block. Run them off the
                // runtime, but wait so notices for this entry stay ordered.
                let sink = sink.clone();
                let delivered = tokio::task::spawn_blocking(move || match notice {
                    Notice::Alert(event) => {
                        tracing::warn!(entry = %event.entry, kind = ?event.kind, "alert fired");
                        sink.alert(&event);
                    }
                    Notice::Recovery(event) => {
                        tracing::info!(entry = %event.entry, kind = ?event.kind, "recovered");
                        sink.recover(&event);
                    }
                })
                .await;
                if let Err(e) = delivered {
                    tracing::error!(entry = %self.entry, error = %e, "alert handler failed");
                }
            }
        }
    }
}

/// Routes each window to its entry's evaluation task, spawning the
/// task the first time an entry shows up.
pub struct AlertDispatcher {
    client_name: Arc<str>,
    policies: AlertPolicies,
    sink: Arc<dyn AlertSink>,
    entries: HashMap<String, mpsc::UnboundedSender<StatsRecord>>,
}

impl AlertDispatcher {
    pub fn new(client_name: Arc<str>, policies: AlertPolicies, sink: Arc<dyn AlertSink>) -> Self {
        Self {
            client_name,
            policies,
            sink,
            entries: HashMap::new(),
        }
    }

    /// Never waits on evaluation; windows queue up per entry instead.
    ///
    /// The per-entry queue is unbounded: an alert sink that stays slower
    /// than the window cycle lets pending windows grow without limit. It
    /// is outside the backpressure chain that bounds ingestion.
    pub fn dispatch(&mut self, record: StatsRecord) {
        let tx = self
            .entries
            .entry(record.interface_name.clone())
            .or_insert_with_key(|entry| {
                let (tx, rx) = mpsc::unbounded_channel();
                let alerts =
                    EntryAlerts::new(self.client_name.clone(), entry.clone(), self.policies);
                tokio::spawn(alerts.run(rx, self.sink.clone()));
                tx
            });
        if tx.send(record).is_err() {
            tracing::error!("alert evaluation task is gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(n: usize, m: usize) -> AlertPolicy {
        AlertPolicy {
            threshold: 0.95,
            bad_windows_to_alert: n,
            good_windows_to_recover: m,
        }
    }

    fn window(success: u32, fail: u32, fast: u32) -> StatsRecord {
        let count = success + fail;
        StatsRecord {
            interface_name: "GET /".into(),
            client_name: "svc".into(),
            count,
            success_count: success,
            fail_count: fail,
            fast_count: fast,
            success_rate: success as f64 / count as f64,
            fast_rate: fast as f64 / count as f64,
            ..StatsRecord::default()
        }
    }

    fn step(state: &mut AlertState, rec: &StatsRecord, p: &AlertPolicy) -> Option<Transition> {
        state.observe(
            rec,
            AlertKind::SuccessRate.rate(rec),
            AlertKind::SuccessRate.applicable(rec),
            p,
        )
    }

    #[test]
    fn three_bad_windows_alert_once() {
        let p = policy(3, 3);
        let mut s = AlertState::default();
        let bad = window(5, 5, 5);

        assert_eq!(step(&mut s, &bad, &p), None);
        assert_eq!(step(&mut s, &bad, &p), None);
        match step(&mut s, &bad, &p) {
            Some(Transition::Alert(w)) => assert_eq!(w.len(), 3),
            other => panic!("expected alert, got {other:?}"),
        }
        assert_eq!(s.status(), AlertStatus::Alerting);
        assert_eq!(s.bad_streak(), 0);

        assert_eq!(step(&mut s, &bad, &p), None);
        assert_eq!(step(&mut s, &bad, &p), None);
        assert_eq!(step(&mut s, &bad, &p), None);
        assert_eq!(s.status(), AlertStatus::Alerting);
    }

    #[test]
    fn good_window_breaks_bad_streak() {
        let p = policy(3, 3);
        let mut s = AlertState::default();
        let bad = window(1, 9, 1);
        let good = window(10, 0, 10);

        step(&mut s, &bad, &p);
        step(&mut s, &bad, &p);
        step(&mut s, &good, &p);
        assert_eq!(s.bad_streak(), 0);
        step(&mut s, &bad, &p);
        step(&mut s, &bad, &p);
        assert_eq!(s.status(), AlertStatus::Healthy);
    }

    #[test]
    fn recovery_needs_unbroken_good_streak() {
        let p = policy(3, 3);
        let mut s = AlertState::default();
        let bad = window(0, 10, 0);
        let good = window(100, 0, 100);

        for _ in 0..3 {
            step(&mut s, &bad, &p);
        }
        assert_eq!(s.status(), AlertStatus::Alerting);

        assert_eq!(step(&mut s, &good, &p), None);
        assert_eq!(step(&mut s, &good, &p), None);
        assert_eq!(step(&mut s, &bad, &p), None);
        assert_eq!(s.good_streak(), 0);

        assert_eq!(step(&mut s, &good, &p), None);
        assert_eq!(step(&mut s, &good, &p), None);
        match step(&mut s, &good, &p) {
            Some(Transition::Recover(w)) => assert_eq!(w.len(), 3),
            other => panic!("expected recovery, got {other:?}"),
        }
        assert_eq!(s.status(), AlertStatus::Healthy);
        assert_eq!(s.good_streak(), 0);
        assert_eq!(step(&mut s, &good, &p), None);
    }

    #[test]
    fn rate_at_threshold_is_not_bad() {
        let p = policy(3, 3);
        let mut s = AlertState::default();
        let edge = window(95, 5, 95);
        for _ in 0..5 {
            assert_eq!(step(&mut s, &edge, &p), None);
        }
        assert_eq!(s.bad_streak(), 0);
    }

    #[test]
    fn larger_streak_counts_are_honoured() {
        let p = policy(5, 4);
        let mut s = AlertState::default();
        let bad = window(0, 1, 0);
        for _ in 0..4 {
            assert_eq!(step(&mut s, &bad, &p), None);
        }
        assert!(matches!(step(&mut s, &bad, &p), Some(Transition::Alert(w)) if w.len() == 5));
    }

    fn policies() -> AlertPolicies {
        AlertPolicies {
            success: policy(3, 3),
            latency: AlertPolicy {
                threshold: 0.8,
                bad_windows_to_alert: 3,
                good_windows_to_recover: 3,
            },
        }
    }

    #[test]
    fn zero_success_window_is_neutral_for_latency() {
        let mut alerts = EntryAlerts::new("svc".into(), "GET /".into(), policies());
        let slow = window(10, 0, 1);
        let all_failed = window(0, 10, 0);

        alerts.evaluate(&slow);
        alerts.evaluate(&slow);
        alerts.evaluate(&all_failed);
        assert_eq!(alerts.state(AlertKind::LatencyCompliance).bad_streak(), 0);
        assert_eq!(alerts.state(AlertKind::SuccessRate).bad_streak(), 1);
    }

    #[test]
    fn zero_success_windows_recover_latency() {
        let mut alerts = EntryAlerts::new("svc".into(), "GET /".into(), policies());
        let slow = window(10, 0, 1);
        let all_failed = window(0, 10, 0);

        let fired: Vec<_> = (0..3).flat_map(|_| alerts.evaluate(&slow)).collect();
        assert!(matches!(
            fired.as_slice(),
            [Notice::Alert(AlertEvent { kind: AlertKind::LatencyCompliance, .. })]
        ));

        let mut recovered = Vec::new();
        for _ in 0..3 {
            recovered.extend(alerts.evaluate(&all_failed));
        }
        let latency_recovery = recovered.iter().any(|n| {
            matches!(n, Notice::Recovery(e) if e.kind == AlertKind::LatencyCompliance)
        });
        assert!(latency_recovery);
        let success_alert = recovered
            .iter()
            .any(|n| matches!(n, Notice::Alert(e) if e.kind == AlertKind::SuccessRate));
        assert!(success_alert);
    }

    #[test]
    fn events_carry_client_and_entry() {
        let mut alerts = EntryAlerts::new("svc".into(), "POST /x".into(), policies());
        let bad = window(1, 9, 1);
        let notices: Vec<_> = (0..3).flat_map(|_| alerts.evaluate(&bad)).collect();
        assert_eq!(notices.len(), 2);
        for notice in notices {
            let Notice::Alert(event) = notice else {
                panic!("expected alerts only");
            };
            assert_eq!(event.client_name, "svc");
            assert_eq!(event.entry, "POST /x");
            assert_eq!(event.windows.len(), 3);
        }
    }
}

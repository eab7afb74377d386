use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;

use crate::alert::{AlertDispatcher, AlertEvent, AlertPolicies};
use crate::classify::{CodeClassifier, CodeFeature};
use crate::config::{EntryConfig, MonitorConfig};
use crate::error::{ConfigError, MonitorError};
use crate::metrics::{
    scheduler, Analyzer, Collector, Command, EntryRegistry, ReportSample, StatsRecord,
};
use crate::sink::{AlertSink, CallbackAlertSink, FnOutputSink, OutputSink, StdoutJsonSink};

/// Cheap, cloneable handle to a running pipeline.
///
/// Only obtainable through registration, so every handle is backed by
/// live collector, analyzer and scheduler tasks.
#[derive(Clone)]
pub struct Monitor {
    client_name: Arc<str>,
    registry: Arc<EntryRegistry>,
    commands: mpsc::Sender<Command>,
}

/// Options that cannot live in a serialized config: the code
/// classifier and the sinks.
pub struct MonitorBuilder {
    config: MonitorConfig,
    classifier: Option<CodeClassifier>,
    output: Option<Arc<dyn OutputSink>>,
    alert_sink: Option<Arc<dyn AlertSink>>,
    callbacks: CallbackAlertSink,
}

impl MonitorBuilder {
    pub fn classifier(mut self, classifier: CodeClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn code_table(self, table: HashMap<i32, CodeFeature>) -> Self {
        self.classifier(CodeClassifier::Table(table))
    }

    pub fn classify_fn<F>(self, f: F) -> Self
    where
        F: Fn(i32) -> CodeFeature + Send + Sync + 'static,
    {
        self.classifier(CodeClassifier::from_fn(f))
    }

    pub fn output_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.output = Some(sink);
        self
    }

    pub fn output_fn<F>(self, f: F) -> Self
    where
        F: Fn(&StatsRecord) + Send + Sync + 'static,
    {
        self.output_sink(Arc::new(FnOutputSink::new(f)))
    }

    /// Replaces alert and recovery handling entirely; takes precedence
    /// over `alert_fn` / `recover_fn`.
    pub fn alert_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.alert_sink = Some(sink);
        self
    }

    pub fn alert_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&AlertEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_alert = Some(Arc::new(f));
        self
    }

    pub fn recover_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&AlertEvent) + Send + Sync + 'static,
    {
        self.callbacks.on_recover = Some(Arc::new(f));
        self
    }

    /// Validate the config and spawn the pipeline on the current runtime.
    pub fn start(self) -> Result<Monitor, MonitorError> {
        let config = self.config.normalized()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| MonitorError::NoRuntime)?;

        let client_name: Arc<str> = Arc::from(config.client_name.as_str());
        let classifier = self.classifier.unwrap_or_default();
        let output: Arc<dyn OutputSink> = match self.output {
            Some(sink) => sink,
            None => Arc::new(StdoutJsonSink),
        };
        let alert_sink: Arc<dyn AlertSink> = match self.alert_sink {
            Some(sink) => sink,
            None => Arc::new(self.callbacks),
        };

        let registry = Arc::new(EntryRegistry::new(config.default_entry_config()));
        let (cmd_tx, cmd_rx) = mpsc::channel(config.queue_capacity);
        let (snap_tx, snap_rx) = mpsc::channel(config.queue_capacity);

        let collector = Collector::new(registry.clone(), classifier.clone());
        let alerts = AlertDispatcher::new(
            client_name.clone(),
            AlertPolicies::from_config(&config),
            alert_sink,
        );
        let analyzer = Analyzer::new(
            client_name.clone(),
            classifier,
            config.fail_label_format.clone(),
            output,
            alerts,
        );

        runtime.spawn(collector.run(cmd_rx, snap_tx));
        runtime.spawn(analyzer.run(snap_rx));
        runtime.spawn(scheduler::run(registry.clone(), cmd_tx.clone(), config.cycle()));

        tracing::info!(
            client = %client_name,
            cycle_ms = config.statistical_cycle_ms,
            queue_capacity = config.queue_capacity,
            "monitor started"
        );

        Ok(Monitor {
            client_name,
            registry,
            commands: cmd_tx,
        })
    }
}

impl Monitor {
    pub fn builder(config: MonitorConfig) -> MonitorBuilder {
        MonitorBuilder {
            config,
            classifier: None,
            output: None,
            alert_sink: None,
            callbacks: CallbackAlertSink::default(),
        }
    }

    /// Start with the default classifier and sinks.
    pub fn register(config: MonitorConfig) -> Result<Self, MonitorError> {
        Self::builder(config).start()
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// Install classification rules for `name`, effective from its next window.
    pub fn add_entry_config(&self, name: &str, config: EntryConfig) -> Result<(), ConfigError> {
        let stored = self.registry.set_config(name, config)?;
        tracing::debug!(entry = name, ?stored, "entry config set");
        Ok(())
    }

    /// Queue one request outcome. Waits only while the ingestion queue is full.
    pub async fn report(&self, name: &str, ms: u32, code: i32) -> Result<(), MonitorError> {
        self.registry.touch(name);
        self.commands
            .send(Command::Report(Self::sample(name, ms, code)))
            .await
            .map_err(|_| MonitorError::Closed)
    }

    /// [`Monitor::report`] for synchronous callers.
    ///
    /// Panics if called from within an async execution context, like
    /// `tokio::sync::mpsc::Sender::blocking_send`.
    pub fn blocking_report(&self, name: &str, ms: u32, code: i32) -> Result<(), MonitorError> {
        self.registry.touch(name);
        self.commands
            .blocking_send(Command::Report(Self::sample(name, ms, code)))
            .map_err(|_| MonitorError::Closed)
    }

    /// Close every entry's current window now, as a scheduler tick would.
    pub async fn flush(&self) -> Result<(), MonitorError> {
        if scheduler::flush_all(&self.registry, &self.commands, Utc::now()).await {
            Ok(())
        } else {
            Err(MonitorError::Closed)
        }
    }

    fn sample(name: &str, ms: u32, code: i32) -> ReportSample {
        ReportSample {
            entry: name.to_owned(),
            ms,
            code,
        }
    }
}

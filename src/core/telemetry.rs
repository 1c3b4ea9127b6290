//! Telemetry side channel
//!
//! The bridge reports custom events, metrics and noticed errors to a
//! [`Telemetry`] sink. The sink is fire-and-forget: it never fails back
//! into the caller.

use parking_lot::Mutex;
use serde::Serialize;

/// Custom event emitted by the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum TelemetryEvent {
    /// Identity assigned or changed
    #[serde(rename = "Name/Set")]
    NameSet {
        /// Identity before the change, if any
        old_name: Option<String>,
        /// Identity after the change
        new_name: String,
    },
    /// Locate indicator requested
    #[serde(rename = "Blink/LED")]
    Locate {
        /// Identity of the located bridge
        name: String,
    },
}

impl TelemetryEvent {
    /// Event type name
    pub fn name(&self) -> &'static str {
        match self {
            Self::NameSet { .. } => "Name/Set",
            Self::Locate { .. } => "Blink/LED",
        }
    }
}

/// Telemetry sink
pub trait Telemetry: Send + Sync {
    /// Record a custom event
    fn record_event(&self, event: TelemetryEvent);

    /// Record a custom metric value
    fn record_metric(&self, name: &str, value: i64);

    /// Notice a non-fatal or fatal error
    fn notice_error(&self, context: &str, error: &dyn std::error::Error);
}

/// Metric name for dispensed quantity of a bridge
pub fn dispensed_metric(identity: &str) -> String {
    format!("{identity}/Dispensed")
}

/// Writes telemetry as structured tracing events under the `telemetry` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn record_event(&self, event: TelemetryEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => tracing::info!(target: "telemetry", event = event.name(), attributes = %json),
            Err(e) => tracing::warn!(target: "telemetry", error = %e, "Unserializable event"),
        }
    }

    fn record_metric(&self, name: &str, value: i64) {
        tracing::info!(target: "telemetry", metric = name, value);
    }

    fn notice_error(&self, context: &str, error: &dyn std::error::Error) {
        tracing::error!(target: "telemetry", context, error = %error);
    }
}

/// One recorded telemetry call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryRecord {
    /// Custom event
    Event(TelemetryEvent),
    /// Metric sample
    Metric {
        /// Metric name
        name: String,
        /// Value
        value: i64,
    },
    /// Noticed error
    Error {
        /// Where it happened
        context: String,
        /// Rendered error
        message: String,
    },
}

/// Keeps every telemetry call in memory
#[derive(Debug, Default)]
pub struct MemoryTelemetry {
    records: Mutex<Vec<TelemetryRecord>>,
}

impl MemoryTelemetry {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded calls
    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.records.lock().clone()
    }

    /// Recorded events only
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.records
            .lock()
            .iter()
            .filter_map(|r| match r {
                TelemetryRecord::Event(e) => Some(e.clone()),
                _ => None,
            })
            .collect()
    }

    /// Recorded metric samples only
    pub fn metrics(&self) -> Vec<(String, i64)> {
        self.records
            .lock()
            .iter()
            .filter_map(|r| match r {
                TelemetryRecord::Metric { name, value } => Some((name.clone(), *value)),
                _ => None,
            })
            .collect()
    }

    /// Number of noticed errors
    pub fn error_count(&self) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| matches!(r, TelemetryRecord::Error { .. }))
            .count()
    }
}

impl Telemetry for MemoryTelemetry {
    fn record_event(&self, event: TelemetryEvent) {
        self.records.lock().push(TelemetryRecord::Event(event));
    }

    fn record_metric(&self, name: &str, value: i64) {
        self.records.lock().push(TelemetryRecord::Metric {
            name: name.to_string(),
            value,
        });
    }

    fn notice_error(&self, context: &str, error: &dyn std::error::Error) {
        self.records.lock().push(TelemetryRecord::Error {
            context: context.to_string(),
            message: error.to_string(),
        });
    }
}

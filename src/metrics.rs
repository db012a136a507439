//! Gauge submission sinks.
//!
//! The poll cycle reports one gauge per table per cycle through the
//! `MetricSink` trait. The production sink speaks the collectd plain-text
//! protocol (`PUTVAL` lines on stdout, for the exec plugin), tagged with
//! the local host identity. Tests use `MockSink`.

use chrono::Utc;

/// Plugin name used in metric identifiers.
pub const PLUGIN: &str = "pftables";

/// Destination for gauge values.
pub trait MetricSink {
    /// Submits a point-in-time gauge of the given type, tagged with a type
    /// instance (the table name here).
    fn submit_gauge(&mut self, type_name: &str, type_instance: &str, value: f64);
}

/// Sink printing collectd `PUTVAL` lines to stdout.
#[derive(Debug, Clone)]
pub struct PutvalSink {
    host: String,
    interval: u64,
}

impl PutvalSink {
    /// Creates a sink tagged with the local hostname.
    pub fn new(interval: u64) -> Self {
        Self {
            host: local_hostname(),
            interval,
        }
    }

    /// Creates a sink with an explicit host tag.
    pub fn with_host(host: impl Into<String>, interval: u64) -> Self {
        Self {
            host: host.into(),
            interval,
        }
    }
}

impl MetricSink for PutvalSink {
    fn submit_gauge(&mut self, type_name: &str, type_instance: &str, value: f64) {
        let line = format_putval(
            &self.host,
            self.interval,
            type_name,
            type_instance,
            Utc::now().timestamp(),
            value,
        );
        println!("{}", line);
    }
}

/// Formats one collectd plain-text protocol line.
fn format_putval(
    host: &str,
    interval: u64,
    type_name: &str,
    type_instance: &str,
    timestamp: i64,
    value: f64,
) -> String {
    format!(
        "PUTVAL \"{}/{}/{}-{}\" interval={} {}:{}",
        host, PLUGIN, type_name, type_instance, interval, timestamp, value
    )
}

/// Local host identity for the metric tag.
fn local_hostname() -> String {
    hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".to_string())
}

/// In-memory sink recording submissions for tests.
#[derive(Debug, Default)]
pub struct MockSink {
    submissions: Vec<(String, String, f64)>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded `(type, instance, value)` triples, in submission order.
    pub fn submissions(&self) -> &[(String, String, f64)] {
        &self.submissions
    }

    /// The value submitted for a type instance, if any.
    pub fn value_for(&self, type_instance: &str) -> Option<f64> {
        self.submissions
            .iter()
            .find(|(_, instance, _)| instance == type_instance)
            .map(|&(_, _, value)| value)
    }
}

impl MetricSink for MockSink {
    fn submit_gauge(&mut self, type_name: &str, type_instance: &str, value: f64) {
        self.submissions
            .push((type_name.to_string(), type_instance.to_string(), value));
    }
}

//! Per-table poll cycle.
//!
//! One cycle walks the configured tables in order, counts each table's
//! entries through the retry driver, and submits one gauge per table. A
//! failing table is logged and skipped - it never aborts the rest of the
//! cycle, and nothing here is process-fatal.

use crate::config::Config;
use crate::driver::{count_table_entries, list_tables};
use crate::metrics::MetricSink;
use crate::pf::{PfBackend, PfError, TableFilter};
use tracing::{debug, warn};

/// Metric type submitted for table entry counts.
pub const GAUGE_TYPE: &str = "gauge";

/// Outcome summary of one poll cycle, for the daemon's cycle log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Tables counted and submitted this cycle.
    pub tables_polled: usize,
    /// Tables skipped due to an enumeration failure.
    pub tables_failed: usize,
}

/// Runs poll cycles against one backend with a fixed configuration.
pub struct Poller<B: PfBackend> {
    backend: B,
    config: Config,
}

impl<B: PfBackend> Poller<B> {
    pub fn new(backend: B, config: Config) -> Self {
        Self { backend, config }
    }

    /// Runs one complete poll cycle.
    ///
    /// An empty configured table list polls every table currently defined
    /// in the kernel. Each table gets a fresh buffer lifecycle; per-table
    /// errors are reported (unless dry-run suppression is active) and the
    /// cycle moves on.
    pub fn run_cycle<S: MetricSink>(&self, sink: &mut S) -> CycleStats {
        let mut stats = CycleStats::default();

        let tables = if self.config.tables.is_empty() {
            match list_tables(&self.backend) {
                Ok(tables) => tables,
                Err(e) => {
                    self.report_failure(None, &e);
                    stats.tables_failed += 1;
                    return stats;
                }
            }
        } else {
            self.config.tables.clone()
        };

        for name in &tables {
            match self.count_one(name) {
                Ok(count) => {
                    sink.submit_gauge(GAUGE_TYPE, name, count as f64);
                    stats.tables_polled += 1;
                }
                Err(e) => {
                    self.report_failure(Some(name), &e);
                    stats.tables_failed += 1;
                }
            }
        }
        stats
    }

    fn count_one(&self, name: &str) -> Result<u64, PfError> {
        let filter = TableFilter::new(name)?;
        count_table_entries(&self.backend, &filter)
    }

    /// Logs a per-table failure, table name elided when not applicable.
    fn report_failure(&self, table: Option<&str>, err: &PfError) {
        if self.config.should_report_errors() {
            match table {
                Some(name) => warn!(table = %name, "poll failed: {}", err),
                None => warn!("table listing failed: {}", err),
            }
        } else {
            match table {
                Some(name) => debug!(table = %name, "poll failed (dry-run): {}", err),
                None => debug!("table listing failed (dry-run): {}", err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MockSink;
    use crate::pf::mock::{MockFailure, MockPf};

    fn config_for(tables: &[&str]) -> Config {
        let mut config = Config::new();
        for name in tables {
            config.add_table(*name).unwrap();
        }
        config
    }

    #[test]
    fn test_cycle_submits_one_gauge_per_table() {
        let mock = MockPf::new().add_table("abc", 5).add_table("xyz", 12);
        let poller = Poller::new(&mock, config_for(&["abc", "xyz"]));
        let mut sink = MockSink::new();

        let stats = poller.run_cycle(&mut sink);
        assert_eq!(stats, CycleStats { tables_polled: 2, tables_failed: 0 });
        assert_eq!(sink.value_for("abc"), Some(5.0));
        assert_eq!(sink.value_for("xyz"), Some(12.0));
        assert_eq!(mock.offered_for("abc"), vec![64]);
    }

    #[test]
    fn test_cycle_retries_truncated_table_to_final_count() {
        let mock = MockPf::new().add_table("big", 150);
        let poller = Poller::new(&mock, config_for(&["big"]));
        let mut sink = MockSink::new();

        poller.run_cycle(&mut sink);
        assert_eq!(sink.value_for("big"), Some(150.0));
        assert_eq!(mock.offered_for("big"), vec![64, 128, 256]);
    }

    #[test]
    fn test_failed_table_is_skipped_and_cycle_continues() {
        let mock = MockPf::new().add_table("abc", 5).add_table("xyz", 12);
        let poller = Poller::new(&mock, config_for(&["abc", "ghost", "xyz"]));
        let mut sink = MockSink::new();

        let stats = poller.run_cycle(&mut sink);
        assert_eq!(stats, CycleStats { tables_polled: 2, tables_failed: 1 });
        assert_eq!(sink.value_for("ghost"), None);
        assert_eq!(sink.value_for("xyz"), Some(12.0));
    }

    #[test]
    fn test_dry_run_suppresses_but_still_skips() {
        let mock = MockPf::new().add_table("abc", 5);
        let mut config = config_for(&["ghost", "abc"]);
        config.no_action = true;
        let poller = Poller::new(&mock, config);
        let mut sink = MockSink::new();

        let stats = poller.run_cycle(&mut sink);
        assert_eq!(stats, CycleStats { tables_polled: 1, tables_failed: 1 });
        assert_eq!(sink.value_for("ghost"), None);
        assert_eq!(sink.value_for("abc"), Some(5.0));
    }

    #[test]
    fn test_kernel_unreachable_does_not_abort_cycle() {
        let mock = MockPf::new()
            .fail_table("down", MockFailure::Unreachable)
            .add_table("up", 3);
        let poller = Poller::new(&mock, config_for(&["down", "up"]));
        let mut sink = MockSink::new();

        let stats = poller.run_cycle(&mut sink);
        assert_eq!(stats, CycleStats { tables_polled: 1, tables_failed: 1 });
        assert_eq!(sink.value_for("up"), Some(3.0));
    }

    #[test]
    fn test_empty_table_list_polls_every_kernel_table() {
        let mock = MockPf::new().add_table("abc", 5).add_table("xyz", 12);
        let poller = Poller::new(&mock, Config::new());
        let mut sink = MockSink::new();

        let stats = poller.run_cycle(&mut sink);
        assert_eq!(stats.tables_polled, 2);
        assert_eq!(sink.value_for("abc"), Some(5.0));
        assert_eq!(sink.value_for("xyz"), Some(12.0));
    }

    #[test]
    fn test_submissions_use_gauge_type() {
        let mock = MockPf::new().add_table("abc", 5);
        let poller = Poller::new(&mock, config_for(&["abc"]));
        let mut sink = MockSink::new();

        poller.run_cycle(&mut sink);
        let (type_name, instance, value) = &sink.submissions()[0];
        assert_eq!(type_name, GAUGE_TYPE);
        assert_eq!(instance, "abc");
        assert_eq!(*value, 5.0);
    }
}

//! pftables - pf(4) table entry gauge collector library.
//!
//! This library provides the core functionality for `pftablesd`, a daemon
//! that periodically counts the entries of named pf address tables and
//! reports each count as a gauge metric:
//! - [`buffer`] - growable typed record buffer for kernel enumeration results
//! - [`pf`] - the `/dev/pf` enumeration boundary (real device and mock)
//! - [`driver`] - the retry-until-fits enumeration driver
//! - [`config`] - collectd-style `Table <name>` configuration
//! - [`metrics`] - gauge submission sinks
//! - [`poll`] - the per-table poll cycle

pub mod buffer;
pub mod config;
pub mod driver;
pub mod metrics;
pub mod pf;
pub mod poll;

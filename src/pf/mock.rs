//! Scripted in-memory pf backend for testing.
//!
//! `MockPf` simulates the enumeration ioctls without a pf kernel: each
//! table has a scripted entry count (or failure), and every attempt is
//! recorded with its offered capacity so tests can assert on the retry
//! protocol. Copied records get a marker byte so zero-fill behavior stays
//! observable.

use crate::pf::types::{PF_TABLE_NAME_SIZE, PFR_TABLE_NAME_OFFSET};
use crate::pf::{Enumeration, PfBackend, PfError, TableFilter, check_destination};
use std::cell::RefCell;
use std::io;

/// Marker byte the mock writes into the first byte of every copied record.
pub const RECORD_MARKER: u8 = 0x01;

/// Scripted failure for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    TableNotFound,
    RulesetNotFound,
    Unreachable,
    System(i32),
}

impl MockFailure {
    fn to_error(self) -> PfError {
        match self {
            MockFailure::TableNotFound => PfError::TableNotFound,
            MockFailure::RulesetNotFound => PfError::RulesetNotFound,
            MockFailure::Unreachable => {
                PfError::KernelUnreachable(io::Error::from_raw_os_error(libc::ENXIO))
            }
            MockFailure::System(errno) => PfError::from_os(io::Error::from_raw_os_error(errno)),
        }
    }
}

/// One recorded enumeration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// Table name the attempt was scoped to (empty for "all tables").
    pub table: String,
    /// Capacity offered to the call, in records.
    pub offered: usize,
}

#[derive(Debug, Clone)]
enum Behavior {
    Entries(usize),
    Fail(MockFailure),
}

/// In-memory pf backend with scripted per-table outcomes.
#[derive(Debug, Default)]
pub struct MockPf {
    tables: Vec<(String, Behavior)>,
    attempts: RefCell<Vec<Attempt>>,
}

impl MockPf {
    /// Creates a mock with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a table reporting the given entry count.
    pub fn add_table(mut self, name: impl Into<String>, entries: usize) -> Self {
        self.tables.push((name.into(), Behavior::Entries(entries)));
        self
    }

    /// Scripts a table whose enumeration fails.
    pub fn fail_table(mut self, name: impl Into<String>, failure: MockFailure) -> Self {
        self.tables.push((name.into(), Behavior::Fail(failure)));
        self
    }

    /// A small fixture used when the daemon runs on a host without pf.
    pub fn with_sample_tables() -> Self {
        Self::new()
            .add_table("spammers", 150)
            .add_table("goodguys", 5)
    }

    /// All recorded attempts, in call order.
    pub fn attempts(&self) -> Vec<Attempt> {
        self.attempts.borrow().clone()
    }

    /// Offered capacities recorded for one table, in call order.
    pub fn offered_for(&self, table: &str) -> Vec<usize> {
        self.attempts
            .borrow()
            .iter()
            .filter(|a| a.table == table)
            .map(|a| a.offered)
            .collect()
    }

    fn record_attempt(&self, filter: &TableFilter, offered: usize) {
        self.attempts.borrow_mut().push(Attempt {
            table: filter.name().to_string(),
            offered,
        });
    }

    fn total_for(&self, filter: &TableFilter) -> Result<usize, PfError> {
        if filter.is_all() {
            let mut total = 0;
            for (_, behavior) in &self.tables {
                match behavior {
                    Behavior::Entries(n) => total += n,
                    Behavior::Fail(failure) => return Err(failure.to_error()),
                }
            }
            return Ok(total);
        }
        match self.tables.iter().find(|(name, _)| name == filter.name()) {
            Some((_, Behavior::Entries(n))) => Ok(*n),
            Some((_, Behavior::Fail(failure))) => Err(failure.to_error()),
            None => Err(PfError::TableNotFound),
        }
    }
}

impl PfBackend for MockPf {
    fn get_addrs(
        &self,
        filter: &TableFilter,
        destination: &mut [u8],
        element_size: usize,
        offered: usize,
    ) -> Result<Enumeration, PfError> {
        check_destination(destination, element_size, offered)?;
        self.record_attempt(filter, offered);

        let total = self.total_for(filter)?;
        let copied = total.min(offered);
        for slot in destination.chunks_exact_mut(element_size).take(copied) {
            slot[0] = RECORD_MARKER;
        }
        Ok(Enumeration { copied, total })
    }

    fn get_tables(
        &self,
        filter: &TableFilter,
        destination: &mut [u8],
        element_size: usize,
        offered: usize,
    ) -> Result<Enumeration, PfError> {
        check_destination(destination, element_size, offered)?;
        self.record_attempt(filter, offered);

        let total = self.tables.len();
        let copied = total.min(offered);
        for (slot, (name, _)) in destination
            .chunks_exact_mut(element_size)
            .zip(&self.tables)
            .take(copied)
        {
            let len = name.len().min(PF_TABLE_NAME_SIZE - 1);
            slot[PFR_TABLE_NAME_OFFSET..PFR_TABLE_NAME_OFFSET + len]
                .copy_from_slice(&name.as_bytes()[..len]);
        }
        Ok(Enumeration { copied, total })
    }
}

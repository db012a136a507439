//! Retry-until-fits enumeration driver.
//!
//! The kernel reports the true total of matching records on every call, no
//! matter how many fit the offered buffer. The driver grows the buffer
//! (floor 64, then doubling) and repeats the call until the total fits,
//! then counts by iterating the valid region. For a true total of K the
//! loop terminates within about `log2(K / 64) + 2` attempts.

use crate::buffer::{RecordBuffer, RecordKind};
use crate::pf::types::table_name_from_record;
use crate::pf::{PfBackend, PfError, TableFilter};
use tracing::trace;

/// Runs the grow/enumerate loop for one record kind and returns the filled
/// buffer once every matching record has been copied.
fn enumerate_all<F>(kind: RecordKind, mut call: F) -> Result<RecordBuffer, PfError>
where
    F: FnMut(&mut [u8], usize, usize) -> Result<crate::pf::Enumeration, PfError>,
{
    let mut buffer = RecordBuffer::new(kind);
    loop {
        buffer.grow(0)?;
        let offered = buffer.capacity();
        // Offer the full current capacity; the call reports the true total.
        buffer.set_count(offered);
        let element_size = buffer.element_size();
        let outcome = call(buffer.bytes_mut(), element_size, offered)?;
        buffer.set_count(outcome.total);
        if outcome.total <= offered {
            return Ok(buffer);
        }
        trace!(
            total = outcome.total,
            offered, "enumeration truncated, growing buffer"
        );
    }
}

/// Counts the address entries of one table.
///
/// The final count is produced by iterating the filled buffer rather than
/// trusting the kernel-reported total, matching pfctl's `PFRB_FOREACH`
/// tally.
pub fn count_table_entries<B: PfBackend>(
    backend: &B,
    filter: &TableFilter,
) -> Result<u64, PfError> {
    let buffer = enumerate_all(RecordKind::Addrs, |dst, es, offered| {
        backend.get_addrs(filter, dst, es, offered)
    })?;
    Ok(buffer.iter().count() as u64)
}

/// Lists the names of all tables currently defined in the kernel.
pub fn list_tables<B: PfBackend>(backend: &B) -> Result<Vec<String>, PfError> {
    let filter = TableFilter::all();
    let buffer = enumerate_all(RecordKind::Tables, |dst, es, offered| {
        backend.get_tables(&filter, dst, es, offered)
    })?;
    Ok(buffer.iter().map(table_name_from_record).collect())
}

//! The pf kernel enumeration boundary.
//!
//! The `PfBackend` trait abstracts the privileged "enumerate records
//! matching a table filter into a buffer, report the true total" ioctls so
//! the driver and poll cycle can run against the real `/dev/pf` device or a
//! scripted mock:
//!
//! ```text
//!        ┌─────────────────┐
//!        │  driver / poll  │
//!        └────────┬────────┘
//!                 │
//!          ┌──────▼──────┐
//!          │  PfBackend  │ (trait)
//!          └──────┬──────┘
//!       ┌─────────┴─────────┐
//! ┌─────▼─────┐       ┌─────▼─────┐
//! │ PfDevice  │       │  MockPf   │
//! │ (/dev/pf) │       │ (testing) │
//! └───────────┘       └───────────┘
//! ```

#[cfg(any(
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "macos"
))]
mod device;
pub mod mock;
pub mod types;

#[cfg(any(
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "macos"
))]
pub use device::PfDevice;
pub use mock::MockPf;

use crate::buffer::BufferError;
use std::io;

pub use types::PF_TABLE_NAME_SIZE;

/// Error type for pf enumeration failures.
///
/// The kernel-reported conditions carry the same human-readable strings as
/// pfctl's `pfr_strerror`.
#[derive(Debug)]
pub enum PfError {
    /// Programmer-visible misuse of the enumeration call.
    InvalidArguments(&'static str),
    /// The pf control device could not be opened.
    KernelUnreachable(io::Error),
    /// The filtered table does not exist (ESRCH).
    TableNotFound,
    /// The anchor or ruleset does not exist (ENOENT).
    RulesetNotFound,
    /// Any other OS-level failure.
    System(io::Error),
    /// Buffer sizing failed while preparing the call.
    Buffer(BufferError),
}

impl PfError {
    /// Maps an ioctl failure to the pf error taxonomy.
    pub fn from_os(err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::ESRCH) => PfError::TableNotFound,
            Some(libc::ENOENT) => PfError::RulesetNotFound,
            _ => PfError::System(err),
        }
    }
}

impl std::fmt::Display for PfError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PfError::InvalidArguments(msg) => write!(f, "invalid arguments: {}", msg),
            PfError::KernelUnreachable(e) => write!(f, "cannot open pf control device: {}", e),
            PfError::TableNotFound => write!(f, "Table does not exist"),
            PfError::RulesetNotFound => write!(f, "Anchor or Ruleset does not exist"),
            PfError::System(e) => write!(f, "{}", e),
            PfError::Buffer(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for PfError {}

impl From<BufferError> for PfError {
    fn from(e: BufferError) -> Self {
        PfError::Buffer(e)
    }
}

/// Table scope for an enumeration call.
///
/// An empty name means "all tables".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFilter {
    name: String,
}

impl TableFilter {
    /// Creates a filter scoped to one table.
    ///
    /// The name must fit the kernel's fixed field: at most
    /// `PF_TABLE_NAME_SIZE - 1` bytes, no interior NUL.
    pub fn new(name: impl Into<String>) -> Result<Self, PfError> {
        let name = name.into();
        if name.len() >= PF_TABLE_NAME_SIZE {
            return Err(PfError::InvalidArguments("table name too long"));
        }
        if name.as_bytes().contains(&0) {
            return Err(PfError::InvalidArguments("table name contains NUL"));
        }
        Ok(Self { name })
    }

    /// Filter matching every table.
    pub fn all() -> Self {
        Self {
            name: String::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_all(&self) -> bool {
        self.name.is_empty()
    }

    /// Builds the C table descriptor carrying this filter.
    pub fn to_pfr_table(&self) -> types::PfrTable {
        let mut table = types::PfrTable::zeroed();
        table.name[..self.name.len()].copy_from_slice(self.name.as_bytes());
        table
    }
}

/// Outcome of one enumeration attempt.
///
/// Replaces the ioctl's in/out size parameter: `copied` records landed in
/// the destination, `total` is the kernel's true matching count. Truncation
/// is `total > copied`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enumeration {
    pub copied: usize,
    pub total: usize,
}

impl Enumeration {
    pub fn truncated(&self) -> bool {
        self.total > self.copied
    }
}

/// The privileged pf enumeration interface.
///
/// Both operations are idempotent and safe to repeat: re-issuing a call
/// with a larger destination after a truncated result is the documented
/// retry protocol. `destination` must hold at least
/// `offered * element_size` bytes.
pub trait PfBackend {
    /// Enumerates address entries of the filtered table.
    fn get_addrs(
        &self,
        filter: &TableFilter,
        destination: &mut [u8],
        element_size: usize,
        offered: usize,
    ) -> Result<Enumeration, PfError>;

    /// Enumerates table descriptors matching the filter.
    fn get_tables(
        &self,
        filter: &TableFilter,
        destination: &mut [u8],
        element_size: usize,
        offered: usize,
    ) -> Result<Enumeration, PfError>;
}

/// Backends hold no caller-visible state, so shared references work
/// everywhere a backend is needed.
impl<B: PfBackend + ?Sized> PfBackend for &B {
    fn get_addrs(
        &self,
        filter: &TableFilter,
        destination: &mut [u8],
        element_size: usize,
        offered: usize,
    ) -> Result<Enumeration, PfError> {
        (**self).get_addrs(filter, destination, element_size, offered)
    }

    fn get_tables(
        &self,
        filter: &TableFilter,
        destination: &mut [u8],
        element_size: usize,
        offered: usize,
    ) -> Result<Enumeration, PfError> {
        (**self).get_tables(filter, destination, element_size, offered)
    }
}

/// Validates the destination/capacity pair common to both operations.
pub(crate) fn check_destination(
    destination: &[u8],
    element_size: usize,
    offered: usize,
) -> Result<(), PfError> {
    if element_size == 0 {
        return Err(PfError::InvalidArguments("zero element size"));
    }
    let needed = offered
        .checked_mul(element_size)
        .ok_or(PfError::InvalidArguments("capacity overflows byte size"))?;
    if destination.len() < needed {
        return Err(PfError::InvalidArguments(
            "destination smaller than offered capacity",
        ));
    }
    Ok(())
}

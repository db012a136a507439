//! Real pf control device backend.
//!
//! Opens `/dev/pf` per call, issues the table ioctl, and closes the
//! descriptor again - the same open/ioctl/close cadence as pfctl's
//! `pfr_get_addrs`/`pfr_get_tables`.

use crate::pf::types::PfiocTable;
use crate::pf::{Enumeration, PfBackend, PfError, TableFilter, check_destination};
use std::ffi::{CString, c_int, c_ulong};
use std::io;
use std::mem::size_of;
use std::path::{Path, PathBuf};

const IOCPARM_MASK: c_ulong = 0x1fff;
const IOC_OUT: c_ulong = 0x4000_0000;
const IOC_IN: c_ulong = 0x8000_0000;

/// BSD `_IOWR` encoding.
const fn iowr(group: u8, num: u8, len: usize) -> c_ulong {
    (IOC_IN | IOC_OUT)
        | (((len as c_ulong) & IOCPARM_MASK) << 16)
        | ((group as c_ulong) << 8)
        | num as c_ulong
}

const DIOCRGETTABLES: c_ulong = iowr(b'D', 63, size_of::<PfiocTable>());
const DIOCRGETADDRS: c_ulong = iowr(b'D', 70, size_of::<PfiocTable>());

/// Backend that talks to the pf control device.
#[derive(Debug, Clone)]
pub struct PfDevice {
    path: PathBuf,
}

impl PfDevice {
    pub const DEFAULT_PATH: &'static str = "/dev/pf";

    /// Creates a backend for the default `/dev/pf` device.
    pub fn new() -> Self {
        Self::with_path(Self::DEFAULT_PATH)
    }

    /// Creates a backend for an alternate device path.
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn request(
        &self,
        cmd: c_ulong,
        filter: &TableFilter,
        destination: &mut [u8],
        element_size: usize,
        offered: usize,
    ) -> Result<Enumeration, PfError> {
        check_destination(destination, element_size, offered)?;
        if offered > c_int::MAX as usize {
            return Err(PfError::InvalidArguments("capacity exceeds ioctl range"));
        }

        let mut io_req = PfiocTable::zeroed();
        io_req.table = filter.to_pfr_table();
        io_req.buffer = destination.as_mut_ptr().cast();
        io_req.esize = element_size as c_int;
        io_req.size = offered as c_int;

        let path = CString::new(self.path.as_os_str().as_encoded_bytes())
            .map_err(|_| PfError::InvalidArguments("device path contains NUL"))?;

        // SAFETY: path is a valid NUL-terminated string; io_req points at
        // destination, which stays borrowed for the whole call.
        let fd = unsafe { libc::open(path.as_ptr(), libc::O_RDONLY) };
        if fd < 0 {
            return Err(PfError::KernelUnreachable(io::Error::last_os_error()));
        }
        let rc = unsafe { libc::ioctl(fd, cmd, &mut io_req) };
        let err = io::Error::last_os_error();
        unsafe { libc::close(fd) };

        if rc != 0 {
            return Err(PfError::from_os(err));
        }
        let total = io_req.size as usize;
        Ok(Enumeration {
            copied: total.min(offered),
            total,
        })
    }
}

impl Default for PfDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl PfBackend for PfDevice {
    fn get_addrs(
        &self,
        filter: &TableFilter,
        destination: &mut [u8],
        element_size: usize,
        offered: usize,
    ) -> Result<Enumeration, PfError> {
        self.request(DIOCRGETADDRS, filter, destination, element_size, offered)
    }

    fn get_tables(
        &self,
        filter: &TableFilter,
        destination: &mut [u8],
        element_size: usize,
        offered: usize,
    ) -> Result<Enumeration, PfError> {
        self.request(DIOCRGETTABLES, filter, destination, element_size, offered)
    }
}

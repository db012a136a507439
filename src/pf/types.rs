//! C-compatible record layouts for the pf table ioctls.
//!
//! Layouts follow the `pfvar.h` shapes the collectd pftables plugin was
//! built against. Only `pfr_table` and `pfr_addr` records are decoded by
//! this daemon; the remaining kinds participate through their sizes in the
//! record-kind size table.

use std::ffi::c_int;
use std::ffi::c_void;

/// Maximum table name length, including the trailing NUL.
pub const PF_TABLE_NAME_SIZE: usize = 32;
/// Anchor path length (`MAXPATHLEN`).
pub const PF_ANCHOR_SIZE: usize = 1024;
/// Interface name length (`IFNAMSIZ`).
pub const PF_IFNAME_SIZE: usize = 16;

/// Byte offset of the name field inside a raw `pfr_table` record.
pub const PFR_TABLE_NAME_OFFSET: usize = PF_ANCHOR_SIZE;

/// Table descriptor (`struct pfr_table`).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PfrTable {
    pub anchor: [u8; PF_ANCHOR_SIZE],
    pub name: [u8; PF_TABLE_NAME_SIZE],
    pub flags: u32,
    pub fback: u8,
}

impl PfrTable {
    pub fn zeroed() -> Self {
        Self {
            anchor: [0; PF_ANCHOR_SIZE],
            name: [0; PF_TABLE_NAME_SIZE],
            flags: 0,
            fback: 0,
        }
    }
}

/// Address entry (`struct pfr_addr`).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PfrAddr {
    /// IPv4/IPv6 address union, sized for `in6_addr`.
    pub addr: [u8; 16],
    pub af: u8,
    pub net: u8,
    pub not: u8,
    pub fback: u8,
}

/// Table statistics (`struct pfr_tstats`).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PfrTstats {
    pub table: PfrTable,
    pub packets: [[u64; 3]; 2],
    pub bytes: [[u64; 3]; 2],
    pub match_: u64,
    pub nomatch: u64,
    pub tzero: i64,
    pub cnt: i32,
    pub refcnt: [i32; 2],
}

/// Address statistics (`struct pfr_astats`).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PfrAstats {
    pub addr: PfrAddr,
    pub packets: [[u64; 3]; 2],
    pub bytes: [[u64; 3]; 2],
    pub tzero: i64,
}

/// Interface descriptor (userland view of `struct pfi_kif`).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PfiKif {
    pub name: [u8; PF_IFNAME_SIZE],
    pub packets: [[[u64; 2]; 2]; 2],
    pub bytes: [[[u64; 2]; 2]; 2],
    pub tzero: u32,
    pub flags: i32,
    pub states: i32,
    pub rules: i32,
}

/// Transaction element (`struct pfioc_trans_e`).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PfiocTransElem {
    pub rs_num: c_int,
    pub anchor: [u8; PF_ANCHOR_SIZE],
    pub ticket: u32,
}

/// Table ioctl request block (`struct pfioc_table`).
///
/// `size` is the in/out parameter of the enumeration protocol: capacity
/// offered on the way in, true total on the way out.
#[repr(C)]
pub struct PfiocTable {
    pub table: PfrTable,
    pub buffer: *mut c_void,
    pub esize: c_int,
    pub size: c_int,
    pub size2: c_int,
    pub nadd: c_int,
    pub ndel: c_int,
    pub nchange: c_int,
    pub flags: c_int,
    pub ticket: u32,
}

impl PfiocTable {
    pub fn zeroed() -> Self {
        Self {
            table: PfrTable::zeroed(),
            buffer: std::ptr::null_mut(),
            esize: 0,
            size: 0,
            size2: 0,
            nadd: 0,
            ndel: 0,
            nchange: 0,
            flags: 0,
            ticket: 0,
        }
    }
}

/// Decodes the NUL-terminated table name from a raw `pfr_table` record.
pub fn table_name_from_record(record: &[u8]) -> String {
    let field = &record[PFR_TABLE_NAME_OFFSET..PFR_TABLE_NAME_OFFSET + PF_TABLE_NAME_SIZE];
    let len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..len]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn test_table_name_offset_matches_layout() {
        assert_eq!(std::mem::offset_of!(PfrTable, name), PFR_TABLE_NAME_OFFSET);
    }

    #[test]
    fn test_record_sizes_are_nonzero_and_distinct_where_expected() {
        assert!(size_of::<PfrAddr>() < size_of::<PfrAstats>());
        assert!(size_of::<PfrTable>() < size_of::<PfrTstats>());
    }

    #[test]
    fn test_table_name_from_record() {
        let mut rec = vec![0u8; size_of::<PfrTable>()];
        rec[PFR_TABLE_NAME_OFFSET..PFR_TABLE_NAME_OFFSET + 3].copy_from_slice(b"abc");
        assert_eq!(table_name_from_record(&rec), "abc");
    }

    #[test]
    fn test_table_name_from_record_full_width() {
        // A name using all 31 usable bytes, no interior NUL.
        let mut rec = vec![0u8; size_of::<PfrTable>()];
        let name = "x".repeat(PF_TABLE_NAME_SIZE - 1);
        rec[PFR_TABLE_NAME_OFFSET..PFR_TABLE_NAME_OFFSET + name.len()]
            .copy_from_slice(name.as_bytes());
        assert_eq!(table_name_from_record(&rec), name);
    }
}

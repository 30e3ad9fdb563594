//! Fat-binary container handling: walking a v2 container, decompressing
//! its sections, and scanning embedded PTX text for kernel signatures.
//!
//! Everything in this crate is a pure function of its byte input; failures
//! degrade to skipped sections or zero widths rather than errors that would
//! abort a host program's module load.

pub mod container;
pub mod lz;
pub mod ptx;

pub use container::{
    EntryFlags, FatBinary, FatbinError, ENTRY_KIND_PTX, FATBIN_HEADER_MAGIC, FATBIN_WRAPPER_MAGIC,
};
pub use ptx::{scan, KernelDecl, MAX_KERNEL_NAME, MAX_KERNEL_PARAMS};

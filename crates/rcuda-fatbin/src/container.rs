//! v2 fat-binary container walking.
//!
//! A container is a 16-byte header followed by a region of concatenated
//! entries. Each 64-byte entry header declares its kind, the payload's
//! offset from the entry header, its (possibly compressed) size on disk,
//! flag bits, and the uncompressed size. Only PTX entries are of interest
//! here; everything else is skipped.

use std::borrow::Cow;

use bitflags::bitflags;
use tracing::warn;

use crate::lz;

/// Sentinel at offset 0 of the wrapper record the host runtime registers.
/// Other values identify container variants this walker does not parse.
pub const FATBIN_WRAPPER_MAGIC: u32 = 0x466243b1;

/// Sentinel at offset 0 of the embedded container header.
pub const FATBIN_HEADER_MAGIC: u32 = 0xba55ed50;

/// Byte length of the container header; the entries region follows it.
pub const HEADER_LEN: usize = 16;

/// Byte length of one entry header.
pub const ENTRY_HEADER_LEN: usize = 64;

/// Entry kind bit marking PTX text sections.
pub const ENTRY_KIND_PTX: u32 = 0x1;

bitflags! {
    /// Entry flag word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EntryFlags: u64 {
        const SIXTY_FOUR_BIT = 0x0000_0001;
        const DEBUG          = 0x0000_0002;
        const LINUX          = 0x0000_0010;
        const COMPRESSED     = 0x0000_2000;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FatbinError {
    #[error("bad container magic 0x{0:08x}")]
    BadMagic(u32),

    #[error("container truncated: region declares {declared} bytes, {actual} present")]
    Truncated { declared: u64, actual: usize },
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().expect("bounds checked"))
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(bytes[offset..offset + 8].try_into().expect("bounds checked"))
}

#[derive(Debug, Clone, Copy)]
struct EntryHeader {
    kind: u32,
    payload_offset: u32,
    payload_size: u64,
    flags: EntryFlags,
    uncompressed_size: u64,
}

impl EntryHeader {
    fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < ENTRY_HEADER_LEN {
            return None;
        }
        Some(Self {
            kind: read_u32(bytes, 0),
            payload_offset: read_u32(bytes, 4),
            payload_size: read_u64(bytes, 8),
            flags: EntryFlags::from_bits_truncate(read_u64(bytes, 40)),
            uncompressed_size: read_u64(bytes, 56),
        })
    }
}

/// A validated view over a fat-binary container (header plus region).
pub struct FatBinary<'a> {
    region: &'a [u8],
}

impl<'a> FatBinary<'a> {
    /// Parse a container starting at its embedded header. The header's
    /// declared size bounds every later read; bytes past it are ignored.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, FatbinError> {
        if bytes.len() < HEADER_LEN {
            return Err(FatbinError::Truncated {
                declared: HEADER_LEN as u64,
                actual: bytes.len(),
            });
        }
        let magic = read_u32(bytes, 0);
        if magic != FATBIN_HEADER_MAGIC {
            return Err(FatbinError::BadMagic(magic));
        }
        let size = read_u64(bytes, 8);
        let available = bytes.len() - HEADER_LEN;
        if size as usize > available {
            return Err(FatbinError::Truncated {
                declared: size,
                actual: available,
            });
        }
        Ok(Self {
            region: &bytes[HEADER_LEN..HEADER_LEN + size as usize],
        })
    }

    /// Walk the entries region and collect the text of every PTX section,
    /// decompressing where the entry is marked compressed.
    ///
    /// Rejection is per entry: a section that fails its structural checks
    /// is skipped and the walk continues.
    pub fn ptx_sections(&self) -> Vec<Cow<'a, [u8]>> {
        let mut sections = Vec::new();
        let mut offset = 0usize;

        while offset + ENTRY_HEADER_LEN <= self.region.len() {
            let entry = match EntryHeader::parse(&self.region[offset..]) {
                Some(e) => e,
                None => break,
            };

            if entry.kind & ENTRY_KIND_PTX != 0 {
                if let Some(text) = self.extract(offset, &entry) {
                    sections.push(text);
                }
            }

            // The container declares its own layout: each entry is followed
            // by the next at payload_offset + payload_size.
            let advance = (entry.payload_offset as u64).saturating_add(entry.payload_size);
            if advance == 0 {
                warn!("fat binary entry with zero advance at offset {offset}, stopping walk");
                break;
            }
            offset = match offset.checked_add(advance as usize) {
                Some(next) => next,
                None => break,
            };
        }

        sections
    }

    fn extract(&self, entry_offset: usize, entry: &EntryHeader) -> Option<Cow<'a, [u8]>> {
        let start = entry_offset.checked_add(entry.payload_offset as usize)?;
        let end = start.checked_add(entry.payload_size as usize)?;
        if end > self.region.len() {
            warn!(
                "PTX entry at offset {entry_offset} overruns the region ({} > {})",
                end,
                self.region.len()
            );
            return None;
        }
        let payload = &self.region[start..end];

        if !entry.flags.contains(EntryFlags::COMPRESSED) {
            return Some(Cow::Borrowed(payload));
        }

        let uncompressed = entry.uncompressed_size as usize;
        let capacity = uncompressed.checked_add(7)?;
        let mut out = Vec::new();
        if out.try_reserve_exact(capacity).is_err() {
            warn!("cannot allocate {capacity} bytes for PTX section");
            return None;
        }
        out.resize(capacity, 0);

        let written = lz::decompress(payload, &mut out[..uncompressed]);
        if written != uncompressed {
            warn!(
                "PTX entry at offset {entry_offset} decompressed to {written} bytes, \
                 expected {uncompressed}"
            );
            return None;
        }

        // The compressed payload is padded to 8-byte alignment with zeros;
        // anything else means the entry is laid out differently than the
        // header claims.
        let pad = entry.payload_size.wrapping_neg() as usize % 8;
        let pad_end = (end + pad).min(self.region.len());
        if self.region[end..pad_end].iter().any(|&b| b != 0) {
            warn!("PTX entry at offset {entry_offset} has non-zero alignment padding");
            return None;
        }

        // Pad the text itself to 8 bytes with zeros.
        for b in &mut out[uncompressed..] {
            *b = 0;
        }
        out.truncate(uncompressed + (uncompressed.wrapping_neg() % 8));
        Some(Cow::Owned(out))
    }
}

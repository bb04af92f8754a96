//! Walks the raw topology buffer record by record, with bounds checks before every read.
//!
//! Nothing in here interprets record payloads beyond the fields needed to find record
//! boundaries; that is the job of the `record` module.

use std::iter::FusedIterator;
use std::slice::ChunksExact;

use crate::{Error, MaskWidth, Result};

/// Size of the header that starts every extended record: relationship tag (u32) followed by the
/// total record size in bytes (u32), header included.
pub(crate) const EXTENDED_HEADER_SIZE: usize = 8;

const EXTENDED_SIZE_OFFSET: usize = 4;

// Largest member of the legacy relationship union: a 16-byte cache descriptor.
const LEGACY_UNION_SIZE: usize = 16;

/// One record cut out of the buffer, not yet decoded.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TaggedRecord<'a> {
    pub(crate) tag: u32,

    /// Offset of the first byte of the record within the buffer.
    pub(crate) offset: usize,

    /// The entire record, including any header.
    pub(crate) bytes: &'a [u8],
}

impl TaggedRecord<'_> {
    /// Fails with [`Error::TruncatedRecord`] unless the record has at least `needed` bytes.
    pub(crate) fn require(&self, needed: usize) -> Result<()> {
        if self.bytes.len() < needed {
            return Err(Error::TruncatedRecord {
                tag: self.tag,
                offset: self.offset,
                needed,
                available: self.bytes.len(),
            });
        }

        Ok(())
    }
}

/// Returns the part of the buffer that the platform declared as valid.
pub(crate) fn valid_region(bytes: &[u8], valid_len: usize) -> Result<&[u8]> {
    bytes.get(..valid_len).ok_or(Error::TruncatedBuffer {
        offset: 0,
        needed: valid_len,
        available: bytes.len(),
    })
}

/// Iterates over the variable-size records of the extended format.
///
/// Records with unknown tags are yielded like any other - it is up to the caller to skip them.
/// The iterator ends after the first error.
#[derive(Debug)]
pub(crate) struct ExtendedRecords<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ExtendedRecords<'a> {
    pub(crate) fn new(bytes: &'a [u8], valid_len: usize) -> Result<Self> {
        Ok(Self {
            bytes: valid_region(bytes, valid_len)?,
            offset: 0,
        })
    }

    fn read_next(&mut self) -> Result<TaggedRecord<'a>> {
        let offset = self.offset;
        let remaining = self.bytes.get(offset..).unwrap_or_default();

        let (Some(tag), Some(size)) = (
            read_u32(remaining, 0),
            read_u32(remaining, EXTENDED_SIZE_OFFSET),
        ) else {
            return Err(Error::TruncatedBuffer {
                offset,
                needed: EXTENDED_HEADER_SIZE,
                available: remaining.len(),
            });
        };

        let size = usize::try_from(size).unwrap_or(usize::MAX);

        // A record shorter than its own header would never move the cursor forward.
        if size < EXTENDED_HEADER_SIZE {
            return Err(Error::TruncatedRecord {
                tag,
                offset,
                needed: EXTENDED_HEADER_SIZE,
                available: size,
            });
        }

        let Some(bytes) = remaining.get(..size) else {
            return Err(Error::TruncatedRecord {
                tag,
                offset,
                needed: size,
                available: remaining.len(),
            });
        };

        // Cannot overflow: offset + size <= self.bytes.len().
        self.offset = offset.saturating_add(size);

        Ok(TaggedRecord { tag, offset, bytes })
    }
}

impl<'a> Iterator for ExtendedRecords<'a> {
    type Item = Result<TaggedRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.bytes.len() {
            return None;
        }

        let result = self.read_next();

        if result.is_err() {
            // Once we have lost track of record boundaries, there is nothing more to read.
            self.offset = self.bytes.len();
        }

        Some(result)
    }
}

impl FusedIterator for ExtendedRecords<'_> {}

/// Iterates over the fixed-size records of the legacy format.
#[derive(Debug)]
pub(crate) struct LegacyRecords<'a> {
    chunks: ChunksExact<'a, u8>,
    mask_width: MaskWidth,
    record_size: usize,
    index: usize,
}

impl<'a> LegacyRecords<'a> {
    pub(crate) fn new(bytes: &'a [u8], valid_len: usize, mask_width: MaskWidth) -> Result<Self> {
        let bytes = valid_region(bytes, valid_len)?;
        let record_size = legacy_record_size(mask_width);

        let chunks = bytes.chunks_exact(record_size);

        let remainder = chunks.remainder().len();
        if remainder != 0 {
            return Err(Error::TruncatedBuffer {
                // The remainder is never larger than the buffer.
                offset: bytes.len().saturating_sub(remainder),
                needed: record_size,
                available: remainder,
            });
        }

        Ok(Self {
            chunks,
            mask_width,
            record_size,
            index: 0,
        })
    }
}

impl<'a> Iterator for LegacyRecords<'a> {
    type Item = TaggedRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.chunks.next()?;

        let offset = self.index.saturating_mul(self.record_size);
        self.index = self.index.saturating_add(1);

        // Every chunk is a full record, so the tag is always present.
        let tag = read_u32(bytes, legacy_relationship_offset(self.mask_width)).unwrap_or_default();

        Some(TaggedRecord { tag, offset, bytes })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for LegacyRecords<'_> {}

impl FusedIterator for LegacyRecords<'_> {}

/// Offset of the relationship tag in a legacy record; it directly follows the mask.
pub(crate) const fn legacy_relationship_offset(mask_width: MaskWidth) -> usize {
    mask_width.bytes()
}

/// Offset of the relationship-specific union (whose first byte is the flags byte) in a legacy
/// record. The union contains 64-bit members, so it is 8-byte aligned on every target.
pub(crate) const fn legacy_union_offset(mask_width: MaskWidth) -> usize {
    match mask_width {
        MaskWidth::Bits32 => 8,
        MaskWidth::Bits64 => 16,
    }
}

/// Size of one legacy record: mask, relationship tag and a 16-byte union.
pub(crate) const fn legacy_record_size(mask_width: MaskWidth) -> usize {
    // Both terms are small constants.
    legacy_union_offset(mask_width).saturating_add(LEGACY_UNION_SIZE)
}

pub(crate) fn read_u8(bytes: &[u8], offset: usize) -> Option<u8> {
    bytes.get(offset).copied()
}

pub(crate) fn read_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    read_array(bytes, offset).map(u16::from_le_bytes)
}

pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    read_array(bytes, offset).map(u32::from_le_bytes)
}

/// Reads a native-word affinity mask, widening 32-bit masks.
pub(crate) fn read_mask(bytes: &[u8], offset: usize, mask_width: MaskWidth) -> Option<u64> {
    match mask_width {
        MaskWidth::Bits32 => read_u32(bytes, offset).map(u64::from),
        MaskWidth::Bits64 => read_array(bytes, offset).map(u64::from_le_bytes),
    }
}

fn read_array<const N: usize>(bytes: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;

    bytes.get(offset..end)?.try_into().ok()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn extended_record(tag: u32, size: u32, payload_len: usize) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&tag.to_le_bytes());
        bytes.extend_from_slice(&size.to_le_bytes());
        bytes.resize(EXTENDED_HEADER_SIZE + payload_len, 0xAA);
        bytes
    }

    #[test]
    fn extended_walks_records_by_declared_size() {
        let mut bytes = extended_record(0, 48, 40);
        bytes.extend(extended_record(99, 16, 8));
        bytes.extend(extended_record(3, 48, 40));

        let records = ExtendedRecords::new(&bytes, bytes.len())
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();

        assert_eq!(records.len(), 3);

        assert_eq!(records[0].tag, 0);
        assert_eq!(records[0].offset, 0);
        assert_eq!(records[0].bytes.len(), 48);

        // Unknown tags are walked over like any other.
        assert_eq!(records[1].tag, 99);
        assert_eq!(records[1].offset, 48);
        assert_eq!(records[1].bytes.len(), 16);

        assert_eq!(records[2].tag, 3);
        assert_eq!(records[2].offset, 64);
    }

    #[test]
    fn extended_empty_buffer_has_no_records() {
        assert_eq!(ExtendedRecords::new(&[], 0).unwrap().count(), 0);
    }

    #[test]
    fn extended_only_reads_valid_region() {
        let mut bytes = extended_record(0, 16, 8);
        // Garbage past the valid length must not be touched.
        bytes.extend_from_slice(&[0xFF; 5]);

        let records = ExtendedRecords::new(&bytes, 16)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();

        assert_eq!(records.len(), 1);
    }

    #[test]
    fn extended_valid_len_beyond_buffer_is_error() {
        let bytes = extended_record(0, 16, 8);

        let error = ExtendedRecords::new(&bytes, 17).unwrap_err();

        assert!(matches!(
            error,
            Error::TruncatedBuffer {
                offset: 0,
                needed: 17,
                available: 16
            }
        ));
    }

    #[test]
    fn extended_declared_size_beyond_end_is_truncated_record() {
        let mut bytes = extended_record(0, 16, 8);
        bytes.extend(extended_record(3, 64, 8));

        let mut records = ExtendedRecords::new(&bytes, bytes.len()).unwrap();

        records.next().unwrap().unwrap();
        let error = records.next().unwrap().unwrap_err();

        assert!(matches!(
            error,
            Error::TruncatedRecord {
                tag: 3,
                offset: 16,
                needed: 64,
                available: 16
            }
        ));

        // Fused after the error.
        assert!(records.next().is_none());
    }

    #[test]
    fn extended_partial_header_is_truncated_buffer() {
        let mut bytes = extended_record(0, 16, 8);
        bytes.extend_from_slice(&[0, 0, 0]);

        let mut records = ExtendedRecords::new(&bytes, bytes.len()).unwrap();

        records.next().unwrap().unwrap();
        let error = records.next().unwrap().unwrap_err();

        assert!(matches!(
            error,
            Error::TruncatedBuffer {
                offset: 16,
                needed: EXTENDED_HEADER_SIZE,
                available: 3
            }
        ));
    }

    #[test]
    fn extended_size_smaller_than_header_is_error() {
        let bytes = extended_record(0, 0, 8);

        let mut records = ExtendedRecords::new(&bytes, bytes.len()).unwrap();

        assert!(matches!(
            records.next().unwrap().unwrap_err(),
            Error::TruncatedRecord { available: 0, .. }
        ));
        assert!(records.next().is_none());
    }

    #[test]
    fn extended_huge_declared_size_is_error() {
        let bytes = extended_record(1, u32::MAX, 8);

        let mut records = ExtendedRecords::new(&bytes, bytes.len()).unwrap();

        assert!(matches!(
            records.next().unwrap().unwrap_err(),
            Error::TruncatedRecord { tag: 1, .. }
        ));
    }

    #[test]
    fn legacy_record_layout() {
        assert_eq!(legacy_record_size(MaskWidth::Bits64), 32);
        assert_eq!(legacy_record_size(MaskWidth::Bits32), 24);
        assert_eq!(legacy_relationship_offset(MaskWidth::Bits64), 8);
        assert_eq!(legacy_relationship_offset(MaskWidth::Bits32), 4);
        assert_eq!(legacy_union_offset(MaskWidth::Bits64), 16);
        assert_eq!(legacy_union_offset(MaskWidth::Bits32), 8);
    }

    #[test]
    fn legacy_walks_fixed_size_records() {
        let mut bytes = vec![0_u8; 96];
        bytes[8..12].copy_from_slice(&3_u32.to_le_bytes());
        bytes[40..44].copy_from_slice(&0_u32.to_le_bytes());
        bytes[72..76].copy_from_slice(&2_u32.to_le_bytes());

        let records = LegacyRecords::new(&bytes, bytes.len(), MaskWidth::Bits64).unwrap();
        assert_eq!(records.len(), 3);

        let records = records.collect::<Vec<_>>();
        assert_eq!(records[0].tag, 3);
        assert_eq!(records[1].tag, 0);
        assert_eq!(records[1].offset, 32);
        assert_eq!(records[2].tag, 2);
        assert_eq!(records[2].offset, 64);
    }

    #[test]
    fn legacy_32_bit_records() {
        let mut bytes = vec![0_u8; 48];
        bytes[4..8].copy_from_slice(&3_u32.to_le_bytes());
        bytes[28..32].copy_from_slice(&1_u32.to_le_bytes());

        let tags = LegacyRecords::new(&bytes, bytes.len(), MaskWidth::Bits32)
            .unwrap()
            .map(|r| r.tag)
            .collect::<Vec<_>>();

        assert_eq!(tags, vec![3, 1]);
    }

    #[test]
    fn legacy_partial_record_is_truncated_buffer() {
        let bytes = vec![0_u8; 40];

        let error = LegacyRecords::new(&bytes, bytes.len(), MaskWidth::Bits64).unwrap_err();

        assert!(matches!(
            error,
            Error::TruncatedBuffer {
                offset: 32,
                needed: 32,
                available: 8
            }
        ));
    }

    #[test]
    fn read_helpers_are_bounds_checked() {
        let bytes = [1_u8, 2, 3, 4, 5, 6, 7, 8];

        assert_eq!(read_u8(&bytes, 7), Some(8));
        assert_eq!(read_u8(&bytes, 8), None);
        assert_eq!(read_u16(&bytes, 6), Some(0x0807));
        assert_eq!(read_u16(&bytes, 7), None);
        assert_eq!(read_u32(&bytes, 4), Some(0x0807_0605));
        assert_eq!(read_u32(&bytes, 5), None);
        assert_eq!(
            read_mask(&bytes, 0, MaskWidth::Bits64),
            Some(0x0807_0605_0403_0201)
        );
        assert_eq!(read_mask(&bytes, 1, MaskWidth::Bits64), None);
        assert_eq!(read_mask(&bytes, 4, MaskWidth::Bits32), Some(0x0807_0605));
        assert_eq!(read_u32(&bytes, usize::MAX), None);
    }
}

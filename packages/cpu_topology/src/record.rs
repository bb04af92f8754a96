//! Decodes tagged records into [`RawRecord`]s.
//!
//! Offsets below are relative to the start of the record (header included) and match the native
//! `SYSTEM_LOGICAL_PROCESSOR_INFORMATION_EX` and `SYSTEM_LOGICAL_PROCESSOR_INFORMATION` layouts.

use smallvec::SmallVec;
use tracing::trace;

use crate::reader::{
    ExtendedRecords, LegacyRecords, TaggedRecord, legacy_union_offset, read_mask, read_u8,
    read_u16, read_u32,
};
use crate::{AffinityMask, EfficiencyClass, MaskWidth, NumaNodeId, PlatformCapabilities, Result};

// PROCESSOR_RELATIONSHIP: Flags, EfficiencyClass, Reserved[20], GroupCount, GroupMask[].
const PROCESSOR_EFFICIENCY_CLASS_OFFSET: usize = 9;

// NUMA_NODE_RELATIONSHIP: NodeNumber, Reserved[18], GroupCount, GroupMask[].
const NUMA_NODE_NUMBER_OFFSET: usize = 8;

// Both relationship payloads place the group count and the mask array at the same offsets.
const GROUP_COUNT_OFFSET: usize = 30;
const GROUP_MASKS_OFFSET: usize = 32;

/// The relationship a record describes, from the platform's `LOGICAL_PROCESSOR_RELATIONSHIP`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum RelationshipKind {
    ProcessorCore,
    NumaNode,
    ProcessorPackage,

    /// Caches, groups, dies, modules and anything a future platform revision adds.
    /// These are skipped, never rejected.
    Other(u32),
}

impl From<u32> for RelationshipKind {
    fn from(tag: u32) -> Self {
        match tag {
            0 => Self::ProcessorCore,
            1 => Self::NumaNode,
            3 => Self::ProcessorPackage,
            other => Self::Other(other),
        }
    }
}

/// Masks of one relationship record. Almost always exactly one - only packages (and in theory
/// NUMA nodes) on systems with more than 64 processors span multiple processor groups.
pub(crate) type AffinityMasks = SmallVec<[AffinityMask; 1]>;

/// A decoded relationship record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum RawRecord {
    Core {
        affinity_masks: AffinityMasks,
        efficiency_class: Option<EfficiencyClass>,
    },
    Package {
        affinity_masks: AffinityMasks,
    },
    NumaNode {
        node_id: NumaNodeId,
        affinity_mask: AffinityMask,
    },
}

/// Decodes every record of an extended-format buffer, skipping unknown relationships.
///
/// Decoding is all-or-nothing: the first malformed record fails the whole buffer.
pub(crate) fn decode_extended_records(
    bytes: &[u8],
    valid_len: usize,
    capabilities: &PlatformCapabilities,
) -> Result<Vec<RawRecord>> {
    let mut records = Vec::new();

    for tagged in ExtendedRecords::new(bytes, valid_len)? {
        if let Some(record) = decode_extended_record(&tagged?, capabilities)? {
            records.push(record);
        }
    }

    Ok(records)
}

/// Decodes one extended record. Returns `None` for relationships we do not care about.
pub(crate) fn decode_extended_record(
    tagged: &TaggedRecord<'_>,
    capabilities: &PlatformCapabilities,
) -> Result<Option<RawRecord>> {
    let record = match RelationshipKind::from(tagged.tag) {
        RelationshipKind::ProcessorCore => {
            let affinity_masks = decode_group_masks(tagged, capabilities.mask_width(), false)?;

            // Earlier platform revisions use this byte for something else, so it only means
            // something if we know the platform reports efficiency classes.
            let efficiency_class = if capabilities.efficiency_reporting() {
                read_u8(tagged.bytes, PROCESSOR_EFFICIENCY_CLASS_OFFSET)
            } else {
                None
            };

            RawRecord::Core {
                affinity_masks,
                efficiency_class,
            }
        }
        RelationshipKind::ProcessorPackage => RawRecord::Package {
            affinity_masks: decode_group_masks(tagged, capabilities.mask_width(), false)?,
        },
        RelationshipKind::NumaNode => {
            let affinity_masks = decode_group_masks(tagged, capabilities.mask_width(), true)?;

            // We model a NUMA node as a single group + mask. Additional masks are not believed
            // to occur in the data we request, so they are ignored if they ever do.
            let Some(&affinity_mask) = affinity_masks.first() else {
                return Ok(None);
            };

            RawRecord::NumaNode {
                // Presence guaranteed by decode_group_masks() bounds check.
                node_id: read_u32(tagged.bytes, NUMA_NODE_NUMBER_OFFSET).unwrap_or_default(),
                affinity_mask,
            }
        }
        RelationshipKind::Other(tag) => {
            trace!(tag, offset = tagged.offset, "skipping unrecognized relationship");
            return Ok(None);
        }
    };

    trace!(offset = tagged.offset, ?record, "decoded relationship");

    Ok(Some(record))
}

/// Decodes the group mask array shared by processor and NUMA node relationships.
///
/// If `count_zero_as_one` is set, a group count of zero is read as one. Older platform revisions
/// leave the count of NUMA node relationships zeroed but still carry one inline group mask.
fn decode_group_masks(
    tagged: &TaggedRecord<'_>,
    mask_width: MaskWidth,
    count_zero_as_one: bool,
) -> Result<AffinityMasks> {
    tagged.require(GROUP_MASKS_OFFSET)?;

    let declared_count = read_u16(tagged.bytes, GROUP_COUNT_OFFSET).unwrap_or_default();
    let count = if count_zero_as_one {
        declared_count.max(1)
    } else {
        declared_count
    };

    let entry_size = group_affinity_size(mask_width);

    let needed = usize::from(count)
        .checked_mul(entry_size)
        .and_then(|len| len.checked_add(GROUP_MASKS_OFFSET))
        .unwrap_or(usize::MAX);
    tagged.require(needed)?;

    let mut masks = AffinityMasks::with_capacity(usize::from(count));

    for index in 0..usize::from(count) {
        // Cannot overflow, we just verified that the whole array fits in the record.
        let entry_offset = GROUP_MASKS_OFFSET.saturating_add(index.saturating_mul(entry_size));

        // Cannot be absent, we just verified that the whole array fits in the record.
        let mask = read_mask(tagged.bytes, entry_offset, mask_width).unwrap_or_default();
        let group = read_u16(
            tagged.bytes,
            entry_offset.saturating_add(mask_width.bytes()),
        )
        .unwrap_or_default();

        masks.push(AffinityMask::from_components(mask, group));
    }

    Ok(masks)
}

// GROUP_AFFINITY: u16 group and 3 reserved u16 after the mask.
const GROUP_AFFINITY_TRAILER_SIZE: usize = 8;

/// Size of `GROUP_AFFINITY`: native-word mask, u16 group and 3 reserved u16.
pub(crate) const fn group_affinity_size(mask_width: MaskWidth) -> usize {
    // Both terms are small constants.
    mask_width.bytes().saturating_add(GROUP_AFFINITY_TRAILER_SIZE)
}

/// Decodes every record of a legacy-format buffer, keeping only core and package relationships.
///
/// Legacy records have no processor groups; every mask is implicitly in group 0.
pub(crate) fn decode_legacy_records(
    bytes: &[u8],
    valid_len: usize,
    mask_width: MaskWidth,
) -> Result<Vec<RawRecord>> {
    Ok(LegacyRecords::new(bytes, valid_len, mask_width)?
        .filter_map(|tagged| decode_legacy_record(&tagged, mask_width))
        .collect())
}

/// Decodes one legacy record. Returns `None` for anything but cores and packages.
pub(crate) fn decode_legacy_record(
    tagged: &TaggedRecord<'_>,
    mask_width: MaskWidth,
) -> Option<RawRecord> {
    let kind = RelationshipKind::from(tagged.tag);

    if !matches!(
        kind,
        RelationshipKind::ProcessorCore | RelationshipKind::ProcessorPackage
    ) {
        trace!(tag = tagged.tag, offset = tagged.offset, "dropping legacy relationship");
        return None;
    }

    // The reader only hands out complete fixed-size records, so the mask is always present.
    let mask = read_mask(tagged.bytes, 0, mask_width)?;
    let affinity_masks: AffinityMasks = smallvec::smallvec![AffinityMask::from_components(mask, 0)];

    trace!(
        tag = tagged.tag,
        offset = tagged.offset,
        flags = read_u8(tagged.bytes, legacy_union_offset(mask_width)),
        mask,
        "decoded legacy relationship"
    );

    Some(match kind {
        RelationshipKind::ProcessorCore => RawRecord::Core {
            affinity_masks,
            efficiency_class: None,
        },
        _ => RawRecord::Package { affinity_masks },
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use smallvec::smallvec;

    use super::*;
    use crate::Error;
    use crate::fake::{ExtendedBufferBuilder, LegacyBufferBuilder};

    fn decode(
        builder: ExtendedBufferBuilder,
        capabilities: &PlatformCapabilities,
    ) -> Result<Vec<RawRecord>> {
        let buffer = builder.build();
        decode_extended_records(buffer.bytes(), buffer.valid_len(), capabilities)
    }

    #[test]
    fn relationship_tags() {
        assert_eq!(RelationshipKind::from(0), RelationshipKind::ProcessorCore);
        assert_eq!(RelationshipKind::from(1), RelationshipKind::NumaNode);
        assert_eq!(RelationshipKind::from(2), RelationshipKind::Other(2));
        assert_eq!(RelationshipKind::from(3), RelationshipKind::ProcessorPackage);
        assert_eq!(RelationshipKind::from(7), RelationshipKind::Other(7));
        assert_eq!(
            RelationshipKind::from(0xFFFF),
            RelationshipKind::Other(0xFFFF)
        );
    }

    #[test]
    fn group_affinity_layout() {
        assert_eq!(group_affinity_size(MaskWidth::Bits64), 16);
        assert_eq!(group_affinity_size(MaskWidth::Bits32), 12);
    }

    #[test]
    fn decodes_all_relationship_kinds() {
        let records = decode(
            ExtendedBufferBuilder::new()
                .core(&[AffinityMask::from_components(0b11, 0)], 1)
                .package(&[
                    AffinityMask::from_components(0b1111, 0),
                    AffinityMask::from_components(0b1, 1),
                ])
                .numa_node(7, AffinityMask::from_components(0b1111, 0)),
            &PlatformCapabilities::extended().with_efficiency_reporting(true),
        )
        .unwrap();

        assert_eq!(
            records,
            vec![
                RawRecord::Core {
                    affinity_masks: smallvec![AffinityMask::from_components(0b11, 0)],
                    efficiency_class: Some(1),
                },
                RawRecord::Package {
                    affinity_masks: smallvec![
                        AffinityMask::from_components(0b1111, 0),
                        AffinityMask::from_components(0b1, 1),
                    ],
                },
                RawRecord::NumaNode {
                    node_id: 7,
                    affinity_mask: AffinityMask::from_components(0b1111, 0),
                },
            ]
        );
    }

    #[test]
    fn core_spanning_groups_keeps_every_mask() {
        let records = decode(
            ExtendedBufferBuilder::new().core(
                &[
                    AffinityMask::from_components(0b1, 0),
                    AffinityMask::from_components(0b1, 1),
                ],
                2,
            ),
            &PlatformCapabilities::extended().with_efficiency_reporting(true),
        )
        .unwrap();

        assert_eq!(
            records,
            vec![RawRecord::Core {
                affinity_masks: smallvec![
                    AffinityMask::from_components(0b1, 0),
                    AffinityMask::from_components(0b1, 1),
                ],
                efficiency_class: Some(2),
            }]
        );
    }

    #[test]
    fn efficiency_class_ignored_without_reporting() {
        let records = decode(
            ExtendedBufferBuilder::new().core(&[AffinityMask::from_components(0b1, 0)], 5),
            &PlatformCapabilities::extended(),
        )
        .unwrap();

        assert_eq!(
            records,
            vec![RawRecord::Core {
                affinity_masks: smallvec![AffinityMask::from_components(0b1, 0)],
                efficiency_class: None,
            }]
        );
    }

    #[test]
    fn unknown_relationships_are_skipped() {
        let records = decode(
            ExtendedBufferBuilder::new()
                .record(2, &[0; 40])
                .core(&[AffinityMask::from_components(0b1, 0)], 0)
                .record(4, &[0; 72])
                .record(0xBEEF, &[]),
            &PlatformCapabilities::extended(),
        )
        .unwrap();

        assert_eq!(records.len(), 1);
        assert!(matches!(records[0], RawRecord::Core { .. }));
    }

    #[test]
    fn group_count_overrunning_record_is_truncated_record() {
        // Declares 2 group masks but only has room for 1.
        let mut payload = vec![0_u8; 24 + 16];
        payload[22..24].copy_from_slice(&2_u16.to_le_bytes());

        let error = decode(
            ExtendedBufferBuilder::new().record(3, &payload),
            &PlatformCapabilities::extended(),
        )
        .unwrap_err();

        assert!(matches!(
            error,
            Error::TruncatedRecord {
                tag: 3,
                offset: 0,
                needed: 64,
                available: 48
            }
        ));
    }

    #[test]
    fn payload_shorter_than_relationship_header_is_truncated_record() {
        let error = decode(
            ExtendedBufferBuilder::new()
                .core(&[AffinityMask::from_components(0b1, 0)], 0)
                .record(1, &[0; 10]),
            &PlatformCapabilities::extended(),
        )
        .unwrap_err();

        assert!(matches!(
            error,
            Error::TruncatedRecord {
                tag: 1,
                offset: 48,
                needed: 32,
                available: 18
            }
        ));
    }

    #[test]
    fn numa_node_extra_masks_ignored() {
        let mut payload = vec![0_u8; 24 + 32];
        payload[0..4].copy_from_slice(&3_u32.to_le_bytes());
        payload[22..24].copy_from_slice(&2_u16.to_le_bytes());
        payload[24..32].copy_from_slice(&0b1100_u64.to_le_bytes());
        payload[40..48].copy_from_slice(&0b0011_u64.to_le_bytes());
        payload[48..50].copy_from_slice(&1_u16.to_le_bytes());

        let records = decode(
            ExtendedBufferBuilder::new().record(1, &payload),
            &PlatformCapabilities::extended(),
        )
        .unwrap();

        assert_eq!(
            records,
            vec![RawRecord::NumaNode {
                node_id: 3,
                affinity_mask: AffinityMask::from_components(0b1100, 0),
            }]
        );
    }

    #[test]
    fn numa_node_zero_group_count_reads_inline_mask() {
        let mut payload = vec![0_u8; 24 + 16];
        payload[0..4].copy_from_slice(&1_u32.to_le_bytes());
        payload[24..32].copy_from_slice(&0b1010_u64.to_le_bytes());

        let records = decode(
            ExtendedBufferBuilder::new().record(1, &payload),
            &PlatformCapabilities::extended(),
        )
        .unwrap();

        assert_eq!(
            records,
            vec![RawRecord::NumaNode {
                node_id: 1,
                affinity_mask: AffinityMask::from_components(0b1010, 0),
            }]
        );
    }

    #[test]
    fn core_with_zero_groups_has_no_masks() {
        let records = decode(
            ExtendedBufferBuilder::new().core(&[], 0),
            &PlatformCapabilities::extended(),
        )
        .unwrap();

        assert_eq!(
            records,
            vec![RawRecord::Core {
                affinity_masks: smallvec![],
                efficiency_class: None,
            }]
        );
    }

    #[test]
    fn decodes_32_bit_layout() {
        let records = decode(
            ExtendedBufferBuilder::with_mask_width(MaskWidth::Bits32)
                .core(&[AffinityMask::from_components(0x8000_0001, 0)], 0)
                .package(&[AffinityMask::from_components(0xFFFF_FFFF, 0)])
                .numa_node(0, AffinityMask::from_components(0xFFFF_FFFF, 0)),
            &PlatformCapabilities::extended().with_mask_width(MaskWidth::Bits32),
        )
        .unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0],
            RawRecord::Core {
                affinity_masks: smallvec![AffinityMask::from_components(0x8000_0001, 0)],
                efficiency_class: None,
            }
        );
    }

    #[test]
    fn legacy_keeps_only_cores_and_packages() {
        let buffer = LegacyBufferBuilder::new()
            .package(0b1111)
            .core(0b0011)
            .numa_node(0, 0b1111)
            .record(2, 0b0001)
            .core(0b1100)
            .build();

        let records =
            decode_legacy_records(buffer.bytes(), buffer.valid_len(), MaskWidth::Bits64).unwrap();

        assert_eq!(
            records,
            vec![
                RawRecord::Package {
                    affinity_masks: smallvec![AffinityMask::from_components(0b1111, 0)],
                },
                RawRecord::Core {
                    affinity_masks: smallvec![AffinityMask::from_components(0b0011, 0)],
                    efficiency_class: None,
                },
                RawRecord::Core {
                    affinity_masks: smallvec![AffinityMask::from_components(0b1100, 0)],
                    efficiency_class: None,
                },
            ]
        );
    }

    #[test]
    fn legacy_partial_record_is_error() {
        let buffer = LegacyBufferBuilder::new().core(0b1).build();

        let error =
            decode_legacy_records(buffer.bytes(), buffer.valid_len() - 1, MaskWidth::Bits64)
                .unwrap_err();

        assert!(matches!(error, Error::TruncatedBuffer { .. }));
    }
}

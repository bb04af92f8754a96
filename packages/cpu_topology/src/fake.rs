//! Builders for synthetic topology buffers.
//!
//! The builders emit bytes in the exact layout of the platform topology queries, so the result can
//! be fed to [`decode_extended()`][crate::decode_extended],
//! [`decode_legacy()`][crate::decode_legacy] or returned from a custom
//! [`TopologySource`][crate::TopologySource]. This allows testing code that depends on the
//! processor topology without having the hardware at hand.
//!
//! # Example
//!
//! ```
//! use cpu_topology::fake::ExtendedBufferBuilder;
//! use cpu_topology::{AffinityMask, NoPackageIds, PlatformCapabilities, decode_extended};
//!
//! // One package with two cores of two processors each, all in one NUMA node.
//! let buffer = ExtendedBufferBuilder::new()
//!     .package(&[AffinityMask::from_components(0b1111, 0)])
//!     .core(&[AffinityMask::from_components(0b0011, 0)], 1)
//!     .core(&[AffinityMask::from_components(0b1100, 0)], 0)
//!     .numa_node(0, AffinityMask::from_components(0b1111, 0))
//!     .build();
//!
//! let capabilities = PlatformCapabilities::extended().with_efficiency_reporting(true);
//! let topology = decode_extended(&buffer, &capabilities, &NoPackageIds).unwrap();
//!
//! assert_eq!(topology.logical_processor_count(), 4);
//! assert_eq!(topology.physical_core_count(), 2);
//! assert_eq!(topology.physical_package_count(), 1);
//! ```

use crate::reader::{
    EXTENDED_HEADER_SIZE, legacy_record_size, legacy_relationship_offset, legacy_union_offset,
};
use crate::{AffinityMask, EfficiencyClass, MaskWidth, NumaNodeId, RawTopologyBuffer};

const TAG_PROCESSOR_CORE: u32 = 0;
const TAG_NUMA_NODE: u32 = 1;
const TAG_PROCESSOR_PACKAGE: u32 = 3;

// Set in the flags byte of a core with more than one logical processor.
const LTP_PC_SMT: u8 = 1;

// Flags, efficiency class and reserved bytes come before the group count.
const PROCESSOR_RELATIONSHIP_PREFIX_SIZE: usize = 22;

// Node number and reserved bytes come before the group count.
const NUMA_NODE_RELATIONSHIP_PREFIX_SIZE: usize = 22;

/// Builds a buffer in the format returned by the extended topology query.
///
/// Records are emitted in the order the builder methods are called.
#[derive(Clone, Debug)]
pub struct ExtendedBufferBuilder {
    mask_width: MaskWidth,
    bytes: Vec<u8>,
}

impl Default for ExtendedBufferBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtendedBufferBuilder {
    /// Creates an empty builder that uses the mask width of the build target.
    #[must_use]
    pub fn new() -> Self {
        Self::with_mask_width(MaskWidth::NATIVE)
    }

    /// Creates an empty builder that uses the given mask width.
    #[must_use]
    pub fn with_mask_width(mask_width: MaskWidth) -> Self {
        Self {
            mask_width,
            bytes: Vec::new(),
        }
    }

    /// Appends a processor core relationship.
    #[must_use]
    pub fn core(self, affinity_masks: &[AffinityMask], efficiency_class: EfficiencyClass) -> Self {
        let flags = if affinity_masks.iter().map(AffinityMask::len).sum::<usize>() > 1 {
            LTP_PC_SMT
        } else {
            0
        };

        self.processor_relationship(TAG_PROCESSOR_CORE, flags, efficiency_class, affinity_masks)
    }

    /// Appends a processor package relationship.
    #[must_use]
    pub fn package(self, affinity_masks: &[AffinityMask]) -> Self {
        self.processor_relationship(TAG_PROCESSOR_PACKAGE, 0, 0, affinity_masks)
    }

    /// Appends a NUMA node relationship with a single group mask.
    #[must_use]
    pub fn numa_node(self, node_id: NumaNodeId, affinity_mask: AffinityMask) -> Self {
        let mut payload = Vec::new();
        payload.extend_from_slice(&node_id.to_le_bytes());
        payload.resize(NUMA_NODE_RELATIONSHIP_PREFIX_SIZE, 0);
        payload.extend_from_slice(&1_u16.to_le_bytes());
        push_group_affinity(&mut payload, affinity_mask, self.mask_width);

        self.record(TAG_NUMA_NODE, &payload)
    }

    /// Appends a record with an arbitrary tag and payload. The header is generated, with the size
    /// covering exactly the header and the payload.
    ///
    /// # Panics
    ///
    /// Panics if the record does not fit in 4 GB.
    #[must_use]
    pub fn record(mut self, tag: u32, payload: &[u8]) -> Self {
        let size = payload
            .len()
            .checked_add(EXTENDED_HEADER_SIZE)
            .and_then(|size| u32::try_from(size).ok())
            .expect("synthetic records are never anywhere near 4 GB");

        self.bytes.extend_from_slice(&tag.to_le_bytes());
        self.bytes.extend_from_slice(&size.to_le_bytes());
        self.bytes.extend_from_slice(payload);
        self
    }

    /// Returns the buffer, all of which is declared valid.
    #[must_use]
    pub fn build(self) -> RawTopologyBuffer {
        RawTopologyBuffer::from_bytes(self.bytes)
    }

    fn processor_relationship(
        self,
        tag: u32,
        flags: u8,
        efficiency_class: EfficiencyClass,
        affinity_masks: &[AffinityMask],
    ) -> Self {
        let group_count = u16::try_from(affinity_masks.len())
            .expect("there are at most u16::MAX processor groups");

        let mut payload = vec![flags, efficiency_class];
        payload.resize(PROCESSOR_RELATIONSHIP_PREFIX_SIZE, 0);
        payload.extend_from_slice(&group_count.to_le_bytes());

        for &mask in affinity_masks {
            push_group_affinity(&mut payload, mask, self.mask_width);
        }

        self.record(tag, &payload)
    }
}

/// Builds a buffer in the format returned by the legacy topology query.
///
/// Legacy records have no processor group, every mask is implicitly in group 0.
#[derive(Clone, Debug)]
pub struct LegacyBufferBuilder {
    mask_width: MaskWidth,
    bytes: Vec<u8>,
}

impl Default for LegacyBufferBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LegacyBufferBuilder {
    /// Creates an empty builder that uses the mask width of the build target.
    #[must_use]
    pub fn new() -> Self {
        Self::with_mask_width(MaskWidth::NATIVE)
    }

    /// Creates an empty builder that uses the given mask width.
    #[must_use]
    pub fn with_mask_width(mask_width: MaskWidth) -> Self {
        Self {
            mask_width,
            bytes: Vec::new(),
        }
    }

    /// Appends a processor core relationship.
    #[must_use]
    pub fn core(self, mask: u64) -> Self {
        let flags = if mask.count_ones() > 1 { LTP_PC_SMT } else { 0 };

        self.relationship(TAG_PROCESSOR_CORE, mask, &[flags])
    }

    /// Appends a processor package relationship.
    #[must_use]
    pub fn package(self, mask: u64) -> Self {
        self.relationship(TAG_PROCESSOR_PACKAGE, mask, &[])
    }

    /// Appends a NUMA node relationship.
    #[must_use]
    pub fn numa_node(self, node_id: NumaNodeId, mask: u64) -> Self {
        self.relationship(TAG_NUMA_NODE, mask, &node_id.to_le_bytes())
    }

    /// Appends a record with an arbitrary tag and an all-zero union.
    #[must_use]
    pub fn record(self, tag: u32, mask: u64) -> Self {
        self.relationship(tag, mask, &[])
    }

    /// Returns the buffer, all of which is declared valid.
    #[must_use]
    pub fn build(self) -> RawTopologyBuffer {
        RawTopologyBuffer::from_bytes(self.bytes)
    }

    fn relationship(mut self, tag: u32, mask: u64, union_prefix: &[u8]) -> Self {
        let start = self.bytes.len();
        let width = self.mask_width.bytes();

        self.bytes
            .extend(mask.to_le_bytes().into_iter().take(width));
        self.bytes
            .resize(start.saturating_add(legacy_relationship_offset(self.mask_width)), 0);
        self.bytes.extend_from_slice(&tag.to_le_bytes());
        self.bytes
            .resize(start.saturating_add(legacy_union_offset(self.mask_width)), 0);
        self.bytes.extend_from_slice(union_prefix);
        self.bytes
            .resize(start.saturating_add(legacy_record_size(self.mask_width)), 0);

        self
    }
}

/// Appends a `GROUP_AFFINITY`: mask, group and 3 reserved u16.
fn push_group_affinity(payload: &mut Vec<u8>, affinity_mask: AffinityMask, mask_width: MaskWidth) {
    payload.extend(
        affinity_mask
            .value()
            .to_le_bytes()
            .into_iter()
            .take(mask_width.bytes()),
    );
    payload.extend_from_slice(&affinity_mask.group().to_le_bytes());
    payload.extend_from_slice(&[0; 6]);
}

/// Identifies a processor group.
///
/// The platform partitions logical processors into groups of at most 64 when the total exceeds
/// the bit width of a native affinity mask. Systems with 64 or fewer processors have only group 0.
pub type ProcessorGroup = u16;

/// Identifies a logical processor by its bit position within its processor group.
pub type ProcessorNumber = u8;

/// Identifies a physical core by the order in which its core relationship record was discovered.
///
/// The platform provides no explicit core identifier, only masks, so this is not a value taken
/// from the platform data and may differ between two machines with identical hardware.
pub type CoreIndex = usize;

/// Identifies a physical package (socket) by the order in which its package relationship record
/// was discovered (extended decoding) or by mask containment (legacy decoding).
pub type PackageIndex = usize;

/// Identifies a NUMA node, matching the node number used by operating system tools.
pub type NumaNodeId = u32;

/// Platform-reported ranking of a physical core on heterogeneous processors.
///
/// Higher values denote higher-performance cores, lower values more energy-efficient cores.
/// The values are relative within one system and carry no meaning across systems.
pub type EfficiencyClass = u8;

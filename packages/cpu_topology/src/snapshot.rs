use std::fmt::{self, Formatter};

use derive_more::derive::Display;
use itertools::Itertools;

use crate::{
    CoreIndex, EfficiencyClass, NoPackageIds, NumaNodeId, PackageIndex, PlatformCapabilities,
    ProcessorGroup, ProcessorNumber, Result, SystemTopologySource, resolve_topology,
};

/// One schedulable execution unit (hardware thread).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct LogicalProcessor {
    processor_number: ProcessorNumber,
    core_index: CoreIndex,
    package_index: PackageIndex,
    numa_node_id: Option<NumaNodeId>,
    processor_group: Option<ProcessorGroup>,
}

impl LogicalProcessor {
    pub(crate) const fn new(
        processor_number: ProcessorNumber,
        core_index: CoreIndex,
        package_index: PackageIndex,
        numa_node_id: Option<NumaNodeId>,
        processor_group: Option<ProcessorGroup>,
    ) -> Self {
        Self {
            processor_number,
            core_index,
            package_index,
            numa_node_id,
            processor_group,
        }
    }

    /// The bit index of the processor within its processor group.
    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    #[must_use]
    pub const fn processor_number(&self) -> ProcessorNumber {
        self.processor_number
    }

    /// The physical core the processor belongs to.
    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    #[must_use]
    pub const fn core_index(&self) -> CoreIndex {
        self.core_index
    }

    /// The physical package the processor belongs to.
    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    #[must_use]
    pub const fn package_index(&self) -> PackageIndex {
        self.package_index
    }

    /// The NUMA node the processor belongs to.
    ///
    /// Always `None` when the topology was decoded from the legacy query, which carries no
    /// NUMA information.
    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    #[must_use]
    pub const fn numa_node_id(&self) -> Option<NumaNodeId> {
        self.numa_node_id
    }

    /// The processor group the processor belongs to.
    ///
    /// Always `None` when the topology was decoded from the legacy query, which only ever sees
    /// a single processor group.
    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    #[must_use]
    pub const fn processor_group(&self) -> Option<ProcessorGroup> {
        self.processor_group
    }
}

impl fmt::Display for LogicalProcessor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "processor {}", self.processor_number)?;

        if let Some(group) = self.processor_group {
            write!(f, " in group {group}")?;
        }

        write!(
            f,
            " on core {} in package {}",
            self.core_index, self.package_index
        )?;

        if let Some(node) = self.numa_node_id {
            write!(f, " (NUMA node {node})")?;
        }

        Ok(())
    }
}

/// One physical processor core, hosting one or more logical processors.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PhysicalCore {
    core_index: CoreIndex,
    package_index: PackageIndex,
    efficiency_class: Option<EfficiencyClass>,
    package_identifier: Option<String>,
}

impl PhysicalCore {
    pub(crate) const fn new(
        core_index: CoreIndex,
        package_index: PackageIndex,
        efficiency_class: Option<EfficiencyClass>,
        package_identifier: Option<String>,
    ) -> Self {
        Self {
            core_index,
            package_index,
            efficiency_class,
            package_identifier,
        }
    }

    /// The index of the core, in discovery order.
    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    #[must_use]
    pub const fn core_index(&self) -> CoreIndex {
        self.core_index
    }

    /// The physical package the core belongs to.
    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    #[must_use]
    pub const fn package_index(&self) -> PackageIndex {
        self.package_index
    }

    /// The efficiency class of the core, if the platform reports it.
    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    #[must_use]
    pub const fn efficiency_class(&self) -> Option<EfficiencyClass> {
        self.efficiency_class
    }

    /// Vendor-specific identifier of the package the core belongs to, if one was supplied
    /// by the [`PackageIdLookup`][crate::PackageIdLookup].
    #[must_use]
    pub fn package_identifier(&self) -> Option<&str> {
        self.package_identifier.as_deref()
    }
}

impl fmt::Display for PhysicalCore {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "core {} in package {}", self.core_index, self.package_index)?;

        if let Some(efficiency_class) = self.efficiency_class {
            write!(f, ", efficiency class {efficiency_class}")?;
        }

        if let Some(identifier) = &self.package_identifier {
            write!(f, ", package id {identifier}")?;
        }

        Ok(())
    }
}

/// Scalar processor counts derived from a [`TopologySnapshot`].
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[expect(
    clippy::exhaustive_structs,
    reason = "these are the three counts the processor description is assembled from"
)]
#[display(
    "{logical_processor_count} logical processors, {physical_core_count} physical cores, {physical_package_count} physical packages"
)]
pub struct ProcessorCounts {
    /// Number of logical processors.
    pub logical_processor_count: usize,

    /// Number of distinct physical cores.
    pub physical_core_count: usize,

    /// Number of distinct physical packages that host at least one logical processor.
    pub physical_package_count: usize,
}

/// The processor topology of the system at the time of the query.
///
/// A fresh snapshot is built on every query; nothing is cached between queries.
///
/// # Example
///
/// ```
/// use cpu_topology::TopologySnapshot;
///
/// match TopologySnapshot::current() {
///     Ok(topology) => {
///         println!("{topology}");
///
///         for processor in topology.logical_processors() {
///             println!("{processor}");
///         }
///     }
///     Err(e) => println!("processor topology not available: {e}"),
/// }
/// ```
#[derive(Clone, Debug, Display, Eq, PartialEq)]
#[display("{counts}")]
pub struct TopologySnapshot {
    logical_processors: Vec<LogicalProcessor>,
    physical_cores: Vec<PhysicalCore>,
    counts: ProcessorCounts,
}

impl TopologySnapshot {
    pub(crate) fn new(
        logical_processors: Vec<LogicalProcessor>,
        physical_cores: Vec<PhysicalCore>,
    ) -> Self {
        // The package count is derived from the logical processors rather than from the package
        // relationships because some platforms under-report package relationships.
        let counts = ProcessorCounts {
            logical_processor_count: logical_processors.len(),
            physical_core_count: physical_cores
                .iter()
                .map(PhysicalCore::core_index)
                .unique()
                .count(),
            physical_package_count: logical_processors
                .iter()
                .map(LogicalProcessor::package_index)
                .unique()
                .count(),
        };

        Self {
            logical_processors,
            physical_cores,
            counts,
        }
    }

    /// Resolves the topology of the current system.
    ///
    /// This detects the platform capabilities and queries the platform directly, without
    /// package identifiers. Use [`resolve_topology()`] for full control.
    ///
    /// # Errors
    ///
    /// Fails if the platform does not offer a topology query or if it returns malformed data.
    pub fn current() -> Result<Self> {
        resolve_topology(
            &PlatformCapabilities::detect(),
            &SystemTopologySource,
            &NoPackageIds,
        )
    }

    /// All logical processors, in discovery order.
    #[must_use]
    pub fn logical_processors(&self) -> &[LogicalProcessor] {
        &self.logical_processors
    }

    /// All physical cores, ordered by core index.
    #[must_use]
    pub fn physical_cores(&self) -> &[PhysicalCore] {
        &self.physical_cores
    }

    /// The derived processor counts.
    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    #[must_use]
    pub const fn counts(&self) -> ProcessorCounts {
        self.counts
    }

    /// Number of logical processors.
    #[must_use]
    pub const fn logical_processor_count(&self) -> usize {
        self.counts.logical_processor_count
    }

    /// Number of distinct physical cores.
    #[must_use]
    pub const fn physical_core_count(&self) -> usize {
        self.counts.physical_core_count
    }

    /// Number of distinct physical packages observed on the logical processors.
    #[must_use]
    pub const fn physical_package_count(&self) -> usize {
        self.counts.physical_package_count
    }

    /// The physical core with the given index, if any.
    #[must_use]
    pub fn physical_core(&self, core_index: CoreIndex) -> Option<&PhysicalCore> {
        self.physical_cores
            .iter()
            .find(|core| core.core_index == core_index)
    }
}

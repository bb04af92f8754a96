//! Builds the topology from the records of a legacy-format buffer.
//!
//! The legacy query only sees processor group 0 and reports neither NUMA nodes (in a form we
//! use) nor efficiency classes, so logical processors are enumerated from the core masks alone.

use foldhash::{HashSet, HashSetExt};
use itertools::Itertools;
use tracing::debug;

use crate::reconcile::PackageIdCache;
use crate::record::RawRecord;
use crate::{
    AffinityMask, LogicalProcessor, PackageIdLookup, PackageIndex, PhysicalCore, ProcessorNumber,
    TopologySnapshot,
};

pub(crate) fn reconcile_legacy<L>(records: &[RawRecord], package_ids: &L) -> TopologySnapshot
where
    L: PackageIdLookup + ?Sized,
{
    let core_masks = distinct_masks(records, |record| matches!(record, RawRecord::Core { .. }));
    let package_masks =
        distinct_masks(records, |record| matches!(record, RawRecord::Package { .. }));

    let mut seen = HashSet::new();
    let mut logical_processors = Vec::new();

    for (core_index, core_mask) in core_masks.iter().enumerate() {
        for processor_number in core_mask.processor_numbers() {
            if !seen.insert(processor_number) {
                debug!(
                    processor_number,
                    core_index, "processor claimed by more than one core; keeping the first"
                );
                continue;
            }

            let package_index =
                find_package(&package_masks, processor_number).unwrap_or_else(|| {
                    debug!(
                        processor_number,
                        "processor not claimed by any package; assuming package 0"
                    );
                    0
                });

            logical_processors.push(LogicalProcessor::new(
                processor_number,
                core_index,
                package_index,
                None,
                None,
            ));
        }
    }

    let mut package_id_cache = PackageIdCache::new(package_ids);

    let physical_cores = logical_processors
        .iter()
        .map(|processor| (processor.package_index(), processor.core_index()))
        .unique()
        .map(|(package_index, core_index)| {
            PhysicalCore::new(
                core_index,
                package_index,
                None,
                package_id_cache.get(package_index),
            )
        })
        .collect_vec();

    TopologySnapshot::new(logical_processors, physical_cores)
}

fn distinct_masks(
    records: &[RawRecord],
    include: impl Fn(&RawRecord) -> bool,
) -> Vec<AffinityMask> {
    records
        .iter()
        .filter(|record| include(record))
        .filter_map(|record| match record {
            RawRecord::Core { affinity_masks, .. } | RawRecord::Package { affinity_masks } => {
                affinity_masks.first().copied()
            }
            RawRecord::NumaNode { .. } => None,
        })
        .unique()
        .collect()
}

fn find_package(
    package_masks: &[AffinityMask],
    processor_number: ProcessorNumber,
) -> Option<PackageIndex> {
    package_masks
        .iter()
        .position(|mask| mask.contains_by_number_in_group(processor_number))
}

//! Reconciles decoded extended records into a [`TopologySnapshot`].
//!
//! The platform never tells us directly which core or package a logical processor belongs to.
//! All we get are sets of processors (as masks) per relationship instance, so the mapping is
//! reconstructed from mask intersections, one NUMA node at a time.

use foldhash::{HashMap, HashMapExt, HashSet, HashSetExt};
use itertools::Itertools;
use tracing::debug;

use crate::record::{AffinityMasks, RawRecord};
use crate::{
    AffinityMask, CoreIndex, EfficiencyClass, LogicalProcessor, PackageIdLookup, PackageIndex,
    PhysicalCore, ProcessorGroup, ProcessorNumber, TopologySnapshot,
};

/// Builds the topology from the records of an extended-format buffer.
pub(crate) fn reconcile_extended<L>(records: &[RawRecord], package_ids: &L) -> TopologySnapshot
where
    L: PackageIdLookup + ?Sized,
{
    // A core record may in theory carry more than one mask. Each distinct mask is its own core
    // index, assigned in order of first appearance.
    let core_masks = records
        .iter()
        .filter_map(|record| match record {
            RawRecord::Core { affinity_masks, .. } => Some(affinity_masks.iter().copied()),
            _ => None,
        })
        .flatten()
        .unique()
        .collect_vec();

    let package_rows = package_rows(records);
    let efficiency_classes = efficiency_classes(records);

    let mut seen = HashSet::new();
    let mut logical_processors = Vec::new();

    for record in records {
        let RawRecord::NumaNode {
            node_id,
            affinity_mask,
        } = record
        else {
            continue;
        };

        let group = affinity_mask.group();

        for processor_number in affinity_mask.processor_numbers() {
            if !seen.insert((group, processor_number)) {
                debug!(
                    group,
                    processor_number,
                    node_id,
                    "processor claimed by more than one NUMA node; keeping the first"
                );
                continue;
            }

            let core_index = find_core(&core_masks, group, processor_number).unwrap_or_else(|| {
                debug!(
                    group,
                    processor_number, "processor not claimed by any core; assuming core 0"
                );
                0
            });

            let package_index = find_package(&package_rows, group, processor_number)
                .unwrap_or_else(|| {
                    debug!(
                        group,
                        processor_number, "processor not claimed by any package; assuming package 0"
                    );
                    0
                });

            logical_processors.push(LogicalProcessor::new(
                processor_number,
                core_index,
                package_index,
                Some(*node_id),
                Some(group),
            ));
        }
    }

    let mut package_id_cache = PackageIdCache::new(package_ids);

    let mut physical_cores = core_masks
        .iter()
        .enumerate()
        .map(|(core_index, mask)| {
            let package_index = mask
                .first()
                .and_then(|first| find_package(&package_rows, mask.group(), first))
                .unwrap_or_else(|| {
                    debug!(
                        core_index,
                        %mask, "core not claimed by any package; assuming package 0"
                    );
                    0
                });

            PhysicalCore::new(
                core_index,
                package_index,
                efficiency_classes.get(mask).copied(),
                package_id_cache.get(package_index),
            )
        })
        .collect_vec();

    if physical_cores.is_empty() && !logical_processors.is_empty() {
        // Every processor was defaulted to core 0, so core 0 has to exist.
        debug!("no core relationships reported; assuming a single core in package 0");
        physical_cores.push(PhysicalCore::new(0, 0, None, package_id_cache.get(0)));
    }

    TopologySnapshot::new(logical_processors, physical_cores)
}

/// Each package record is one row, however many processor groups it spans.
fn package_rows(records: &[RawRecord]) -> Vec<&AffinityMasks> {
    records
        .iter()
        .filter_map(|record| match record {
            RawRecord::Package { affinity_masks } => Some(affinity_masks),
            _ => None,
        })
        .unique()
        .collect()
}

/// Efficiency class per core, keyed by the first mask of the core record. If the same mask is
/// reported more than once, the first report wins.
fn efficiency_classes(records: &[RawRecord]) -> HashMap<AffinityMask, EfficiencyClass> {
    let mut classes = HashMap::new();

    for record in records {
        let RawRecord::Core {
            affinity_masks,
            efficiency_class: Some(efficiency_class),
        } = record
        else {
            continue;
        };

        if let Some(&mask) = affinity_masks.first() {
            classes.entry(mask).or_insert(*efficiency_class);
        }
    }

    classes
}

fn find_core(
    core_masks: &[AffinityMask],
    group: ProcessorGroup,
    processor_number: ProcessorNumber,
) -> Option<CoreIndex> {
    core_masks
        .iter()
        .position(|mask| mask.contains(group, processor_number))
}

fn find_package(
    package_rows: &[&AffinityMasks],
    group: ProcessorGroup,
    processor_number: ProcessorNumber,
) -> Option<PackageIndex> {
    package_rows.iter().position(|row| {
        row.iter()
            .any(|mask| mask.contains(group, processor_number))
    })
}

/// Calls the package identifier lookup at most once per package.
pub(crate) struct PackageIdCache<'a, L: ?Sized> {
    lookup: &'a L,
    identifiers: HashMap<PackageIndex, Option<String>>,
}

impl<'a, L> PackageIdCache<'a, L>
where
    L: PackageIdLookup + ?Sized,
{
    pub(crate) fn new(lookup: &'a L) -> Self {
        Self {
            lookup,
            identifiers: HashMap::new(),
        }
    }

    pub(crate) fn get(&mut self, package_index: PackageIndex) -> Option<String> {
        self.identifiers
            .entry(package_index)
            .or_insert_with(|| self.lookup.package_id(package_index))
            .clone()
    }
}

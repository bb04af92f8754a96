use tracing::debug;

use crate::legacy::reconcile_legacy;
use crate::reconcile::reconcile_extended;
use crate::record::{decode_extended_records, decode_legacy_records};
use crate::{
    PackageIdLookup, PlatformCapabilities, QueryCapability, RawTopologyBuffer, Result,
    TopologySnapshot, TopologySource,
};

/// Queries the topology source and decodes the result into a [`TopologySnapshot`].
///
/// The extended query is used if the capabilities allow it, otherwise the legacy one. The package
/// identifier lookup is called at most once per physical package.
///
/// # Errors
///
/// Fails if the source cannot supply a buffer or if the buffer is malformed. Decoding is
/// all-or-nothing; there is no partial snapshot.
///
/// # Example
///
/// ```
/// use cpu_topology::{NoPackageIds, PlatformCapabilities, SystemTopologySource, resolve_topology};
///
/// let capabilities = PlatformCapabilities::detect();
///
/// if let Ok(topology) = resolve_topology(&capabilities, &SystemTopologySource, &NoPackageIds) {
///     println!("{}", topology.counts());
/// }
/// ```
pub fn resolve_topology<S, L>(
    capabilities: &PlatformCapabilities,
    source: &S,
    package_ids: &L,
) -> Result<TopologySnapshot>
where
    S: TopologySource + ?Sized,
    L: PackageIdLookup + ?Sized,
{
    match capabilities.query() {
        QueryCapability::Extended => {
            let buffer = source.extended_buffer()?;
            decode_extended(&buffer, capabilities, package_ids)
        }
        QueryCapability::LegacyOnly => {
            let buffer = source.legacy_buffer()?;
            decode_legacy(&buffer, capabilities, package_ids)
        }
    }
}

/// Decodes a buffer returned by the extended topology query.
///
/// # Errors
///
/// Fails if the buffer is malformed.
pub fn decode_extended<L>(
    buffer: &RawTopologyBuffer,
    capabilities: &PlatformCapabilities,
    package_ids: &L,
) -> Result<TopologySnapshot>
where
    L: PackageIdLookup + ?Sized,
{
    let records = decode_extended_records(buffer.bytes(), buffer.valid_len(), capabilities)?;
    let snapshot = reconcile_extended(&records, package_ids);

    debug!(
        records = records.len(),
        logical_processors = snapshot.logical_processor_count(),
        physical_cores = snapshot.physical_core_count(),
        physical_packages = snapshot.physical_package_count(),
        "decoded extended topology"
    );

    Ok(snapshot)
}

/// Decodes a buffer returned by the legacy topology query.
///
/// Only the mask width of the capabilities matters here; the legacy format has no efficiency
/// classes to report.
///
/// # Errors
///
/// Fails if the buffer is malformed.
pub fn decode_legacy<L>(
    buffer: &RawTopologyBuffer,
    capabilities: &PlatformCapabilities,
    package_ids: &L,
) -> Result<TopologySnapshot>
where
    L: PackageIdLookup + ?Sized,
{
    let records =
        decode_legacy_records(buffer.bytes(), buffer.valid_len(), capabilities.mask_width())?;
    let snapshot = reconcile_legacy(&records, package_ids);

    debug!(
        records = records.len(),
        logical_processors = snapshot.logical_processor_count(),
        physical_cores = snapshot.physical_core_count(),
        physical_packages = snapshot.physical_package_count(),
        "decoded legacy topology"
    );

    Ok(snapshot)
}

use std::fmt::Debug;

use crate::{AcquisitionError, PlatformCapabilities, RawTopologyBuffer};

/// The operating system services the topology engine depends on.
///
/// All calls are synchronous and expected to be fast: they ask the OS about static
/// hardware configuration.
pub(crate) trait Platform: Debug + Send + Sync + 'static {
    /// Detects which topology query generation the OS offers and whether it reports
    /// efficiency classes. The answer does not change for the lifetime of the process.
    fn capabilities(&self) -> PlatformCapabilities;

    /// Returns the records of every relationship from the extended topology query.
    fn extended_buffer(&self) -> Result<RawTopologyBuffer, AcquisitionError>;

    /// Returns the records of every relationship from the legacy topology query.
    fn legacy_buffer(&self) -> Result<RawTopologyBuffer, AcquisitionError>;
}

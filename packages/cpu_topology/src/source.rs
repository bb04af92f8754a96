#![cfg_attr(test, expect(
    clippy::struct_field_names,
    reason = "false positive from automock generated code"
))]

use std::fmt::Debug;

use crate::pal::{BUILD_TARGET_PLATFORM, Platform};
use crate::{AcquisitionError, PackageIndex};

/// The raw result of a platform topology query: an opaque byte buffer and the number of bytes
/// at its start that the platform declared as valid.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct RawTopologyBuffer {
    bytes: Vec<u8>,
    valid_len: usize,
}

impl RawTopologyBuffer {
    /// Wraps a buffer of which the platform declared the first `valid_len` bytes as valid.
    ///
    /// The declared length is not validated here. Decoding a buffer whose declared length
    /// exceeds the buffer fails with [`Error::TruncatedBuffer`][crate::Error::TruncatedBuffer].
    #[must_use]
    pub const fn new(bytes: Vec<u8>, valid_len: usize) -> Self {
        Self { bytes, valid_len }
    }

    /// Wraps a buffer that is valid in its entirety.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let valid_len = bytes.len();
        Self { bytes, valid_len }
    }

    /// The entire buffer, including any bytes beyond the declared valid length.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The number of bytes the platform declared as valid.
    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    #[must_use]
    pub const fn valid_len(&self) -> usize {
        self.valid_len
    }
}

/// Supplies raw topology buffers, typically by calling the platform topology query facility.
///
/// The real implementation is [`SystemTopologySource`]. Implement this trait to decode
/// topology data captured elsewhere (e.g. recorded from another machine).
#[cfg_attr(test, mockall::automock)]
pub trait TopologySource: Debug {
    /// Queries all relationships via the extended topology query.
    ///
    /// # Errors
    ///
    /// Fails if the platform does not offer the query or if the query itself fails.
    fn extended_buffer(&self) -> Result<RawTopologyBuffer, AcquisitionError>;

    /// Queries all relationships via the legacy topology query.
    ///
    /// # Errors
    ///
    /// Fails if the platform does not offer the query or if the query itself fails.
    fn legacy_buffer(&self) -> Result<RawTopologyBuffer, AcquisitionError>;
}

/// Queries the topology of the system the process is running on.
///
/// Only Windows offers the topology query facility. On other platforms, every query fails
/// with [`AcquisitionError::Unsupported`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTopologySource;

impl TopologySource for SystemTopologySource {
    #[cfg_attr(test, mutants::skip)] // Trivial delegation, we only test the underlying logic.
    fn extended_buffer(&self) -> Result<RawTopologyBuffer, AcquisitionError> {
        BUILD_TARGET_PLATFORM.extended_buffer()
    }

    #[cfg_attr(test, mutants::skip)] // Trivial delegation, we only test the underlying logic.
    fn legacy_buffer(&self) -> Result<RawTopologyBuffer, AcquisitionError> {
        BUILD_TARGET_PLATFORM.legacy_buffer()
    }
}

/// Looks up the vendor-specific identifier (e.g. a CPU ID string) of a physical package.
///
/// The lookup is keyed by package index and is called at most once per package per query.
/// Any `Fn(PackageIndex) -> Option<String>` closure implements this trait.
///
/// # Example
///
/// ```
/// use cpu_topology::{PackageIdLookup, PackageIndex};
///
/// let ids = ["BFEBFBFF000906A3".to_string()];
/// let lookup = |package_index: PackageIndex| ids.get(package_index).cloned();
///
/// assert_eq!(lookup.package_id(0).as_deref(), Some("BFEBFBFF000906A3"));
/// assert_eq!(lookup.package_id(1), None);
/// ```
pub trait PackageIdLookup {
    /// Returns the identifier of the package with the given index, if known.
    fn package_id(&self, package_index: PackageIndex) -> Option<String>;
}

impl<F> PackageIdLookup for F
where
    F: Fn(PackageIndex) -> Option<String>,
{
    fn package_id(&self, package_index: PackageIndex) -> Option<String> {
        self(package_index)
    }
}

/// A [`PackageIdLookup`] that knows no package identifiers.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPackageIds;

impl PackageIdLookup for NoPackageIds {
    #[cfg_attr(test, mutants::skip)] // Nothing to mutate.
    fn package_id(&self, _package_index: PackageIndex) -> Option<String> {
        None
    }
}

use crate::pal::{BUILD_TARGET_PLATFORM, Platform};

/// Which generation of the platform topology query is available.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[expect(
    clippy::exhaustive_enums,
    reason = "mirroring the two API generations of the platform"
)]
pub enum QueryCapability {
    /// Only the legacy query is available: fixed-size records, a single processor group,
    /// no NUMA or efficiency data.
    LegacyOnly,

    /// The extended query is available: variable-size records, multiple processor groups,
    /// NUMA nodes and (depending on the platform revision) efficiency classes.
    Extended,
}

/// Width of the native word used for affinity masks in the platform's record layout.
///
/// Both the position of fields after a mask and the size of every mask entry depend on this.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[expect(
    clippy::exhaustive_enums,
    reason = "these are the only pointer widths the platform ships"
)]
pub enum MaskWidth {
    /// 4-byte masks, as produced by 32-bit processes.
    Bits32,

    /// 8-byte masks, as produced by 64-bit processes.
    Bits64,
}

impl MaskWidth {
    /// The mask width of the build target.
    #[cfg(target_pointer_width = "64")]
    pub const NATIVE: Self = Self::Bits64;

    /// The mask width of the build target.
    #[cfg(not(target_pointer_width = "64"))]
    pub const NATIVE: Self = Self::Bits32;

    /// Size of one mask in bytes.
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Bits32 => 4,
            Self::Bits64 => 8,
        }
    }
}

/// Describes what the platform topology query facility can provide.
///
/// This is read-only configuration for the lifetime of the process. Construct it once at startup
/// (via [`PlatformCapabilities::detect()`] or explicitly) and pass it to
/// [`resolve_topology()`][crate::resolve_topology].
///
/// # Example
///
/// ```
/// use cpu_topology::{PlatformCapabilities, QueryCapability};
///
/// let capabilities = PlatformCapabilities::extended().with_efficiency_reporting(true);
///
/// assert_eq!(capabilities.query(), QueryCapability::Extended);
/// assert!(capabilities.efficiency_reporting());
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct PlatformCapabilities {
    query: QueryCapability,
    efficiency_reporting: bool,
    mask_width: MaskWidth,
}

impl PlatformCapabilities {
    /// Capabilities of a platform that only offers the legacy query.
    #[must_use]
    pub const fn legacy_only() -> Self {
        Self {
            query: QueryCapability::LegacyOnly,
            efficiency_reporting: false,
            mask_width: MaskWidth::NATIVE,
        }
    }

    /// Capabilities of a platform that offers the extended query but does not report
    /// efficiency classes.
    #[must_use]
    pub const fn extended() -> Self {
        Self {
            query: QueryCapability::Extended,
            efficiency_reporting: false,
            mask_width: MaskWidth::NATIVE,
        }
    }

    /// Detects the capabilities of the platform the process is running on.
    ///
    /// On platforms without a topology query facility, this returns [`Self::legacy_only()`];
    /// the query itself will then fail with an acquisition error.
    #[must_use]
    pub fn detect() -> Self {
        BUILD_TARGET_PLATFORM.capabilities()
    }

    /// Sets whether the efficiency class byte in core records is to be trusted.
    ///
    /// Earlier platform revisions repurpose that byte, so it must only be trusted when the
    /// platform is known to report efficiency classes. Has no effect on legacy decoding.
    #[must_use]
    pub const fn with_efficiency_reporting(mut self, enabled: bool) -> Self {
        self.efficiency_reporting = enabled;
        self
    }

    /// Overrides the mask width used to decode records. Defaults to [`MaskWidth::NATIVE`].
    #[must_use]
    pub const fn with_mask_width(mut self, mask_width: MaskWidth) -> Self {
        self.mask_width = mask_width;
        self
    }

    /// Which query generation to use.
    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    #[must_use]
    pub const fn query(&self) -> QueryCapability {
        self.query
    }

    /// Whether efficiency classes reported by the platform are to be trusted.
    ///
    /// Always `false` for [`QueryCapability::LegacyOnly`].
    #[must_use]
    pub const fn efficiency_reporting(&self) -> bool {
        match self.query {
            QueryCapability::LegacyOnly => false,
            QueryCapability::Extended => self.efficiency_reporting,
        }
    }

    /// The mask width of the record layout.
    #[cfg_attr(test, mutants::skip)] // Trivial accessor.
    #[must_use]
    pub const fn mask_width(&self) -> MaskWidth {
        self.mask_width
    }
}

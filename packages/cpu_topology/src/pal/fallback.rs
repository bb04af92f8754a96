use std::env::consts::OS;

use crate::pal::Platform;
use crate::{AcquisitionError, PlatformCapabilities, RawTopologyBuffer};

/// Singleton instance of `BuildTargetPlatform`, used by public API types
/// to hook up to the correct PAL implementation.
#[cfg_attr(test, allow(dead_code, reason = "only used on platforms without native support"))]
pub(crate) static BUILD_TARGET_PLATFORM: BuildTargetPlatform = BuildTargetPlatform;

/// Fallback platform implementation for operating systems without a topology query facility.
///
/// Every query fails with [`AcquisitionError::Unsupported`], so callers can tell an unsupported
/// platform apart from corrupt topology data.
#[derive(Debug)]
pub(crate) struct BuildTargetPlatform;

impl Platform for BuildTargetPlatform {
    fn capabilities(&self) -> PlatformCapabilities {
        PlatformCapabilities::legacy_only()
    }

    fn extended_buffer(&self) -> Result<RawTopologyBuffer, AcquisitionError> {
        Err(AcquisitionError::Unsupported { platform: OS })
    }

    fn legacy_buffer(&self) -> Result<RawTopologyBuffer, AcquisitionError> {
        Err(AcquisitionError::Unsupported { platform: OS })
    }
}

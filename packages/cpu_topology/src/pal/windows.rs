use std::io;

use tracing::debug;
use windows::Wdk::System::SystemServices::RtlGetVersion;
use windows::Win32::Foundation::ERROR_INSUFFICIENT_BUFFER;
use windows::Win32::System::SystemInformation::{
    GetLogicalProcessorInformation, GetLogicalProcessorInformationEx, OSVERSIONINFOW, RelationAll,
};
use windows::core::HRESULT;

use crate::pal::Platform;
use crate::{AcquisitionError, PlatformCapabilities, RawTopologyBuffer};

/// Singleton instance of `BuildTargetPlatform`, used by public API types
/// to hook up to the correct PAL implementation.
pub(crate) static BUILD_TARGET_PLATFORM: BuildTargetPlatform = BuildTargetPlatform;

const EXTENDED_API: &str = "GetLogicalProcessorInformationEx";
const LEGACY_API: &str = "GetLogicalProcessorInformation";

/// The platform that matches the crate's build target.
#[derive(Debug)]
pub(crate) struct BuildTargetPlatform;

impl Platform for BuildTargetPlatform {
    fn capabilities(&self) -> PlatformCapabilities {
        let (major, minor) = os_version();

        capabilities_for_version(major, minor)
    }

    fn extended_buffer(&self) -> Result<RawTopologyBuffer, AcquisitionError> {
        query_with_retry(EXTENDED_API, |buffer, returned_length| {
            // SAFETY: The buffer is at least `returned_length` bytes and 8-byte aligned, both
            // pointers outlive the call.
            unsafe {
                GetLogicalProcessorInformationEx(
                    RelationAll,
                    buffer.map(|b| b.as_mut_ptr().cast()),
                    returned_length,
                )
            }
        })
    }

    fn legacy_buffer(&self) -> Result<RawTopologyBuffer, AcquisitionError> {
        query_with_retry(LEGACY_API, |buffer, returned_length| {
            // SAFETY: The buffer is at least `returned_length` bytes and 8-byte aligned, both
            // pointers outlive the call.
            unsafe {
                GetLogicalProcessorInformation(
                    buffer.map(|b| b.as_mut_ptr().cast()),
                    returned_length,
                )
            }
        })
    }
}

/// The extended query exists since Windows 7 (6.1), efficiency classes are reported since
/// Windows 10 (10.0). Before that, the efficiency class byte was reserved.
fn capabilities_for_version(major: u32, minor: u32) -> PlatformCapabilities {
    let at_least = |want_major: u32, want_minor: u32| {
        major > want_major || (major == want_major && minor >= want_minor)
    };

    if at_least(6, 1) {
        PlatformCapabilities::extended().with_efficiency_reporting(at_least(10, 0))
    } else {
        PlatformCapabilities::legacy_only()
    }
}

/// Returns the real OS version. Unlike `GetVersionEx()`, this is not subject to
/// application manifest compatibility shims.
fn os_version() -> (u32, u32) {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "the structure is a few hundred bytes"
    )]
    let mut info = OSVERSIONINFOW {
        dwOSVersionInfoSize: size_of::<OSVERSIONINFOW>() as u32,
        ..Default::default()
    };

    // SAFETY: The structure is correctly sized and outlives the call.
    let status = unsafe { RtlGetVersion(&raw mut info) };

    if status.is_err() {
        // Cannot really happen but if it does, we fall back to the least capable platform.
        debug!(?status, "RtlGetVersion failed; assuming legacy topology query only");
        return (0, 0);
    }

    (info.dwMajorVersion, info.dwMinorVersion)
}

/// Runs the two-step size probe + fill protocol shared by both topology queries.
///
/// The set of processors can change between the two calls, in which case the fill may again
/// report an insufficient buffer and we start over.
fn query_with_retry<F>(
    api: &'static str,
    mut call: F,
) -> Result<RawTopologyBuffer, AcquisitionError>
where
    F: FnMut(Option<&mut [u64]>, *mut u32) -> windows::core::Result<()>,
{
    let insufficient_buffer = HRESULT::from_win32(ERROR_INSUFFICIENT_BUFFER.0);

    loop {
        let mut required_length: u32 = 0;

        match call(None, &raw mut required_length) {
            // Nothing to report. Odd but not our problem to judge.
            Ok(()) => return Ok(RawTopologyBuffer::from_bytes(Vec::new())),
            Err(e) if e.code() == insufficient_buffer => {}
            Err(e) => {
                return Err(AcquisitionError::Os {
                    api,
                    source: io::Error::from(e),
                });
            }
        }

        let byte_len = required_length as usize;

        // We use u64 words to guarantee the alignment the platform structures require.
        let mut words = vec![0_u64; byte_len.div_ceil(size_of::<u64>())];
        let mut final_length = required_length;

        match call(Some(&mut words), &raw mut final_length) {
            Ok(()) => {}
            Err(e) if e.code() == insufficient_buffer => {
                debug!(
                    api,
                    required_length, "topology changed between size probe and query; retrying"
                );
                continue;
            }
            Err(e) => {
                return Err(AcquisitionError::Os {
                    api,
                    source: io::Error::from(e),
                });
            }
        }

        let bytes = words.iter().flat_map(|word| word.to_ne_bytes()).collect();

        return Ok(RawTopologyBuffer::new(bytes, final_length as usize));
    }
}

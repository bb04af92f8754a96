//! Platform Abstraction Layer (PAL). Everything that talks to the operating system goes through
//! here, so the decoding logic above it is identical on every platform.

mod abstractions;
pub(crate) use abstractions::*;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub(crate) use windows::*;

// The fallback module is compiled in test mode on all platforms and as the primary
// implementation on platforms without a topology query facility. We only glob-import it when
// it is the primary implementation, to avoid ambiguity with the platform-specific one.
#[cfg(any(test, not(windows)))]
pub(crate) mod fallback;

#[cfg(not(windows))]
pub(crate) use fallback::*;

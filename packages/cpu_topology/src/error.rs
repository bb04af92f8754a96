use std::io;

use thiserror::Error;

/// Errors that can occur when resolving the processor topology.
///
/// The variants distinguish "platform unsupported or query failed" ([`Error::Acquisition`]) from
/// "platform data is corrupt" ([`Error::TruncatedBuffer`], [`Error::TruncatedRecord`]). Decoding
/// is all-or-nothing: if any record is malformed, no partial topology is returned.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The raw topology buffer could not be obtained from the platform.
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    /// The buffer as a whole does not have a valid shape: the declared valid length exceeds the
    /// buffer, the buffer ends in the middle of a record header, or a fixed-size record
    /// sequence is cut short.
    #[error(
        "truncated topology buffer: {needed} bytes needed at offset {offset} but only {available} available"
    )]
    TruncatedBuffer {
        /// Byte offset at which the problem was detected.
        offset: usize,

        /// Number of bytes the reader needed to continue.
        needed: usize,

        /// Number of bytes actually available from `offset`.
        available: usize,
    },

    /// A single record declares a length (or a number of entries) that does not fit in the
    /// bytes available for it.
    #[error(
        "truncated topology record with relationship tag {tag} at offset {offset}: {needed} bytes needed but only {available} available"
    )]
    TruncatedRecord {
        /// The relationship tag of the offending record.
        tag: u32,

        /// Byte offset of the start of the offending record.
        offset: usize,

        /// Number of bytes the record requires.
        needed: usize,

        /// Number of bytes actually available for the record.
        available: usize,
    },
}

/// The platform refused or was unable to provide the raw topology buffer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AcquisitionError {
    /// The current platform does not offer the topology query facility.
    #[error("processor topology query is not supported on {platform}")]
    Unsupported {
        /// Name of the platform the query was attempted on.
        platform: &'static str,
    },

    /// The platform query facility exists but the call failed.
    #[error("{api} failed")]
    Os {
        /// Name of the platform API that failed.
        api: &'static str,

        /// The underlying operating system error.
        #[source]
        source: io::Error,
    },
}

/// A specialized `Result` type for topology operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;

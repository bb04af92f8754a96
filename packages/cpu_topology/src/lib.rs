#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Decodes the processor topology reported by the platform into logical processors, physical
//! cores, physical packages and NUMA nodes.
//!
//! The platform topology query facility (on Windows, `GetLogicalProcessorInformationEx` and its
//! legacy predecessor `GetLogicalProcessorInformation`) returns a buffer of tagged binary records.
//! Each record only states that some set of logical processors shares a core, a package or a NUMA
//! node. This package decodes those records and reconstructs which core, package and NUMA node
//! every logical processor belongs to.
//!
//! This is part of the [Folo project](https://github.com/folo-rs/folo) that provides mechanisms for
//! high-performance hardware-aware programming in Rust.
//!
//! # Example
//!
//! ```
//! use cpu_topology::TopologySnapshot;
//!
//! if let Ok(topology) = TopologySnapshot::current() {
//!     println!(
//!         "{} logical processors on {} cores in {} packages",
//!         topology.logical_processor_count(),
//!         topology.physical_core_count(),
//!         topology.physical_package_count()
//!     );
//! }
//! ```
//!
//! # Decoding captured data
//!
//! The decoder does not care where the buffer came from. Implement [`TopologySource`] to supply
//! buffers captured elsewhere, or call [`decode_extended()`] and [`decode_legacy()`] directly. The
//! [`fake`] module builds synthetic buffers for tests.
//!
//! # Extended and legacy queries
//!
//! The extended query knows about processor groups, NUMA nodes and efficiency classes. The legacy
//! query only sees the first processor group and the decoded topology has no NUMA node or
//! efficiency class information. Which query is used is decided by [`PlatformCapabilities`],
//! typically detected via [`PlatformCapabilities::detect()`].
//!
//! Nothing is cached. Every query reads and decodes the topology from scratch.
//!
//! # Operating system compatibility
//!
//! Only Windows offers the topology query facility. On other operating systems, decoding works
//! as normal but [`SystemTopologySource`] fails with [`AcquisitionError::Unsupported`].

mod affinity_mask;
mod capabilities;
mod error;
mod legacy;
mod pal;
mod primitive_types;
mod reader;
mod reconcile;
mod record;
mod snapshot;
mod source;
mod topology;

pub mod fake;

pub use affinity_mask::*;
pub use capabilities::*;
pub use error::*;
pub use primitive_types::*;
pub use snapshot::*;
pub use source::*;
pub use topology::*;

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/epo/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod allocator;
pub mod config;
pub mod error;
pub mod inputs;

// Re-export main types from sub-crates
pub use epo_data as data;
pub use epo_output as output;
pub use epo_risk as risk;

pub use allocator::{Allocation, EpoAllocator, allocate};
pub use config::{AllocationConfig, Method};
pub use error::EpoError;
pub use inputs::{mean_signal, uniform_anchor};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

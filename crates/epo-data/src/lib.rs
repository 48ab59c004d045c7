#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/epo/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod returns;
pub mod vector;

pub use error::{DataError, Result};
pub use returns::ReturnsTable;
pub use vector::{parse_vector, vector_from_json};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

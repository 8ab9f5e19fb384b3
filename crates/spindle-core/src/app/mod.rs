//! App - the indexing orchestrator and its wiring.
//!
//! # Components
//! - **IndexOptions**: configuration of one managed index
//! - **IndexServiceBuilder**: fail-fast construction from options and ports
//! - **IndexService**: turns mutations into ordered index operations

pub mod builder;
pub mod options;
pub mod service;

pub use self::builder::{BuildError, IndexServiceBuilder};
pub use self::options::IndexOptions;
pub use self::service::IndexService;

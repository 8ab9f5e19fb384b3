//! Ports: the collaborators the indexing pipeline talks to.
//!
//! The pipeline owns none of these. The surrounding system supplies the
//! index engine, the row/document mapper and (optionally) the row source;
//! `crate::impls` has in-memory versions for development and tests.

pub mod clock;
pub mod index_engine;
pub mod mapper;
pub mod row_source;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::index_engine::IndexEngine;
pub use self::mapper::RowMapper;
pub use self::row_source::RowSource;

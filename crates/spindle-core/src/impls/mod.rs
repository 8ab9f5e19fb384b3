//! Impls - in-memory implementations of the ports.
//!
//! Good enough for development, demos and tests; a real deployment plugs in
//! its own search engine, mapper and store read path.

pub mod json_mapper;
pub mod memory_index;
pub mod memory_source;

pub use self::json_mapper::JsonMapper;
pub use self::memory_index::{EngineCall, MemoryIndex};
pub use self::memory_source::MemoryRowSource;

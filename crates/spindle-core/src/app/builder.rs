//! IndexServiceBuilder - wiring of an [`IndexService`].
//!
//! Fail-fast: a missing collaborator or invalid options are reported by
//! `build()`, before any worker is started.

use std::sync::Arc;

use super::{IndexOptions, IndexService};
use crate::ports::{Clock, IndexEngine, RowMapper, RowSource, SystemClock};

/// # Example
/// ```ignore
/// let service = IndexServiceBuilder::new(IndexOptions::default())
///     .engine(Arc::new(MemoryIndex::new()))
///     .mapper(Arc::new(JsonMapper::new()))
///     .build()?;
/// ```
pub struct IndexServiceBuilder {
    options: IndexOptions,
    engine: Option<Arc<dyn IndexEngine>>,
    mapper: Option<Arc<dyn RowMapper>>,
    source: Option<Arc<dyn RowSource>>,
    clock: Option<Arc<dyn Clock>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error("invalid index options: {0}")]
    InvalidOptions(String),
}

impl IndexServiceBuilder {
    pub fn new(options: IndexOptions) -> Self {
        Self {
            options,
            engine: None,
            mapper: None,
            source: None,
            clock: None,
        }
    }

    pub fn engine(mut self, engine: Arc<dyn IndexEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn mapper(mut self, mapper: Arc<dyn RowMapper>) -> Self {
        self.mapper = Some(mapper);
        self
    }

    /// Re-read mutated rows from the store before indexing them.
    pub fn row_source(mut self, source: Arc<dyn RowSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Clock used by [`IndexService::apply_mutation_now`]. Defaults to the
    /// system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate and start the service. Must run inside a Tokio runtime.
    pub fn build(self) -> Result<IndexService, BuildError> {
        self.options.validate()?;
        let engine = self
            .engine
            .ok_or(BuildError::MissingCollaborator("index engine"))?;
        let mapper = self
            .mapper
            .ok_or(BuildError::MissingCollaborator("row mapper"))?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        Ok(IndexService::new(
            &self.options,
            engine,
            mapper,
            self.source,
            clock,
        ))
    }
}

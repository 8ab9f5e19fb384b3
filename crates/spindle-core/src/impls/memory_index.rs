//! MemoryIndex - in-memory index engine.
//!
//! Keeps a live document set plus the snapshot taken by the last commit, and
//! records every call it receives so callers can check ordering. Failures
//! can be injected per term or for commits.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::{Document, Term};
use crate::error::EngineError;
use crate::ports::IndexEngine;

/// One call received by a [`MemoryIndex`], in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Upsert(Term),
    Delete(Term),
    Commit,
    Truncate,
    Close,
}

#[derive(Debug, Default)]
struct MemoryIndexState {
    live: Vec<Document>,
    committed: Vec<Document>,
    calls: Vec<EngineCall>,
    commits: u64,
    closed: bool,
    failing_terms: HashSet<String>,
    fail_commits: bool,
}

impl MemoryIndexState {
    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.closed {
            return Err(EngineError::new("index engine is closed"));
        }
        Ok(())
    }

    fn ensure_writable(&self, term: &Term) -> Result<(), EngineError> {
        self.ensure_open()?;
        if self.failing_terms.contains(&term.text) {
            return Err(EngineError::new(format!("injected failure for {term}")));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryIndex {
    state: Mutex<MemoryIndexState>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryIndexState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Documents currently in the index, committed or not.
    pub fn documents(&self) -> Vec<Document> {
        self.lock().live.clone()
    }

    /// Documents as of the last successful commit.
    pub fn committed_documents(&self) -> Vec<Document> {
        self.lock().committed.clone()
    }

    pub fn find(&self, term: &Term) -> Option<Document> {
        self.lock().live.iter().find(|doc| term.matches(doc)).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().live.is_empty()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    pub fn commits(&self) -> u64 {
        self.lock().commits
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Make every upsert/delete whose term text equals `text` fail.
    pub fn fail_term(&self, text: impl Into<String>) {
        self.lock().failing_terms.insert(text.into());
    }

    pub fn fail_commits(&self, fail: bool) {
        self.lock().fail_commits = fail;
    }
}

#[async_trait]
impl IndexEngine for MemoryIndex {
    async fn upsert(&self, term: Term, document: Document) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.ensure_writable(&term)?;
        state.live.retain(|doc| !term.matches(doc));
        state.live.push(document);
        state.calls.push(EngineCall::Upsert(term));
        Ok(())
    }

    async fn delete(&self, term: Term) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.ensure_writable(&term)?;
        state.live.retain(|doc| !term.matches(doc));
        state.calls.push(EngineCall::Delete(term));
        Ok(())
    }

    async fn commit(&self) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.ensure_open()?;
        if state.fail_commits {
            return Err(EngineError::new("injected commit failure"));
        }
        state.committed = state.live.clone();
        state.commits += 1;
        state.calls.push(EngineCall::Commit);
        Ok(())
    }

    async fn truncate(&self) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.ensure_open()?;
        state.live.clear();
        state.committed.clear();
        state.calls.push(EngineCall::Truncate);
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        let mut state = self.lock();
        state.ensure_open()?;
        state.closed = true;
        state.calls.push(EngineCall::Close);
        Ok(())
    }
}

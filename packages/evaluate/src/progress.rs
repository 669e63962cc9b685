//! Per-table progress events of an evaluation.
//!
//! [`evaluate`](crate::evaluate) reports each table it starts and finishes.
//! The CLI renders these as an `indicatif` bar; tests use [`NullProgress`].

use std::sync::Arc;

/// Receives evaluation progress, one table at a time.
pub trait TableProgress: Send + Sync {
    /// Evaluation is about to visit `tables` tables.
    fn start(&self, tables: u64);

    /// `table` is being queried.
    fn table_started(&self, table: &str);

    /// `table` returned `outside` rows outside the boundary, before noise
    /// filtering.
    fn table_finished(&self, table: &str, outside: usize);

    /// All tables are done; `violations` records survived filtering.
    fn finish(&self, violations: usize);
}

/// A [`TableProgress`] that discards every event.
pub struct NullProgress;

impl TableProgress for NullProgress {
    fn start(&self, _tables: u64) {}
    fn table_started(&self, _table: &str) {}
    fn table_finished(&self, _table: &str, _outside: usize) {}
    fn finish(&self, _violations: usize) {}
}

/// Shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn TableProgress> {
    Arc::new(NullProgress)
}

//! Seams between the engine and the databases it talks to.
//!
//! - [`Connector`]: builds and releases one handle per logical service
//! - [`DatasetStore`]: full-table reads and appends against those services
//!
//! The orchestrator and executor only see these traits, so the same engine
//! runs against MySQL in production and against
//! [`MemoryStore`](crate::memory::MemoryStore) in tests.

use async_trait::async_trait;

use crate::config::ConnectionParams;
use crate::error::Result;

use super::dataset::Dataset;

/// Creates and disposes connection handles.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Handle cached by the registry for the lifetime of a run.
    type Handle: Send + Sync;

    /// Connect to `service`. Failure is a `Connectivity` error.
    async fn connect(&self, service: &str, params: &ConnectionParams) -> Result<Self::Handle>;

    /// Check that an existing handle can still reach its service.
    async fn probe(&self, service: &str, handle: &Self::Handle) -> Result<()>;

    /// Dispose of a handle. Called at most once per handle.
    async fn release(&self, service: &str, handle: Self::Handle);
}

/// Reads whole tables from, and appends datasets to, logical services.
///
/// Execution is strictly sequential, so every method takes `&mut self`.
#[async_trait]
pub trait DatasetStore: Send {
    /// Resolve `service` and check it answers.
    async fn ping(&mut self, service: &str) -> Result<()>;

    /// Unconditional full-table read. Errors propagate to the caller.
    async fn load(&mut self, service: &str, table: &str) -> Result<Dataset>;

    /// Append `dataset` to an existing table.
    ///
    /// An empty dataset is a trivial success with no write attempted.
    /// A failed append is reported as `false`, not as an error.
    async fn write(&mut self, service: &str, table: &str, dataset: &Dataset) -> bool;

    /// Release every connection. Safe to call more than once.
    async fn close(&mut self);
}

//! Read-only access to the operational document store.
//!
//! The [`SourceStore`] trait is the seam the pipeline is tested through:
//! [`mongo::MongoSourceStore`] talks to the real MongoDB collections, while
//! [`memory::MemorySourceStore`] serves isolated tests. The three query
//! functions in [`queries`] materialize the reads and hand them to the pure
//! rollups in `caa_core::rollup`.

use async_trait::async_trait;
use caa_core::{Appointment, Doctor, Patient};
use thiserror::Error;

pub mod memory;
pub mod mongo;
pub mod queries;

pub use memory::MemorySourceStore;
pub use mongo::MongoSourceStore;

pub const CRATE_NAME: &str = "caa-source";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source store unreachable: {0}")]
    Connect(#[source] mongodb::error::Error),
    #[error("source query failed: {0}")]
    Query(#[from] mongodb::error::Error),
    #[error("malformed {collection} document: {reason}")]
    Decode {
        collection: &'static str,
        reason: String,
    },
    #[error("{0}")]
    Unavailable(String),
}

/// Materialized, read-only view of the source collections.
///
/// No retry at this layer; any connectivity or query failure propagates
/// fatally to the caller.
#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn ping(&self) -> Result<(), SourceError>;
    async fn doctors(&self) -> Result<Vec<Doctor>, SourceError>;
    async fn appointments(&self) -> Result<Vec<Appointment>, SourceError>;
    async fn patients(&self) -> Result<Vec<Patient>, SourceError>;
}

//! Relational warehouse target for the computed aggregates.
//!
//! Three tables, one per aggregate shape, each with an explicit uniqueness
//! constraint. Writes are row-level upserts issued one statement at a time;
//! there is deliberately no transaction around a writer's loop, so a failure
//! mid-loop leaves earlier rows committed and aborts the run.

use async_trait::async_trait;
use caa_core::{ConditionAggregate, DoctorAggregate, FrequencyAggregate};
use chrono::NaiveDate;
use thiserror::Error;

pub mod memory;
pub mod pg;

pub use memory::MemoryWarehouse;
pub use pg::PgWarehouse;

pub const CRATE_NAME: &str = "caa-warehouse";

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("warehouse unreachable: {0}")]
    Connect(#[source] sqlx::Error),
    #[error("warehouse write failed: {0}")]
    Write(#[from] sqlx::Error),
    #[error("no calendar month {month} in year {year}")]
    InvalidMonth { year: i32, month: u32 },
}

/// Idempotent writers for the three aggregate shapes.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Idempotent table bootstrap.
    async fn ensure_schema(&self) -> Result<(), WarehouseError>;

    /// Upsert keyed by doctor_id; conflicts overwrite name, specialization
    /// and count.
    async fn write_doctor_aggregates(
        &self,
        rows: &[DoctorAggregate],
    ) -> Result<(), WarehouseError>;

    /// Upsert keyed by the first calendar day of (year, month); conflicts
    /// overwrite the count.
    async fn write_frequency_aggregates(
        &self,
        rows: &[FrequencyAggregate],
    ) -> Result<(), WarehouseError>;

    /// One row per (specialty, condition) pair; conflicts preserve the
    /// existing row.
    async fn write_condition_aggregates(
        &self,
        rows: &[ConditionAggregate],
    ) -> Result<(), WarehouseError>;
}

/// Storage key for a frequency aggregate: the first day of its month.
pub fn month_start(row: &FrequencyAggregate) -> Result<NaiveDate, WarehouseError> {
    NaiveDate::from_ymd_opt(row.year, row.month, 1).ok_or(WarehouseError::InvalidMonth {
        year: row.year,
        month: row.month,
    })
}

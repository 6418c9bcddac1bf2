//! In-memory [`Warehouse`] modelling the same conflict semantics as the
//! Postgres tables, for pipeline and idempotence tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use caa_core::{ConditionAggregate, DoctorAggregate, FrequencyAggregate};
use chrono::NaiveDate;

use crate::{month_start, Warehouse, WarehouseError};

#[derive(Debug, Default)]
struct Tables {
    doctor_totals: BTreeMap<i64, DoctorAggregate>,
    monthly_totals: BTreeMap<NaiveDate, u64>,
    // Key-only table, so ON CONFLICT DO NOTHING degenerates to set insert.
    specialty_conditions: BTreeSet<(String, String)>,
}

#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    tables: Mutex<Tables>,
    fail_writes: Mutex<bool>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, for exercising abort paths.
    pub fn fail_writes(&self) {
        *self.fail_writes.lock().expect("lock poisoned") = true;
    }

    pub fn doctor_rows(&self) -> Vec<DoctorAggregate> {
        let tables = self.tables.lock().expect("lock poisoned");
        tables.doctor_totals.values().cloned().collect()
    }

    pub fn monthly_rows(&self) -> Vec<(NaiveDate, u64)> {
        let tables = self.tables.lock().expect("lock poisoned");
        tables.monthly_totals.iter().map(|(k, v)| (*k, *v)).collect()
    }

    pub fn condition_rows(&self) -> Vec<(String, String)> {
        let tables = self.tables.lock().expect("lock poisoned");
        tables.specialty_conditions.iter().cloned().collect()
    }

    fn check(&self) -> Result<(), WarehouseError> {
        if *self.fail_writes.lock().expect("lock poisoned") {
            return Err(WarehouseError::Connect(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn ensure_schema(&self) -> Result<(), WarehouseError> {
        Ok(())
    }

    async fn write_doctor_aggregates(
        &self,
        rows: &[DoctorAggregate],
    ) -> Result<(), WarehouseError> {
        self.check()?;
        let mut tables = self.tables.lock().expect("lock poisoned");
        for row in rows {
            tables.doctor_totals.insert(row.doctor_id, row.clone());
        }
        Ok(())
    }

    async fn write_frequency_aggregates(
        &self,
        rows: &[FrequencyAggregate],
    ) -> Result<(), WarehouseError> {
        self.check()?;
        let mut tables = self.tables.lock().expect("lock poisoned");
        for row in rows {
            let key = month_start(row)?;
            tables.monthly_totals.insert(key, row.total_appointments);
        }
        Ok(())
    }

    async fn write_condition_aggregates(
        &self,
        rows: &[ConditionAggregate],
    ) -> Result<(), WarehouseError> {
        self.check()?;
        let mut tables = self.tables.lock().expect("lock poisoned");
        for row in rows {
            for condition in &row.common_conditions {
                tables
                    .specialty_conditions
                    .insert((row.specialty.clone(), condition.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn doctor_row(id: i64, name: &str, total: u64) -> DoctorAggregate {
        DoctorAggregate {
            doctor_id: id,
            doctor_name: name.to_string(),
            specialization: None,
            total_appointments: total,
        }
    }

    #[tokio::test]
    async fn doctor_upsert_is_idempotent_and_overwrites() {
        let warehouse = MemoryWarehouse::new();
        warehouse
            .write_doctor_aggregates(&[doctor_row(1, "A", 2), doctor_row(2, "B", 5)])
            .await
            .unwrap();
        warehouse
            .write_doctor_aggregates(&[doctor_row(1, "A", 3)])
            .await
            .unwrap();

        let rows = warehouse.doctor_rows();
        assert_eq!(rows.len(), 2);
        let row = rows.iter().find(|r| r.doctor_id == 1).unwrap();
        assert_eq!(row.total_appointments, 3);
    }

    #[tokio::test]
    async fn frequency_upsert_keys_by_month_start() {
        let warehouse = MemoryWarehouse::new();
        let row = FrequencyAggregate {
            year: 2026,
            month: 4,
            total_appointments: 9,
        };
        warehouse.write_frequency_aggregates(&[row.clone()]).await.unwrap();
        warehouse
            .write_frequency_aggregates(&[FrequencyAggregate {
                total_appointments: 11,
                ..row
            }])
            .await
            .unwrap();

        let rows = warehouse.monthly_rows();
        assert_eq!(
            rows,
            vec![(NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(), 11)]
        );
    }

    #[tokio::test]
    async fn condition_upsert_preserves_existing_pairs() {
        let warehouse = MemoryWarehouse::new();
        let row = ConditionAggregate {
            specialty: "cardiology".into(),
            common_conditions: BTreeSet::from(["arrhythmia".into(), "hypertension".into()]),
        };
        warehouse.write_condition_aggregates(&[row.clone()]).await.unwrap();
        warehouse.write_condition_aggregates(&[row]).await.unwrap();

        let rows = warehouse.condition_rows();
        assert_eq!(rows.len(), 2);
        assert!(rows.contains(&("cardiology".into(), "arrhythmia".into())));
    }

    #[tokio::test]
    async fn failed_writes_surface_the_error() {
        let warehouse = MemoryWarehouse::new();
        warehouse.fail_writes();
        assert!(warehouse
            .write_doctor_aggregates(&[doctor_row(1, "A", 1)])
            .await
            .is_err());
    }
}

//! Postgres-backed [`Warehouse`] implementation.

use async_trait::async_trait;
use caa_core::{ConditionAggregate, DoctorAggregate, FrequencyAggregate};
use sqlx::PgPool;
use tracing::info;

use crate::{month_start, Warehouse, WarehouseError};

#[derive(Debug, Clone)]
pub struct PgWarehouse {
    pool: PgPool,
}

impl PgWarehouse {
    pub async fn connect(database_url: &str) -> Result<Self, WarehouseError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(WarehouseError::Connect)?;
        info!("connected to warehouse");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn ensure_schema(&self) -> Result<(), WarehouseError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS doctor_appointment_totals (
                doctor_id          BIGINT PRIMARY KEY,
                doctor_name        TEXT NOT NULL,
                specialization     TEXT,
                total_appointments BIGINT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS monthly_appointment_totals (
                month_start        DATE PRIMARY KEY,
                total_appointments BIGINT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS specialty_conditions (
                specialty TEXT NOT NULL,
                condition TEXT NOT NULL,
                PRIMARY KEY (specialty, condition)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn write_doctor_aggregates(
        &self,
        rows: &[DoctorAggregate],
    ) -> Result<(), WarehouseError> {
        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO doctor_appointment_totals
                    (doctor_id, doctor_name, specialization, total_appointments)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (doctor_id) DO UPDATE
                   SET doctor_name        = EXCLUDED.doctor_name,
                       specialization     = EXCLUDED.specialization,
                       total_appointments = EXCLUDED.total_appointments
                "#,
            )
            .bind(row.doctor_id)
            .bind(&row.doctor_name)
            .bind(&row.specialization)
            .bind(row.total_appointments as i64)
            .execute(&self.pool)
            .await?;
        }
        info!(rows = rows.len(), "wrote doctor aggregates");
        Ok(())
    }

    async fn write_frequency_aggregates(
        &self,
        rows: &[FrequencyAggregate],
    ) -> Result<(), WarehouseError> {
        for row in rows {
            let key = month_start(row)?;
            sqlx::query(
                r#"
                INSERT INTO monthly_appointment_totals (month_start, total_appointments)
                VALUES ($1, $2)
                ON CONFLICT (month_start) DO UPDATE
                   SET total_appointments = EXCLUDED.total_appointments
                "#,
            )
            .bind(key)
            .bind(row.total_appointments as i64)
            .execute(&self.pool)
            .await?;
        }
        info!(rows = rows.len(), "wrote frequency aggregates");
        Ok(())
    }

    async fn write_condition_aggregates(
        &self,
        rows: &[ConditionAggregate],
    ) -> Result<(), WarehouseError> {
        let mut written = 0usize;
        for row in rows {
            for condition in &row.common_conditions {
                sqlx::query(
                    r#"
                    INSERT INTO specialty_conditions (specialty, condition)
                    VALUES ($1, $2)
                    ON CONFLICT (specialty, condition) DO NOTHING
                    "#,
                )
                .bind(&row.specialty)
                .bind(condition)
                .execute(&self.pool)
                .await?;
                written += 1;
            }
        }
        info!(rows = written, "wrote condition aggregates");
        Ok(())
    }
}

//! The three analytical queries, materialized through a [`SourceStore`].

use caa_core::{rollup, ConditionAggregate, DoctorAggregate, FrequencyAggregate};
use tracing::debug;

use crate::{SourceError, SourceStore};

/// Per-doctor appointment counts, inner-joined to doctor records.
pub async fn appointments_per_doctor(
    store: &dyn SourceStore,
) -> Result<Vec<DoctorAggregate>, SourceError> {
    let appointments = store.appointments().await?;
    let doctors = store.doctors().await?;
    let rows = rollup::appointments_per_doctor(&appointments, &doctors);
    debug!(
        appointments = appointments.len(),
        doctors = doctors.len(),
        rows = rows.len(),
        "computed appointments per doctor"
    );
    Ok(rows)
}

/// Appointment counts per calendar month, ascending.
pub async fn appointment_frequency(
    store: &dyn SourceStore,
) -> Result<Vec<FrequencyAggregate>, SourceError> {
    let appointments = store.appointments().await?;
    let rows = rollup::appointment_frequency(&appointments);
    debug!(
        appointments = appointments.len(),
        rows = rows.len(),
        "computed appointment frequency"
    );
    Ok(rows)
}

/// Deduplicated condition sets per specialty.
pub async fn common_conditions_by_specialty(
    store: &dyn SourceStore,
) -> Result<Vec<ConditionAggregate>, SourceError> {
    let patients = store.patients().await?;
    let rows = rollup::common_conditions_by_specialty(&patients);
    debug!(
        patients = patients.len(),
        rows = rows.len(),
        "computed common conditions by specialty"
    );
    Ok(rows)
}

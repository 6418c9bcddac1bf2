//! Pure grouping/rollup computations over materialized source records.
//!
//! All three functions are deterministic over their inputs and carry no
//! state between calls; the I/O-bearing query layer in `caa-source` feeds
//! them fully materialized result sets.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Datelike;

use crate::{
    Appointment, ConditionAggregate, Doctor, DoctorAggregate, FrequencyAggregate, Patient,
};

/// Group appointments by doctor, count, and inner-join to doctor records.
///
/// Inner-join semantics: doctors with zero appointments are absent, and
/// appointments referencing an unknown doctor id are dropped, not reported.
/// Output is ordered by doctor id.
pub fn appointments_per_doctor(
    appointments: &[Appointment],
    doctors: &[Doctor],
) -> Vec<DoctorAggregate> {
    let mut counts: BTreeMap<i64, u64> = BTreeMap::new();
    for appointment in appointments {
        *counts.entry(appointment.doctor_id).or_default() += 1;
    }

    let by_id: BTreeMap<i64, &Doctor> = doctors.iter().map(|d| (d.id, d)).collect();

    counts
        .into_iter()
        .filter_map(|(doctor_id, total_appointments)| {
            by_id.get(&doctor_id).map(|doctor| DoctorAggregate {
                doctor_id,
                doctor_name: doctor.name.clone(),
                specialization: doctor.specialization.clone(),
                total_appointments,
            })
        })
        .collect()
}

/// Group appointments by the calendar (year, month) of their date.
///
/// Output is sorted ascending by (year, month) with no duplicate pairs.
pub fn appointment_frequency(appointments: &[Appointment]) -> Vec<FrequencyAggregate> {
    let mut counts: BTreeMap<(i32, u32), u64> = BTreeMap::new();
    for appointment in appointments {
        let key = (appointment.date.year(), appointment.date.month());
        *counts.entry(key).or_default() += 1;
    }

    counts
        .into_iter()
        .map(|((year, month), total_appointments)| FrequencyAggregate {
            year,
            month,
            total_appointments,
        })
        .collect()
}

/// Flatten each patient's medical history into a deduplicated condition set
/// per specialty.
///
/// Patients with no specialty recorded contribute nothing. Output is ordered
/// by specialty.
pub fn common_conditions_by_specialty(patients: &[Patient]) -> Vec<ConditionAggregate> {
    let mut sets: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for patient in patients {
        let Some(specialty) = &patient.specialty else {
            continue;
        };
        let set = sets.entry(specialty.clone()).or_default();
        for condition in &patient.medical_history {
            set.insert(condition.clone());
        }
    }

    sets.into_iter()
        .map(|(specialty, common_conditions)| ConditionAggregate {
            specialty,
            common_conditions,
        })
        .collect()
}

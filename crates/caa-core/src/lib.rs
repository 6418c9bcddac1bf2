//! Core domain model and pure rollup functions for the clinic aggregation service.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod rollup;

pub const CRATE_NAME: &str = "caa-core";

/// Doctor record as it exists in the operational store. Read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: i64,
    pub name: String,
    pub specialization: Option<String>,
}

/// Scheduled appointment. Clinical fields beyond what the rollups need are
/// intentionally not modelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub doctor_id: i64,
    pub date: DateTime<Utc>,
}

/// Patient record with its ordered medical history of condition labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: String,
    pub specialty: Option<String>,
    pub medical_history: Vec<String>,
}

/// Per-doctor appointment count. Uniqueness key = doctor_id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorAggregate {
    pub doctor_id: i64,
    pub doctor_name: String,
    pub specialization: Option<String>,
    pub total_appointments: u64,
}

/// Appointment count for one calendar month. Uniqueness key = (year, month).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyAggregate {
    pub year: i32,
    pub month: u32,
    pub total_appointments: u64,
}

/// Deduplicated set of condition labels seen for one specialty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionAggregate {
    pub specialty: String,
    pub common_conditions: BTreeSet<String>,
}

/// Combined result of one pipeline run, also the JSON body of the on-demand
/// endpoint and the on-disk snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateBundle {
    pub appointments_per_doctor: Vec<DoctorAggregate>,
    pub appointment_frequency: Vec<FrequencyAggregate>,
    pub common_conditions_by_specialty: Vec<ConditionAggregate>,
}

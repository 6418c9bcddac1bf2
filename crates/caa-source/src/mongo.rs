//! MongoDB-backed [`SourceStore`] implementation.

use async_trait::async_trait;
use caa_core::{Appointment, Doctor, Patient};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime};
use mongodb::{Client, Database};
use serde::Deserialize;
use tracing::info;

use crate::{SourceError, SourceStore};

const DOCTORS_COLLECTION: &str = "doctors";
const APPOINTMENTS_COLLECTION: &str = "appointments";
const PATIENTS_COLLECTION: &str = "patients";

/// Raw appointment document. Clinical fields the rollups never touch are
/// left undeclared and ignored by serde.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppointmentDoc {
    #[serde(rename = "_id")]
    id: ObjectId,
    doctor_id: i64,
    date: BsonDateTime,
}

#[derive(Debug, Clone, Deserialize)]
struct DoctorDoc {
    #[serde(rename = "_id")]
    id: i64,
    name: String,
    #[serde(default)]
    specialization: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PatientDoc {
    #[serde(rename = "_id")]
    id: ObjectId,
    #[serde(default)]
    specialty: Option<String>,
    #[serde(default)]
    medical_history: Vec<String>,
}

impl TryFrom<AppointmentDoc> for Appointment {
    type Error = SourceError;

    fn try_from(doc: AppointmentDoc) -> Result<Self, Self::Error> {
        let date = DateTime::<Utc>::from_timestamp_millis(doc.date.timestamp_millis()).ok_or(
            SourceError::Decode {
                collection: APPOINTMENTS_COLLECTION,
                reason: format!("date out of range for appointment {}", doc.id.to_hex()),
            },
        )?;
        Ok(Appointment {
            id: doc.id.to_hex(),
            doctor_id: doc.doctor_id,
            date,
        })
    }
}

impl From<DoctorDoc> for Doctor {
    fn from(doc: DoctorDoc) -> Self {
        Doctor {
            id: doc.id,
            name: doc.name,
            specialization: doc.specialization,
        }
    }
}

impl From<PatientDoc> for Patient {
    fn from(doc: PatientDoc) -> Self {
        Patient {
            id: doc.id.to_hex(),
            specialty: doc.specialty,
            medical_history: doc.medical_history,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MongoSourceStore {
    db: Database,
}

impl MongoSourceStore {
    /// Connect to the source store. The driver defers socket establishment,
    /// so callers should follow up with [`SourceStore::ping`] before relying
    /// on the connection.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, SourceError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(SourceError::Connect)?;
        let db = client.database(db_name);
        info!(db = db_name, "connected to source store");
        Ok(Self { db })
    }
}

#[async_trait]
impl SourceStore for MongoSourceStore {
    async fn ping(&self) -> Result<(), SourceError> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(SourceError::Connect)?;
        Ok(())
    }

    async fn doctors(&self) -> Result<Vec<Doctor>, SourceError> {
        let cursor = self
            .db
            .collection::<DoctorDoc>(DOCTORS_COLLECTION)
            .find(doc! {})
            .await?;
        let docs: Vec<DoctorDoc> = cursor.try_collect().await?;
        Ok(docs.into_iter().map(Doctor::from).collect())
    }

    async fn appointments(&self) -> Result<Vec<Appointment>, SourceError> {
        let cursor = self
            .db
            .collection::<AppointmentDoc>(APPOINTMENTS_COLLECTION)
            .find(doc! {})
            .await?;
        let docs: Vec<AppointmentDoc> = cursor.try_collect().await?;
        docs.into_iter().map(Appointment::try_from).collect()
    }

    async fn patients(&self) -> Result<Vec<Patient>, SourceError> {
        let cursor = self
            .db
            .collection::<PatientDoc>(PATIENTS_COLLECTION)
            .find(doc! {})
            .await?;
        let docs: Vec<PatientDoc> = cursor.try_collect().await?;
        Ok(docs.into_iter().map(Patient::from).collect())
    }
}

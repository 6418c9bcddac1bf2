//! In-memory [`SourceStore`] for isolated tests and local development.

use async_trait::async_trait;
use caa_core::{Appointment, Doctor, Patient};

use crate::{SourceError, SourceStore};

/// Holds fully materialized collections; every read returns a clone.
#[derive(Debug, Clone, Default)]
pub struct MemorySourceStore {
    doctors: Vec<Doctor>,
    appointments: Vec<Appointment>,
    patients: Vec<Patient>,
    failure: Option<String>,
}

impl MemorySourceStore {
    pub fn new(
        doctors: Vec<Doctor>,
        appointments: Vec<Appointment>,
        patients: Vec<Patient>,
    ) -> Self {
        Self {
            doctors,
            appointments,
            patients,
            failure: None,
        }
    }

    /// A store whose every operation fails with the given message, for
    /// exercising the fatal-error paths.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), SourceError> {
        match &self.failure {
            Some(message) => Err(SourceError::Unavailable(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SourceStore for MemorySourceStore {
    async fn ping(&self) -> Result<(), SourceError> {
        self.check()
    }

    async fn doctors(&self) -> Result<Vec<Doctor>, SourceError> {
        self.check()?;
        Ok(self.doctors.clone())
    }

    async fn appointments(&self) -> Result<Vec<Appointment>, SourceError> {
        self.check()?;
        Ok(self.appointments.clone())
    }

    async fn patients(&self) -> Result<Vec<Patient>, SourceError> {
        self.check()?;
        Ok(self.patients.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_return_seeded_collections() {
        let store = MemorySourceStore::new(
            vec![Doctor {
                id: 1,
                name: "A".into(),
                specialization: None,
            }],
            vec![],
            vec![],
        );
        assert!(store.ping().await.is_ok());
        assert_eq!(store.doctors().await.unwrap().len(), 1);
        assert!(store.appointments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_store_fails_every_operation() {
        let store = MemorySourceStore::failing("source store down");
        let err = store.ping().await.unwrap_err();
        assert_eq!(err.to_string(), "source store down");
        assert!(store.doctors().await.is_err());
    }
}

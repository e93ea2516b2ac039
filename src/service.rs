use crate::{
    models::Person,
    repository::{PersonStoreState, StoreError},
};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// ServiceError
///
/// Domain outcomes of a failed `PersonService` call. A plain lookup miss is not in
/// here: `get` returns `Ok(None)` and the API layer decides what that means.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("a person named {first_name} {last_name} already exists")]
    Duplicate {
        first_name: String,
        last_name: String,
    },
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate {
                first_name,
                last_name,
            } => ServiceError::Duplicate {
                first_name,
                last_name,
            },
            other => ServiceError::Store(other),
        }
    }
}

/// PersonService
///
/// Owns the `(first_name, last_name)` uniqueness rule on top of a `PersonStore`.
///
/// The name-pair lookup in `save` is a check-then-act pre-check and does not by itself
/// guarantee uniqueness under concurrent writers. The store constraint does; its
/// rejection arrives as `StoreError::Duplicate` and is reported exactly like a
/// pre-check hit.
#[derive(Clone)]
pub struct PersonService {
    store: PersonStoreState,
}

impl PersonService {
    pub fn new(store: PersonStoreState) -> Self {
        Self { store }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<Option<Person>, ServiceError> {
        let person = self.store.find_by_id(id).await?;
        debug!(found = person.is_some(), "person lookup");
        Ok(person)
    }

    /// All records, ascending by last name.
    #[instrument(skip(self))]
    pub async fn get_all(&self) -> Result<Vec<Person>, ServiceError> {
        let people = self.store.list_ordered_by_last_name().await?;
        debug!(count = people.len(), "person listing");
        Ok(people)
    }

    pub async fn get_by_name_pair(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Option<Person>, ServiceError> {
        Ok(self.store.find_by_name_pair(first_name, last_name).await?)
    }

    /// save
    ///
    /// Creates (`id == None`) or replaces (`id == Some`) a record. An id the store does
    /// not hold is an insert under a freshly generated id. Fails with
    /// `Duplicate` when another record already holds the same name pair. A record
    /// keeping its own name on update is not a conflict.
    #[instrument(skip(self, candidate), fields(id = ?candidate.id))]
    pub async fn save(&self, candidate: Person) -> Result<Person, ServiceError> {
        if let Some(existing) = self
            .store
            .find_by_name_pair(&candidate.first_name, &candidate.last_name)
            .await?
        {
            if existing.id != candidate.id {
                warn!(existing_id = ?existing.id, "rejected duplicate name pair");
                return Err(ServiceError::Duplicate {
                    first_name: candidate.first_name,
                    last_name: candidate.last_name,
                });
            }
        }

        let saved = self.store.save(candidate).await.map_err(|e| {
            if matches!(e, StoreError::Duplicate { .. }) {
                warn!("store rejected duplicate name pair");
            }
            ServiceError::from(e)
        })?;
        info!(id = ?saved.id, "person saved");
        Ok(saved)
    }

    /// Idempotent: an unknown id is not an error.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        self.store.delete_by_id(id).await?;
        info!("person deleted");
        Ok(())
    }
}

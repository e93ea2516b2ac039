use crate::models::Person;
use async_trait::async_trait;
use sqlx::PgPool;
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};
use thiserror::Error;

/// StoreError
///
/// Failures a `PersonStore` can report. `Duplicate` is the store's own verdict on the
/// `(first_name, last_name)` uniqueness constraint and is the authoritative signal; the
/// service-level pre-check only catches the common case early.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a person named {first_name} {last_name} already exists")]
    Duplicate {
        first_name: String,
        last_name: String,
    },
    #[error("store backend error: {0}")]
    Backend(String),
}

// 1. PersonStore Contract
/// PersonStore
///
/// Persistence contract for `Person` records. Handlers never see this trait directly;
/// the `PersonService` sits in between and owns the uniqueness rules.
///
/// **Send + Sync + async_trait** make `Arc<dyn PersonStore>` shareable across Axum's
/// task boundaries.
#[async_trait]
pub trait PersonStore: Send + Sync {
    /// Absence is `Ok(None)`, never an error.
    async fn find_by_id(&self, id: i32) -> Result<Option<Person>, StoreError>;

    async fn find_by_name_pair(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Option<Person>, StoreError>;

    /// Ascending by last name compared byte-wise (so `"Young"` sorts before `"bell"`);
    /// ties keep insertion (id) order. Every implementation must use this ordering.
    async fn list_ordered_by_last_name(&self) -> Result<Vec<Person>, StoreError>;

    /// Inserts when `person.id` is `None` or names an id the store does not hold,
    /// replaces otherwise. An insert always gets a freshly generated id, so the returned
    /// record may carry a different id than the one requested.
    async fn save(&self, person: Person) -> Result<Person, StoreError>;

    /// Idempotent: deleting an unknown id succeeds.
    async fn delete_by_id(&self, id: i32) -> Result<(), StoreError>;
}

/// PersonStoreState
///
/// The concrete type used to share the persistence layer across the application state.
pub type PersonStoreState = Arc<dyn PersonStore>;

// 2. The Postgres Implementation
/// PgPersonStore
///
/// `PersonStore` backed by the `person` table. The table carries
/// `UNIQUE (first_name, last_name)`, so concurrent writers racing past the service
/// pre-check are still rejected here (SQLSTATE 23505 -> `StoreError::Duplicate`).
pub struct PgPersonStore {
    pool: PgPool,
}

impl PgPersonStore {
    /// Creates a new store using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, person: &Person) -> Result<Person, StoreError> {
        sqlx::query_as::<_, Person>(
            r#"INSERT INTO person (first_name, last_name) VALUES ($1, $2)
               RETURNING id, first_name, last_name"#,
        )
        .bind(&person.first_name)
        .bind(&person.last_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, person))
    }

    /// Applies the embedded migrations in `./migrations`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Postgres 23505 is `unique_violation`.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().map(|c| c == "23505").unwrap_or(false),
        _ => false,
    }
}

fn map_write_error(err: sqlx::Error, person: &Person) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::Duplicate {
            first_name: person.first_name.clone(),
            last_name: person.last_name.clone(),
        }
    } else {
        tracing::error!("person write error: {:?}", err);
        StoreError::Backend(err.to_string())
    }
}

fn map_read_error(op: &'static str, err: sqlx::Error) -> StoreError {
    tracing::error!("{} error: {:?}", op, err);
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl PersonStore for PgPersonStore {
    async fn find_by_id(&self, id: i32) -> Result<Option<Person>, StoreError> {
        sqlx::query_as::<_, Person>("SELECT id, first_name, last_name FROM person WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_read_error("find_by_id", e))
    }

    async fn find_by_name_pair(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Option<Person>, StoreError> {
        sqlx::query_as::<_, Person>(
            "SELECT id, first_name, last_name FROM person WHERE first_name = $1 AND last_name = $2",
        )
        .bind(first_name)
        .bind(last_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_read_error("find_by_name_pair", e))
    }

    /// `COLLATE "C"` pins byte order regardless of the database default collation;
    /// `id` breaks ties so equal last names keep insertion order.
    async fn list_ordered_by_last_name(&self) -> Result<Vec<Person>, StoreError> {
        sqlx::query_as::<_, Person>(
            r#"SELECT id, first_name, last_name FROM person
               ORDER BY last_name COLLATE "C" ASC, id ASC"#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_read_error("list_ordered_by_last_name", e))
    }

    async fn save(&self, person: Person) -> Result<Person, StoreError> {
        let Some(id) = person.id else {
            return self.insert(&person).await;
        };

        let updated = sqlx::query_as::<_, Person>(
            r#"UPDATE person SET first_name = $2, last_name = $3 WHERE id = $1
               RETURNING id, first_name, last_name"#,
        )
        .bind(id)
        .bind(&person.first_name)
        .bind(&person.last_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &person))?;

        match updated {
            Some(saved) => Ok(saved),
            None => {
                tracing::debug!(id, "update target missing, inserting");
                self.insert(&person).await
            }
        }
    }

    async fn delete_by_id(&self, id: i32) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM person WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| map_read_error("delete_by_id", e))
    }
}

// 3. The In-Memory Implementation (Local mode and tests)
/// InMemoryPersonStore
///
/// Keeps records in a `BTreeMap` keyed by id behind one mutex. The uniqueness check and
/// the write share the lock, which makes this store a single-writer serialization point:
/// it enforces the name-pair constraint on its own, just like the Postgres table does.
#[derive(Default)]
pub struct InMemoryPersonStore {
    inner: Mutex<InMemoryState>,
    /// When true, every operation returns `StoreError::Backend`.
    pub should_fail: bool,
}

#[derive(Default)]
struct InMemoryState {
    last_id: i32,
    rows: BTreeMap<i32, Person>,
}

impl InMemoryPersonStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, InMemoryState>, StoreError> {
        if self.should_fail {
            return Err(StoreError::Backend(
                "Mock Store Error: Simulation requested".to_string(),
            ));
        }
        // A panic while holding the lock cannot leave a half-written row behind.
        Ok(self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

#[async_trait]
impl PersonStore for InMemoryPersonStore {
    async fn find_by_id(&self, id: i32) -> Result<Option<Person>, StoreError> {
        Ok(self.state()?.rows.get(&id).cloned())
    }

    async fn find_by_name_pair(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Option<Person>, StoreError> {
        Ok(self
            .state()?
            .rows
            .values()
            .find(|p| p.first_name == first_name && p.last_name == last_name)
            .cloned())
    }

    async fn list_ordered_by_last_name(&self) -> Result<Vec<Person>, StoreError> {
        let mut people: Vec<Person> = self.state()?.rows.values().cloned().collect();
        // Stable sort over id-ordered rows keeps insertion order for equal last names.
        people.sort_by(|a, b| a.last_name.cmp(&b.last_name));
        Ok(people)
    }

    async fn save(&self, mut person: Person) -> Result<Person, StoreError> {
        let mut state = self.state()?;

        let conflict = state.rows.values().any(|p| {
            p.id != person.id
                && p.first_name == person.first_name
                && p.last_name == person.last_name
        });
        if conflict {
            return Err(StoreError::Duplicate {
                first_name: person.first_name,
                last_name: person.last_name,
            });
        }

        let id = match person.id {
            Some(id) if state.rows.contains_key(&id) => id,
            _ => {
                state.last_id += 1;
                state.last_id
            }
        };
        person.id = Some(id);
        state.rows.insert(id, person.clone());
        Ok(person)
    }

    async fn delete_by_id(&self, id: i32) -> Result<(), StoreError> {
        self.state()?.rows.remove(&id);
        Ok(())
    }
}

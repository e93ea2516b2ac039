use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Application Schemas (Mapped to Database) ---

/// Person
///
/// A single record from the `person` table. The `id` is assigned by the store on first
/// save and never changes afterwards; a `None` id marks a record that has not been
/// persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Person {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    pub first_name: String,
    pub last_name: String,
}

impl Person {
    /// Builds an unsaved record.
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// Same record bound to an existing id (used for updates).
    pub fn with_id(mut self, id: i32) -> Self {
        self.id = Some(id);
        self
    }
}

/// --- Request Payloads (Input Schemas) ---

/// PersonRequest
///
/// Body of `POST /person` and `PUT /person/{id}`. Both fields are optional at the
/// deserialization level so that a missing field is reported through the field->message
/// map instead of a generic JSON rejection.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PersonRequest {
    #[schema(example = "Alex")]
    pub first_name: Option<String>,
    #[schema(example = "Bell")]
    pub last_name: Option<String>,
}

/// FieldErrors
///
/// Validation failures keyed by the JSON field name. Ordered so responses are stable.
pub type FieldErrors = BTreeMap<String, String>;

const BLANK_MESSAGE: &str = "must not be blank";

impl PersonRequest {
    /// validate
    ///
    /// Runs every `(field, rule)` check and collects all failures, so a request missing
    /// both names reports both. Values are trimmed before being accepted.
    pub fn validate(self) -> Result<Person, FieldErrors> {
        let mut errors = FieldErrors::new();

        let first_name = required("firstName", self.first_name, &mut errors);
        let last_name = required("lastName", self.last_name, &mut errors);

        match (first_name, last_name) {
            (Some(first), Some(last)) if errors.is_empty() => Ok(Person::new(first, last)),
            _ => Err(errors),
        }
    }
}

fn required(field: &str, value: Option<String>, errors: &mut FieldErrors) -> Option<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Some(v),
        _ => {
            errors.insert(field.to_string(), BLANK_MESSAGE.to_string());
            None
        }
    }
}

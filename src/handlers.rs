use crate::{
    auth::{AuthUser, Role},
    error::ApiError,
    models::{Person, PersonRequest},
    service::PersonService,
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};

// --- Handlers ---
//
// Every handler resolves the caller through the `AuthUser` extractor (401 on failure)
// and checks the required role (403) before the service is touched. Bodies arrive as
// `Result<Json<_>, JsonRejection>` so a malformed body is only reported once the role
// check has passed.

/// list_people
///
/// [VIEWER] All people, ascending by last name.
#[utoipa::path(
    get,
    path = "/person",
    responses(
        (status = 200, description = "People ordered by last name", body = [Person]),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing VIEWER role")
    )
)]
pub async fn list_people(
    user: AuthUser,
    State(people): State<PersonService>,
) -> Result<Json<Vec<Person>>, ApiError> {
    user.require(Role::Viewer)?;
    Ok(Json(people.get_all().await?))
}

/// get_person
///
/// [VIEWER] A single person. A miss is a 404, not a server error.
#[utoipa::path(
    get,
    path = "/person/{id}",
    params(("id" = i32, Path, description = "Person ID")),
    responses(
        (status = 200, description = "Found", body = Person),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_person(
    user: AuthUser,
    State(people): State<PersonService>,
    Path(id): Path<i32>,
) -> Result<Json<Person>, ApiError> {
    user.require(Role::Viewer)?;
    match people.get(id).await? {
        Some(person) => Ok(Json(person)),
        None => Err(ApiError::NotFound),
    }
}

/// create_person
///
/// [EDITOR] Validates the body, then saves a new record. Any id in the body is ignored.
#[utoipa::path(
    post,
    path = "/person",
    request_body = PersonRequest,
    responses(
        (status = 201, description = "Created", body = Person),
        (status = 400, description = "Field -> message map"),
        (status = 409, description = "Name pair already exists"),
        (status = 422, description = "Body is not a person payload")
    )
)]
pub async fn create_person(
    user: AuthUser,
    State(people): State<PersonService>,
    payload: Result<Json<PersonRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Person>), ApiError> {
    user.require(Role::Editor)?;
    let Json(payload) = payload?;
    let candidate = payload.validate().map_err(ApiError::Validation)?;
    let created = people.save(candidate).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// update_person
///
/// [EDITOR] Replaces both names of the record at `{id}`. The path id wins over anything
/// in the body; keeping the current name is allowed. An unknown `{id}` inserts a new
/// record under a generated id (201, the body carries that id).
#[utoipa::path(
    put,
    path = "/person/{id}",
    params(("id" = i32, Path, description = "Person ID")),
    request_body = PersonRequest,
    responses(
        (status = 200, description = "Updated", body = Person),
        (status = 201, description = "Unknown id, created under a generated id", body = Person),
        (status = 400, description = "Field -> message map"),
        (status = 409, description = "Name pair already exists"),
        (status = 422, description = "Body is not a person payload")
    )
)]
pub async fn update_person(
    user: AuthUser,
    State(people): State<PersonService>,
    Path(id): Path<i32>,
    payload: Result<Json<PersonRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Person>), ApiError> {
    user.require(Role::Editor)?;
    let Json(payload) = payload?;
    let candidate = payload.validate().map_err(ApiError::Validation)?.with_id(id);

    let existed = people.get(id).await?.is_some();
    let saved = people.save(candidate).await?;
    let status = if existed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(saved)))
}

/// delete_person
///
/// [EDITOR] Idempotent delete: 204 whether or not the record existed.
#[utoipa::path(
    delete,
    path = "/person/{id}",
    params(("id" = i32, Path, description = "Person ID")),
    responses((status = 204, description = "Deleted"))
)]
pub async fn delete_person(
    user: AuthUser,
    State(people): State<PersonService>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    user.require(Role::Editor)?;
    people.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

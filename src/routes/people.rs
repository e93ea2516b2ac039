use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// People Router Module
///
/// | Method | Path          | Role   |
/// |--------|---------------|--------|
/// | GET    | /person       | VIEWER |
/// | GET    | /person/{id}  | VIEWER |
/// | POST   | /person       | EDITOR |
/// | PUT    | /person/{id}  | EDITOR |
/// | DELETE | /person/{id}  | EDITOR |
///
/// Role checks live in the handlers, right after the `AuthUser` extractor has resolved
/// the caller, so they run before any service call.
pub fn people_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/person",
            get(handlers::list_people).post(handlers::create_person),
        )
        .route(
            "/person/{id}",
            get(handlers::get_person)
                .put(handlers::update_person)
                .delete(handlers::delete_person),
        )
}

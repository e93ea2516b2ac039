/// Router Module Index
///
/// The route table, split by access level so the protection of each group is visible
/// where the routes are declared.

/// Routes accessible to anonymous callers (health check).
pub mod public;

/// `/person` CRUD routes. Every handler authenticates the caller and checks its role.
pub mod people;

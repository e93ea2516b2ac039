use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    str::FromStr,
    sync::Arc,
};

use crate::error::ApiError;

/// Role
///
/// Capability labels attached to an authenticated caller. `Viewer` covers the read
/// endpoints, `Editor` covers create/update/delete. An editor is also allowed to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Viewer,
    Editor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "VIEWER",
            Role::Editor => "EDITOR",
        }
    }

    /// Whether holding `self` satisfies a requirement for `required`.
    pub fn grants(self, required: Role) -> bool {
        match self {
            Role::Editor => true,
            Role::Viewer => required == Role::Viewer,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().trim_start_matches("ROLE_") {
            "VIEWER" => Ok(Role::Viewer),
            "EDITOR" => Ok(Role::Editor),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

pub type RoleSet = BTreeSet<Role>;

/// Principal
///
/// What an `Authenticator` hands back for a valid username/password pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub roles: RoleSet,
}

/// Authenticator
///
/// The identity provider seam. The application only needs "credentials in, role set
/// out"; swapping the in-memory table for a real identity store means providing another
/// implementation, not touching handlers.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str) -> Option<Principal>;
}

/// AuthenticatorState
///
/// Shared handle to the configured `Authenticator`.
pub type AuthenticatorState = Arc<dyn Authenticator>;

/// UserEntry
///
/// One configured account. `password_hash` is an argon2 PHC string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntry {
    pub username: String,
    pub password_hash: String,
    pub roles: RoleSet,
}

/// InMemoryCredentialStore
///
/// `username -> (argon2 hash, roles)` table built once at startup.
///
/// Unknown usernames are verified against `dummy_hash` so a miss costs the same argon2
/// work as a wrong password.
pub struct InMemoryCredentialStore {
    users: HashMap<String, UserEntry>,
    dummy_hash: Option<String>,
}

impl InMemoryCredentialStore {
    pub fn new(entries: impl IntoIterator<Item = UserEntry>) -> Self {
        let dummy_hash = hash_password("no-such-user")
            .map_err(|e| tracing::error!("cannot hash dummy credential: {}", e))
            .ok();
        Self {
            users: entries
                .into_iter()
                .map(|entry| (entry.username.clone(), entry))
                .collect(),
            dummy_hash,
        }
    }

    pub fn has_dummy_hash(&self) -> bool {
        self.dummy_hash.is_some()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// hash_password
///
/// Produces an argon2id PHC string with a random salt, suitable for `APP_USERS`.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::error!("stored password hash is not a valid PHC string: {}", e);
            false
        }
    }
}

#[async_trait]
impl Authenticator for InMemoryCredentialStore {
    async fn authenticate(&self, username: &str, password: &str) -> Option<Principal> {
        let Some(entry) = self.users.get(username) else {
            if let Some(dummy) = &self.dummy_hash {
                verify_password(password, dummy);
            }
            tracing::debug!(username, "unknown user");
            return None;
        };
        if !verify_password(password, &entry.password_hash) {
            tracing::debug!(username, "password mismatch");
            return None;
        }
        Some(Principal {
            username: entry.username.clone(),
            roles: entry.roles.clone(),
        })
    }
}

/// AuthUser Extractor Result
///
/// The resolved identity of an authenticated request. Handlers receive it as an
/// argument and call `require` before touching the service.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
    pub roles: RoleSet,
}

impl AuthUser {
    /// require
    ///
    /// Authorization gate. Rejects with 403 when no held role grants `role`.
    pub fn require(&self, role: Role) -> Result<(), ApiError> {
        if self.roles.iter().any(|held| held.grants(role)) {
            Ok(())
        } else {
            tracing::warn!(username = %self.username, required = %role, "authorization denied");
            Err(ApiError::Forbidden(role.as_str()))
        }
    }
}

impl From<Principal> for AuthUser {
    fn from(principal: Principal) -> Self {
        Self {
            username: principal.username,
            roles: principal.roles,
        }
    }
}

/// Splits an `Authorization: Basic <base64(user:pass)>` header value.
pub fn parse_basic_credentials(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// AuthUser Extractor Implementation
///
/// 1. Pulls the `Authorization` header and decodes HTTP Basic credentials.
/// 2. Resolves them through the `Authenticator` held in the application state.
///
/// Rejection: `ApiError::Unauthenticated` (401 + Basic challenge) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AuthenticatorState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let authenticator = AuthenticatorState::from_ref(state);

        let (username, password) = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_basic_credentials)
            .ok_or(ApiError::Unauthenticated)?;

        match authenticator.authenticate(&username, &password).await {
            Some(principal) => Ok(principal.into()),
            None => {
                tracing::info!(username = %username, "authentication failed");
                Err(ApiError::Unauthenticated)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editor_grants_viewer_but_not_the_reverse() {
        assert!(Role::Editor.grants(Role::Viewer));
        assert!(Role::Editor.grants(Role::Editor));
        assert!(Role::Viewer.grants(Role::Viewer));
        assert!(!Role::Viewer.grants(Role::Editor));
    }

    #[test]
    fn role_parsing_accepts_spring_style_prefix() {
        assert_eq!("ROLE_EDITOR".parse::<Role>(), Ok(Role::Editor));
        assert_eq!("viewer".parse::<Role>(), Ok(Role::Viewer));
        assert!("ADMIN".parse::<Role>().is_err());
    }

    #[test]
    fn basic_header_parsing() {
        // "sam:sam"
        assert_eq!(
            parse_basic_credentials("Basic c2FtOnNhbQ=="),
            Some(("sam".to_string(), "sam".to_string()))
        );
        assert_eq!(parse_basic_credentials("Bearer c2FtOnNhbQ=="), None);
        assert_eq!(parse_basic_credentials("Basic !!!"), None);
        // "nocolon"
        assert_eq!(parse_basic_credentials("Basic bm9jb2xvbg=="), None);
    }

    #[tokio::test]
    async fn credential_store_verifies_argon2_hash() {
        let store = InMemoryCredentialStore::new([UserEntry {
            username: "sam".into(),
            password_hash: hash_password("sam").unwrap(),
            roles: RoleSet::from([Role::Viewer]),
        }]);

        let principal = store.authenticate("sam", "sam").await.unwrap();
        assert_eq!(principal.roles, RoleSet::from([Role::Viewer]));
        assert!(store.authenticate("sam", "wrong").await.is_none());
        assert!(store.authenticate("nobody", "sam").await.is_none());
    }

    #[tokio::test]
    async fn unknown_user_is_checked_against_dummy_hash() {
        let store = InMemoryCredentialStore::new(Vec::<UserEntry>::new());

        assert!(store.has_dummy_hash());
        // The dummy credential's own password must not authenticate anyone.
        assert!(store.authenticate("nobody", "no-such-user").await.is_none());
        assert!(store.authenticate("", "").await.is_none());
    }
}

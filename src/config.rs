use std::env;

use crate::auth::{Role, RoleSet, UserEntry, hash_password};

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and pulled
/// into handlers through `FromRef` as part of the shared `AppState`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and which settings are mandatory.
    pub env: Env,
    // Postgres connection string. `None` selects the in-memory store (local only).
    pub db_url: Option<String>,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Accounts accepted by HTTP Basic authentication.
    pub users: Vec<UserEntry>,
}

/// Env
///
/// Runtime context: `Local` allows fallbacks (in-memory store, demo accounts),
/// `Production` requires every setting explicitly.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

impl Default for AppConfig {
    /// default
    ///
    /// Safe, non-panicking configuration for tests: local mode, in-memory store and the
    /// demo accounts.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            users: demo_users(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads all parameters from environment variables and implements the **fail-fast**
    /// principle.
    ///
    /// # Panics
    /// Panics if a variable required for the current environment is missing, or if
    /// `APP_USERS` cannot be parsed. The service must not start half-configured.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        let users = match env::var("APP_USERS") {
            Ok(spec) => parse_users(&spec)
                .unwrap_or_else(|e| panic!("FATAL: APP_USERS is invalid: {}", e)),
            Err(_) if env == Env::Local => demo_users(),
            Err(_) => panic!("FATAL: APP_USERS must be set in production."),
        };

        match env {
            Env::Local => Self {
                env: Env::Local,
                db_url: env::var("DATABASE_URL").ok(),
                bind_addr,
                users,
            },
            Env::Production => Self {
                env: Env::Production,
                db_url: Some(
                    env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod"),
                ),
                bind_addr,
                users,
            },
        }
    }
}

/// parse_users
///
/// Parses `user:phc-hash:ROLE+ROLE` entries separated by `;`. Argon2 PHC strings never
/// contain `:` or `;`, so the separators are unambiguous.
pub fn parse_users(spec: &str) -> Result<Vec<UserEntry>, String> {
    spec.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let parts: Vec<&str> = entry.split(':').collect();
            let [username, password_hash, roles] = parts.as_slice() else {
                return Err(format!(
                    "expected 'user:hash:ROLES', got {} field(s)",
                    parts.len()
                ));
            };
            if username.is_empty() {
                return Err("empty username".to_string());
            }
            let roles = roles
                .split('+')
                .map(str::parse::<Role>)
                .collect::<Result<RoleSet, _>>()?;
            Ok(UserEntry {
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                roles,
            })
        })
        .collect()
}

/// Demo accounts for local runs: password equals the username.
fn demo_users() -> Vec<UserEntry> {
    [
        ("sam", vec![Role::Viewer]),
        ("carlos", vec![Role::Viewer, Role::Editor]),
        ("john", vec![Role::Viewer, Role::Editor]),
    ]
    .into_iter()
    .filter_map(|(name, roles)| match hash_password(name) {
        Ok(password_hash) => Some(UserEntry {
            username: name.to_string(),
            password_hash,
            roles: roles.into_iter().collect(),
        }),
        Err(e) => {
            tracing::error!("failed to hash demo password for {}: {}", name, e);
            None
        }
    })
    .collect()
}

//!
//! rbadmin credential store
//! ------------------------
//! File-backed store for user records. Records live in a single `users.json`
//! under the configured data root and are rewritten wholesale on every
//! mutation; callers serialize access through `SharedStore`, so each
//! read-modify-write cycle is atomic with respect to other requests.
//!
//! Key responsibilities:
//! - Case-insensitive email uniqueness on insert and update.
//! - Role is always one of the three enumerated values after a write.
//! - Secret hashes are persisted but never leave the store on read paths,
//!   which return `UserSummary`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, AppResult};

/// Flat access roles. No hierarchy: gates compare for exact equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Manager,
    User,
}

impl Role {
    /// Case-insensitive parse; anything unrecognized is None.
    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Some(Role::Admin),
            "MANAGER" => Some(Role::Manager),
            "USER" => Some(Role::User),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::User => "USER",
        }
    }
}

impl Default for Role {
    fn default() -> Self { Role::User }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted user record. `email` is stored lowercased.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(email: &str, name: &str, role: Role, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.trim().to_lowercase(),
            name: name.trim().to_string(),
            role,
            password_hash,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// The shape all read paths return; the secret hash never leaves the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Core file-backed store handle rooted at a data directory.
#[derive(Clone)]
pub struct UserStore {
    root: PathBuf,
}

impl UserStore {
    /// Create a store rooted at the given path. The directory is created if
    /// it does not already exist.
    pub fn new<P: AsRef<Path>>(root: P) -> AppResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path { &self.root }

    fn users_path(&self) -> PathBuf { self.root.join("users.json") }

    fn read_all(&self) -> AppResult<Vec<UserRecord>> {
        let p = self.users_path();
        if !p.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&p)?;
        let users: Vec<UserRecord> = serde_json::from_str(&text)?;
        Ok(users)
    }

    fn write_all(&self, users: &[UserRecord]) -> AppResult<()> {
        let text = serde_json::to_string_pretty(users)?;
        fs::write(self.users_path(), text)?;
        Ok(())
    }

    /// All user summaries, newest first by creation time.
    pub fn list(&self) -> AppResult<Vec<UserSummary>> {
        let mut users = self.read_all()?;
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users.iter().map(UserRecord::summary).collect())
    }

    pub fn count(&self) -> AppResult<usize> {
        Ok(self.read_all()?.len())
    }

    pub fn find_by_id(&self, id: &str) -> AppResult<Option<UserRecord>> {
        Ok(self.read_all()?.into_iter().find(|u| u.id == id))
    }

    /// Case-insensitive lookup by the natural login key.
    pub fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        let needle = email.trim().to_lowercase();
        Ok(self.read_all()?.into_iter().find(|u| u.email == needle))
    }

    /// Insert a new record, enforcing case-insensitive email uniqueness.
    pub fn insert(&self, record: UserRecord) -> AppResult<UserRecord> {
        let mut users = self.read_all()?;
        if users.iter().any(|u| u.email == record.email) {
            return Err(AppError::conflict("conflict", "User already exists"));
        }
        debug!(email = %record.email, role = %record.role, "store.insert");
        users.push(record.clone());
        self.write_all(&users)?;
        Ok(record)
    }

    /// Replace the record with the same id. The caller mutates a copy
    /// obtained from `find_by_id`; email uniqueness is re-checked against
    /// every other record.
    pub fn update(&self, record: UserRecord) -> AppResult<UserRecord> {
        let mut users = self.read_all()?;
        if users.iter().any(|u| u.id != record.id && u.email == record.email) {
            return Err(AppError::conflict("conflict", "Email already in use"));
        }
        let Some(slot) = users.iter_mut().find(|u| u.id == record.id) else {
            return Err(AppError::not_found("not_found", "User not found"));
        };
        let mut record = record;
        record.updated_at = Utc::now();
        *slot = record.clone();
        self.write_all(&users)?;
        Ok(record)
    }

    /// Remove the record irreversibly.
    pub fn delete(&self, id: &str) -> AppResult<()> {
        let mut users = self.read_all()?;
        let before = users.len();
        users.retain(|u| u.id != id);
        if users.len() == before {
            return Err(AppError::not_found("not_found", "User not found"));
        }
        self.write_all(&users)?;
        Ok(())
    }
}

/// Thread-safe handle shared by every request handler.
#[derive(Clone)]
pub struct SharedStore(pub Arc<Mutex<UserStore>>);

impl SharedStore {
    pub fn new<P: AsRef<Path>>(root: P) -> AppResult<Self> {
        Ok(Self(Arc::new(Mutex::new(UserStore::new(root)?))))
    }

    pub fn root_path(&self) -> PathBuf {
        self.0.lock().root().to_path_buf()
    }
}

/// Seed a bootstrap admin account on first startup with an empty store so the
/// panel is reachable (admin@example.com / admin123, matching the seed data
/// the dashboards are provisioned with).
pub fn ensure_default_admin(store: &SharedStore) -> AppResult<()> {
    let guard = store.0.lock();
    if guard.count()? > 0 {
        return Ok(());
    }
    let hash = crate::identity::hash_password("admin123")?;
    let admin = UserRecord::new("admin@example.com", "Administrator", Role::Admin, hash);
    tracing::info!(email = %admin.email, "seeding default admin account");
    guard.insert(admin)?;
    Ok(())
}

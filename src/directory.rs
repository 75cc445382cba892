//! User directory operations: the CRUD surface over the credential store.
//!
//! Every operation here is invoked from an ADMIN-gated handler; the guard has
//! already run, so these functions receive verified claims where the acting
//! identity matters (self-delete prevention). Validation and conflict checks
//! run before any mutating store call.

use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::identity::{hash_password_blocking, Claims};
use crate::store::{Role, SharedStore, UserRecord, UserSummary};

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub password: Option<String>,
}

/// All users, newest first, eagerly materialized and free of secret hashes.
pub fn list(store: &SharedStore) -> AppResult<Vec<UserSummary>> {
    store.0.lock().list()
}

/// Create a user. Fails on missing fields, invalid role, or a
/// case-insensitive email collision.
pub async fn create(store: &SharedStore, input: NewUser) -> AppResult<UserSummary> {
    if input.email.trim().is_empty()
        || input.password.is_empty()
        || input.name.trim().is_empty()
        || input.role.trim().is_empty()
    {
        return Err(AppError::validation("missing_fields", "All fields are required"));
    }
    let Some(role) = Role::parse(&input.role) else {
        return Err(AppError::validation("invalid_role", "Role must be ADMIN, MANAGER or USER"));
    };

    if store.0.lock().find_by_email(&input.email)?.is_some() {
        return Err(AppError::conflict("conflict", "User already exists"));
    }

    let hash = hash_password_blocking(&input.password).await?;
    let record = UserRecord::new(&input.email, &input.name, role, hash);
    let created = store.0.lock().insert(record)?;
    Ok(created.summary())
}

/// Partial update: absent fields are untouched. An email change that
/// collides with a different record is a conflict; a blank password is
/// ignored, a non-blank one is re-hashed.
pub async fn update(store: &SharedStore, id: &str, input: UserUpdate) -> AppResult<UserSummary> {
    let existing = { store.0.lock().find_by_id(id)? };
    let Some(mut record) = existing else {
        return Err(AppError::not_found("not_found", "User not found"));
    };

    if let Some(email) = input.email.as_deref() {
        let new_email = email.trim().to_lowercase();
        if !new_email.is_empty() && new_email != record.email {
            let collision = { store.0.lock().find_by_email(&new_email)? };
            if collision.map(|u| u.id != record.id).unwrap_or(false) {
                return Err(AppError::conflict("conflict", "Email already in use"));
            }
            record.email = new_email;
        }
    }
    if let Some(name) = input.name.as_deref() {
        if !name.trim().is_empty() {
            record.name = name.trim().to_string();
        }
    }
    if let Some(role) = input.role.as_deref() {
        let Some(parsed) = Role::parse(role) else {
            return Err(AppError::validation("invalid_role", "Role must be ADMIN, MANAGER or USER"));
        };
        record.role = parsed;
    }
    if let Some(password) = input.password.as_deref() {
        if !password.trim().is_empty() {
            record.password_hash = hash_password_blocking(password).await?;
        }
    }

    let updated = store.0.lock().update(record)?;
    Ok(updated.summary())
}

/// Irreversible removal. A caller may never delete their own record,
/// regardless of role.
pub fn delete(store: &SharedStore, id: &str, acting: &Claims) -> AppResult<UserSummary> {
    let existing = { store.0.lock().find_by_id(id)? };
    let Some(record) = existing else {
        return Err(AppError::not_found("not_found", "User not found"));
    };
    if acting.sub == id {
        return Err(AppError::validation("cannot_delete_self", "Cannot delete your own account"));
    }
    store.0.lock().delete(id)?;
    Ok(record.summary())
}

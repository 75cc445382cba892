//!
//! rbadmin HTTP server
//! -------------------
//! This module defines the Axum-based HTTP API of the admin panel core.
//!
//! Responsibilities:
//! - Login/logout/me endpoints backed by the credential store and token service.
//! - The ADMIN-gated user directory (list/create/update/delete).
//! - The ADMIN-gated bulk CSV import endpoint (multipart field `file`).
//! - Settings document and audit log endpoints.
//! - Startup bootstrap: default admin seeding and route registration.

use std::net::SocketAddr;

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::config::AppConfig;
use crate::directory::{self, NewUser, UserUpdate};
use crate::error::{AppError, AppResult};
use crate::identity::{self, authorize, Claims, TokenService, AUTH_COOKIE};
use crate::import;
use crate::store::{ensure_default_admin, Role, SharedStore};
use crate::system::{record_activity, SystemSettings, SystemStore};

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub system: SystemStore,
    pub tokens: TokenService,
    pub token_ttl_hours: i64,
}

impl AppState {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        Ok(Self {
            store: SharedStore::new(&config.data_root)?,
            system: SystemStore::new(&config.data_root)?,
            tokens: TokenService::new(config.token_secret.clone(), config.token_ttl_hours),
            token_ttl_hours: config.token_ttl_hours,
        })
    }
}

/// Build the full route table over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "rbadmin ok" }))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/users", get(list_users).post(create_user))
        .route("/users/import", post(import_users))
        .route("/users/{id}", put(update_user).delete(delete_user))
        .route("/settings", get(get_settings).post(update_settings))
        .route("/settings/logs", get(get_logs).post(create_log).delete(clear_logs))
        .with_state(state)
}

/// Start the HTTP server: seed the bootstrap admin, mount routes, serve.
pub async fn run_with_config(config: AppConfig) -> anyhow::Result<()> {
    let state = AppState::new(&config).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    ensure_default_admin(&state.store).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let user_count = state.store.0.lock().count().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    info!(
        target: "startup",
        "rbadmin starting: data_root='{}', users={}, token_ttl_hours={}",
        config.data_root, user_count, config.token_ttl_hours
    );

    let app = router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn set_auth_cookie(token: &str, ttl_hours: i64) -> HeaderValue {
    // Deliberately no HttpOnly: the dashboard script reads the token.
    let max_age = ttl_hours.max(0) * 3600;
    HeaderValue::from_str(&format!(
        "{}={}; Max-Age={}; Path=/; SameSite=Lax",
        AUTH_COOKIE, token, max_age
    ))
    .unwrap_or_else(|_| HeaderValue::from_static(""))
}

fn clear_auth_cookie() -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0; Path=/; SameSite=Lax",
        AUTH_COOKIE
    ))
    .unwrap_or_else(|_| HeaderValue::from_static(""))
}

fn claims_json(claims: &Claims) -> serde_json::Value {
    json!({
        "id": claims.sub,
        "email": claims.email,
        "name": claims.name,
        "role": claims.role,
    })
}

// ---------------- auth ----------------

#[derive(Debug, Deserialize)]
struct LoginPayload {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<(HeaderMap, Json<serde_json::Value>), AppError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AppError::validation("missing_fields", "Email and password required"));
    }

    let user = { state.store.0.lock().find_by_email(&payload.email)? };
    let Some(user) = user else {
        return Err(AppError::auth("invalid_credentials", "Invalid credentials"));
    };
    if !identity::verify_password_blocking(&user.password_hash, &payload.password).await {
        return Err(AppError::auth("invalid_credentials", "Invalid credentials"));
    }

    let token = state.tokens.issue(&user)?;
    info!(email = %user.email, role = %user.role, "auth.login");

    let mut headers = HeaderMap::new();
    headers.insert("Set-Cookie", set_auth_cookie(&token, state.token_ttl_hours));
    let body = json!({
        "message": "Login successful",
        "user": user.summary(),
        "token": token,
    });
    Ok((headers, Json(body)))
}

async fn logout() -> (HeaderMap, Json<serde_json::Value>) {
    let mut headers = HeaderMap::new();
    headers.insert("Set-Cookie", clear_auth_cookie());
    (headers, Json(json!({ "message": "Logout successful" })))
}

/// Identity probe. Token optional: absent or invalid yields a null identity,
/// never an error status.
async fn me(State(state): State<AppState>, headers: HeaderMap) -> Json<serde_json::Value> {
    let user = identity::parse_cookie(&headers, AUTH_COOKIE)
        .and_then(|token| state.tokens.verify(&token))
        .map(|claims| claims_json(&claims));
    Json(json!({ "user": user }))
}

// ---------------- user directory ----------------

async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    authorize(&headers, Role::Admin, &state.tokens)?;
    let users = directory::list(&state.store)?;
    let count = users.len();
    Ok(Json(json!({ "success": true, "users": users, "count": count })))
}

async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<NewUser>,
) -> Result<Json<serde_json::Value>, AppError> {
    let claims = authorize(&headers, Role::Admin, &state.tokens)?;
    let created = directory::create(&state.store, payload).await?;

    info!(email = %created.email, role = %created.role, by = %claims.email, "user.create");
    record_activity(
        &state.system,
        "user.create",
        &format!("created {} as {}", created.email, created.role),
        &claims.sub,
        &claims.name,
    );
    Ok(Json(json!({
        "success": true,
        "message": "User created successfully",
        "user": created,
    })))
}

async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<UserUpdate>,
) -> Result<Json<serde_json::Value>, AppError> {
    let claims = authorize(&headers, Role::Admin, &state.tokens)?;
    let updated = directory::update(&state.store, &id, payload).await?;

    info!(email = %updated.email, by = %claims.email, "user.update");
    record_activity(
        &state.system,
        "user.update",
        &format!("updated {}", updated.email),
        &claims.sub,
        &claims.name,
    );
    Ok(Json(json!({
        "success": true,
        "message": "User updated",
        "user": updated,
    })))
}

async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let claims = authorize(&headers, Role::Admin, &state.tokens)?;
    let removed = directory::delete(&state.store, &id, &claims)?;

    info!(email = %removed.email, by = %claims.email, "user.delete");
    record_activity(
        &state.system,
        "user.delete",
        &format!("deleted {}", removed.email),
        &claims.sub,
        &claims.name,
    );
    Ok(Json(json!({ "success": true, "message": "User deleted" })))
}

// ---------------- bulk import ----------------

async fn import_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    let claims = authorize(&headers, Role::Admin, &state.tokens)?;

    let mut text: Option<String> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_input("bad_multipart", e.to_string()))?
    {
        if field.name() == Some("file") {
            let content = field
                .text()
                .await
                .map_err(|e| AppError::bad_input("bad_multipart", e.to_string()))?;
            text = Some(content);
            break;
        }
    }
    let Some(text) = text else {
        return Err(AppError::validation("missing_file", "No file provided"));
    };

    let report = import::import_users(&state.store, &text).await?;
    info!(
        by = %claims.email,
        created = report.created.len(),
        updated = report.updated.len(),
        errors = report.errors.len(),
        "users.import"
    );
    record_activity(
        &state.system,
        "users.import",
        &format!(
            "imported {} rows: {} created, {} updated, {} errors",
            report.total_processed,
            report.created.len(),
            report.updated.len(),
            report.errors.len()
        ),
        &claims.sub,
        &claims.name,
    );

    let message = format!(
        "Import completed! {} created, {} updated, {} errors",
        report.created.len(),
        report.updated.len(),
        report.errors.len()
    );
    Ok(Json(json!({
        "success": true,
        "message": message,
        "summary": {
            "totalProcessed": report.total_processed,
            "created": report.created.len(),
            "updated": report.updated.len(),
            "errors": report.errors.len(),
        },
        "created": report.created,
        "updated": report.updated,
        "errors": report.errors,
    })))
}

// ---------------- settings & audit ----------------

async fn get_settings(State(state): State<AppState>) -> Result<Json<SystemSettings>, AppError> {
    Ok(Json(state.system.load_or_default()?))
}

async fn update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(settings): Json<SystemSettings>,
) -> Result<Json<serde_json::Value>, AppError> {
    let claims = authorize(&headers, Role::Admin, &state.tokens)?;
    state.system.save(&settings)?;
    info!(by = %claims.email, site = %settings.site_name, "settings.update");
    Ok(Json(json!({
        "success": true,
        "message": "Settings updated",
        "settings": settings,
    })))
}

async fn get_logs(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let logs = state.system.recent_audit(50)?;
    Ok(Json(json!(logs)))
}

#[derive(Debug, Deserialize)]
struct CreateLogPayload {
    #[serde(default)]
    action: String,
    #[serde(default)]
    details: String,
    #[serde(default, rename = "userId")]
    user_id: String,
    #[serde(default, rename = "userName")]
    user_name: String,
}

async fn create_log(
    State(state): State<AppState>,
    Json(payload): Json<CreateLogPayload>,
) -> Result<Json<serde_json::Value>, AppError> {
    record_activity(&state.system, &payload.action, &payload.details, &payload.user_id, &payload.user_name);
    Ok(Json(json!({ "success": true })))
}

async fn clear_logs(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let claims = authorize(&headers, Role::Admin, &state.tokens)?;
    state.system.clear_audit()?;
    info!(by = %claims.email, "audit.clear");
    Ok(Json(json!({ "success": true, "message": "All logs cleared" })))
}

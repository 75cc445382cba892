//! System settings and the audit log.
//!
//! Both are shallow keyed persistence under the data root: settings as a
//! single JSON document, the audit trail as an append-only JSONL file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppResult;
use crate::store::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemSettings {
    pub site_name: String,
    pub maintenance_mode: bool,
    pub user_registration: bool,
    pub default_user_role: Role,
    /// Session timeout in hours; informational for the dashboard, the token
    /// TTL itself is server configuration.
    pub session_timeout: i64,
    pub email_notifications: bool,
    pub audit_logging: bool,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            site_name: "RBAC System".to_string(),
            maintenance_mode: false,
            user_registration: true,
            default_user_role: Role::User,
            session_timeout: 24,
            email_notifications: true,
            audit_logging: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub action: String,
    pub details: String,
    pub user_id: String,
    pub user_name: String,
    pub created_at: DateTime<Utc>,
}

/// Handle over the settings document and audit file for one data root.
#[derive(Clone)]
pub struct SystemStore {
    root: PathBuf,
}

impl SystemStore {
    pub fn new<P: AsRef<Path>>(root: P) -> AppResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn settings_path(&self) -> PathBuf { self.root.join("settings.json") }
    fn audit_path(&self) -> PathBuf { self.root.join("audit.jsonl") }

    /// Current settings; defaults are created and persisted on first read.
    pub fn load_or_default(&self) -> AppResult<SystemSettings> {
        let p = self.settings_path();
        if p.exists() {
            let text = fs::read_to_string(&p)?;
            Ok(serde_json::from_str(&text)?)
        } else {
            let defaults = SystemSettings::default();
            self.save(&defaults)?;
            Ok(defaults)
        }
    }

    pub fn save(&self, settings: &SystemSettings) -> AppResult<()> {
        let text = serde_json::to_string_pretty(settings)?;
        fs::write(self.settings_path(), text)?;
        debug!(site = %settings.site_name, "settings.save");
        Ok(())
    }

    /// Append one audit entry. The file is append-only; entries are never
    /// rewritten in place.
    pub fn append_audit(&self, entry: &AuditEntry) -> AppResult<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut f = fs::OpenOptions::new().create(true).append(true).open(self.audit_path())?;
        f.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Most recent entries, newest first.
    pub fn recent_audit(&self, limit: usize) -> AppResult<Vec<AuditEntry>> {
        let p = self.audit_path();
        if !p.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&p)?;
        let mut entries: Vec<AuditEntry> = text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect();
        entries.reverse();
        entries.truncate(limit);
        Ok(entries)
    }

    pub fn clear_audit(&self) -> AppResult<()> {
        let p = self.audit_path();
        if p.exists() {
            fs::remove_file(&p)?;
        }
        Ok(())
    }
}

/// Record an activity entry attributed to the acting user, honoring the
/// audit_logging settings flag. Best-effort: failures are logged, not raised.
pub fn record_activity(store: &SystemStore, action: &str, details: &str, user_id: &str, user_name: &str) {
    let enabled = store.load_or_default().map(|s| s.audit_logging).unwrap_or(true);
    if !enabled {
        return;
    }
    let entry = AuditEntry {
        id: uuid::Uuid::new_v4().to_string(),
        action: action.to_string(),
        details: details.to_string(),
        user_id: user_id.to_string(),
        user_name: user_name.to_string(),
        created_at: Utc::now(),
    };
    if let Err(e) = store.append_audit(&entry) {
        tracing::warn!(action, error = %e, "failed to append audit entry");
    }
}

//!
//! rbadmin bulk import engine
//! --------------------------
//! Tolerant CSV parsing plus reconciliation against the credential store.
//!
//! The parser accepts heterogeneous export formats: column roles are resolved
//! by substring matching over a priority-ordered pattern table instead of
//! exact header names, and values are split with a simple quote toggle so
//! embedded commas survive. Reconciliation is a fold over rows where each row
//! is independently fallible; one bad row never aborts the batch.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::identity::hash_password_blocking;
use crate::store::{Role, SharedStore, UserRecord};

/// Password prefixes that mark a synthetic/placeholder secret. A placeholder
/// arriving for an existing user must never overwrite a real hash.
const PLACEHOLDER_PREFIXES: [&str; 2] = ["TempPass", "ImportedPass"];

/// Logical columns the importer can map, with the header substrings that
/// resolve each one. Order matters: the first header matching any pattern
/// wins for that column.
const COLUMN_PATTERNS: [(ImportColumn, &[&str]); 4] = [
    (ImportColumn::Name, &["name", "fullname", "username"]),
    (ImportColumn::Email, &["email", "mail"]),
    (ImportColumn::Role, &["role", "type", "permission"]),
    (ImportColumn::Password, &["password", "pass", "pwd"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImportColumn {
    Name,
    Email,
    Role,
    Password,
}

/// Resolved header indices; None means the column is absent for every row.
#[derive(Debug, Default, Clone, Copy)]
struct ColumnMap {
    name: Option<usize>,
    email: Option<usize>,
    role: Option<usize>,
    password: Option<usize>,
}

/// A normalized data row ready for reconciliation. Not persisted in raw form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportedUser {
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportRowError {
    pub email: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ImportReport {
    pub created: Vec<ImportedUser>,
    pub updated: Vec<ImportedUser>,
    pub errors: Vec<ImportRowError>,
    #[serde(rename = "totalProcessed")]
    pub total_processed: usize,
}

fn strip_quotes(s: &str) -> String {
    s.replace('"', "")
}

/// Resolve each logical column to the first header containing any of its
/// patterns, scanning headers in their original order.
fn resolve_columns(headers: &[String]) -> ColumnMap {
    let mut map = ColumnMap::default();
    for (column, patterns) in COLUMN_PATTERNS {
        let idx = headers
            .iter()
            .position(|h| patterns.iter().any(|p| h.contains(p)));
        match column {
            ImportColumn::Name => map.name = idx,
            ImportColumn::Email => map.email = idx,
            ImportColumn::Role => map.role = idx,
            ImportColumn::Password => map.password = idx,
        }
    }
    map
}

/// Split one CSV line on commas with a double-quote toggle: inside a quoted
/// run, commas are literal. Consecutive `""` is not specially unescaped.
fn split_quoted(line: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in line.chars() {
        if ch == '"' {
            in_quotes = !in_quotes;
        } else if ch == ',' && !in_quotes {
            values.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(ch);
        }
    }
    values.push(current.trim().to_string());
    values
}

/// Fallback secret for rows without a password: the recognizable
/// `ImportedPass` prefix (see PLACEHOLDER_PREFIXES, which keeps re-imports
/// from clobbering real secrets) plus a random suffix so two rows never
/// share a placeholder. Placeholders are rotated at first login.
fn synthetic_password() -> String {
    let mut bytes = [0u8; 6];
    // Zeroes on RNG failure still yield a valid, recognizable placeholder.
    let _ = getrandom::getrandom(&mut bytes);
    let suffix: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("ImportedPass{}", suffix)
}

/// Stage 1 + 2: parse the raw text into normalized rows.
///
/// The first non-blank line is the header row. A data row is skipped (not an
/// error) when its email or name is empty after normalization.
pub fn parse_csv(text: &str) -> Vec<ImportRow> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let Some((header_line, data_lines)) = lines.split_first() else {
        return Vec::new();
    };

    let headers: Vec<String> = header_line
        .split(',')
        .map(|h| strip_quotes(h.trim()).to_lowercase())
        .collect();
    let columns = resolve_columns(&headers);
    debug!(?headers, ?columns, "import.headers");

    let mut rows = Vec::new();
    for (i, line) in data_lines.iter().enumerate() {
        let values = split_quoted(line);
        let pick = |idx: Option<usize>| -> String {
            idx.and_then(|j| values.get(j))
                .map(|v| strip_quotes(v).trim().to_string())
                .unwrap_or_default()
        };

        let name = pick(columns.name);
        let email = pick(columns.email).to_lowercase();
        let role = Role::parse(&pick(columns.role)).unwrap_or_default();
        let mut password = pick(columns.password);
        if password.is_empty() {
            password = synthetic_password();
        }

        if email.is_empty() || name.is_empty() {
            warn!(row = i + 1, "skipping import row: missing email or name");
            continue;
        }
        rows.push(ImportRow { name, email, role, password });
    }
    rows
}

fn is_placeholder(password: &str) -> bool {
    PLACEHOLDER_PREFIXES.iter().any(|p| password.starts_with(p))
}

/// Stage 3: create-or-update merge of parsed rows against the store.
///
/// Rows are processed in file order; each row's failure is recorded and the
/// fold continues. The store lock is never held across a hashing await.
pub async fn reconcile(store: &SharedStore, rows: Vec<ImportRow>) -> ImportReport {
    let mut report = ImportReport { total_processed: rows.len(), ..Default::default() };

    for row in rows {
        let outcome = reconcile_row(store, &row).await;
        match outcome {
            Ok(RowOutcome::Updated) => {
                debug!(email = %row.email, role = %row.role, "import.updated");
                report.updated.push(ImportedUser { email: row.email, role: row.role });
            }
            Ok(RowOutcome::Created) => {
                debug!(email = %row.email, role = %row.role, "import.created");
                report.created.push(ImportedUser { email: row.email, role: row.role });
            }
            Err(e) => {
                warn!(email = %row.email, error = %e, "import row failed");
                report.errors.push(ImportRowError { email: row.email, error: e.message().to_string() });
            }
        }
    }
    report
}

enum RowOutcome {
    Created,
    Updated,
}

async fn reconcile_row(store: &SharedStore, row: &ImportRow) -> AppResult<RowOutcome> {
    let existing = { store.0.lock().find_by_email(&row.email)? };
    match existing {
        Some(mut record) => {
            record.name = row.name.clone();
            record.role = row.role;
            // A real secret set by the user wins over a re-imported placeholder.
            if !is_placeholder(&row.password) {
                record.password_hash = hash_password_blocking(&row.password).await?;
            }
            store.0.lock().update(record)?;
            Ok(RowOutcome::Updated)
        }
        None => {
            let hash = hash_password_blocking(&row.password).await?;
            let record = UserRecord::new(&row.email, &row.name, row.role, hash);
            store.0.lock().insert(record)?;
            Ok(RowOutcome::Created)
        }
    }
}

/// Full import: parse, then reconcile. Fails only when zero rows parse;
/// otherwise always returns a report, even if every row individually errored.
pub async fn import_users(store: &SharedStore, text: &str) -> AppResult<ImportReport> {
    let rows = parse_csv(text);
    if rows.is_empty() {
        return Err(AppError::bad_input(
            "no_valid_rows",
            "No valid users found in file. Please check CSV format.",
        ));
    }
    debug!(rows = rows.len(), "import.parsed");
    Ok(reconcile(store, rows).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_resolve_by_substring_in_header_order() {
        let headers: Vec<String> = ["full name", "email address", "user role", "temp password"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let map = resolve_columns(&headers);
        assert_eq!(map.name, Some(0));
        assert_eq!(map.email, Some(1));
        assert_eq!(map.role, Some(2));
        assert_eq!(map.password, Some(3));
    }

    #[test]
    fn first_matching_header_wins() {
        // "username" matches the name patterns before "fullname" does.
        let headers: Vec<String> = ["username", "fullname", "mail"].iter().map(|s| s.to_string()).collect();
        let map = resolve_columns(&headers);
        assert_eq!(map.name, Some(0));
        assert_eq!(map.email, Some(2));
        assert_eq!(map.role, None);
        assert_eq!(map.password, None);
    }

    #[test]
    fn quoted_fields_keep_embedded_commas() {
        let values = split_quoted(r#""Doe, Jane",jane@x.com,ADMIN"#);
        assert_eq!(values, vec!["Doe, Jane", "jane@x.com", "ADMIN"]);
    }

    #[test]
    fn rows_missing_email_or_name_are_skipped() {
        let rows = parse_csv("name,email,role\nAlice,alice@x.com,ADMIN\nBob,,USER\n,carol@x.com,USER\n");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Alice");
        assert_eq!(rows[0].email, "alice@x.com");
        assert_eq!(rows[0].role, Role::Admin);
    }

    #[test]
    fn invalid_role_defaults_to_user_and_email_is_lowercased() {
        let rows = parse_csv("name,email,role\nDave,DAVE@X.COM,OVERLORD\n");
        assert_eq!(rows[0].email, "dave@x.com");
        assert_eq!(rows[0].role, Role::User);
    }

    #[test]
    fn missing_password_gets_synthetic_placeholder() {
        let rows = parse_csv("name,email\nEve,eve@x.com\n");
        assert!(rows[0].password.starts_with("ImportedPass"));
        assert_eq!(rows[0].password.len(), "ImportedPass".len() + 12);
        assert!(is_placeholder(&rows[0].password));

        // Distinct rows get distinct placeholders.
        let more = parse_csv("name,email\nA,a@x.com\nB,b@x.com\n");
        assert_ne!(more[0].password, more[1].password);
    }

    #[test]
    fn blank_lines_are_dropped() {
        let rows = parse_csv("\n\nname,email\n\nFay,fay@x.com\n\n");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].email, "fay@x.com");
    }

    #[test]
    fn placeholder_detection_covers_both_prefixes() {
        assert!(is_placeholder("TempPass123"));
        assert!(is_placeholder("ImportedPass994201"));
        assert!(!is_placeholder("hunter2"));
        assert!(!is_placeholder("xTempPass"));
    }
}

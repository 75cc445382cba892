//! rbadmin: the authentication/authorization core of an RBAC admin panel.
//!
//! Signed session tokens, a role-gated user directory API, a tolerant CSV
//! bulk import engine, and flat settings/audit persistence, served over HTTP.

pub mod config;
pub mod directory;
pub mod error;
pub mod identity;
pub mod import;
pub mod server;
pub mod store;
pub mod system;

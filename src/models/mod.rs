//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! plus the request and response bodies built from them.

/// Admin users and sessions
pub mod admin_user;
/// Append-only audit trail
pub mod audit_log;
/// Devices bound to licenses
pub mod device;
/// License keys and their status rules
pub mod license;

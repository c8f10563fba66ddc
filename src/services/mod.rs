//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They handle database transactions, validation, and state transitions.

pub mod activation_service;
pub mod admin_service;
pub mod audit_service;
pub mod license_service;
pub mod notification_service;
pub mod token_service;

//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, headers, URL params)
//! 2. Delegates to a service
//! 3. Returns HTTP response (JSON, status code)

/// Admin session, license and device management endpoints
pub mod admin;
/// Service health probe
pub mod health;
/// Device activation and validation endpoints
pub mod licensing;

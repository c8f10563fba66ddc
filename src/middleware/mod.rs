//! HTTP middleware components.
//!
//! Middleware are functions that run before route handlers.
//! They authenticate requests and short-circuit unauthorized ones.

/// Device token and admin session authentication
pub mod auth;

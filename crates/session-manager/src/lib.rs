//! Session management for the request orchestrator.
//!
//! A session binds a user+channel to its currently active agent across
//! multiple requests. This crate owns the find-or-create lifecycle, partial
//! session updates, the advisory ingress rate limiter, and the best-effort
//! cache of agent-runtime conversation handles.

pub mod manager;
pub mod rate_limiter;
pub mod runtime_cache;

pub use manager::{SessionManager, SessionUpdate};
pub use rate_limiter::IngressRateLimiter;
pub use runtime_cache::RuntimeSessionCache;

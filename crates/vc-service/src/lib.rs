//! Videocall Controller (VC) Service Library
//!
//! Core functionality for the Crema Videocall Controller, the
//! orchestration layer for real-time mentoring meeting sessions:
//!
//! - Session lifecycle (resolve-or-create, end, status)
//! - Participant presence tracking and the quick-join/reconnect protocol
//! - Idempotent chat transcript archival (optimistic versioning)
//! - Deduplicated shared-file registry
//!
//! # Architecture
//!
//! The VC follows the Handler -> Service -> Repository pattern:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> repositories/*.rs
//! ```
//!
//! Stores and the RTC provider client are trait seams, so services run
//! identically against Postgres + the real provider and against the
//! in-memory/mock implementations used by tests.
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `models` - Data models and tagged lifecycle states
//! - `observability` - Prometheus metrics
//! - `repositories` - Store traits and Postgres implementations
//! - `routes` - Axum router setup
//! - `services` - Orchestration, transcript, files, RTC client

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;

//! # VC Test Utilities
//!
//! Shared test utilities for the Videocall Controller (VC) service.
//!
//! This crate provides:
//! - In-memory store implementations (`Memory*Store`) that enforce the
//!   same uniqueness semantics as the Postgres schema, so services can
//!   be exercised without real infrastructure
//! - Pre-wired fixtures (`TestContext`) bundling stores, a mock RTC
//!   client and the three services
//! - Server test harness (`TestVcServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vc_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestVcServer::spawn().await?;
//!     let client = reqwest::Client::new();
//!
//!     let response = client
//!         .get(format!("{}/v1/health", server.url()))
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod memory_stores;
pub mod server_harness;

// Re-export commonly used items
pub use fixtures::*;
pub use memory_stores::*;
pub use server_harness::*;

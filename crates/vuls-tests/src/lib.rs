//! End-to-end tests for the vulnerability dictionary server
//!
//! This crate contains tests that exercise the full stack in-process:
//! - Settings merge and descriptor resolution
//! - Backend probing and the client factory
//! - The HTTP listener and the query dispatcher
//!
//! Dictionaries are temporary SQLite files or fake dictionary servers on
//! ephemeral ports, so no external services are needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p vuls-tests
//! ```
//!
//! # Test Structure
//!
//! - `server_e2e_test.rs` - Full server lifecycle and query tests
//! - `concurrency_test.rs` - Many concurrent requests against one handle

// This crate only contains tests, no library code

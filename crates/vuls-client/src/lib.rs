//! Dictionary Client Library
//!
//! Provides a typed HTTP client for go-cve-dictionary style servers: a
//! liveness route at `/health` and a bulk lookup route at `POST /cves`.
//!
//! # Example
//!
//! ```rust,no_run
//! use vuls_client::DictClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), vuls_client::DictClientError> {
//!     let client = DictClient::new("http://127.0.0.1:1323")?;
//!     client.health().await?;
//!
//!     let entries = client.lookup(&["CVE-2021-44228".to_string()]).await?;
//!     println!("{} entries", entries.len());
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! The `testing` module runs an axum router on an ephemeral port:
//!
//! ```rust,ignore
//! use vuls_client::testing::TestServer;
//!
//! let server = TestServer::start(router).await?;
//! server.client.health().await?;
//! ```

mod client;
mod error;
pub mod testing;
mod types;

pub use client::DictClient;
pub use error::{DictClientError, Result};
pub use types::*;

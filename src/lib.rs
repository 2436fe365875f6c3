//! # rgate
//!
//! An async request gateway: one place every outgoing HTTP call goes through,
//! adding response caching, in-flight deduplication, and retry with
//! exponential backoff.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use rgate::{Gateway, GatewayConfig, RequestOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = Gateway::new(GatewayConfig::load()?)?;
//!
//!     // Ten concurrent identical reads become one network call.
//!     let calls = (0..10).map(|_| gateway.get("/api/sessions", RequestOptions::new()));
//!     let responses = futures::future::join_all(calls).await;
//!     println!("{} responses, {:?}", responses.len(), gateway.stats());
//!
//!     // Served from the cache for the next minute.
//!     let again = gateway
//!         .get("/api/sessions", RequestOptions::new().ttl(Duration::from_secs(60)))
//!         .await?;
//!     println!("{}", again.text());
//!     Ok(())
//! }
//! ```
//!
//! Logging goes through [`tracing`]; install a subscriber to see cache hits,
//! joins and retries.

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod notion;
pub mod retry;
pub mod transport;

// Convenience re-exports
pub use cache::{CacheKey, Invalidation};
pub use config::{ConfigError, GatewayConfig};
pub use error::{ErrorKind, GatewayError};
pub use gateway::{Gateway, GatewayStats, RequestOptions};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use retry::RetryPolicy;
pub use transport::{Transport, TransportError};

//! Gatekeeper - Request Admission Filter
//!
//! This crate decides, per inbound HTTP request, whether it is allowed,
//! unconditionally denied (blocklist), unconditionally allowed (safelist),
//! or throttled by a fixed-window counter shared through a counter store.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use gatekeeper::ratelimit::{Engine, MemoryCounterStore, Policy, RequestInfo, ThrottleRule};
//!
//! # async fn run() -> gatekeeper::error::Result<()> {
//! let policy = Arc::new(Policy::new());
//! policy.add_throttle_rule(ThrottleRule::new(
//!     "/api/*",
//!     "POST",
//!     "ratelimit:%{ip}:%{path}",
//!     100,
//!     Duration::from_secs(3600),
//! )?);
//! policy.add_safelist_ip("127.0.0.1");
//! policy.add_blocklist_cidr("10.0.0.0/24")?;
//!
//! let engine = Engine::new(policy, Arc::new(MemoryCounterStore::new()));
//! let request = RequestInfo::new("POST", "/api/items", "203.0.113.9:52100");
//! let throttled = engine.is_throttled(&request).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod ratelimit;

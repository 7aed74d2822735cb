//! In-memory key/value cache with per-entry expiration.
//!
//! This crate provides the process-lifetime store that backs the credential
//! manager and the now-playing queue snapshot:
//! - Per-entry time-to-live, with [`NO_EXPIRATION`] for entries that live
//!   until overwritten or the process ends
//! - Passive eviction on read plus an optional background sweeper
//! - An injectable [`Clock`] so expiry can be tested without sleeping
//!
//! # Example
//!
//! ```rust,ignore
//! use sonar_cache::{TtlCache, NO_EXPIRATION};
//!
//! let cache = TtlCache::new();
//! cache.set("refresh_token", "abc".to_string(), NO_EXPIRATION);
//! cache.set("access_token", "xyz".to_string(), Duration::from_secs(3540));
//! ```

mod cache;
mod clock;
mod sweeper;

pub use cache::{NO_EXPIRATION, SharedCache, TtlCache};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use sweeper::{DEFAULT_SWEEP_INTERVAL, spawn_sweeper};

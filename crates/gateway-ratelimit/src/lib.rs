//! Dual token-bucket rate limiter and the admission gate built on top of
//! it: per-IP and per-resource buckets, LRU eviction, payment top-off, and
//! the check-reserve-adjust protocol described in spec.md §4.5-4.6.

pub mod admission;
pub mod allowlist;
pub mod bucket;
pub mod config;
pub mod key;
pub mod limiter;

pub use admission::{AdmissionDecision, AdmissionGate};
pub use allowlist::Allowlist;
pub use bucket::BucketSnapshot;
pub use config::RateLimiterConfig;
pub use key::resource_key;
pub use limiter::{AdmissionOutcome, LimitType, RateLimiter, Reservation};

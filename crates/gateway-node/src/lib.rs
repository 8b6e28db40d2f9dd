//! Composition root: wires the peer manager, the retrieval tier cascade,
//! the rate limiter, and the admission gate behind one `GatewayRuntime`,
//! plus the hop-header, manifest/name-resolution, payment, and metrics
//! seams `apps/gateway-server` drives the HTTP surface with.

pub mod config;
pub mod hops;
pub mod manifest;
pub mod metrics;
pub mod payment;
pub mod peer_chunk_source;
pub mod runtime;
pub mod tx_offset;

pub use config::{GatewayRuntimeConfig, TierKind};
pub use hops::{attributes_from_headers, headers_for_forward};
pub use manifest::{
    InMemoryManifestResolver, InMemoryNameResolver, ManifestResolver, NameResolver,
    MANIFEST_CONTENT_TYPE,
};
pub use metrics::GatewayMetrics;
pub use payment::{PaymentContext, PaymentError, PaymentProcessor, PaymentReceipt, PaymentRequirements};
pub use peer_chunk_source::PeerChunkSource;
pub use runtime::{FetchOutcome, GatewayRuntime, RuntimeError};
pub use tx_offset::TrustedNodeOffsetResolver;

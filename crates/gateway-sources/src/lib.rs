//! Contiguous-data retrieval tiers and the cascade that orders them: local
//! cache, object store, trusted peer gateways, and chunk assembly from the
//! weave, each implementing [`ContiguousDataTier`].

pub mod cache;
pub mod chunk_store;
pub mod chunks;
pub mod composite;
pub mod error;
pub mod request;
pub mod s3;
pub mod tier;
pub mod trusted_gateways;

pub use cache::CacheTier;
pub use chunk_store::{ChunkMetadataStore, ChunkStoreError};
pub use chunks::ChunkAssemblyTier;
pub use composite::CompositeSource;
pub use error::{AllTiersFailed, TierError};
pub use request::DataRequest;
pub use s3::{S3Config, S3Tier};
pub use tier::ContiguousDataTier;
pub use trusted_gateways::{TrustedGatewayTier, TrustedGatewayTierConfig};

pub mod assembly;
pub mod composite;
pub mod error;
pub mod locator;
pub mod source;
pub mod validate;

pub use assembly::{assemble_stream, ChunkAssemblyRequest};
pub use composite::CompositeChunkSource;
pub use error::{AllSourcesFailed, ChunkSourceError};
pub use locator::ChunkLocator;
pub use source::ChunkSource;
pub use validate::validate_chunk;

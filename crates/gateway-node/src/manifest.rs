use std::collections::HashMap;

use async_trait::async_trait;
use gateway_core::Identifier;

/// Content type that marks an identifier's payload as a manifest; the core
/// never parses this JSON itself, only dispatches to a resolver.
pub const MANIFEST_CONTENT_TYPE: &str = "application/x.arweave-manifest+json";

/// External collaborator: resolves a manifest sub-path (`GET /{id}/{path}`)
/// to the inner identifier it names. The CORE never parses manifest JSON
/// itself; this is the seam spec.md §1 calls out as an external collaborator.
#[async_trait]
pub trait ManifestResolver: Send + Sync {
    async fn resolve_subpath(&self, manifest_id: &Identifier, subpath: &str) -> Option<Identifier>;
}

/// External collaborator: resolves a human-readable name (ArNS or similar)
/// to a content identifier. Consumed, never implemented, by the retrieval
/// pipeline — the gateway forwards whatever identifier it is handed.
#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn resolve_name(&self, name: &str) -> Option<Identifier>;
}

/// Fixed-table manifest resolver for tests and local development; a real
/// deployment wires an HTTP or database-backed implementation instead.
#[derive(Default)]
pub struct InMemoryManifestResolver {
    manifests: HashMap<Identifier, HashMap<String, Identifier>>,
}

impl InMemoryManifestResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, manifest_id: Identifier, subpath: impl Into<String>, target: Identifier) {
        self.manifests
            .entry(manifest_id)
            .or_default()
            .insert(subpath.into(), target);
    }
}

#[async_trait]
impl ManifestResolver for InMemoryManifestResolver {
    async fn resolve_subpath(&self, manifest_id: &Identifier, subpath: &str) -> Option<Identifier> {
        self.manifests.get(manifest_id)?.get(subpath).copied()
    }
}

/// Fixed-table name resolver for tests and local development.
#[derive(Default)]
pub struct InMemoryNameResolver {
    names: HashMap<String, Identifier>,
}

impl InMemoryNameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, target: Identifier) {
        self.names.insert(name.into(), target);
    }
}

#[async_trait]
impl NameResolver for InMemoryNameResolver {
    async fn resolve_name(&self, name: &str) -> Option<Identifier> {
        self.names.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_id(byte: u8) -> Identifier {
        Identifier::from_bytes([byte; 32])
    }

    #[tokio::test]
    async fn resolves_known_subpath() {
        let mut resolver = InMemoryManifestResolver::new();
        let manifest = sample_id(1);
        let target = sample_id(2);
        resolver.insert(manifest, "images/logo.png", target);

        let resolved = resolver.resolve_subpath(&manifest, "images/logo.png").await;
        assert_eq!(resolved, Some(target));
    }

    #[tokio::test]
    async fn unknown_subpath_resolves_to_none() {
        let resolver = InMemoryManifestResolver::new();
        let manifest = sample_id(1);
        assert_eq!(resolver.resolve_subpath(&manifest, "missing").await, None);
    }

    #[tokio::test]
    async fn name_resolver_looks_up_by_exact_name() {
        let mut resolver = InMemoryNameResolver::new();
        let target = sample_id(9);
        resolver.insert("my-arns-name", target);
        assert_eq!(resolver.resolve_name("my-arns-name").await, Some(target));
        assert_eq!(resolver.resolve_name("other").await, None);
    }
}

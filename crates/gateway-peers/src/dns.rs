use async_trait::async_trait;

/// Optional pre-resolution of preferred peer URLs to their IP form, so a
/// hot-path request can skip per-request DNS. Not used unless a resolver is
/// configured on the peer manager.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    async fn resolve(&self, host: &str) -> Option<String>;
}

/// Resolves via the OS resolver through `tokio::net::lookup_host`, taking
/// the first returned address.
pub struct SystemDnsResolver;

#[async_trait]
impl DnsResolver for SystemDnsResolver {
    async fn resolve(&self, host: &str) -> Option<String> {
        let lookup_target = if host.contains(':') {
            host.to_string()
        } else {
            format!("{host}:0")
        };
        let mut addrs = tokio::net::lookup_host(lookup_target).await.ok()?;
        addrs.next().map(|addr| addr.ip().to_string())
    }
}

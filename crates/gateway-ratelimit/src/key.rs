/// Canonical resource-bucket key: `method|host|canonical-path`.
pub fn resource_key(method: &str, host: &str, path: &str) -> String {
    format!("{method}|{host}|{path}")
}

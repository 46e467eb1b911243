#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Unknown cache name: {0}")]
    UnknownCache(String),

    #[error("Invalid configuration: {key}={value}")]
    Config { key: &'static str, value: String },
}

/// Operation pipeline configuration.
///
/// Controls operation timeouts and the concurrency limit applied before load
/// shedding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Timeout for a single operation in milliseconds. Covers tenant
    /// resolution, the completion call and message delivery.
    pub operation_timeout_ms: u64,
    /// Maximum number of concurrent operations before load shedding.
    pub max_concurrent_operations: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: 120_000,
            max_concurrent_operations: 256,
        }
    }
}

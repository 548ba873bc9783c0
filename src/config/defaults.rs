/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_CONNECTIONS: usize = 20;

// Cache defaults
pub const DEFAULT_CACHE_PARENT: &str = "./";
pub const DEFAULT_CACHE_PREFIX: &str = "cache";
pub const DEFAULT_CACHE_QUOTA_BYTES: u64 = 15 * 1024 * 1024 * 1024; // 15GiB

// Render defaults
pub const DEFAULT_MAX_ITERATIONS: u32 = 255;

// Heavy request defaults
pub const DEFAULT_HEAVY_DELAY: &str = "20s";

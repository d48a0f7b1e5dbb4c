//! Naturalization run tuning parameters

use serde::{Deserialize, Serialize};

/// Tuning parameters for one naturalization run
///
/// All fields have conservative defaults sized for the upstream generation
/// API's rate limits; callers override them per run via the start request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NaturalizeParameters {
    /// Names per generation request (default: 20)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum simultaneous in-flight generation requests (default: 8)
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Minimum spacing between batch dispatches in milliseconds, 0 disables
    /// pacing (default: 250ms)
    #[serde(default = "default_batch_pacing_ms")]
    pub batch_pacing_ms: u64,

    /// Retry attempts per batch before identity fallback (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay before retrying a transient failure (default: 2000ms)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Base delay for rate-limit retries; grows linearly with the attempt
    /// number (default: 5000ms)
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,

    /// Keys per cache lookup chunk (default: 500)
    #[serde(default = "default_cache_chunk_size")]
    pub cache_chunk_size: usize,

    /// Record updates per propagation chunk (default: 100)
    #[serde(default = "default_update_chunk_size")]
    pub update_chunk_size: usize,

    /// Parallel record updates within a propagation chunk (default: 4)
    #[serde(default = "default_update_parallelism")]
    pub update_parallelism: usize,
}

impl Default for NaturalizeParameters {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_in_flight: default_max_in_flight(),
            batch_pacing_ms: default_batch_pacing_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
            cache_chunk_size: default_cache_chunk_size(),
            update_chunk_size: default_update_chunk_size(),
            update_parallelism: default_update_parallelism(),
        }
    }
}

fn default_batch_size() -> usize {
    20
}

fn default_max_in_flight() -> usize {
    8
}

fn default_batch_pacing_ms() -> u64 {
    250
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_rate_limit_delay_ms() -> u64 {
    5000
}

fn default_cache_chunk_size() -> usize {
    500
}

fn default_update_chunk_size() -> usize {
    100
}

fn default_update_parallelism() -> usize {
    4
}

//! Runtime settings injected into the protocol router

use std::time::Duration;

pub const DEFAULT_THEATER_DELAY_MS: u64 = 3000;
pub const DEFAULT_MAP_RADIUS: u32 = 4;
/// Castle plus moat occupy rings 0 and 1, so resource fields need at least ring 2.
pub const MIN_MAP_RADIUS: u32 = 2;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Pause between broadcasting a resolved round and starting the next one,
    /// giving clients time to animate the outcome.
    pub theater_delay: Duration,
    pub map_radius: u32,
}

impl ServerConfig {
    pub fn new(theater_delay_ms: u64, map_radius: u32) -> Self {
        Self {
            theater_delay: Duration::from_millis(theater_delay_ms),
            map_radius: map_radius.max(MIN_MAP_RADIUS),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_THEATER_DELAY_MS, DEFAULT_MAP_RADIUS)
    }
}

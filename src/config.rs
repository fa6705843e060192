//! Application configuration, read from the same figment Rocket uses
//! (`Rocket.toml` and `ROCKET_*` environment variables).
use serde::{Deserialize, Serialize};

use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database file
    pub database: String,
    /// Period of the countdown ticker in milliseconds
    pub countdown_tick_ms: u64,
    /// Buffered task changes per change-feed subscriber
    pub event_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: "timewise.db".to_string(),
            countdown_tick_ms: 50,
            event_capacity: 256,
        }
    }
}

impl AppConfig {
    pub fn countdown_period(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms.max(1))
    }
}

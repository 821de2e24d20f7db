pub mod config;
pub mod stats;
pub mod task;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use stats::{BotStats, ErrorRate, StatsSnapshot};
pub use task::{shutdown_pair, ShutdownSignal, ShutdownTrigger, TaskHandle};

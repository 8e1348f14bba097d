//! Stream and serial settings, overridable through `DPOINT_*` environment variables.

use std::time::Duration;

/// Settings for a binary pen stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Capacity of the frame queue and of the event channel.
    pub channel_capacity: usize,
    /// How often reader threads wake up to check for a stop request.
    pub poll_interval: Duration,
    /// Accelerometer full-scale range configured in the pen firmware, in g.
    pub accel_range_g: f64,
    /// Gyroscope full-scale range configured in the pen firmware, in deg/s.
    pub gyro_range_dps: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
            poll_interval: Duration::from_millis(100),
            accel_range_g: 4.0,
            gyro_range_dps: 1000.0,
        }
    }
}

impl StreamConfig {
    /// Defaults, overridden by `DPOINT_CHANNEL_CAPACITY`, `DPOINT_POLL_MS`,
    /// `DPOINT_ACCEL_RANGE_G` and `DPOINT_GYRO_RANGE_DPS`.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            channel_capacity: read_env_parse("DPOINT_CHANNEL_CAPACITY", d.channel_capacity).max(1),
            poll_interval: read_env_millis("DPOINT_POLL_MS", d.poll_interval),
            accel_range_g: read_env_parse("DPOINT_ACCEL_RANGE_G", d.accel_range_g),
            gyro_range_dps: read_env_parse("DPOINT_GYRO_RANGE_DPS", d.gyro_range_dps),
        }
    }
}

/// Settings for the serial position feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Per-read timeout. Partial lines survive a timeout.
    pub read_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 9600,
            read_timeout: Duration::from_millis(100),
        }
    }
}

impl SerialConfig {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            ..Self::default()
        }
    }

    /// Defaults, overridden by `DPOINT_SERIAL_PORT`, `DPOINT_SERIAL_BAUD` and
    /// `DPOINT_SERIAL_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            port: read_env_string("DPOINT_SERIAL_PORT", &d.port),
            baud_rate: read_env_parse("DPOINT_SERIAL_BAUD", d.baud_rate),
            read_timeout: read_env_millis("DPOINT_SERIAL_TIMEOUT_MS", d.read_timeout),
        }
    }
}

fn read_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn read_env_millis(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

// Port names are case-sensitive.
fn read_env_string(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

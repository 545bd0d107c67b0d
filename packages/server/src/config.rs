//! Command line / environment configuration.

use std::time::Duration;

use clap::Parser;

use crate::{ui::SessionConfig, usecase::CoordinatorConfig};

#[derive(Parser, Debug, Clone)]
#[command(name = "hiroba-server")]
#[command(about = "Room-based chat relay over WebSocket", long_about = None)]
pub struct ServerConfig {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "HIROBA_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Recent messages kept in memory per room and replayed on join
    #[arg(long, env = "HIROBA_HISTORY_CAPACITY", default_value_t = 50)]
    pub history_capacity: usize,

    /// Outbound messages buffered per session before it is considered unresponsive
    #[arg(long, env = "HIROBA_MAILBOX_CAPACITY", default_value_t = 256)]
    pub mailbox_capacity: usize,

    /// Capacity of the broadcast coordinator's event queue
    #[arg(long, env = "HIROBA_EVENT_QUEUE_CAPACITY", default_value_t = 1024)]
    pub event_queue_capacity: usize,

    /// Maximum size in bytes of an inbound WebSocket message
    #[arg(long, env = "HIROBA_MAX_FRAME_SIZE", default_value_t = 512)]
    pub max_frame_size: usize,

    /// Seconds between pings sent to each client
    #[arg(long, env = "HIROBA_PING_INTERVAL_SECS", default_value_t = 30)]
    pub ping_interval_secs: u64,

    /// Seconds without a pong before a client is disconnected
    #[arg(long, env = "HIROBA_PONG_TIMEOUT_SECS", default_value_t = 60)]
    pub pong_timeout_secs: u64,

    /// Seconds allowed for a single write to a client
    #[arg(long, env = "HIROBA_WRITE_TIMEOUT_SECS", default_value_t = 10)]
    pub write_timeout_secs: u64,

    /// Seconds to wait for sessions to close on shutdown
    #[arg(long, env = "HIROBA_SHUTDOWN_GRACE_SECS", default_value_t = 15)]
    pub shutdown_grace_secs: u64,

    /// Seconds an empty room stays in memory (0 keeps rooms forever)
    #[arg(long, env = "HIROBA_ROOM_IDLE_TTL_SECS", default_value_t = 600)]
    pub room_idle_ttl_secs: u64,
}

impl ServerConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl From<&ServerConfig> for CoordinatorConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            history_capacity: config.history_capacity,
            event_queue_capacity: config.event_queue_capacity,
            room_idle_ttl: (config.room_idle_ttl_secs > 0)
                .then(|| Duration::from_secs(config.room_idle_ttl_secs)),
            ..Self::default()
        }
    }
}

impl From<&ServerConfig> for SessionConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            ping_interval: Duration::from_secs(config.ping_interval_secs.max(1)),
            pong_timeout: Duration::from_secs(config.pong_timeout_secs),
            write_timeout: Duration::from_secs(config.write_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        // テスト項目: 引数なしで起動したときのデフォルト値
        // given (前提条件):
        // when (操作):
        let config = ServerConfig::try_parse_from(["hiroba-server"]).unwrap();

        // then (期待する結果):
        assert_eq!(config.history_capacity, 50);
        assert_eq!(config.mailbox_capacity, 256);
        assert_eq!(config.max_frame_size, 512);
        assert_eq!(config.shutdown_grace(), Duration::from_secs(15));

        let session = SessionConfig::from(&config);
        assert_eq!(session.ping_interval, Duration::from_secs(30));
        assert_eq!(session.pong_timeout, Duration::from_secs(60));
        assert_eq!(session.write_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_zero_idle_ttl_disables_reclaim() {
        // テスト項目: --room-idle-ttl-secs 0 で Room の回収が無効になる
        // given (前提条件):
        let config =
            ServerConfig::try_parse_from(["hiroba-server", "--room-idle-ttl-secs", "0"]).unwrap();

        // when (操作):
        let coordinator = CoordinatorConfig::from(&config);

        // then (期待する結果):
        assert_eq!(coordinator.room_idle_ttl, None);
    }

    #[test]
    fn test_flags_override_defaults() {
        // テスト項目: フラグで指定した値が各設定に反映される
        // given (前提条件):
        let config = ServerConfig::try_parse_from([
            "hiroba-server",
            "--history-capacity",
            "5",
            "--event-queue-capacity",
            "16",
            "--ping-interval-secs",
            "2",
        ])
        .unwrap();

        // when (操作):
        let coordinator = CoordinatorConfig::from(&config);
        let session = SessionConfig::from(&config);

        // then (期待する結果):
        assert_eq!(coordinator.history_capacity, 5);
        assert_eq!(coordinator.event_queue_capacity, 16);
        assert_eq!(session.ping_interval, Duration::from_secs(2));
    }
}

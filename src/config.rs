use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    #[serde(default = "default_pg_host")]
    pub host: String,
    #[serde(default = "default_pg_port")]
    pub port: u16,
    #[serde(default = "default_pg_user")]
    pub user: String,
    #[serde(default = "default_pg_password")]
    pub password: String,
    #[serde(default = "default_pg_database")]
    pub database: String,
    #[serde(default = "default_max_open_conn")]
    pub max_open_conn: u32,
    #[serde(default = "default_max_idle_time")]
    pub max_idle_time: String,
}

fn default_pg_host() -> String {
    "localhost".into()
}
fn default_pg_port() -> u16 {
    5432
}
fn default_pg_user() -> String {
    "postgres".into()
}
fn default_pg_password() -> String {
    String::new()
}
fn default_pg_database() -> String {
    "restaurant".into()
}
fn default_max_open_conn() -> u32 {
    25
}
fn default_max_idle_time() -> String {
    "15m".into()
}

impl PostgresConfig {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }

    /// Parses the Go-style duration string ("15m", "90s") that this field
    /// inherits from the config surface's env-var convention.
    pub fn max_idle_duration(&self) -> Duration {
        parse_go_duration(&self.max_idle_time).unwrap_or(Duration::from_secs(15 * 60))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RabbitmqConfig {
    #[serde(default = "default_rabbit_host")]
    pub host: String,
    #[serde(default = "default_rabbit_port")]
    pub port: u16,
    #[serde(default = "default_rabbit_user")]
    pub user: String,
    #[serde(default = "default_rabbit_password")]
    pub password: String,
    #[serde(default = "default_order_exchange")]
    pub order_exchange: String,
    #[serde(default = "default_notifications_exchange")]
    pub notifications_exchange: String,
    #[serde(default = "default_reconnect_attempt")]
    pub reconnect_attempt: u32,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: String,
}

fn default_rabbit_host() -> String {
    "localhost".into()
}
fn default_rabbit_port() -> u16 {
    5672
}
fn default_rabbit_user() -> String {
    "guest".into()
}
fn default_rabbit_password() -> String {
    "guest".into()
}
fn default_order_exchange() -> String {
    "orders_topic".into()
}
fn default_notifications_exchange() -> String {
    "notifications_fanout".into()
}
fn default_reconnect_attempt() -> u32 {
    5
}
fn default_reconnect_delay() -> String {
    "1s".into()
}

impl RabbitmqConfig {
    pub fn amqp_uri(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/%2f",
            self.user, self.password, self.host, self.port
        )
    }

    pub fn reconnect_delay_duration(&self) -> Duration {
        parse_go_duration(&self.reconnect_delay).unwrap_or(Duration::from_secs(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderServiceConfig {
    #[serde(default = "default_sem_wait")]
    pub sem_wait: String,
}

fn default_sem_wait() -> String {
    "1s".into()
}

impl OrderServiceConfig {
    pub fn sem_wait_duration(&self) -> Duration {
        parse_go_duration(&self.sem_wait).unwrap_or(Duration::from_secs(1))
    }
}

impl Default for OrderServiceConfig {
    fn default() -> Self {
        Self {
            sem_wait: default_sem_wait(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KitchenConfig {
    #[serde(default = "default_reconnect_attempt")]
    pub reconnect_attempt: u32,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: String,
}

impl Default for KitchenConfig {
    fn default() -> Self {
        Self {
            reconnect_attempt: default_reconnect_attempt(),
            reconnect_delay: default_reconnect_delay(),
        }
    }
}

impl KitchenConfig {
    pub fn reconnect_delay_duration(&self) -> Duration {
        parse_go_duration(&self.reconnect_delay).unwrap_or(Duration::from_secs(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub postgres: PostgresConfig,
    #[serde(default)]
    pub rabbitmq: RabbitmqConfig,
    #[serde(default)]
    pub order: OrderServiceConfig,
    #[serde(default)]
    pub kitchen: KitchenConfig,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: default_pg_host(),
            port: default_pg_port(),
            user: default_pg_user(),
            password: default_pg_password(),
            database: default_pg_database(),
            max_open_conn: default_max_open_conn(),
            max_idle_time: default_max_idle_time(),
        }
    }
}

impl Default for RabbitmqConfig {
    fn default() -> Self {
        Self {
            host: default_rabbit_host(),
            port: default_rabbit_port(),
            user: default_rabbit_user(),
            password: default_rabbit_password(),
            order_exchange: default_order_exchange(),
            notifications_exchange: default_notifications_exchange(),
            reconnect_attempt: default_reconnect_attempt(),
            reconnect_delay: default_reconnect_delay(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            postgres: PostgresConfig::default(),
            rabbitmq: RabbitmqConfig::default(),
            order: OrderServiceConfig::default(),
            kitchen: KitchenConfig::default(),
        }
    }
}

impl Config {
    /// Loads the YAML file at `path` if present (a missing file yields
    /// all-default config), then applies the environment-variable
    /// overrides documented for this system, in that order of precedence.
    pub fn load(path: &Path) -> Result<Config, AppError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| AppError::Fatal(anyhow::anyhow!("reading {path:?}: {e}")))?;
            serde_yaml::from_str(&contents)
                .map_err(|e| AppError::Fatal(anyhow::anyhow!("parsing {path:?}: {e}")))?
        } else {
            Config::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        env_override(&mut self.postgres.host, "POSTGRES_HOST");
        env_override_parsed(&mut self.postgres.port, "POSTGRES_PORT");
        env_override(&mut self.postgres.user, "POSTGRES_USER");
        env_override(&mut self.postgres.password, "POSTGRES_PASSWORD");
        env_override(&mut self.postgres.database, "POSTGRES_DATABASE");
        env_override_parsed(&mut self.postgres.max_open_conn, "POSTGRES_MAX_OPEN_CONN");
        env_override(&mut self.postgres.max_idle_time, "POSTGRES_MAX_IDLE_TIME");

        env_override(&mut self.rabbitmq.host, "RABBITMQ_HOST");
        env_override_parsed(&mut self.rabbitmq.port, "RABBITMQ_PORT");
        env_override(&mut self.rabbitmq.user, "RABBITMQ_USER");
        env_override(&mut self.rabbitmq.password, "RABBITMQ_PASSWORD");
        env_override(&mut self.rabbitmq.order_exchange, "RABBITMQ_ORDER_EXCHANGE");
        env_override(
            &mut self.rabbitmq.notifications_exchange,
            "RABBITMQ_NOTIFICATIONS_EXCHANGE",
        );
        env_override_parsed(
            &mut self.rabbitmq.reconnect_attempt,
            "RABBITMQ_RECONNECT_ATTEMPT",
        );
        env_override(&mut self.rabbitmq.reconnect_delay, "RABBITMQ_RECONNECT_DELAY");

        env_override(&mut self.order.sem_wait, "ORDER_SEMWAIT");
        env_override_parsed(&mut self.kitchen.reconnect_attempt, "KITCHEN_RECONNECT_ATTEMPT");
        env_override(&mut self.kitchen.reconnect_delay, "KITCHEN_RECONNECT_DELAY");
    }
}

fn env_override(field: &mut String, key: &str) {
    if let Ok(value) = std::env::var(key) {
        *field = value;
    }
}

fn env_override_parsed<T: std::str::FromStr>(field: &mut T, key: &str) {
    if let Ok(value) = std::env::var(key) {
        if let Ok(parsed) = value.parse() {
            *field = parsed;
        }
    }
}

/// Parses a minimal subset of Go's `time.ParseDuration` grammar ("15m",
/// "90s", "1h") since that is the format the config's env-var documentation
/// uses for the idle-time and delay fields.
fn parse_go_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    let split_at = input.find(|c: char| !c.is_ascii_digit())?;
    let (value, unit) = input.split_at(split_at);
    let value: u64 = value.parse().ok()?;
    match unit {
        "s" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_secs(value * 60)),
        "h" => Some(Duration::from_secs(value * 3600)),
        "ms" => Some(Duration::from_millis(value)),
        _ => None,
    }
}

const SECRET_MARKERS: [&str; 3] = ["password", "secret", "key"];

/// A masked rendering of the effective configuration, logged once at
/// startup so operators can see what was actually loaded without leaking
/// credentials into the log stream.
pub struct MaskedConfig<'a>(pub &'a Config);

impl fmt::Display for MaskedConfig<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = serde_json::to_value(self.0).map_err(|_| fmt::Error)?;
        mask_secrets(&mut value);
        write!(f, "{value}")
    }
}

fn mask_secrets(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                let lowered = key.to_ascii_lowercase();
                if SECRET_MARKERS.iter().any(|marker| lowered.contains(marker)) {
                    *v = serde_json::Value::String("****".into());
                } else {
                    mask_secrets(v);
                }
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(mask_secrets),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_password_but_not_host() {
        let mut config = Config::default();
        config.postgres.password = "hunter2".into();
        let rendered = MaskedConfig(&config).to_string();
        assert!(rendered.contains("\"****\""));
        assert!(rendered.contains("localhost"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn parses_go_style_durations() {
        assert_eq!(parse_go_duration("15m"), Some(Duration::from_secs(900)));
        assert_eq!(parse_go_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_go_duration("90s"), Some(Duration::from_secs(90)));
    }
}

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Slowest configurable speed multiplier. One tick then spans 1000 s of
/// wall time.
pub const SPEED_FLOOR: f64 = 0.001;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub engine: EngineConfig,
    pub broadcast: BroadcastConfig,
}

/// Per-match pacing, capacities and completion handling.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub max_match_seconds: u32,
    pub default_speed: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    pub broadcast_cadence_ticks: u64,
    pub event_history_cap: usize,
    pub revenue_history_cap: usize,
    pub halftime_intermission: Duration,
    /// Events kept in the persisted record.
    pub persisted_event_limit: usize,
    pub persist_max_attempts: u32,
    pub persist_initial_backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_match_seconds: 2400,
            default_speed: 1.0,
            min_speed: 0.1,
            max_speed: 100.0,
            broadcast_cadence_ticks: 5,
            event_history_cap: 50,
            revenue_history_cap: 120,
            halftime_intermission: Duration::from_millis(30_000),
            persisted_event_limit: 20,
            persist_max_attempts: 5,
            persist_initial_backoff: Duration::from_millis(200),
        }
    }
}

/// Subscriber fan-out limits.
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastConfig {
    pub queue_capacity: usize,
    pub max_consecutive_failures: u32,
    pub delivery_timeout: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            max_consecutive_failures: 3,
            delivery_timeout: Duration::from_millis(2_000),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_or(&env_map, "PORT", 8080u16, "must be a valid u16")?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .unwrap_or_else(|| "data/matches.db".to_string());

        let defaults = EngineConfig::default();
        let max_match_seconds = parse_or(
            &env_map,
            "MAX_MATCH_SECONDS",
            defaults.max_match_seconds,
            "must be a valid u32",
        )?;
        if max_match_seconds < 2 {
            return Err(invalid("MAX_MATCH_SECONDS", "must be at least 2"));
        }

        let default_speed =
            parse_speed(&env_map, "DEFAULT_SIMULATION_SPEED", defaults.default_speed)?;
        let min_speed = parse_speed(&env_map, "MIN_SIMULATION_SPEED", defaults.min_speed)?;
        let max_speed = parse_speed(&env_map, "MAX_SIMULATION_SPEED", defaults.max_speed)?;
        if min_speed > max_speed {
            return Err(invalid(
                "MIN_SIMULATION_SPEED",
                "must not exceed MAX_SIMULATION_SPEED",
            ));
        }
        if default_speed < min_speed || default_speed > max_speed {
            return Err(invalid(
                "DEFAULT_SIMULATION_SPEED",
                "must lie within the configured speed bounds",
            ));
        }

        let broadcast_cadence_ticks = parse_positive(
            &env_map,
            "BROADCAST_CADENCE_TICKS",
            defaults.broadcast_cadence_ticks,
        )?;
        let event_history_cap =
            parse_positive(&env_map, "EVENT_HISTORY_CAP", defaults.event_history_cap)?;
        let revenue_history_cap =
            parse_positive(&env_map, "REVENUE_HISTORY_CAP", defaults.revenue_history_cap)?;
        let halftime_intermission = parse_millis(
            &env_map,
            "HALFTIME_INTERMISSION_MS",
            defaults.halftime_intermission,
        )?;
        let persisted_event_limit = parse_or(
            &env_map,
            "PERSISTED_EVENT_LIMIT",
            defaults.persisted_event_limit,
            "must be a valid usize",
        )?;
        let persist_max_attempts = parse_positive(
            &env_map,
            "PERSIST_MAX_ATTEMPTS",
            defaults.persist_max_attempts,
        )?;
        let persist_initial_backoff = parse_millis(
            &env_map,
            "PERSIST_INITIAL_BACKOFF_MS",
            defaults.persist_initial_backoff,
        )?;

        let broadcast_defaults = BroadcastConfig::default();
        let queue_capacity = parse_positive(
            &env_map,
            "SUBSCRIBER_QUEUE_CAPACITY",
            broadcast_defaults.queue_capacity,
        )?;
        let max_consecutive_failures = parse_positive(
            &env_map,
            "SUBSCRIBER_MAX_FAILURES",
            broadcast_defaults.max_consecutive_failures,
        )?;
        let delivery_timeout = parse_millis(
            &env_map,
            "SUBSCRIBER_DELIVERY_TIMEOUT_MS",
            broadcast_defaults.delivery_timeout,
        )?;

        Ok(Config {
            port,
            database_path,
            engine: EngineConfig {
                max_match_seconds,
                default_speed,
                min_speed,
                max_speed,
                broadcast_cadence_ticks,
                event_history_cap,
                revenue_history_cap,
                halftime_intermission,
                persisted_event_limit,
                persist_max_attempts,
                persist_initial_backoff,
            },
            broadcast: BroadcastConfig {
                queue_capacity,
                max_consecutive_failures,
                delivery_timeout,
            },
        })
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue(key.to_string(), reason.to_string())
}

fn parse_or<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
    reason: &str,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| invalid(key, reason)),
        None => Ok(default),
    }
}

/// Integer option that must be at least 1.
fn parse_positive<T>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + From<u8>,
{
    let value = parse_or(env_map, key, default, "must be a positive integer")?;
    if value < T::from(1u8) {
        return Err(invalid(key, "must be at least 1"));
    }
    Ok(value)
}

fn parse_speed(
    env_map: &HashMap<String, String>,
    key: &str,
    default: f64,
) -> Result<f64, ConfigError> {
    let value = parse_or(env_map, key, default, "must be a number")?;
    if !value.is_finite() || value < SPEED_FLOOR {
        return Err(invalid(key, "must be a finite number of at least 0.001"));
    }
    Ok(value)
}

fn parse_millis(
    env_map: &HashMap<String, String>,
    key: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match env_map.get(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| invalid(key, "must be a whole number of milliseconds")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(HashMap::new()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_path, "data/matches.db");
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.broadcast, BroadcastConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_env_map(env(&[
            ("PORT", "9000"),
            ("MAX_MATCH_SECONDS", "600"),
            ("DEFAULT_SIMULATION_SPEED", "2.5"),
            ("BROADCAST_CADENCE_TICKS", "10"),
            ("HALFTIME_INTERMISSION_MS", "500"),
            ("SUBSCRIBER_QUEUE_CAPACITY", "8"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.engine.max_match_seconds, 600);
        assert_eq!(config.engine.default_speed, 2.5);
        assert_eq!(config.engine.broadcast_cadence_ticks, 10);
        assert_eq!(
            config.engine.halftime_intermission,
            Duration::from_millis(500)
        );
        assert_eq!(config.broadcast.queue_capacity, 8);
    }

    #[test]
    fn test_invalid_port() {
        let result = Config::from_env_map(env(&[("PORT", "not_a_number")]));
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_zero_cap_rejected() {
        let result = Config::from_env_map(env(&[("EVENT_HISTORY_CAP", "0")]));
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "EVENT_HISTORY_CAP"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_non_finite_speed_rejected() {
        let result = Config::from_env_map(env(&[("DEFAULT_SIMULATION_SPEED", "inf")]));
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "DEFAULT_SIMULATION_SPEED"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_speed_below_floor_rejected() {
        let result = Config::from_env_map(env(&[("MIN_SIMULATION_SPEED", "1e-21")]));
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "MIN_SIMULATION_SPEED"),
            _ => panic!("Expected InvalidValue error"),
        }

        let config = Config::from_env_map(env(&[("MIN_SIMULATION_SPEED", "0.001")])).unwrap();
        assert_eq!(config.engine.min_speed, SPEED_FLOOR);
    }

    #[test]
    fn test_default_speed_outside_bounds() {
        let result = Config::from_env_map(env(&[
            ("DEFAULT_SIMULATION_SPEED", "50"),
            ("MAX_SIMULATION_SPEED", "10"),
        ]));
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "DEFAULT_SIMULATION_SPEED"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_max_match_seconds_too_small() {
        let result = Config::from_env_map(env(&[("MAX_MATCH_SECONDS", "1")]));
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "MAX_MATCH_SECONDS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }
}

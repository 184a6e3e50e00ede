use std::str::FromStr;
use std::time::Duration;

use crate::shared::AppError;

/// Origins always allowed by CORS in addition to `ALLOWED_ORIGINS`
const DEFAULT_ORIGINS: &[&str] = &[
    "https://localhost",
    "http://localhost",
    "http://localhost:5173",
    "http://localhost:4173",
    "http://127.0.0.1:5173",
    "http://127.0.0.1:4173",
    "http://localhost:3000",
];

/// Longest room lifetime accepted from `ROOM_TTL_HOURS` (one year)
pub const MAX_ROOM_TTL_HOURS: i64 = 24 * 365;

/// Runtime configuration, read once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// How long a room lives after it was (re)created
    pub room_ttl_hours: i64,
    /// Self-destruct delay used when a message asks for one without a time
    pub self_destruct_default_secs: u64,
    /// How often the expiry sweeper runs
    pub sweep_interval: Duration,
    /// Upper bound on rooms expired per sweep
    pub sweep_batch_size: usize,
    /// How often old messages are purged as a backstop
    pub retention_interval: Duration,
    pub database_url: Option<String>,
    pub allowed_origins: Vec<String>,
    pub bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            room_ttl_hours: 2,
            self_destruct_default_secs: 60,
            sweep_interval: Duration::from_secs(5 * 60), // 5 minutes
            sweep_batch_size: 200,
            retention_interval: Duration::from_secs(10 * 60), // 10 minutes
            database_url: None,
            allowed_origins: DEFAULT_ORIGINS.iter().map(|o| o.to_string()).collect(),
            bind_addr: "0.0.0.0:8000".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from the process environment
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let room_ttl_hours: i64 = parse_var(&lookup, "ROOM_TTL_HOURS", defaults.room_ttl_hours)?;
        if !(1..=MAX_ROOM_TTL_HOURS).contains(&room_ttl_hours) {
            return Err(AppError::Config(format!(
                "ROOM_TTL_HOURS must be between 1 and {}",
                MAX_ROOM_TTL_HOURS
            )));
        }

        let sweep_secs: u64 = parse_var(
            &lookup,
            "SWEEP_INTERVAL_SECS",
            defaults.sweep_interval.as_secs(),
        )?;
        let retention_secs: u64 = parse_var(
            &lookup,
            "MESSAGE_RETENTION_INTERVAL_SECS",
            defaults.retention_interval.as_secs(),
        )?;
        if sweep_secs == 0 || retention_secs == 0 {
            return Err(AppError::Config(
                "background task intervals must be non-zero".to_string(),
            ));
        }

        let mut allowed_origins: Vec<String> = lookup("ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
        allowed_origins.extend(defaults.allowed_origins);
        allowed_origins.sort();
        allowed_origins.dedup();

        let bind_addr = match lookup("BIND_ADDR") {
            Some(addr) => addr,
            None => {
                let port: u16 = parse_var(&lookup, "PORT", 8000)?;
                format!("0.0.0.0:{}", port)
            }
        };

        Ok(Self {
            room_ttl_hours,
            self_destruct_default_secs: parse_var(
                &lookup,
                "SELF_DESTRUCT_SECONDS",
                defaults.self_destruct_default_secs,
            )?,
            sweep_interval: Duration::from_secs(sweep_secs),
            sweep_batch_size: parse_var(&lookup, "SWEEP_BATCH_SIZE", defaults.sweep_batch_size)?,
            retention_interval: Duration::from_secs(retention_secs),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            allowed_origins,
            bind_addr,
        })
    }

    pub fn room_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.room_ttl_hours)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} has invalid value {:?}", key, raw))),
        _ => Ok(default),
    }
}

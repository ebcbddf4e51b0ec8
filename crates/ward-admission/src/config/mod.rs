use crate::admissions::AllocationConfig;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub allocation: AllocationConfig,
    pub seed: SeedConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let allocation = match env::var("ADMISSION_MAX_MOVE_ATTEMPTS") {
            Ok(raw) => AllocationConfig {
                max_move_attempts: parse_move_attempts(&raw)?,
            },
            Err(_) => AllocationConfig::default(),
        };

        let seed = SeedConfig {
            wards_csv: path_var("ADMISSION_SEED_WARDS"),
            patients_csv: path_var("ADMISSION_SEED_PATIENTS"),
        };
        if seed.wards_csv.is_none() && seed.patients_csv.is_some() {
            return Err(ConfigError::OrphanPatientSeed);
        }

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            allocation,
            seed,
        })
    }
}

fn parse_move_attempts(raw: &str) -> Result<u8, ConfigError> {
    match raw.trim().parse::<u8>() {
        Ok(value) if value >= 1 => Ok(value),
        _ => Err(ConfigError::InvalidMoveAttempts {
            value: raw.to_string(),
        }),
    }
}

fn path_var(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Optional CSV files used to populate the in-memory store at startup.
#[derive(Debug, Clone, Default)]
pub struct SeedConfig {
    pub wards_csv: Option<PathBuf>,
    pub patients_csv: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidMoveAttempts { value: String },
    OrphanPatientSeed,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidMoveAttempts { value } => write!(
                f,
                "ADMISSION_MAX_MOVE_ATTEMPTS must be an integer between 1 and 255, got '{value}'"
            ),
            ConfigError::OrphanPatientSeed => write!(
                f,
                "ADMISSION_SEED_PATIENTS requires ADMISSION_SEED_WARDS to be set"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidMoveAttempts { .. }
            | ConfigError::OrphanPatientSeed => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "ADMISSION_MAX_MOVE_ATTEMPTS",
            "ADMISSION_SEED_WARDS",
            "ADMISSION_SEED_PATIENTS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.allocation.max_move_attempts, 3);
        assert!(config.seed.wards_csv.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn move_attempts_must_be_positive() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ADMISSION_MAX_MOVE_ATTEMPTS", "0");
        let err = AppConfig::load().expect_err("zero attempts rejected");
        assert!(matches!(err, ConfigError::InvalidMoveAttempts { .. }));

        env::set_var("ADMISSION_MAX_MOVE_ATTEMPTS", " 5 ");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.allocation.max_move_attempts, 5);
        reset_env();
    }

    #[test]
    fn patient_seed_needs_ward_seed() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ADMISSION_SEED_PATIENTS", "patients.csv");
        let err = AppConfig::load().expect_err("orphan patient seed rejected");
        assert!(matches!(err, ConfigError::OrphanPatientSeed));

        env::set_var("ADMISSION_SEED_WARDS", "wards.csv");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.seed.wards_csv, Some(PathBuf::from("wards.csv")));
        reset_env();
    }
}

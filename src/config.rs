use std::{str::FromStr, time::Duration};

use anyhow::{Context, Result};

// ---------------------------------------------------------------------------
// HashAlgorithm
// ---------------------------------------------------------------------------

/// Digest used as the PBKDF2 pseudo-random function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
}

impl FromStr for HashAlgorithm {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            other => Err(anyhow::anyhow!("unsupported hash algorithm: {other:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordConfig {
    pub algorithm: HashAlgorithm,
    pub salt_length: usize,
    pub iterations: u32,
    /// Length of the derived key in bytes.
    pub dk_length: usize,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// Address the socket ingester binds and the relay client connects to.
    pub ingest_host: String,
    pub ingest_port: u16,
    pub serial_port: String,
    pub serial_baud_rate: u32,
    /// Serial read timeout; an expired read is treated as "no data yet".
    pub serial_timeout: Duration,
    /// Rows deleted per table on every retention sweep.
    pub retention_batch_size: u32,
    /// Pause between the end of one sweep and the start of the next.
    pub retention_interval: Duration,
    pub password: PasswordConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests need not touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());

        Ok(Self {
            database_url: optional("DATABASE_URL", "sqlite://sensor_data.db"),
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: parse(&optional("SERVER_PORT", "8080"), "SERVER_PORT")?,
            ingest_host: optional("INGEST_HOST", "0.0.0.0"),
            ingest_port: parse(&optional("INGEST_PORT", "5000"), "INGEST_PORT")?,
            serial_port: optional("SERIAL_PORT", "/dev/ttyACM0"),
            serial_baud_rate: parse(&optional("SERIAL_BAUD_RATE", "9600"), "SERIAL_BAUD_RATE")?,
            serial_timeout: Duration::from_millis(parse(
                &optional("SERIAL_TIMEOUT_MS", "1000"),
                "SERIAL_TIMEOUT_MS",
            )?),
            retention_batch_size: parse(
                &optional("RETENTION_BATCH_SIZE", "100"),
                "RETENTION_BATCH_SIZE",
            )?,
            retention_interval: Duration::from_secs(parse(
                &optional("RETENTION_INTERVAL_SECS", "3600"),
                "RETENTION_INTERVAL_SECS",
            )?),
            password: PasswordConfig {
                algorithm: parse(&optional("PBKDF2_HASH_NAME", "sha256"), "PBKDF2_HASH_NAME")?,
                salt_length: parse(&optional("PBKDF2_SALT_LENGTH", "16"), "PBKDF2_SALT_LENGTH")?,
                iterations: parse(&optional("PBKDF2_ITERATIONS", "100000"), "PBKDF2_ITERATIONS")?,
                dk_length: parse(&optional("PBKDF2_DK_LENGTH", "32"), "PBKDF2_DK_LENGTH")?,
            },
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn ingest_addr(&self) -> String {
        format!("{}:{}", self.ingest_host, self.ingest_port)
    }
}

fn parse<T>(raw: &str, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Into<anyhow::Error>,
{
    raw.trim()
        .parse::<T>()
        .map_err(Into::<anyhow::Error>::into)
        .with_context(|| format!("{key} has an invalid value: {raw:?}"))
}

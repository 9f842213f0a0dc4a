use anyhow::{Context, Result, bail};
use dotenvy::dotenv;
use std::{env, fmt::Display, str::FromStr};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    MySql,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" => Ok(StorageBackend::MySql),
            "memory" => Ok(StorageBackend::Memory),
            other => bail!("unknown storage backend `{other}` (expected mysql or memory)"),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub server_addr: String,
    pub jwt_secret: String,
    pub storage_backend: StorageBackend,
    pub database_url: Option<String>,

    // Rate limiting
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Student lookup cache
    pub student_cache_capacity: u64,
    pub student_cache_ttl_secs: u64,

    pub log_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let storage_backend: StorageBackend = env_or("STORAGE_BACKEND", "mysql")?;
        let database_url = env::var("DATABASE_URL").ok();
        if storage_backend == StorageBackend::MySql && database_url.is_none() {
            bail!("DATABASE_URL must be set when STORAGE_BACKEND=mysql");
        }

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            jwt_secret: required("JWT_SECRET")?,
            storage_backend,
            database_url,

            rate_protected_per_min: env_or("RATE_PROTECTED_PER_MIN", "1000")?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            student_cache_capacity: env_or("STUDENT_CACHE_CAPACITY", "50000")?,
            student_cache_ttl_secs: env_or("STUDENT_CACHE_TTL_SECS", "300")?, // default 5 min

            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
        })
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn env_or<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse()
        .map_err(|e| anyhow::anyhow!("invalid {key} value `{raw}`: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_parses_case_insensitively() {
        assert_eq!("MySQL".parse::<StorageBackend>().unwrap(), StorageBackend::MySql);
        assert_eq!("memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert!("azure".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn env_or_falls_back_to_default() {
        let value: u32 = env_or("EDUTRACK_TEST_UNSET_VARIABLE", "42").unwrap();
        assert_eq!(value, 42);
    }
}

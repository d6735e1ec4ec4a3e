use std::env;
use std::time::Duration;

use moss_application::{
    DEFAULT_PERMISSION_CACHE_MAX_ENTRIES, DEFAULT_PERMISSION_CACHE_TTL, PermissionCacheConfig,
};
use moss_core::AppError;

const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub database_max_connections: u32,
    pub permission_cache: PermissionCacheConfig,
    pub seed_system_roles: bool,
}

impl BootstrapConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");
        Self::from_lookup(migrate_only, |name| env::var(name).ok())
    }

    pub fn from_lookup(
        migrate_only: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| AppError::Validation("DATABASE_URL is required".to_owned()))?;

        let database_max_connections = parse_or(
            &lookup,
            "DATABASE_MAX_CONNECTIONS",
            DEFAULT_DATABASE_MAX_CONNECTIONS,
        )?;
        if database_max_connections == 0 {
            return Err(AppError::Validation(
                "DATABASE_MAX_CONNECTIONS must be greater than zero".to_owned(),
            ));
        }

        let ttl_seconds = parse_or(
            &lookup,
            "PERMISSION_CACHE_TTL_SECONDS",
            DEFAULT_PERMISSION_CACHE_TTL.as_secs(),
        )?;
        let max_entries = parse_or(
            &lookup,
            "PERMISSION_CACHE_MAX_ENTRIES",
            DEFAULT_PERMISSION_CACHE_MAX_ENTRIES,
        )?;
        let permission_cache = if ttl_seconds == 0 {
            PermissionCacheConfig::disabled()
        } else {
            PermissionCacheConfig {
                ttl: Duration::from_secs(ttl_seconds),
                max_entries,
            }
        };

        let seed_system_roles = match lookup("AUTHZ_SEED_SYSTEM_ROLES") {
            None => true,
            Some(value) => parse_flag("AUTHZ_SEED_SYSTEM_ROLES", value.as_str())?,
        };

        Ok(Self {
            migrate_only,
            database_url,
            database_max_connections,
            permission_cache,
            seed_system_roles,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = lookup(name).filter(|value| !value.trim().is_empty()) else {
        return Ok(default);
    };

    value
        .trim()
        .parse::<T>()
        .map_err(|error| AppError::Validation(format!("invalid {name} '{value}': {error}")))
}

fn parse_flag(name: &str, value: &str) -> Result<bool, AppError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(AppError::Validation(format!(
            "{name} must be true or false, got '{value}'"
        ))),
    }
}

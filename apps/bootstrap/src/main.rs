//! Moss authorization bootstrap: migrates the schema and seeds system roles.

#![forbid(unsafe_code)]

mod bootstrap_config;

use std::sync::Arc;

use moss_application::{AuthorizationService, SecurityAdminService};
use moss_core::AppError;
use moss_infrastructure::{PostgresAuditRepository, postgres_authorization_stores};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::bootstrap_config::BootstrapConfig;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = BootstrapConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    if config.migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let authorization_service = AuthorizationService::new(
        postgres_authorization_stores(pool.clone()),
        config.permission_cache,
    );
    let security_admin_service = SecurityAdminService::new(
        authorization_service,
        Arc::new(PostgresAuditRepository::new(pool)),
    );

    if config.seed_system_roles {
        let summary = security_admin_service.seed_system_roles().await?;
        info!(
            created_roles = summary.created_roles,
            added_permissions = summary.added_permissions,
            "system roles seeded"
        );
    } else {
        info!("system role seeding disabled");
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

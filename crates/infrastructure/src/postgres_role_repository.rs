use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use moss_application::{RolePermissionRepository, RoleQuery, RoleRepository};
use moss_core::{AppError, AppResult};
use moss_domain::{
    ObjectType, PermissionAction, PermissionGrant, Role, RoleHierarchy, RoleId, RolePermission,
};

/// PostgreSQL-backed role store and role permission catalog.
#[derive(Clone)]
pub struct PostgresRoleRepository {
    pool: PgPool,
}

impl PostgresRoleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    parent_role_id: Option<Uuid>,
    is_system: bool,
}

impl TryFrom<RoleRow> for Role {
    type Error = AppError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        Role::new(
            RoleId::from_uuid(row.id),
            row.name,
            row.description,
            row.parent_role_id.map(RoleId::from_uuid),
            row.is_system,
        )
        .map_err(|error| AppError::Internal(format!("invalid stored role '{}': {error}", row.id)))
    }
}

#[derive(Debug, FromRow)]
struct RolePermissionRow {
    role_id: Uuid,
    object_type: String,
    action: String,
}

impl TryFrom<RolePermissionRow> for RolePermission {
    type Error = AppError;

    fn try_from(row: RolePermissionRow) -> Result<Self, Self::Error> {
        let object_type = ObjectType::from_str(row.object_type.as_str());
        let action = PermissionAction::from_str(row.action.as_str());
        match (object_type, action) {
            (Ok(object_type), Ok(action)) => Ok(RolePermission::new(
                RoleId::from_uuid(row.role_id),
                object_type,
                action,
            )),
            (Err(error), _) | (_, Err(error)) => Err(AppError::Internal(format!(
                "invalid stored grant for role '{}': {error}",
                row.role_id
            ))),
        }
    }
}

fn map_role_write_error(error: sqlx::Error, role: &Role) -> AppError {
    if let sqlx::Error::Database(database_error) = &error {
        match database_error.code().as_deref() {
            Some("23505") => {
                return AppError::Conflict(format!(
                    "role '{}' already exists",
                    role.name().as_str()
                ));
            }
            Some("23503") => {
                return AppError::NotFound(format!(
                    "parent role '{}' does not exist",
                    role.parent_role_id()
                        .map(|value| value.to_string())
                        .unwrap_or_default()
                ));
            }
            _ => {}
        }
    }

    AppError::Internal(format!("failed to persist role: {error}"))
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl RoleRepository for PostgresRoleRepository {
    async fn list_roles(&self, query: &RoleQuery) -> AppResult<Vec<Role>> {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_lowercase);

        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, description, parent_role_id, is_system
            FROM roles
            WHERE ($1::TEXT IS NULL
                    OR strpos(lower(name), $1) > 0
                    OR strpos(lower(coalesce(description, '')), $1) > 0)
                AND ($2::BOOLEAN IS NULL OR is_system = $2)
            ORDER BY name
            LIMIT $3
            OFFSET $4
            "#,
        )
        .bind(search)
        .bind(query.is_system)
        .bind(query.limit.map(to_i64))
        .bind(to_i64(query.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        rows.into_iter().map(Role::try_from).collect()
    }

    async fn find_role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, description, parent_role_id, is_system
            FROM roles
            WHERE id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role: {error}")))?
        .map(Role::try_from)
        .transpose()
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<Role>> {
        sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT id, name, description, parent_role_id, is_system
            FROM roles
            WHERE name = $1
            "#,
        )
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role by name: {error}")))?
        .map(Role::try_from)
        .transpose()
    }

    async fn create_role(&self, role: Role, permissions: &[PermissionGrant]) -> AppResult<Role> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        sqlx::query(
            r#"
            INSERT INTO roles (id, name, description, parent_role_id, is_system)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(role.id().as_uuid())
        .bind(role.name().as_str())
        .bind(role.description())
        .bind(role.parent_role_id().map(|value| value.as_uuid()))
        .bind(role.is_system())
        .execute(&mut *transaction)
        .await
        .map_err(|error| map_role_write_error(error, &role))?;

        for grant in permissions {
            sqlx::query(
                r#"
                INSERT INTO role_permissions (role_id, object_type, action)
                VALUES ($1, $2, $3)
                ON CONFLICT (role_id, object_type, action) DO NOTHING
                "#,
            )
            .bind(role.id().as_uuid())
            .bind(grant.object_type.as_str())
            .bind(grant.action.as_str())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to add role permission: {error}"))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(role)
    }

    async fn update_role(&self, role: Role) -> AppResult<Role> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        // Serializes hierarchy writers across processes while reads continue.
        sqlx::query("LOCK TABLE roles IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *transaction)
            .await
            .map_err(|error| AppError::Internal(format!("failed to lock roles: {error}")))?;

        let edges = sqlx::query_as::<_, (Uuid, Option<Uuid>)>(
            r#"
            SELECT id, parent_role_id
            FROM roles
            "#,
        )
        .fetch_all(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role hierarchy: {error}")))?;

        RoleHierarchy::from_edges(edges.into_iter().map(|(id, parent_role_id)| {
            (
                RoleId::from_uuid(id),
                parent_role_id.map(RoleId::from_uuid),
            )
        }))
        .ensure_acyclic(role.id(), role.parent_role_id())?;

        let rows_affected = sqlx::query(
            r#"
            UPDATE roles
            SET name = $2,
                description = $3,
                parent_role_id = $4,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(role.id().as_uuid())
        .bind(role.name().as_str())
        .bind(role.description())
        .bind(role.parent_role_id().map(|value| value.as_uuid()))
        .execute(&mut *transaction)
        .await
        .map_err(|error| map_role_write_error(error, &role))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "role '{}' does not exist",
                role.id()
            )));
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(role)
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<u64> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        let removed_assignments = sqlx::query(
            r#"
            DELETE FROM role_assignments
            WHERE role_id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to delete role assignments: {error}"))
        })?
        .rows_affected();

        let rows_affected = sqlx::query(
            r#"
            DELETE FROM roles
            WHERE id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete role: {error}")))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "role '{role_id}' does not exist"
            )));
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(removed_assignments)
    }
}

#[async_trait]
impl RolePermissionRepository for PostgresRoleRepository {
    async fn list_permissions_for_roles(
        &self,
        role_ids: &[RoleId],
    ) -> AppResult<Vec<RolePermission>> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }

        let role_ids = role_ids.iter().map(RoleId::as_uuid).collect::<Vec<_>>();
        let rows = sqlx::query_as::<_, RolePermissionRow>(
            r#"
            SELECT role_id, object_type, action
            FROM role_permissions
            WHERE role_id = ANY($1)
            ORDER BY role_id, object_type, action
            "#,
        )
        .bind(role_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list role permissions: {error}")))?;

        rows.into_iter().map(RolePermission::try_from).collect()
    }

    async fn add_permission(&self, permission: RolePermission) -> AppResult<bool> {
        let rows_affected = sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, object_type, action)
            VALUES ($1, $2, $3)
            ON CONFLICT (role_id, object_type, action) DO NOTHING
            "#,
        )
        .bind(permission.role_id.as_uuid())
        .bind(permission.grant.object_type.as_str())
        .bind(permission.grant.action.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if let sqlx::Error::Database(database_error) = &error
                && database_error.code().as_deref() == Some("23503")
            {
                return AppError::NotFound(format!(
                    "role '{}' does not exist",
                    permission.role_id
                ));
            }
            AppError::Internal(format!("failed to add role permission: {error}"))
        })?
        .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn remove_permission(&self, permission: RolePermission) -> AppResult<bool> {
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM role_permissions
            WHERE role_id = $1 AND object_type = $2 AND action = $3
            "#,
        )
        .bind(permission.role_id.as_uuid())
        .bind(permission.grant.object_type.as_str())
        .bind(permission.grant.action.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to remove role permission: {error}"))
        })?
        .rows_affected();

        Ok(rows_affected > 0)
    }
}

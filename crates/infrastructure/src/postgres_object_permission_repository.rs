use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

use moss_application::{ObjectPermissionQuery, ObjectPermissionRepository};
use moss_core::{AppError, AppResult};
use moss_domain::{
    ObjectId, ObjectPermissionId, ObjectPermissionOverride, ObjectType, PermissionAction,
    Subject, UserId,
};

/// PostgreSQL-backed object permission override store.
#[derive(Clone)]
pub struct PostgresObjectPermissionRepository {
    pool: PgPool,
}

impl PostgresObjectPermissionRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ObjectPermissionRow {
    id: Uuid,
    object_type: String,
    object_id: Uuid,
    permission_type: String,
    person_id: Option<Uuid>,
    group_id: Option<Uuid>,
    granted_by: Uuid,
    granted_at: DateTime<Utc>,
}

impl TryFrom<ObjectPermissionRow> for ObjectPermissionOverride {
    type Error = AppError;

    fn try_from(row: ObjectPermissionRow) -> Result<Self, Self::Error> {
        Ok(ObjectPermissionOverride {
            id: ObjectPermissionId::from_uuid(row.id),
            object_type: ObjectType::from_str(row.object_type.as_str())?,
            object_id: ObjectId::from_uuid(row.object_id),
            permission: PermissionAction::from_str(row.permission_type.as_str())?,
            subject: Subject::from_parts(row.person_id, row.group_id)?,
            granted_by: UserId::from_uuid(row.granted_by),
            granted_at: row.granted_at,
        })
    }
}

fn readable_overrides(rows: Vec<ObjectPermissionRow>) -> Vec<ObjectPermissionOverride> {
    rows.into_iter()
        .filter_map(|row| {
            let override_id = row.id;
            match ObjectPermissionOverride::try_from(row) {
                Ok(value) => Some(value),
                Err(error) => {
                    warn!(%override_id, %error, "skipping unreadable object permission");
                    None
                }
            }
        })
        .collect()
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl ObjectPermissionRepository for PostgresObjectPermissionRepository {
    async fn list_overrides(
        &self,
        query: &ObjectPermissionQuery,
    ) -> AppResult<Vec<ObjectPermissionOverride>> {
        let (person_id, group_id) = query
            .subject
            .map(|subject| subject.to_parts())
            .unwrap_or_default();

        let rows = sqlx::query_as::<_, ObjectPermissionRow>(
            r#"
            SELECT id, object_type, object_id, permission_type, person_id, group_id,
                granted_by, granted_at
            FROM object_permissions
            WHERE ($1::TEXT IS NULL OR object_type = $1)
                AND ($2::UUID IS NULL OR object_id = $2)
                AND ($3::UUID IS NULL OR person_id = $3)
                AND ($4::UUID IS NULL OR group_id = $4)
                AND ($5::TEXT IS NULL OR permission_type = $5)
            ORDER BY granted_at, id
            LIMIT $6
            OFFSET $7
            "#,
        )
        .bind(query.object_type.map(|object_type| object_type.as_str()))
        .bind(query.object_id.map(|object_id| object_id.as_uuid()))
        .bind(person_id)
        .bind(group_id)
        .bind(query.permission.map(|permission| permission.as_str()))
        .bind(query.limit.map(to_i64))
        .bind(to_i64(query.offset))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list object permissions: {error}"))
        })?;

        Ok(readable_overrides(rows))
    }

    async fn list_overrides_for_subjects(
        &self,
        subjects: &[Subject],
    ) -> AppResult<Vec<ObjectPermissionOverride>> {
        if subjects.is_empty() {
            return Ok(Vec::new());
        }

        let person_ids = subjects
            .iter()
            .filter_map(Subject::person_id)
            .map(|person_id| person_id.as_uuid())
            .collect::<Vec<_>>();
        let group_ids = subjects
            .iter()
            .filter_map(Subject::group_id)
            .map(|group_id| group_id.as_uuid())
            .collect::<Vec<_>>();

        let rows = sqlx::query_as::<_, ObjectPermissionRow>(
            r#"
            SELECT id, object_type, object_id, permission_type, person_id, group_id,
                granted_by, granted_at
            FROM object_permissions
            WHERE person_id = ANY($1) OR group_id = ANY($2)
            ORDER BY granted_at, id
            "#,
        )
        .bind(person_ids)
        .bind(group_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list subject object permissions: {error}"
            ))
        })?;

        Ok(readable_overrides(rows))
    }

    async fn find_override(
        &self,
        override_id: ObjectPermissionId,
    ) -> AppResult<Option<ObjectPermissionOverride>> {
        sqlx::query_as::<_, ObjectPermissionRow>(
            r#"
            SELECT id, object_type, object_id, permission_type, person_id, group_id,
                granted_by, granted_at
            FROM object_permissions
            WHERE id = $1
            "#,
        )
        .bind(override_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find object permission: {error}")))?
        .map(ObjectPermissionOverride::try_from)
        .transpose()
    }

    async fn create_override(
        &self,
        object_permission: ObjectPermissionOverride,
    ) -> AppResult<ObjectPermissionOverride> {
        let (person_id, group_id) = object_permission.subject.to_parts();
        sqlx::query(
            r#"
            INSERT INTO object_permissions (
                id,
                object_type,
                object_id,
                permission_type,
                person_id,
                group_id,
                granted_by,
                granted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(object_permission.id.as_uuid())
        .bind(object_permission.object_type.as_str())
        .bind(object_permission.object_id.as_uuid())
        .bind(object_permission.permission.as_str())
        .bind(person_id)
        .bind(group_id)
        .bind(object_permission.granted_by.as_uuid())
        .bind(object_permission.granted_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if let sqlx::Error::Database(database_error) = &error {
                match database_error.code().as_deref() {
                    Some("23505") => {
                        return AppError::Conflict(format!(
                            "{} already holds {} on {}:{}",
                            object_permission.subject,
                            object_permission.permission,
                            object_permission.object_type,
                            object_permission.object_id
                        ));
                    }
                    Some("23503") => {
                        return AppError::NotFound(format!(
                            "{} does not exist",
                            object_permission.subject
                        ));
                    }
                    _ => {}
                }
            }
            AppError::Internal(format!("failed to create object permission: {error}"))
        })?;

        Ok(object_permission)
    }

    async fn delete_override(
        &self,
        override_id: ObjectPermissionId,
    ) -> AppResult<ObjectPermissionOverride> {
        sqlx::query_as::<_, ObjectPermissionRow>(
            r#"
            DELETE FROM object_permissions
            WHERE id = $1
            RETURNING id, object_type, object_id, permission_type, person_id, group_id,
                granted_by, granted_at
            "#,
        )
        .bind(override_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to delete object permission: {error}"))
        })?
        .ok_or_else(|| {
            AppError::NotFound(format!("object permission '{override_id}' does not exist"))
        })
        .and_then(ObjectPermissionOverride::try_from)
    }
}

#[cfg(test)]
mod tests;

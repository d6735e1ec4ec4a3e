use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::warn;
use uuid::Uuid;

use moss_application::{RoleAssignmentQuery, RoleAssignmentRepository};
use moss_core::{AppError, AppResult};
use moss_domain::{
    AssignmentId, LocationId, ObjectId, RoleAssignment, RoleId, RoleScope, ScopeKind, Subject,
    UserId,
};

const SELECT_ASSIGNMENTS: &str = r#"
    SELECT
        ra.id,
        ra.role_id,
        ra.person_id,
        ra.group_id,
        ra.scope,
        ra.granted_by,
        ra.granted_at,
        ra.notes,
        ARRAY(
            SELECT location_id
            FROM role_assignment_locations
            WHERE assignment_id = ra.id
            ORDER BY location_id
        ) AS location_ids,
        ARRAY(
            SELECT object_id
            FROM role_assignment_objects
            WHERE assignment_id = ra.id
            ORDER BY object_id
        ) AS object_ids
    FROM role_assignments ra
"#;

/// PostgreSQL-backed role assignment store.
#[derive(Clone)]
pub struct PostgresRoleAssignmentRepository {
    pool: PgPool,
}

impl PostgresRoleAssignmentRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RoleAssignmentRow {
    id: Uuid,
    role_id: Uuid,
    person_id: Option<Uuid>,
    group_id: Option<Uuid>,
    scope: String,
    granted_by: Uuid,
    granted_at: DateTime<Utc>,
    notes: Option<String>,
    location_ids: Vec<Uuid>,
    object_ids: Vec<Uuid>,
}

impl TryFrom<RoleAssignmentRow> for RoleAssignment {
    type Error = AppError;

    fn try_from(row: RoleAssignmentRow) -> Result<Self, Self::Error> {
        let subject = Subject::from_parts(row.person_id, row.group_id)?;
        let scope = RoleScope::from_parts(
            ScopeKind::from_str(row.scope.as_str())?,
            row.location_ids.into_iter().map(LocationId::from_uuid),
            row.object_ids.into_iter().map(ObjectId::from_uuid),
        )?;

        Ok(RoleAssignment {
            id: AssignmentId::from_uuid(row.id),
            role_id: RoleId::from_uuid(row.role_id),
            subject,
            scope,
            granted_by: UserId::from_uuid(row.granted_by),
            granted_at: row.granted_at,
            notes: row.notes,
        })
    }
}

/// Converts rows for listings, skipping any whose subject or scope is unreadable.
fn readable_assignments(rows: Vec<RoleAssignmentRow>) -> Vec<RoleAssignment> {
    rows.into_iter()
        .filter_map(|row| {
            let assignment_id = row.id;
            match RoleAssignment::try_from(row) {
                Ok(assignment) => Some(assignment),
                Err(error) => {
                    warn!(%assignment_id, %error, "skipping unreadable role assignment");
                    None
                }
            }
        })
        .collect()
}

fn scope_columns(scope: &RoleScope) -> (Vec<Uuid>, Vec<Uuid>) {
    match scope {
        RoleScope::Global => (Vec::new(), Vec::new()),
        RoleScope::Location { location_ids } => (
            location_ids.iter().map(LocationId::as_uuid).collect(),
            Vec::new(),
        ),
        RoleScope::SpecificObjects { object_ids } => (
            Vec::new(),
            object_ids.iter().map(ObjectId::as_uuid).collect(),
        ),
    }
}

fn split_subjects(subjects: &[Subject]) -> (Vec<Uuid>, Vec<Uuid>) {
    let person_ids = subjects
        .iter()
        .filter_map(Subject::person_id)
        .map(|person_id| person_id.as_uuid())
        .collect();
    let group_ids = subjects
        .iter()
        .filter_map(Subject::group_id)
        .map(|group_id| group_id.as_uuid())
        .collect();
    (person_ids, group_ids)
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn map_assignment_write_error(error: sqlx::Error, assignment: &RoleAssignment) -> AppError {
    if let sqlx::Error::Database(database_error) = &error {
        match database_error.code().as_deref() {
            Some("23505") => {
                return AppError::Conflict(format!(
                    "{} already holds role '{}'",
                    assignment.subject, assignment.role_id
                ));
            }
            Some("23503") => {
                return AppError::NotFound(format!(
                    "role '{}' or {} does not exist",
                    assignment.role_id, assignment.subject
                ));
            }
            _ => {}
        }
    }

    AppError::Internal(format!("failed to persist role assignment: {error}"))
}

async fn replace_scope_rows(
    transaction: &mut Transaction<'_, Postgres>,
    assignment_id: AssignmentId,
    scope: &RoleScope,
) -> AppResult<()> {
    sqlx::query("DELETE FROM role_assignment_locations WHERE assignment_id = $1")
        .bind(assignment_id.as_uuid())
        .execute(&mut **transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to clear assignment locations: {error}"))
        })?;
    sqlx::query("DELETE FROM role_assignment_objects WHERE assignment_id = $1")
        .bind(assignment_id.as_uuid())
        .execute(&mut **transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to clear assignment objects: {error}"))
        })?;

    let (location_ids, object_ids) = scope_columns(scope);
    if !location_ids.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO role_assignment_locations (assignment_id, location_id)
            SELECT $1, location_id
            FROM UNNEST($2::UUID[]) AS location_id
            "#,
        )
        .bind(assignment_id.as_uuid())
        .bind(location_ids)
        .execute(&mut **transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to save assignment locations: {error}"))
        })?;
    }
    if !object_ids.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO role_assignment_objects (assignment_id, object_id)
            SELECT $1, object_id
            FROM UNNEST($2::UUID[]) AS object_id
            "#,
        )
        .bind(assignment_id.as_uuid())
        .bind(object_ids)
        .execute(&mut **transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to save assignment objects: {error}"))
        })?;
    }

    Ok(())
}

async fn fetch_assignment(
    transaction: &mut Transaction<'_, Postgres>,
    assignment_id: AssignmentId,
) -> AppResult<Option<RoleAssignment>> {
    let sql = format!("{SELECT_ASSIGNMENTS} WHERE ra.id = $1");
    sqlx::query_as::<_, RoleAssignmentRow>(sql.as_str())
        .bind(assignment_id.as_uuid())
        .fetch_optional(&mut **transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role assignment: {error}")))?
        .map(RoleAssignment::try_from)
        .transpose()
}

#[async_trait]
impl RoleAssignmentRepository for PostgresRoleAssignmentRepository {
    async fn list_assignments(
        &self,
        query: &RoleAssignmentQuery,
    ) -> AppResult<Vec<RoleAssignment>> {
        let (person_id, group_id) = query
            .subject
            .map(|subject| subject.to_parts())
            .unwrap_or_default();
        let sql = format!(
            r#"{SELECT_ASSIGNMENTS}
            WHERE ($1::UUID IS NULL OR ra.person_id = $1)
                AND ($2::UUID IS NULL OR ra.group_id = $2)
                AND ($3::UUID IS NULL OR ra.role_id = $3)
                AND ($4::TEXT IS NULL OR ra.scope = $4)
            ORDER BY ra.granted_at, ra.id
            LIMIT $5
            OFFSET $6
            "#
        );

        let rows = sqlx::query_as::<_, RoleAssignmentRow>(sql.as_str())
            .bind(person_id)
            .bind(group_id)
            .bind(query.role_id.map(|role_id| role_id.as_uuid()))
            .bind(query.scope.map(|kind| kind.as_str()))
            .bind(query.limit.map(to_i64))
            .bind(to_i64(query.offset))
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to list role assignments: {error}"))
            })?;

        Ok(readable_assignments(rows))
    }

    async fn list_assignments_for_subjects(
        &self,
        subjects: &[Subject],
    ) -> AppResult<Vec<RoleAssignment>> {
        if subjects.is_empty() {
            return Ok(Vec::new());
        }

        let (person_ids, group_ids) = split_subjects(subjects);
        let sql = format!(
            r#"{SELECT_ASSIGNMENTS}
            WHERE ra.person_id = ANY($1) OR ra.group_id = ANY($2)
            ORDER BY ra.granted_at, ra.id
            "#
        );

        let rows = sqlx::query_as::<_, RoleAssignmentRow>(sql.as_str())
            .bind(person_ids)
            .bind(group_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to list subject role assignments: {error}"))
            })?;

        Ok(readable_assignments(rows))
    }

    async fn list_assignments_for_roles(
        &self,
        role_ids: &[RoleId],
    ) -> AppResult<Vec<RoleAssignment>> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }

        let role_ids = role_ids.iter().map(RoleId::as_uuid).collect::<Vec<_>>();
        let sql = format!(
            r#"{SELECT_ASSIGNMENTS}
            WHERE ra.role_id = ANY($1)
            ORDER BY ra.granted_at, ra.id
            "#
        );

        let rows = sqlx::query_as::<_, RoleAssignmentRow>(sql.as_str())
            .bind(role_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to list role holders: {error}"))
            })?;

        Ok(readable_assignments(rows))
    }

    async fn find_assignment(
        &self,
        assignment_id: AssignmentId,
    ) -> AppResult<Option<RoleAssignment>> {
        let sql = format!("{SELECT_ASSIGNMENTS} WHERE ra.id = $1");
        sqlx::query_as::<_, RoleAssignmentRow>(sql.as_str())
            .bind(assignment_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to find role assignment: {error}"))
            })?
            .map(RoleAssignment::try_from)
            .transpose()
    }

    async fn create_assignment(&self, assignment: RoleAssignment) -> AppResult<RoleAssignment> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        let (person_id, group_id) = assignment.subject.to_parts();
        sqlx::query(
            r#"
            INSERT INTO role_assignments (
                id,
                role_id,
                person_id,
                group_id,
                scope,
                granted_by,
                granted_at,
                notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(assignment.id.as_uuid())
        .bind(assignment.role_id.as_uuid())
        .bind(person_id)
        .bind(group_id)
        .bind(assignment.scope.kind().as_str())
        .bind(assignment.granted_by.as_uuid())
        .bind(assignment.granted_at)
        .bind(assignment.notes.as_deref())
        .execute(&mut *transaction)
        .await
        .map_err(|error| map_assignment_write_error(error, &assignment))?;

        replace_scope_rows(&mut transaction, assignment.id, &assignment.scope).await?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(assignment)
    }

    async fn update_assignment(
        &self,
        assignment_id: AssignmentId,
        scope: RoleScope,
        notes: Option<String>,
    ) -> AppResult<RoleAssignment> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        let rows_affected = sqlx::query(
            r#"
            UPDATE role_assignments
            SET scope = $2,
                notes = $3
            WHERE id = $1
            "#,
        )
        .bind(assignment_id.as_uuid())
        .bind(scope.kind().as_str())
        .bind(notes.as_deref())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update role assignment: {error}")))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "role assignment '{assignment_id}' does not exist"
            )));
        }

        replace_scope_rows(&mut transaction, assignment_id, &scope).await?;
        let updated = fetch_assignment(&mut transaction, assignment_id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "role assignment '{assignment_id}' vanished during update"
                ))
            })?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(updated)
    }

    async fn delete_assignment(&self, assignment_id: AssignmentId) -> AppResult<RoleAssignment> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        let existing = fetch_assignment(&mut transaction, assignment_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("role assignment '{assignment_id}' does not exist"))
            })?;

        sqlx::query(
            r#"
            DELETE FROM role_assignments
            WHERE id = $1
            "#,
        )
        .bind(assignment_id.as_uuid())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete role assignment: {error}")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(existing)
    }
}

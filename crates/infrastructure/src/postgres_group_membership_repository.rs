use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use moss_application::GroupMembershipRepository;
use moss_core::{AppError, AppResult};
use moss_domain::{GroupId, GroupMembership, PersonId};

/// PostgreSQL-backed one-level group membership resolver.
#[derive(Clone)]
pub struct PostgresGroupMembershipRepository {
    pool: PgPool,
}

impl PostgresGroupMembershipRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates an empty group and returns its identifier.
    pub async fn create_group(&self, name: &str) -> AppResult<GroupId> {
        let group_id = GroupId::new();
        sqlx::query(
            r#"
            INSERT INTO groups (id, name)
            VALUES ($1, $2)
            "#,
        )
        .bind(group_id.as_uuid())
        .bind(name.trim())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to create group: {error}")))?;

        Ok(group_id)
    }
}

#[async_trait]
impl GroupMembershipRepository for PostgresGroupMembershipRepository {
    async fn list_groups_for_person(&self, person_id: PersonId) -> AppResult<Vec<GroupId>> {
        let group_ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT group_id
            FROM group_members
            WHERE person_id = $1
            ORDER BY group_id
            "#,
        )
        .bind(person_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list person groups: {error}")))?;

        Ok(group_ids.into_iter().map(GroupId::from_uuid).collect())
    }

    async fn list_group_members(&self, group_id: GroupId) -> AppResult<Vec<PersonId>> {
        let person_ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT person_id
            FROM group_members
            WHERE group_id = $1
            ORDER BY person_id
            "#,
        )
        .bind(group_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list group members: {error}")))?;

        Ok(person_ids.into_iter().map(PersonId::from_uuid).collect())
    }

    async fn add_group_member(&self, membership: GroupMembership) -> AppResult<bool> {
        let rows_affected = sqlx::query(
            r#"
            INSERT INTO group_members (group_id, person_id)
            VALUES ($1, $2)
            ON CONFLICT (group_id, person_id) DO NOTHING
            "#,
        )
        .bind(membership.group_id.as_uuid())
        .bind(membership.person_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            if let sqlx::Error::Database(database_error) = &error
                && database_error.code().as_deref() == Some("23503")
            {
                return AppError::NotFound(format!(
                    "group '{}' does not exist",
                    membership.group_id
                ));
            }
            AppError::Internal(format!("failed to add group member: {error}"))
        })?
        .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn remove_group_member(&self, membership: GroupMembership) -> AppResult<bool> {
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM group_members
            WHERE group_id = $1 AND person_id = $2
            "#,
        )
        .bind(membership.group_id.as_uuid())
        .bind(membership.person_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to remove group member: {error}")))?
        .rows_affected();

        Ok(rows_affected > 0)
    }
}

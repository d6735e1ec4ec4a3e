use chrono::Utc;
use moss_application::{ObjectPermissionQuery, ObjectPermissionRepository};
use moss_core::AppError;
use moss_domain::{
    GroupId, ObjectId, ObjectPermissionId, ObjectPermissionOverride, ObjectType,
    PermissionAction, PersonId, Subject, UserId,
};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use super::PostgresObjectPermissionRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres object permission tests: {error}");
    }

    Some(pool)
}

fn override_for(
    subject: Subject,
    object_id: ObjectId,
    permission: PermissionAction,
) -> ObjectPermissionOverride {
    ObjectPermissionOverride {
        id: ObjectPermissionId::new(),
        object_type: ObjectType::Device,
        object_id,
        permission,
        subject,
        granted_by: UserId::new(),
        granted_at: Utc::now(),
    }
}

#[tokio::test]
async fn duplicate_override_is_conflict() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresObjectPermissionRepository::new(pool);
    let subject = Subject::Person(PersonId::new());
    let object_id = ObjectId::new();

    let first = repository
        .create_override(override_for(subject, object_id, PermissionAction::Edit))
        .await;
    let second = repository
        .create_override(override_for(subject, object_id, PermissionAction::Edit))
        .await;
    let other_action = repository
        .create_override(override_for(subject, object_id, PermissionAction::View))
        .await;

    assert!(first.is_ok());
    assert!(matches!(second, Err(AppError::Conflict(_))));
    assert!(other_action.is_ok());
}

#[tokio::test]
async fn unknown_group_is_not_found() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresObjectPermissionRepository::new(pool);
    let result = repository
        .create_override(override_for(
            Subject::Group(GroupId::new()),
            ObjectId::new(),
            PermissionAction::View,
        ))
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn overrides_are_listed_by_subject_and_object() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresObjectPermissionRepository::new(pool);
    let person_id = PersonId::new();
    let object_id = ObjectId::new();
    for permission in [PermissionAction::View, PermissionAction::Delete] {
        let created = repository
            .create_override(override_for(Subject::Person(person_id), object_id, permission))
            .await;
        assert!(created.is_ok());
    }

    let for_subject = repository
        .list_overrides_for_subjects(&[Subject::Person(person_id)])
        .await;
    let deletes = repository
        .list_overrides(&ObjectPermissionQuery {
            object_id: Some(object_id),
            permission: Some(PermissionAction::Delete),
            ..ObjectPermissionQuery::default()
        })
        .await;

    assert!(matches!(for_subject, Ok(ref values) if values.len() == 2));
    assert!(matches!(
        deletes,
        Ok(ref values) if values.len() == 1 && values[0].object_type == ObjectType::Device
    ));
}

#[tokio::test]
async fn delete_override_returns_removed_row() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let repository = PostgresObjectPermissionRepository::new(pool);
    let Ok(created) = repository
        .create_override(override_for(
            Subject::Person(PersonId::new()),
            ObjectId::new(),
            PermissionAction::ManagePermissions,
        ))
        .await
    else {
        panic!("override should be stored");
    };

    let removed = repository.delete_override(created.id).await;

    assert!(matches!(
        removed,
        Ok(ref value) if value.id == created.id
            && value.permission == PermissionAction::ManagePermissions
    ));
    assert!(matches!(repository.find_override(created.id).await, Ok(None)));
    assert!(matches!(
        repository.delete_override(created.id).await,
        Err(AppError::NotFound(_))
    ));
}

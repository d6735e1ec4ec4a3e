use std::sync::Arc;
use std::sync::atomic::Ordering;

use moss_core::{AppError, Session, UserRole};
use moss_domain::{
    AuditAction, ObjectId, ObjectType, PermissionAction, PermissionGrant, PersonId, RoleId,
    RoleScope, Subject,
};

use crate::test_support::{
    FakeAuditRepository, FakeAuthorizationStore, authorization_service, session_with_role,
};
use crate::{
    CreateRoleAssignmentInput, CreateRoleInput, GrantObjectPermissionInput, RoleQuery,
    UpdateRoleAssignmentInput, UpdateRoleInput,
};

use super::{SYSTEM_ROLE_ADMIN, SYSTEM_ROLE_EDITOR, SYSTEM_ROLE_VIEWER, SecurityAdminService};

struct Fixture {
    store: Arc<FakeAuthorizationStore>,
    audit: Arc<FakeAuditRepository>,
    service: SecurityAdminService,
    admin: Session,
}

fn fixture() -> Fixture {
    let store = Arc::new(FakeAuthorizationStore::default());
    let audit = Arc::new(FakeAuditRepository::default());
    let service = SecurityAdminService::new(authorization_service(&store), audit.clone());

    Fixture {
        store,
        audit,
        service,
        admin: session_with_role(UserRole::Admin),
    }
}

fn role_input(name: &str, parent_role_id: Option<RoleId>) -> CreateRoleInput {
    CreateRoleInput {
        name: name.to_owned(),
        description: None,
        parent_role_id,
        permissions: Vec::new(),
    }
}

fn grant(object_type: ObjectType, action: PermissionAction) -> PermissionGrant {
    PermissionGrant::new(object_type, action)
}

async fn create_role(fixture: &Fixture, name: &str, parent_role_id: Option<RoleId>) -> RoleId {
    let Ok(role) = fixture
        .service
        .create_role(&fixture.admin, role_input(name, parent_role_id))
        .await
    else {
        panic!("role '{name}' should be created");
    };
    role.id()
}

async fn assign_globally(fixture: &Fixture, role_id: RoleId, subject: Subject) {
    let result = fixture
        .service
        .assign_role(
            &fixture.admin,
            CreateRoleAssignmentInput {
                role_id,
                subject,
                scope: RoleScope::Global,
                notes: None,
            },
        )
        .await;
    assert!(result.is_ok());
}

async fn can(fixture: &Fixture, person_id: PersonId, object_type: ObjectType, action: PermissionAction) -> bool {
    fixture
        .service
        .authorization_service()
        .has_permission(person_id, object_type, action, None)
        .await
        .unwrap_or_else(|error| panic!("check should succeed: {error}"))
}

#[tokio::test]
async fn non_admin_cannot_create_roles() {
    let fixture = fixture();
    let result = fixture
        .service
        .create_role(&session_with_role(UserRole::User), role_input("Ops", None))
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn create_role_attaches_initial_grants_and_audits() {
    let fixture = fixture();
    let result = fixture
        .service
        .create_role(
            &fixture.admin,
            CreateRoleInput {
                name: "  Network Team ".to_owned(),
                description: Some("Runs the network".to_owned()),
                parent_role_id: None,
                permissions: vec![
                    grant(ObjectType::Network, PermissionAction::View),
                    grant(ObjectType::Network, PermissionAction::Edit),
                ],
            },
        )
        .await;

    let Ok(role) = result else {
        panic!("role should be created");
    };
    assert_eq!(role.name().as_str(), "Network Team");
    let permissions = fixture
        .service
        .list_role_permissions(&fixture.admin, role.id())
        .await
        .unwrap_or_default();
    assert_eq!(permissions.len(), 2);

    let events = fixture.audit.events.lock().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action, AuditAction::RoleCreated);
}

#[tokio::test]
async fn create_role_rejects_unknown_parent_and_duplicate_name() {
    let fixture = fixture();
    create_role(&fixture, "Ops", None).await;

    let unknown_parent = fixture
        .service
        .create_role(&fixture.admin, role_input("Child", Some(RoleId::new())))
        .await;
    let duplicate = fixture
        .service
        .create_role(&fixture.admin, role_input("Ops", None))
        .await;

    assert!(matches!(unknown_parent, Err(AppError::NotFound(_))));
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn reparenting_under_descendant_is_rejected_without_changes() {
    let fixture = fixture();
    let root = create_role(&fixture, "Root", None).await;
    let middle = create_role(&fixture, "Middle", Some(root)).await;
    let leaf = create_role(&fixture, "Leaf", Some(middle)).await;

    let result = fixture
        .service
        .update_role(
            &fixture.admin,
            root,
            UpdateRoleInput {
                name: Some("Renamed Root".to_owned()),
                parent_role_id: Some(Some(leaf)),
                ..UpdateRoleInput::default()
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::InvalidHierarchy(_))));
    let unchanged = fixture.service.get_role(&fixture.admin, root).await;
    assert!(matches!(
        unchanged,
        Ok(ref role) if role.parent_role_id().is_none() && role.name().as_str() == "Root"
    ));
}

#[tokio::test]
async fn reparenting_refreshes_cached_decisions_of_holders() {
    let fixture = fixture();
    let granting = create_role(&fixture, "Granting", None).await;
    let held = create_role(&fixture, "Held", None).await;
    assert!(
        fixture
            .service
            .grant_role_permission(
                &fixture.admin,
                granting,
                grant(ObjectType::Contract, PermissionAction::View),
            )
            .await
            .is_ok()
    );
    let person_id = PersonId::new();
    assign_globally(&fixture, held, Subject::Person(person_id)).await;
    assert!(!can(&fixture, person_id, ObjectType::Contract, PermissionAction::View).await);

    let result = fixture
        .service
        .update_role(
            &fixture.admin,
            held,
            UpdateRoleInput {
                parent_role_id: Some(Some(granting)),
                ..UpdateRoleInput::default()
            },
        )
        .await;

    assert!(result.is_ok());
    assert!(can(&fixture, person_id, ObjectType::Contract, PermissionAction::View).await);
}

#[tokio::test]
async fn system_roles_are_immutable() {
    let fixture = fixture();
    let system_role = fixture.store.seed_system_role("viewer").await;

    let update = fixture
        .service
        .update_role(
            &fixture.admin,
            system_role,
            UpdateRoleInput {
                name: Some("reader".to_owned()),
                ..UpdateRoleInput::default()
            },
        )
        .await;
    let delete = fixture.service.delete_role(&fixture.admin, system_role).await;
    let grant_result = fixture
        .service
        .grant_role_permission(
            &fixture.admin,
            system_role,
            grant(ObjectType::Device, PermissionAction::Delete),
        )
        .await;

    assert!(matches!(update, Err(AppError::Forbidden(_))));
    assert!(matches!(delete, Err(AppError::Forbidden(_))));
    assert!(matches!(grant_result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn granting_twice_is_idempotent() {
    let fixture = fixture();
    let role_id = create_role(&fixture, "Ops", None).await;
    let device_view = grant(ObjectType::Device, PermissionAction::View);

    let first = fixture
        .service
        .grant_role_permission(&fixture.admin, role_id, device_view)
        .await;
    let second = fixture
        .service
        .grant_role_permission(&fixture.admin, role_id, device_view)
        .await;

    assert!(matches!(first, Ok(true)));
    assert!(matches!(second, Ok(false)));
    let permissions = fixture
        .service
        .list_role_permissions(&fixture.admin, role_id)
        .await
        .unwrap_or_default();
    assert_eq!(permissions.len(), 1);
    let granted_events = fixture
        .audit
        .events
        .lock()
        .await
        .iter()
        .filter(|event| event.action == AuditAction::RolePermissionGranted)
        .count();
    assert_eq!(granted_events, 1);
}

#[tokio::test]
async fn parent_grant_reaches_cached_child_holder_immediately() {
    let fixture = fixture();
    let parent = create_role(&fixture, "Parent", None).await;
    let child = create_role(&fixture, "Child", Some(parent)).await;
    let person_id = PersonId::new();
    assign_globally(&fixture, child, Subject::Person(person_id)).await;
    assert!(!can(&fixture, person_id, ObjectType::Device, PermissionAction::View).await);

    let granted = fixture
        .service
        .grant_role_permission(
            &fixture.admin,
            parent,
            grant(ObjectType::Device, PermissionAction::View),
        )
        .await;
    assert!(matches!(granted, Ok(true)));
    assert!(can(&fixture, person_id, ObjectType::Device, PermissionAction::View).await);

    let revoked = fixture
        .service
        .revoke_role_permission(
            &fixture.admin,
            parent,
            grant(ObjectType::Device, PermissionAction::View),
        )
        .await;
    assert!(matches!(revoked, Ok(true)));
    assert!(!can(&fixture, person_id, ObjectType::Device, PermissionAction::View).await);
}

#[tokio::test]
async fn assign_role_rejects_unknown_role_and_duplicates() {
    let fixture = fixture();
    let role_id = create_role(&fixture, "Ops", None).await;
    let subject = Subject::Person(PersonId::new());
    assign_globally(&fixture, role_id, subject).await;

    let duplicate = fixture
        .service
        .assign_role(
            &fixture.admin,
            CreateRoleAssignmentInput {
                role_id,
                subject,
                scope: RoleScope::Global,
                notes: None,
            },
        )
        .await;
    let unknown = fixture
        .service
        .assign_role(
            &fixture.admin,
            CreateRoleAssignmentInput {
                role_id: RoleId::new(),
                subject,
                scope: RoleScope::Global,
                notes: None,
            },
        )
        .await;

    assert!(matches!(duplicate, Err(AppError::Conflict(_))));
    assert!(matches!(unknown, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn narrowing_and_revoking_assignment_updates_decisions() {
    let fixture = fixture();
    let role_id = create_role(&fixture, "Ops", None).await;
    assert!(
        fixture
            .service
            .grant_role_permission(&fixture.admin, role_id, grant(ObjectType::Room, PermissionAction::Edit))
            .await
            .is_ok()
    );
    let person_id = PersonId::new();
    assign_globally(&fixture, role_id, Subject::Person(person_id)).await;
    assert!(can(&fixture, person_id, ObjectType::Room, PermissionAction::Edit).await);

    let assignments = fixture
        .service
        .list_role_assignments(&fixture.admin, &crate::RoleAssignmentQuery::default())
        .await
        .unwrap_or_default();
    assert_eq!(assignments.len(), 1);
    let assignment_id = assignments[0].id;

    let Ok(scope) = RoleScope::specific_objects([ObjectId::new()]) else {
        panic!("scope should be valid");
    };
    let updated = fixture
        .service
        .update_role_assignment(
            &fixture.admin,
            assignment_id,
            UpdateRoleAssignmentInput {
                scope: Some(scope),
                notes: Some(Some("  narrowed ".to_owned())),
            },
        )
        .await;
    assert!(matches!(updated, Ok(ref value) if value.notes.as_deref() == Some("narrowed")));
    assert!(!can(&fixture, person_id, ObjectType::Room, PermissionAction::Edit).await);

    let revoked = fixture
        .service
        .revoke_role_assignment(&fixture.admin, assignment_id)
        .await;
    assert!(revoked.is_ok());
    let missing = fixture
        .service
        .revoke_role_assignment(&fixture.admin, assignment_id)
        .await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn group_membership_changes_refresh_member_decisions() {
    let fixture = fixture();
    let role_id = create_role(&fixture, "Helpdesk", None).await;
    assert!(
        fixture
            .service
            .grant_role_permission(&fixture.admin, role_id, grant(ObjectType::Person, PermissionAction::View))
            .await
            .is_ok()
    );
    let group_id = fixture.store.seed_group(&[]).await;
    assign_globally(&fixture, role_id, Subject::Group(group_id)).await;
    let person_id = PersonId::new();
    assert!(!can(&fixture, person_id, ObjectType::Person, PermissionAction::View).await);

    let added = fixture
        .service
        .add_group_member(&fixture.admin, group_id, person_id)
        .await;
    assert!(matches!(added, Ok(true)));
    assert!(can(&fixture, person_id, ObjectType::Person, PermissionAction::View).await);

    let again = fixture
        .service
        .add_group_member(&fixture.admin, group_id, person_id)
        .await;
    assert!(matches!(again, Ok(false)));

    let removed = fixture
        .service
        .remove_group_member(&fixture.admin, group_id, person_id)
        .await;
    assert!(matches!(removed, Ok(true)));
    assert!(!can(&fixture, person_id, ObjectType::Person, PermissionAction::View).await);
}

#[tokio::test]
async fn object_permission_grant_and_revoke() {
    let fixture = fixture();
    let person_id = PersonId::new();
    let object_id = ObjectId::new();
    let input = GrantObjectPermissionInput {
        object_type: ObjectType::Device,
        object_id,
        permission: PermissionAction::Edit,
        subject: Subject::Person(person_id),
    };
    let authorization = fixture.service.authorization_service();
    let before = authorization
        .has_permission(person_id, ObjectType::Device, PermissionAction::Edit, Some(object_id))
        .await;
    assert!(matches!(before, Ok(false)));

    let Ok(granted) = fixture
        .service
        .grant_object_permission(&fixture.admin, input)
        .await
    else {
        panic!("override should be granted");
    };
    let duplicate = fixture
        .service
        .grant_object_permission(&fixture.admin, input)
        .await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    let during = authorization
        .has_permission(person_id, ObjectType::Device, PermissionAction::Edit, Some(object_id))
        .await;
    assert!(matches!(during, Ok(true)));

    let revoked = fixture
        .service
        .revoke_object_permission(&fixture.admin, granted.id)
        .await;
    assert!(revoked.is_ok());
    let after = authorization
        .has_permission(person_id, ObjectType::Device, PermissionAction::Edit, Some(object_id))
        .await;
    assert!(matches!(after, Ok(false)));
}

#[tokio::test]
async fn deleting_role_cascades_and_orphans_children() {
    let fixture = fixture();
    let parent = create_role(&fixture, "Parent", None).await;
    let child = create_role(&fixture, "Child", Some(parent)).await;
    assert!(
        fixture
            .service
            .grant_role_permission(&fixture.admin, parent, grant(ObjectType::Io, PermissionAction::View))
            .await
            .is_ok()
    );
    let parent_holder = PersonId::new();
    let child_holder = PersonId::new();
    assign_globally(&fixture, parent, Subject::Person(parent_holder)).await;
    assign_globally(&fixture, child, Subject::Person(child_holder)).await;
    assert!(can(&fixture, parent_holder, ObjectType::Io, PermissionAction::View).await);
    assert!(can(&fixture, child_holder, ObjectType::Io, PermissionAction::View).await);

    let deleted = fixture.service.delete_role(&fixture.admin, parent).await;

    assert!(matches!(deleted, Ok(ref value) if value.removed_assignments == 1));
    assert!(!can(&fixture, parent_holder, ObjectType::Io, PermissionAction::View).await);
    assert!(!can(&fixture, child_holder, ObjectType::Io, PermissionAction::View).await);
    let orphan = fixture.service.get_role(&fixture.admin, child).await;
    assert!(matches!(orphan, Ok(ref role) if role.parent_role_id().is_none()));
}

#[tokio::test]
async fn list_roles_filters_by_search_and_system_flag() {
    let fixture = fixture();
    create_role(&fixture, "Network Admins", None).await;
    create_role(&fixture, "Helpdesk", None).await;
    fixture.store.seed_system_role("viewer").await;

    let searched = fixture
        .service
        .list_roles(
            &fixture.admin,
            &RoleQuery {
                search: Some("network".to_owned()),
                ..RoleQuery::default()
            },
        )
        .await
        .unwrap_or_default();
    let system = fixture
        .service
        .list_roles(
            &fixture.admin,
            &RoleQuery {
                is_system: Some(true),
                ..RoleQuery::default()
            },
        )
        .await
        .unwrap_or_default();

    assert_eq!(searched.len(), 1);
    assert_eq!(system.len(), 1);
    assert!(system[0].is_system());
}

#[tokio::test]
async fn seeding_system_roles_is_idempotent() {
    let fixture = fixture();

    let first = fixture.service.seed_system_roles().await;
    let second = fixture.service.seed_system_roles().await;

    let object_types = ObjectType::all().len();
    assert!(matches!(
        first,
        Ok(summary) if summary.created_roles == 3 && summary.added_permissions == object_types * 4
    ));
    assert!(matches!(
        second,
        Ok(summary) if summary.created_roles == 0 && summary.added_permissions == 0
    ));

    let roles = fixture
        .service
        .list_roles(&fixture.admin, &RoleQuery::default())
        .await
        .unwrap_or_default();
    let find = |name: &str| roles.iter().find(|role| role.name().as_str() == name).cloned();
    let (Some(viewer), Some(editor), Some(admin)) = (
        find(SYSTEM_ROLE_VIEWER),
        find(SYSTEM_ROLE_EDITOR),
        find(SYSTEM_ROLE_ADMIN),
    ) else {
        panic!("system roles should exist");
    };
    assert_eq!(editor.parent_role_id(), Some(viewer.id()));
    assert_eq!(admin.parent_role_id(), Some(editor.id()));

    let person_id = PersonId::new();
    assign_globally(&fixture, admin.id(), Subject::Person(person_id)).await;
    assert!(can(&fixture, person_id, ObjectType::Contract, PermissionAction::View).await);
    assert!(can(&fixture, person_id, ObjectType::Contract, PermissionAction::ManagePermissions).await);
}

#[tokio::test]
async fn seeding_rejects_custom_role_holding_a_system_name() {
    let fixture = fixture();
    fixture.store.seed_role(SYSTEM_ROLE_VIEWER, None).await;

    let result = fixture.service.seed_system_roles().await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    let roles = fixture
        .service
        .list_roles(&fixture.admin, &RoleQuery::default())
        .await
        .unwrap_or_default();
    assert_eq!(roles.len(), 1);
    assert!(!roles[0].is_system());
}

#[tokio::test]
async fn seeding_rejects_system_role_under_unexpected_parent() {
    let fixture = fixture();
    fixture.store.seed_system_role(SYSTEM_ROLE_VIEWER).await;
    fixture.store.seed_system_role(SYSTEM_ROLE_EDITOR).await;

    let result = fixture.service.seed_system_roles().await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    let admin = fixture
        .service
        .list_roles(
            &fixture.admin,
            &RoleQuery {
                search: Some(SYSTEM_ROLE_ADMIN.to_owned()),
                ..RoleQuery::default()
            },
        )
        .await
        .unwrap_or_default();
    assert!(admin.is_empty());
}

#[tokio::test]
async fn seeding_completes_a_partially_seeded_hierarchy() {
    let fixture = fixture();
    let viewer = fixture.store.seed_system_role(SYSTEM_ROLE_VIEWER).await;

    let result = fixture.service.seed_system_roles().await;

    let object_types = ObjectType::all().len();
    assert!(matches!(
        result,
        Ok(summary) if summary.created_roles == 2 && summary.added_permissions == object_types * 4
    ));
    let roles = fixture
        .service
        .list_roles(&fixture.admin, &RoleQuery::default())
        .await
        .unwrap_or_default();
    assert!(
        roles
            .iter()
            .any(|role| role.name().as_str() == SYSTEM_ROLE_EDITOR
                && role.parent_role_id() == Some(viewer))
    );
}

#[tokio::test]
async fn failed_grant_write_leaves_no_role_behind() {
    let fixture = fixture();
    fixture.store.fail_permission_writes(true);

    let result = fixture
        .service
        .create_role(
            &fixture.admin,
            CreateRoleInput {
                permissions: vec![
                    grant(ObjectType::Room, PermissionAction::View),
                    grant(ObjectType::Room, PermissionAction::Edit),
                ],
                ..role_input("Facilities", None)
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::Internal(_))));
    let roles = fixture
        .service
        .list_roles(&fixture.admin, &RoleQuery::default())
        .await
        .unwrap_or_default();
    assert!(roles.is_empty());
    assert!(fixture.audit.events.lock().await.is_empty());

    fixture.store.fail_permission_writes(false);
    let retried = fixture
        .service
        .create_role(&fixture.admin, role_input("Facilities", None))
        .await;
    assert!(retried.is_ok());
}

#[tokio::test]
async fn audit_failure_does_not_fail_mutation() {
    let fixture = fixture();
    fixture.audit.fail.store(true, Ordering::SeqCst);

    let result = fixture
        .service
        .create_role(&fixture.admin, role_input("Ops", None))
        .await;

    assert!(result.is_ok());
    assert!(fixture.audit.events.lock().await.is_empty());
}

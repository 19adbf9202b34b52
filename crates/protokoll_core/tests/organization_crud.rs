use protokoll_core::db::open_db_in_memory;
use protokoll_core::{
    Organization, OrganizationRepository, RepoError, SqliteOrganizationRepository,
};
use rusqlite::Connection;

#[test]
fn create_and_get_roundtrip() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteOrganizationRepository::try_new(&mut conn).unwrap();

    let mut draft = Organization::new("Acme", "clinic");
    draft.city = Some("Berlin".to_string());
    let created = repo.create_organization(&draft).unwrap();

    assert!(created.id > 0);
    assert_eq!(created.row_version, 1);
    assert!(created.created_or_edited > 0);

    let loaded = repo.get_organization(created.id).unwrap();
    assert_eq!(loaded, created);
    assert_eq!(loaded.name, "Acme");
    assert_eq!(loaded.organization_type, "clinic");
    assert_eq!(loaded.city.as_deref(), Some("Berlin"));
}

#[test]
fn list_returns_rows_in_insertion_order() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteOrganizationRepository::try_new(&mut conn).unwrap();

    let first = repo
        .create_organization(&Organization::new("First", "clinic"))
        .unwrap();
    let second = repo
        .create_organization(&Organization::new("Second", "chapter"))
        .unwrap();
    let third = repo
        .create_organization(&Organization::new("Third", "clinic"))
        .unwrap();

    let all = repo.list_organizations().unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].id, first.id);
    assert_eq!(all[1].id, second.id);
    assert_eq!(all[2].id, third.id);
}

#[test]
fn get_missing_returns_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteOrganizationRepository::try_new(&mut conn).unwrap();

    let err = repo.get_organization(42).unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound {
            entity: "organization",
            id: 42
        }
    ));
}

#[test]
fn update_replaces_record_and_bumps_version() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteOrganizationRepository::try_new(&mut conn).unwrap();

    let created = repo
        .create_organization(&Organization::new("Acme", "clinic"))
        .unwrap();

    let mut changed = created.clone();
    changed.name = "Acme Nord".to_string();
    changed.country = Some("DE".to_string());
    repo.update_organization(created.id, &changed).unwrap();

    let loaded = repo.get_organization(created.id).unwrap();
    assert_eq!(loaded.name, "Acme Nord");
    assert_eq!(loaded.country.as_deref(), Some("DE"));
    assert_eq!(loaded.row_version, created.row_version + 1);
    assert!(loaded.created_or_edited >= created.created_or_edited);
}

#[test]
fn update_with_mismatched_id_is_rejected() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteOrganizationRepository::try_new(&mut conn).unwrap();

    let created = repo
        .create_organization(&Organization::new("Acme", "clinic"))
        .unwrap();

    let err = repo.update_organization(created.id + 1, &created).unwrap_err();
    assert!(matches!(err, RepoError::IdMismatch { .. }));

    // The row is untouched.
    let loaded = repo.get_organization(created.id).unwrap();
    assert_eq!(loaded.row_version, 1);
}

#[test]
fn update_missing_returns_not_found_never_upserts() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteOrganizationRepository::try_new(&mut conn).unwrap();

    let mut phantom = Organization::new("Ghost", "clinic");
    phantom.id = 99;
    phantom.row_version = 1;

    let err = repo.update_organization(99, &phantom).unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound {
            entity: "organization",
            id: 99
        }
    ));
    assert!(repo.list_organizations().unwrap().is_empty());
}

#[test]
fn delete_removes_row_and_missing_delete_reports_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteOrganizationRepository::try_new(&mut conn).unwrap();

    let created = repo
        .create_organization(&Organization::new("Acme", "clinic"))
        .unwrap();
    assert!(repo.organization_exists(created.id).unwrap());

    repo.delete_organization(created.id).unwrap();
    assert!(!repo.organization_exists(created.id).unwrap());

    let err = repo.delete_organization(created.id).unwrap_err();
    assert!(matches!(err, RepoError::NotFound { .. }));
}

#[test]
fn validation_failure_blocks_create_and_update() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteOrganizationRepository::try_new(&mut conn).unwrap();

    let err = repo
        .create_organization(&Organization::new("", "clinic"))
        .unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
    assert!(repo.list_organizations().unwrap().is_empty());

    let created = repo
        .create_organization(&Organization::new("Acme", "clinic"))
        .unwrap();
    let mut invalid = created.clone();
    invalid.organization_type = "  ".to_string();
    let err = repo.update_organization(created.id, &invalid).unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
}

#[test]
fn repository_rejects_uninitialized_connection() {
    let mut conn = Connection::open_in_memory().unwrap();

    let result = SqliteOrganizationRepository::try_new(&mut conn);
    match result {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert!(expected_version > 0),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

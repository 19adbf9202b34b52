use protokoll_core::db::open_db_in_memory;
use protokoll_core::{
    Organization, OrganizationRepository, Protocol, ProtocolRepository, ProtocolTemplate,
    RepoError, SqliteOrganizationRepository, SqliteProtocolRepository, SqliteTemplateRepository,
    SqliteUserRepository, TemplateRepository, User, UserRepository,
};
use rusqlite::Connection;

fn row_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

fn orphan_count(conn: &Connection) -> i64 {
    // Rows whose foreign key no longer resolves, across all dependent tables.
    conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM users u
              WHERE NOT EXISTS (SELECT 1 FROM organizations o WHERE o.id = u.organization_id))
          + (SELECT COUNT(*) FROM protocols p
              WHERE NOT EXISTS (SELECT 1 FROM users u WHERE u.id = p.user_id))
          + (SELECT COUNT(*) FROM additional_users au
              WHERE NOT EXISTS (SELECT 1 FROM users u WHERE u.id = au.user_id)
                 OR NOT EXISTS (SELECT 1 FROM protocols p WHERE p.id = au.protocol_id))
          + (SELECT COUNT(*) FROM protocol_templates t
              WHERE NOT EXISTS (SELECT 1 FROM organizations o WHERE o.id = t.organization_id));",
        [],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn deleting_organization_cascades_through_whole_subtree() {
    let mut conn = open_db_in_memory().unwrap();

    let organization = {
        let mut repo = SqliteOrganizationRepository::try_new(&mut conn).unwrap();
        repo.create_organization(&Organization::new("Acme", "clinic"))
            .unwrap()
    };

    // Two users, each owning two protocols; participants cross-linked.
    let users: Vec<User> = {
        let mut repo = SqliteUserRepository::try_new(&mut conn).unwrap();
        (0..2)
            .map(|index| {
                repo.create_user(&User::new(
                    format!("user{index}"),
                    format!("user{index}@acme.test"),
                    "x",
                    organization.id,
                ))
                .unwrap()
            })
            .collect()
    };

    {
        let mut repo = SqliteProtocolRepository::try_new(&mut conn).unwrap();
        for user in &users {
            for _ in 0..2 {
                let protocol = repo.create_protocol(&Protocol::new_draft(user.id)).unwrap();
                let other = users.iter().find(|u| u.id != user.id).unwrap();
                repo.set_additional_users(protocol.id, &[other.id]).unwrap();
            }
        }
    }

    {
        let mut repo = SqliteTemplateRepository::try_new(&mut conn).unwrap();
        repo.create_template(&ProtocolTemplate::new(
            "debrief",
            "## Debrief",
            organization.id,
        ))
        .unwrap();
    }

    assert_eq!(row_count(&conn, "users"), 2);
    assert_eq!(row_count(&conn, "protocols"), 4);
    assert_eq!(row_count(&conn, "additional_users"), 4);
    assert_eq!(row_count(&conn, "protocol_templates"), 1);

    {
        let mut repo = SqliteOrganizationRepository::try_new(&mut conn).unwrap();
        repo.delete_organization(organization.id).unwrap();
    }

    assert_eq!(row_count(&conn, "organizations"), 0);
    assert_eq!(row_count(&conn, "users"), 0);
    assert_eq!(row_count(&conn, "protocols"), 0);
    assert_eq!(row_count(&conn, "additional_users"), 0);
    assert_eq!(row_count(&conn, "protocol_templates"), 0);
    assert_eq!(orphan_count(&conn), 0);
}

#[test]
fn deleting_user_cascades_to_protocols_and_memberships_only() {
    let mut conn = open_db_in_memory().unwrap();

    let organization = {
        let mut repo = SqliteOrganizationRepository::try_new(&mut conn).unwrap();
        repo.create_organization(&Organization::new("Acme", "clinic"))
            .unwrap()
    };
    let (owner, participant) = {
        let mut repo = SqliteUserRepository::try_new(&mut conn).unwrap();
        let owner = repo
            .create_user(&User::new("owner", "o@acme.test", "x", organization.id))
            .unwrap();
        let participant = repo
            .create_user(&User::new("participant", "p@acme.test", "x", organization.id))
            .unwrap();
        (owner, participant)
    };
    let protocol = {
        let mut repo = SqliteProtocolRepository::try_new(&mut conn).unwrap();
        let protocol = repo.create_protocol(&Protocol::new_draft(owner.id)).unwrap();
        repo.set_additional_users(protocol.id, &[participant.id])
            .unwrap();
        protocol
    };

    // Deleting the participant removes only their membership.
    {
        let mut repo = SqliteUserRepository::try_new(&mut conn).unwrap();
        repo.delete_user(participant.id).unwrap();
    }
    assert_eq!(row_count(&conn, "protocols"), 1);
    assert_eq!(row_count(&conn, "additional_users"), 0);

    // Deleting the owner removes the protocol itself.
    {
        let mut repo = SqliteUserRepository::try_new(&mut conn).unwrap();
        repo.delete_user(owner.id).unwrap();
    }
    assert_eq!(row_count(&conn, "protocols"), 0);
    assert_eq!(orphan_count(&conn), 0);

    let repo_check = SqliteProtocolRepository::try_new(&mut conn).unwrap();
    let err = repo_check.get_protocol(protocol.id).unwrap_err();
    assert!(matches!(err, RepoError::NotFound { entity: "protocol", .. }));

    // The organization itself is untouched.
    assert_eq!(row_count(&conn, "organizations"), 1);
}

#[test]
fn example_scenario_from_contract() {
    // Create org -> user -> protocol, delete the org, everything is gone.
    let mut conn = open_db_in_memory().unwrap();

    let organization = {
        let mut repo = SqliteOrganizationRepository::try_new(&mut conn).unwrap();
        repo.create_organization(&Organization::new("Acme", "clinic"))
            .unwrap()
    };
    assert_eq!(organization.id, 1);

    let user = {
        let mut repo = SqliteUserRepository::try_new(&mut conn).unwrap();
        repo.create_user(&User::new("jdoe", "j@acme.test", "x", organization.id))
            .unwrap()
    };
    assert_eq!(user.id, 1);

    let protocol = {
        let mut repo = SqliteProtocolRepository::try_new(&mut conn).unwrap();
        repo.create_protocol(&Protocol::new_draft(user.id)).unwrap()
    };
    assert_eq!(protocol.id, 1);

    {
        let mut repo = SqliteOrganizationRepository::try_new(&mut conn).unwrap();
        repo.delete_organization(organization.id).unwrap();
    }

    {
        let repo = SqliteUserRepository::try_new(&mut conn).unwrap();
        assert!(matches!(
            repo.get_user(user.id).unwrap_err(),
            RepoError::NotFound { entity: "user", .. }
        ));
    }
    {
        let repo = SqliteProtocolRepository::try_new(&mut conn).unwrap();
        assert!(matches!(
            repo.get_protocol(protocol.id).unwrap_err(),
            RepoError::NotFound { entity: "protocol", .. }
        ));
    }
}

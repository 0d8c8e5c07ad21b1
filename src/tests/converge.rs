use std::collections::BTreeMap;

use diesel::prelude::*;
use diesel::PgConnection;

use crate::errors::StoreError;
use crate::models::{NewRole, PermissionView};
use crate::schema::{ab_permission, ab_permission_view, ab_view_menu};
use crate::security::{add_pvms, find_pvm, migrate_roles, PvmMigrationMap};
use crate::tests::test_pool;

fn row_counts(conn: &mut PgConnection) -> (i64, i64, i64) {
    let permissions: i64 = ab_permission::table.count().get_result(conn).unwrap();
    let view_menus: i64 = ab_view_menu::table.count().get_result(conn).unwrap();
    let pvms: i64 = ab_permission_view::table.count().get_result(conn).unwrap();
    (permissions, view_menus, pvms)
}

fn registrar_input(view: &str, permissions: &[&str]) -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([(
        view.to_string(),
        permissions.iter().map(|p| p.to_string()).collect(),
    )])
}

fn migration_entry(old: (&str, &str), new: &[(&str, &str)]) -> PvmMigrationMap {
    BTreeMap::from([(
        (old.0.to_string(), old.1.to_string()),
        new.iter()
            .map(|(v, p)| (v.to_string(), p.to_string()))
            .collect(),
    )])
}

#[test]
fn registrar_is_idempotent() {
    let pool = test_pool();
    let mut conn = pool.get().unwrap();

    conn.test_transaction::<_, StoreError, _>(|conn| {
        let before = row_counts(conn);
        let input = registrar_input("Chart", &["can_read", "can_write"]);

        add_pvms(conn, &input)?;
        let after_first = row_counts(conn);
        assert_eq!(after_first.0, before.0 + 2);
        assert_eq!(after_first.1, before.1 + 1);
        assert_eq!(after_first.2, before.2 + 2);

        add_pvms(conn, &input)?;
        assert_eq!(row_counts(conn), after_first);

        assert!(find_pvm(conn, "Chart", "can_read")?.is_some());
        assert!(find_pvm(conn, "Chart", "can_write")?.is_some());
        Ok(())
    });
}

#[test]
fn find_pvm_returns_none_on_absence() {
    let pool = test_pool();
    let mut conn = pool.get().unwrap();

    conn.test_transaction::<_, StoreError, _>(|conn| {
        assert!(find_pvm(conn, "NoSuchView", "can_fly")?.is_none());
        Ok(())
    });
}

#[test]
fn migration_moves_grants_and_prunes_orphans() {
    let pool = test_pool();
    let mut conn = pool.get().unwrap();

    conn.test_transaction::<_, StoreError, _>(|conn| {
        add_pvms(conn, &registrar_input("Chart", &["can_show", "can_read"]))?;
        let old_pvm = find_pvm(conn, "Chart", "can_show")?.unwrap();
        let new_pvm = find_pvm(conn, "Chart", "can_read")?.unwrap();

        let role = NewRole {
            name: "converge_gamma".to_string(),
        }
        .save(conn)?;
        role.grant(conn, &old_pvm)?;

        migrate_roles(
            conn,
            &migration_entry(("Chart", "can_show"), &[("Chart", "can_read")]),
        )?;

        let held = role.permission_views(conn)?;
        assert!(held.contains(&new_pvm));
        assert!(!held.iter().any(|pvm| pvm.id == old_pvm.id));

        // The superseded pair and its now-unreferenced permission are
        // gone; the view menu survives through the replacement pair.
        assert!(find_pvm(conn, "Chart", "can_show")?.is_none());
        let orphaned: Option<i32> = ab_permission::table
            .filter(ab_permission::name.eq("can_show"))
            .select(ab_permission::id)
            .first(conn)
            .optional()?;
        assert!(orphaned.is_none());
        let view_menu: Option<i32> = ab_view_menu::table
            .filter(ab_view_menu::name.eq("Chart"))
            .select(ab_view_menu::id)
            .first(conn)
            .optional()?;
        assert!(view_menu.is_some());
        Ok(())
    });
}

#[test]
fn migration_deletes_view_menu_left_without_pairs() {
    let pool = test_pool();
    let mut conn = pool.get().unwrap();

    conn.test_transaction::<_, StoreError, _>(|conn| {
        add_pvms(conn, &registrar_input("LegacyChart", &["can_show"]))?;
        add_pvms(conn, &registrar_input("Chart", &["can_read"]))?;

        migrate_roles(
            conn,
            &migration_entry(("LegacyChart", "can_show"), &[("Chart", "can_read")]),
        )?;

        let view_menu: Option<i32> = ab_view_menu::table
            .filter(ab_view_menu::name.eq("LegacyChart"))
            .select(ab_view_menu::id)
            .first(conn)
            .optional()?;
        assert!(view_menu.is_none());
        Ok(())
    });
}

#[test]
fn migration_does_not_duplicate_existing_grants() {
    let pool = test_pool();
    let mut conn = pool.get().unwrap();

    conn.test_transaction::<_, StoreError, _>(|conn| {
        add_pvms(conn, &registrar_input("Chart", &["can_show", "can_read"]))?;
        let old_pvm = find_pvm(conn, "Chart", "can_show")?.unwrap();
        let new_pvm = find_pvm(conn, "Chart", "can_read")?.unwrap();

        // The role already holds the replacement.
        let role = NewRole {
            name: "converge_delta".to_string(),
        }
        .save(conn)?;
        role.grant(conn, &old_pvm)?;
        role.grant(conn, &new_pvm)?;

        migrate_roles(
            conn,
            &migration_entry(("Chart", "can_show"), &[("Chart", "can_read")]),
        )?;

        let held: Vec<PermissionView> = role.permission_views(conn)?;
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].id, new_pvm.id);
        Ok(())
    });
}

#[test]
fn unresolved_old_pair_is_a_silent_no_op() {
    let pool = test_pool();
    let mut conn = pool.get().unwrap();

    conn.test_transaction::<_, StoreError, _>(|conn| {
        add_pvms(conn, &registrar_input("Chart", &["can_read"]))?;
        let role = NewRole {
            name: "converge_epsilon".to_string(),
        }
        .save(conn)?;
        let pvm = find_pvm(conn, "Chart", "can_read")?.unwrap();
        role.grant(conn, &pvm)?;

        let before = row_counts(conn);
        migrate_roles(
            conn,
            &migration_entry(("Ghost", "can_vanish"), &[("Chart", "can_read")]),
        )?;

        assert_eq!(row_counts(conn), before);
        assert_eq!(role.permission_views(conn)?.len(), 1);
        Ok(())
    });
}

#[test]
fn migration_rewrites_all_roles_holding_the_old_pair() {
    let pool = test_pool();
    let mut conn = pool.get().unwrap();

    conn.test_transaction::<_, StoreError, _>(|conn| {
        add_pvms(
            conn,
            &registrar_input("Chart", &["can_show", "can_read", "can_write"]),
        )?;
        let old_pvm = find_pvm(conn, "Chart", "can_show")?.unwrap();
        let read_pvm = find_pvm(conn, "Chart", "can_read")?.unwrap();
        let write_pvm = find_pvm(conn, "Chart", "can_write")?.unwrap();

        let admin = NewRole {
            name: "converge_admin".to_string(),
        }
        .save(conn)?;
        let viewer = NewRole {
            name: "converge_viewer".to_string(),
        }
        .save(conn)?;
        let bystander = NewRole {
            name: "converge_bystander".to_string(),
        }
        .save(conn)?;
        admin.grant(conn, &old_pvm)?;
        viewer.grant(conn, &old_pvm)?;
        bystander.grant(conn, &write_pvm)?;

        // One old pair fans out to two replacements.
        migrate_roles(
            conn,
            &migration_entry(
                ("Chart", "can_show"),
                &[("Chart", "can_read"), ("Chart", "can_write")],
            ),
        )?;

        for role in [&admin, &viewer] {
            assert!(role.has_permission_view(conn, &read_pvm)?);
            assert!(role.has_permission_view(conn, &write_pvm)?);
            assert!(!role.has_permission_view(conn, &old_pvm)?);
        }

        // A role that never held the old pair is untouched.
        let held = bystander.permission_views(conn)?;
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].id, write_pvm.id);
        Ok(())
    });
}

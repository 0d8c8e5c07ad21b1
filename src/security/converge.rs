//! Helpers for converging role-based access control during metadata
//! migrations: registering permission/view pairs, rewriting role grants
//! from superseded pairs to their replacements, and pruning the rows the
//! rewrite leaves unreferenced.
//!
//! Everything here runs against a single borrowed connection and performs
//! no commit of its own. Callers that need all-or-nothing semantics wrap
//! the calls in `conn.transaction(..)`.

use std::collections::BTreeMap;

use diesel::prelude::*;
use tracing::{info, warn};

use crate::errors::StoreError;
use crate::models::{NewPermission, NewPermissionView, NewViewMenu, PermissionView, Role};
use crate::schema::{ab_permission, ab_permission_view, ab_view_menu};

/// A (view menu name, permission name) pair.
pub type PvmKey = (String, String);

/// How superseded pairs map to their replacements. Ordered so that runs
/// and the derived reverse maps are deterministic.
pub type PvmMigrationMap = BTreeMap<PvmKey, Vec<PvmKey>>;

/// Ensure every (permission, view) pair in `pvm_data` exists, creating
/// missing permissions, view menus and pairs along the way. Idempotent: a
/// second run with the same input changes nothing.
pub fn add_pvms(
    conn: &mut PgConnection,
    pvm_data: &BTreeMap<String, Vec<String>>,
) -> Result<(), StoreError> {
    for (view_name, permission_names) in pvm_data {
        let view_menu = NewViewMenu {
            name: view_name.clone(),
        }
        .get_or_create(conn)?;

        for permission_name in permission_names {
            let permission = NewPermission {
                name: permission_name.clone(),
            }
            .get_or_create(conn)?;

            NewPermissionView {
                permission_id: permission.id,
                view_menu_id: view_menu.id,
            }
            .get_or_create(conn)?;
        }
    }
    Ok(())
}

/// Look up the permission-view row for a view/permission name pair.
/// Absence is not an error.
pub fn find_pvm(
    conn: &mut PgConnection,
    view_name: &str,
    permission_name: &str,
) -> Result<Option<PermissionView>, StoreError> {
    Ok(ab_permission_view::table
        .inner_join(ab_permission::table)
        .inner_join(ab_view_menu::table)
        .filter(ab_view_menu::name.eq(view_name))
        .filter(ab_permission::name.eq(permission_name))
        .select(ab_permission_view::all_columns)
        .first::<PermissionView>(conn)
        .optional()?)
}

/// Rewrite every role so that grants on the old pairs in `pvm_key_map`
/// become grants on their replacements, then delete the old pairs and any
/// permission or view menu they leave without references.
///
/// Entries whose old pair cannot be resolved are skipped with a log line:
/// the migration is best-effort per entry, so maps that partially overlap
/// an earlier run converge instead of failing. Persistence errors
/// propagate to the caller; wrap the call in a transaction to roll back a
/// partially applied map.
pub fn migrate_roles(
    conn: &mut PgConnection,
    pvm_key_map: &PvmMigrationMap,
) -> Result<(), StoreError> {
    let mut pvm_map: Vec<(PermissionView, Vec<PermissionView>)> = Vec::new();
    for ((old_view, old_permission), new_keys) in pvm_key_map {
        let Some(old_pvm) = find_pvm(conn, old_view, old_permission)? else {
            info!(
                message = "Skipping unresolved permission-view pair",
                view = %old_view,
                permission = %old_permission,
            );
            continue;
        };

        let mut new_pvms = Vec::new();
        for (new_view, new_permission) in new_keys {
            match find_pvm(conn, new_view, new_permission)? {
                Some(new_pvm) => new_pvms.push(new_pvm),
                None => warn!(
                    message = "Replacement permission-view pair does not exist",
                    view = %new_view,
                    permission = %new_permission,
                ),
            }
        }
        pvm_map.push((old_pvm, new_pvms));
    }

    // Swap old grants for their replacements on every role. Tracking the
    // held set in memory keeps the result a set no matter how map entries
    // overlap.
    for role in Role::all(conn)? {
        let mut held: Vec<i32> = role
            .permission_views(conn)?
            .iter()
            .map(|pvm| pvm.id)
            .collect();

        for (old_pvm, new_pvms) in &pvm_map {
            if !held.contains(&old_pvm.id) {
                continue;
            }
            info!(
                message = "Revoking permission-view from role",
                role = %role.name,
                permission_view_id = old_pvm.id,
            );
            role.revoke(conn, old_pvm)?;
            held.retain(|id| *id != old_pvm.id);

            for new_pvm in new_pvms {
                if !held.contains(&new_pvm.id) {
                    info!(
                        message = "Granting permission-view to role",
                        role = %role.name,
                        permission_view_id = new_pvm.id,
                    );
                    role.grant(conn, new_pvm)?;
                    held.push(new_pvm.id);
                }
            }
        }
    }

    // Drop the superseded rows, then whatever they leave orphaned. The
    // permission and view menu checks are independent: either may survive
    // through other pairs.
    for (old_pvm, _) in &pvm_map {
        let permission = old_pvm.permission(conn)?;
        let view_menu = old_pvm.view_menu(conn)?;

        info!(
            message = "Deleting superseded permission-view",
            view = %view_menu.name,
            permission = %permission.name,
        );
        old_pvm.delete(conn)?;

        if permission.reference_count(conn)? == 0 {
            info!(message = "Deleting orphaned permission", name = %permission.name);
            permission.delete(conn)?;
        }
        if view_menu.reference_count(conn)? == 0 {
            info!(message = "Deleting orphaned view menu", name = %view_menu.name);
            view_menu.delete(conn)?;
        }
    }

    Ok(())
}

/// Collapse a migration map back to registrar input: old view name to the
/// old permission names seen for it. Duplicates in the input survive.
pub fn get_reversed_new_pvms(pvm_map: &PvmMigrationMap) -> BTreeMap<String, Vec<String>> {
    let mut reversed: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (old_view, old_permission) in pvm_map.keys() {
        reversed
            .entry(old_view.clone())
            .or_default()
            .push(old_permission.clone());
    }
    reversed
}

/// Invert a migration map: each new pair maps to the old pairs that
/// designate it, accumulated in iteration order of the input.
pub fn get_reversed_pvm_map(pvm_map: &PvmMigrationMap) -> PvmMigrationMap {
    let mut reversed = PvmMigrationMap::new();
    for (old_key, new_keys) in pvm_map {
        for new_key in new_keys {
            reversed
                .entry(new_key.clone())
                .or_default()
                .push(old_key.clone());
        }
    }
    reversed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(view: &str, permission: &str) -> PvmKey {
        (view.to_string(), permission.to_string())
    }

    fn sample_map() -> PvmMigrationMap {
        BTreeMap::from([
            (
                key("Chart", "can_show"),
                vec![key("Chart", "can_read")],
            ),
            (
                key("Chart", "can_add"),
                vec![key("Chart", "can_write")],
            ),
            (
                key("Dataset", "can_list"),
                vec![key("Dataset", "can_read"), key("Chart", "can_read")],
            ),
        ])
    }

    #[test]
    fn reversed_new_pvms_groups_permissions_by_view() {
        let reversed = get_reversed_new_pvms(&sample_map());

        assert_eq!(
            reversed.get("Chart"),
            Some(&vec!["can_add".to_string(), "can_show".to_string()])
        );
        assert_eq!(reversed.get("Dataset"), Some(&vec!["can_list".to_string()]));
    }

    #[test]
    fn reversed_pvm_map_inverts_the_relation() {
        let reversed = get_reversed_pvm_map(&sample_map());

        // One new key can receive contributions from several old keys.
        assert_eq!(
            reversed.get(&key("Chart", "can_read")),
            Some(&vec![key("Chart", "can_show"), key("Dataset", "can_list")])
        );
        assert_eq!(
            reversed.get(&key("Chart", "can_write")),
            Some(&vec![key("Chart", "can_add")])
        );
        assert_eq!(
            reversed.get(&key("Dataset", "can_read")),
            Some(&vec![key("Dataset", "can_list")])
        );
    }

    #[test]
    fn reversed_pvm_map_round_trips_without_shared_new_keys() {
        let forward = BTreeMap::from([
            (key("Chart", "can_show"), vec![key("Chart", "can_read")]),
            (key("Chart", "can_edit"), vec![key("Chart", "can_write")]),
        ]);

        let reversed = get_reversed_pvm_map(&forward);
        let recovered = get_reversed_pvm_map(&reversed);

        assert_eq!(recovered, forward);
    }

    #[test]
    fn reverse_maps_of_empty_input_are_empty() {
        let empty = PvmMigrationMap::new();
        assert!(get_reversed_new_pvms(&empty).is_empty());
        assert!(get_reversed_pvm_map(&empty).is_empty());
    }
}

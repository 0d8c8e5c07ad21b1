use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;
use crate::schema::{ab_permission, ab_permission_view, ab_view_menu};

/// An action name, such as `can_read`.
#[derive(Debug, Serialize, Deserialize, Queryable, Clone, PartialEq, Eq)]
#[diesel(table_name = ab_permission)]
pub struct Permission {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Insertable)]
#[diesel(table_name = ab_permission)]
pub struct NewPermission {
    pub name: String,
}

impl NewPermission {
    /// Upsert keyed on the unique name: insert-or-ignore, then read back.
    /// Two concurrent callers racing on the same name both end up with the
    /// single surviving row.
    pub fn get_or_create(&self, conn: &mut PgConnection) -> Result<Permission, StoreError> {
        diesel::insert_into(ab_permission::table)
            .values(self)
            .on_conflict(ab_permission::name)
            .do_nothing()
            .execute(conn)?;

        Ok(ab_permission::table
            .filter(ab_permission::name.eq(&self.name))
            .first::<Permission>(conn)?)
    }
}

impl Permission {
    pub fn get_by_name(
        conn: &mut PgConnection,
        permission_name: &str,
    ) -> Result<Option<Permission>, StoreError> {
        Ok(ab_permission::table
            .filter(ab_permission::name.eq(permission_name))
            .first::<Permission>(conn)
            .optional()?)
    }

    /// Number of permission-view rows that still reference this permission.
    /// Zero means the row is orphaned and may be deleted.
    pub fn reference_count(&self, conn: &mut PgConnection) -> Result<i64, StoreError> {
        Ok(ab_permission_view::table
            .filter(ab_permission_view::permission_id.eq(self.id))
            .count()
            .get_result(conn)?)
    }

    pub fn delete(&self, conn: &mut PgConnection) -> Result<(), StoreError> {
        diesel::delete(ab_permission::table.filter(ab_permission::id.eq(self.id)))
            .execute(conn)?;
        Ok(())
    }
}

/// A named protected resource or view. The original metadata schema keyed
/// equality on the name; here comparisons go through ids or names
/// explicitly, so two rows are only equal when all fields match.
#[derive(Debug, Serialize, Deserialize, Queryable, Clone, PartialEq, Eq)]
#[diesel(table_name = ab_view_menu)]
pub struct ViewMenu {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Insertable)]
#[diesel(table_name = ab_view_menu)]
pub struct NewViewMenu {
    pub name: String,
}

impl NewViewMenu {
    pub fn get_or_create(&self, conn: &mut PgConnection) -> Result<ViewMenu, StoreError> {
        diesel::insert_into(ab_view_menu::table)
            .values(self)
            .on_conflict(ab_view_menu::name)
            .do_nothing()
            .execute(conn)?;

        Ok(ab_view_menu::table
            .filter(ab_view_menu::name.eq(&self.name))
            .first::<ViewMenu>(conn)?)
    }
}

impl ViewMenu {
    pub fn get_by_name(
        conn: &mut PgConnection,
        view_name: &str,
    ) -> Result<Option<ViewMenu>, StoreError> {
        Ok(ab_view_menu::table
            .filter(ab_view_menu::name.eq(view_name))
            .first::<ViewMenu>(conn)
            .optional()?)
    }

    pub fn reference_count(&self, conn: &mut PgConnection) -> Result<i64, StoreError> {
        Ok(ab_permission_view::table
            .filter(ab_permission_view::view_menu_id.eq(self.id))
            .count()
            .get_result(conn)?)
    }

    pub fn delete(&self, conn: &mut PgConnection) -> Result<(), StoreError> {
        diesel::delete(ab_view_menu::table.filter(ab_view_menu::id.eq(self.id)))
            .execute(conn)?;
        Ok(())
    }
}

/// The pairing of one permission with one view menu, unique on the pair.
/// This is the atomic grantable unit.
#[derive(Debug, Serialize, Deserialize, Queryable, Clone, Copy, PartialEq, Eq)]
#[diesel(table_name = ab_permission_view)]
pub struct PermissionView {
    pub id: i32,
    pub permission_id: i32,
    pub view_menu_id: i32,
}

#[derive(Debug, Serialize, Deserialize, Insertable)]
#[diesel(table_name = ab_permission_view)]
pub struct NewPermissionView {
    pub permission_id: i32,
    pub view_menu_id: i32,
}

impl NewPermissionView {
    pub fn get_or_create(&self, conn: &mut PgConnection) -> Result<PermissionView, StoreError> {
        diesel::insert_into(ab_permission_view::table)
            .values(self)
            .on_conflict((
                ab_permission_view::permission_id,
                ab_permission_view::view_menu_id,
            ))
            .do_nothing()
            .execute(conn)?;

        Ok(ab_permission_view::table
            .filter(ab_permission_view::permission_id.eq(self.permission_id))
            .filter(ab_permission_view::view_menu_id.eq(self.view_menu_id))
            .first::<PermissionView>(conn)?)
    }
}

impl PermissionView {
    pub fn permission(&self, conn: &mut PgConnection) -> Result<Permission, StoreError> {
        Ok(ab_permission::table
            .filter(ab_permission::id.eq(self.permission_id))
            .first::<Permission>(conn)?)
    }

    pub fn view_menu(&self, conn: &mut PgConnection) -> Result<ViewMenu, StoreError> {
        Ok(ab_view_menu::table
            .filter(ab_view_menu::id.eq(self.view_menu_id))
            .first::<ViewMenu>(conn)?)
    }

    pub fn delete(&self, conn: &mut PgConnection) -> Result<(), StoreError> {
        diesel::delete(ab_permission_view::table.filter(ab_permission_view::id.eq(self.id)))
            .execute(conn)?;
        Ok(())
    }
}

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;
use crate::models::permission::PermissionView;
use crate::schema::{ab_permission_view, ab_permission_view_role, ab_role};

/// A named bundle of permission-view grants.
#[derive(Debug, Serialize, Deserialize, Queryable, Clone, PartialEq, Eq)]
#[diesel(table_name = ab_role)]
pub struct Role {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Insertable)]
#[diesel(table_name = ab_role)]
pub struct NewRole {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Queryable)]
#[diesel(table_name = ab_permission_view_role)]
pub struct RolePermissionView {
    pub id: i32,
    pub permission_view_id: i32,
    pub role_id: i32,
}

#[derive(Debug, Serialize, Deserialize, Insertable)]
#[diesel(table_name = ab_permission_view_role)]
pub struct NewRolePermissionView {
    pub permission_view_id: i32,
    pub role_id: i32,
}

impl NewRole {
    pub fn save(&self, conn: &mut PgConnection) -> Result<Role, StoreError> {
        Ok(diesel::insert_into(ab_role::table)
            .values(self)
            .get_result(conn)?)
    }
}

impl Role {
    pub fn get_by_name(
        conn: &mut PgConnection,
        role_name: &str,
    ) -> Result<Option<Role>, StoreError> {
        Ok(ab_role::table
            .filter(ab_role::name.eq(role_name))
            .first::<Role>(conn)
            .optional()?)
    }

    pub fn all(conn: &mut PgConnection) -> Result<Vec<Role>, StoreError> {
        Ok(ab_role::table.order(ab_role::id).load::<Role>(conn)?)
    }

    /// The full grant set of this role, in no particular order.
    pub fn permission_views(
        &self,
        conn: &mut PgConnection,
    ) -> Result<Vec<PermissionView>, StoreError> {
        Ok(ab_permission_view_role::table
            .inner_join(ab_permission_view::table)
            .filter(ab_permission_view_role::role_id.eq(self.id))
            .select(ab_permission_view::all_columns)
            .load::<PermissionView>(conn)?)
    }

    pub fn has_permission_view(
        &self,
        conn: &mut PgConnection,
        pvm: &PermissionView,
    ) -> Result<bool, StoreError> {
        let count: i64 = ab_permission_view_role::table
            .filter(ab_permission_view_role::role_id.eq(self.id))
            .filter(ab_permission_view_role::permission_view_id.eq(pvm.id))
            .count()
            .get_result(conn)?;
        Ok(count > 0)
    }

    /// Grant a permission-view to this role. Granting an already-held pair
    /// is a no-op, keeping the membership a set.
    pub fn grant(&self, conn: &mut PgConnection, pvm: &PermissionView) -> Result<(), StoreError> {
        diesel::insert_into(ab_permission_view_role::table)
            .values(NewRolePermissionView {
                permission_view_id: pvm.id,
                role_id: self.id,
            })
            .on_conflict((
                ab_permission_view_role::permission_view_id,
                ab_permission_view_role::role_id,
            ))
            .do_nothing()
            .execute(conn)?;
        Ok(())
    }

    pub fn revoke(&self, conn: &mut PgConnection, pvm: &PermissionView) -> Result<(), StoreError> {
        diesel::delete(
            ab_permission_view_role::table
                .filter(ab_permission_view_role::role_id.eq(self.id))
                .filter(ab_permission_view_role::permission_view_id.eq(pvm.id)),
        )
        .execute(conn)?;
        Ok(())
    }

    pub fn delete(&self, conn: &mut PgConnection) -> Result<(), StoreError> {
        diesel::delete(
            ab_permission_view_role::table.filter(ab_permission_view_role::role_id.eq(self.id)),
        )
        .execute(conn)?;
        diesel::delete(ab_role::table.filter(ab_role::id.eq(self.id))).execute(conn)?;
        Ok(())
    }
}

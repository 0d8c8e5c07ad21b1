use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;
use crate::schema::users;

#[derive(Debug, Serialize, Deserialize, Queryable, Clone, PartialEq, Eq)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
}

impl NewUser {
    pub fn save(&self, conn: &mut PgConnection) -> Result<User, StoreError> {
        Ok(diesel::insert_into(users::table)
            .values(self)
            .get_result(conn)?)
    }
}

impl User {
    pub fn get_by_username(
        conn: &mut PgConnection,
        name: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(users::table
            .filter(users::username.eq(name))
            .first::<User>(conn)
            .optional()?)
    }

    pub fn delete(&self, conn: &mut PgConnection) -> Result<(), StoreError> {
        diesel::delete(users::table.filter(users::id.eq(self.id))).execute(conn)?;
        Ok(())
    }
}

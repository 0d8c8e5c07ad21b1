use diesel::r2d2::ConnectionManager;
use diesel::r2d2::Pool;
use diesel::PgConnection;
use tracing::debug;

use crate::errors::StoreError;
use crate::utilities::db::DatabaseUrlComponents;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub fn init_pool(database_url: &str, max_size: u32) -> Result<DbPool, StoreError> {
    let components = DatabaseUrlComponents::new(database_url)
        .map_err(StoreError::DbConnectionError)?;

    debug!(
        message = "Database URL parsed.",
        vendor = components.vendor,
        username = components.username,
        host = components.host,
        port = components.port,
        database = components.database,
    );

    let manager = ConnectionManager::<PgConnection>::new(database_url);

    Pool::builder()
        .max_size(max_size)
        .build(manager)
        .map_err(|e| StoreError::DbConnectionError(e.to_string()))
}

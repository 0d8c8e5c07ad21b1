#![allow(dead_code)]
// We allow dead code here because all of this is used in tests and it is
// thus marked as dead. Doh.
//
// The test modules below need a provisioned postgres instance (see the
// migrations directory) reachable via CHARTDECK_DATABASE_URL, so they are
// gated behind the test-db feature.

#[cfg(all(test, feature = "test-db"))]
mod converge;

use crate::config::get_config;
use crate::db::{init_pool, DbPool};

pub fn test_pool() -> DbPool {
    let config = get_config();
    init_pool(&config.database_url, config.db_pool_size).expect("Failed to create test pool")
}

pub mod connection;

pub use connection::{init_pool, DbPool};

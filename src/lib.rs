pub mod config;
pub mod db;
pub mod errors;
pub mod logger;
pub mod models;
pub mod schema;
pub mod security;
pub mod tests;
pub mod utilities;

use diesel::r2d2::PoolError;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Serialize)]
pub enum StoreError {
    NotFound(String),
    Conflict(String),
    DatabaseError(String),
    DbConnectionError(String),
    MalformedJson(String),
    Io(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(ref message) => write!(f, "{}", message),
            StoreError::Conflict(ref message) => write!(f, "{}", message),
            StoreError::DatabaseError(ref message) => write!(f, "{}", message),
            StoreError::DbConnectionError(ref message) => write!(f, "{}", message),
            StoreError::MalformedJson(ref message) => write!(f, "{}", message),
            StoreError::Io(ref message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<PoolError> for StoreError {
    fn from(e: PoolError) -> Self {
        StoreError::DbConnectionError(e.to_string())
    }
}

impl From<DieselError> for StoreError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::NotFound => StoreError::NotFound(e.to_string()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                StoreError::Conflict(e.to_string())
            }
            _ => StoreError::DatabaseError(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::MalformedJson(e.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

pub mod dashboard;
pub mod permission;
pub mod role;
pub mod user;

pub use crate::models::dashboard::*;
pub use crate::models::permission::*;
pub use crate::models::role::*;
pub use crate::models::user::*;

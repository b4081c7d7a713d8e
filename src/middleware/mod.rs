pub mod admin_auth;
pub mod identity;

pub use admin_auth::{admin_auth, require_write_role, AdminContext};
pub use identity::Identity;

mod admin;
mod audit_log;
mod claim;
mod code;
mod entitlement;
mod receipt;
mod user;

pub use admin::*;
pub use audit_log::*;
pub use claim::*;
pub use code::*;
pub use entitlement::*;
pub use receipt::*;
pub use user::*;

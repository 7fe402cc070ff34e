pub mod content;
pub mod user;

pub use content::{ContentEntry, ProjectSnapshot};
pub use user::{AuthToken, Credential, TOKEN_VALIDITY_MS, User};

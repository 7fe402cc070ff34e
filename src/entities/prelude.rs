pub use super::content::Entity as Content;
pub use super::users::Entity as Users;

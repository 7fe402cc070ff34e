pub mod prelude;

pub mod content;
pub mod users;

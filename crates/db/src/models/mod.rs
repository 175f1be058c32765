pub mod universe;
pub mod user;

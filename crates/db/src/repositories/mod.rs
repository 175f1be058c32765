pub mod universe_repo;
pub mod user_repo;

pub use universe_repo::UniverseRepo;
pub use user_repo::UserRepo;

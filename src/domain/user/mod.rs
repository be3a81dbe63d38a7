//! User domain - accounts that publish models or consume them

mod entity;
mod repository;

pub use entity::{normalize_email, User, UserId, UserType};
pub use repository::UserRepository;

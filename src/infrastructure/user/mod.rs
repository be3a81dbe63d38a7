//! User infrastructure module
//!
//! Storage-backed credential store and the service that registers,
//! authenticates and updates accounts.

mod repository;
mod service;

pub use repository::StorageUserRepository;
pub use service::{AuthSession, ProfileUpdate, RegisterUser, UserService};

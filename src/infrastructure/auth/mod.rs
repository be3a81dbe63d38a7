//! Authentication infrastructure module
//!
//! JWT bearer tokens for sessions and Argon2 for stored passwords.

mod jwt;
mod password;

pub use jwt::{JwtClaims, JwtConfig, JwtGenerator, JwtService};
pub use password::{Argon2Hasher, PasswordHasher};

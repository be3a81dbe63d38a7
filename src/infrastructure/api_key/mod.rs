//! API key ledger infrastructure
//!
//! Secret generation, the two repository backends and the ledger service.

mod generator;
mod in_memory;
mod postgres;
mod service;

pub use generator::{hash_secret, GeneratedSecret, SecretGenerator, SECRET_PREFIX};
pub use in_memory::InMemoryApiKeyRepository;
pub use postgres::PostgresApiKeyRepository;
pub use service::{ApiKeyService, IssuedApiKey, KeyDetails, KeyHolder, OwnedKey};

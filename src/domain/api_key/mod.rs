//! API key ledger domain - per-model keys, their lifecycle and usage counter

mod entity;
mod repository;

pub use entity::{ApiKey, ApiKeyId, ApiKeyStatus};
pub use repository::ApiKeyRepository;

#[cfg(test)]
pub use repository::MockApiKeyRepository;

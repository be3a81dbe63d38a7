//! Model registry infrastructure

mod repository;
mod service;

pub use repository::StorageModelRepository;
pub use service::{ModelFilter, ModelListing, ModelService, ModelUpdate};

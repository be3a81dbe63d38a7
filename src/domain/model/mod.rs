//! Model registry domain - AI models listed on the marketplace

mod entity;
mod repository;

pub use entity::{AiModel, ModelDraft, ModelId, ModelStatus, PricingType};
pub use repository::ModelRepository;

//! AI model entity and related types

use std::str::FromStr;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::storage::{StorageEntity, StorageKey};
use crate::domain::user::UserId;
use crate::domain::DomainError;

const MAX_NAME_LEN: usize = 150;
const MAX_CATEGORY_LEN: usize = 100;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Opaque model identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(Uuid);

impl ModelId {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl FromStr for ModelId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| DomainError::invalid_id(format!("Invalid model id '{}'", s)))
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StorageKey for ModelId {
    fn as_key(&self) -> String {
        self.0.to_string()
    }
}

/// Publication status of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    /// Listed, accepts new keys and calls
    Active,
    /// Not yet published
    #[default]
    Draft,
    Suspended,
}

impl FromStr for ModelStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "draft" => Ok(Self::Draft),
            "suspended" => Ok(Self::Suspended),
            _ => Err(DomainError::validation("Invalid status value")),
        }
    }
}

impl std::fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Draft => write!(f, "draft"),
            Self::Suspended => write!(f, "suspended"),
        }
    }
}

/// How calls to a model are billed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingType {
    Free,
    PerCall,
}

/// Input for creating a model or replacing its listing fields
#[derive(Debug, Clone)]
pub struct ModelDraft {
    pub name: String,
    pub description: String,
    pub category: Option<String>,
    pub pricing_type: PricingType,
    pub price_per_call: f64,
    pub usage_limit_free: u32,
    pub model_file_url: String,
}

/// AI model listed by a developer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiModel {
    id: ModelId,
    developer_id: UserId,
    name: String,
    description: String,
    #[serde(default)]
    category: Option<String>,
    pricing_type: PricingType,
    price_per_call: f64,
    usage_limit_free: u32,
    api_endpoint: String,
    model_file_url: String,
    status: ModelStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AiModel {
    /// Create a draft model owned by `developer_id`
    pub fn new(developer_id: UserId, draft: ModelDraft) -> Result<Self, DomainError> {
        validate_name(&draft.name)?;
        if let Some(category) = draft.category.as_deref() {
            validate_category(category)?;
        }
        validate_price(draft.price_per_call)?;

        let now = Utc::now();
        let api_endpoint = endpoint_for(&draft.name, now);

        let mut model = Self {
            id: ModelId::generate(),
            developer_id,
            name: draft.name,
            description: draft.description,
            category: draft.category,
            pricing_type: draft.pricing_type,
            price_per_call: draft.price_per_call,
            usage_limit_free: draft.usage_limit_free,
            api_endpoint,
            model_file_url: draft.model_file_url,
            status: ModelStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        model.normalize_pricing();

        Ok(model)
    }

    // Getters

    pub fn id(&self) -> &ModelId {
        &self.id
    }

    pub fn developer_id(&self) -> &UserId {
        &self.developer_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn pricing_type(&self) -> PricingType {
        self.pricing_type
    }

    pub fn price_per_call(&self) -> f64 {
        self.price_per_call
    }

    pub fn usage_limit_free(&self) -> u32 {
        self.usage_limit_free
    }

    pub fn api_endpoint(&self) -> &str {
        &self.api_endpoint
    }

    pub fn model_file_url(&self) -> &str {
        &self.model_file_url
    }

    pub fn status(&self) -> ModelStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Whether new keys may be issued against this model
    pub fn is_active(&self) -> bool {
        self.status == ModelStatus::Active
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.developer_id == user_id
    }

    // Mutators

    pub fn set_status(&mut self, status: ModelStatus) {
        self.status = status;
        self.touch();
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), DomainError> {
        let name = name.into();
        validate_name(&name)?;
        self.name = name;
        self.touch();
        Ok(())
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
        self.touch();
    }

    pub fn set_category(&mut self, category: impl Into<String>) -> Result<(), DomainError> {
        let category = category.into();
        validate_category(&category)?;
        self.category = Some(category);
        self.touch();
        Ok(())
    }

    pub fn set_model_file_url(&mut self, url: impl Into<String>) {
        self.model_file_url = url.into();
        self.touch();
    }

    /// Switch pricing scheme; the unused price field is reset
    pub fn set_pricing_type(&mut self, pricing_type: PricingType) {
        self.pricing_type = pricing_type;
        self.normalize_pricing();
        self.touch();
    }

    /// Only applies when the model is billed per call
    pub fn set_price_per_call(&mut self, price: f64) -> Result<(), DomainError> {
        validate_price(price)?;
        if self.pricing_type == PricingType::PerCall {
            self.price_per_call = price;
            self.touch();
        }
        Ok(())
    }

    /// Only applies when the model is free
    pub fn set_usage_limit_free(&mut self, limit: u32) {
        if self.pricing_type == PricingType::Free {
            self.usage_limit_free = limit;
            self.touch();
        }
    }

    fn normalize_pricing(&mut self) {
        match self.pricing_type {
            PricingType::Free => self.price_per_call = 0.0,
            PricingType::PerCall => self.usage_limit_free = 0,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl StorageEntity for AiModel {
    type Key = ModelId;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}

fn validate_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("Model name cannot be empty"));
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "Model name cannot exceed {} characters",
            MAX_NAME_LEN
        )));
    }

    Ok(())
}

fn validate_category(category: &str) -> Result<(), DomainError> {
    if category.chars().count() > MAX_CATEGORY_LEN {
        return Err(DomainError::validation(format!(
            "Category cannot exceed {} characters",
            MAX_CATEGORY_LEN
        )));
    }

    Ok(())
}

fn validate_price(price: f64) -> Result<(), DomainError> {
    if !price.is_finite() || price < 0.0 {
        return Err(DomainError::validation("Price per call must be non-negative"));
    }

    Ok(())
}

fn endpoint_for(name: &str, at: DateTime<Utc>) -> String {
    let slug = WHITESPACE.replace_all(&name.trim().to_lowercase(), "-").into_owned();
    format!("/api/models/{}-{}", slug, at.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(pricing_type: PricingType) -> ModelDraft {
        ModelDraft {
            name: "Sentiment  Analyzer".to_string(),
            description: "Scores text".to_string(),
            category: Some("nlp".to_string()),
            pricing_type,
            price_per_call: 0.25,
            usage_limit_free: 100,
            model_file_url: "https://files.example.com/sa.bin".to_string(),
        }
    }

    #[test]
    fn test_new_model_is_draft() {
        let model = AiModel::new(UserId::generate(), draft(PricingType::PerCall)).unwrap();

        assert_eq!(model.status(), ModelStatus::Draft);
        assert!(!model.is_active());
    }

    #[test]
    fn test_pricing_normalization() {
        let free = AiModel::new(UserId::generate(), draft(PricingType::Free)).unwrap();
        assert_eq!(free.price_per_call(), 0.0);
        assert_eq!(free.usage_limit_free(), 100);

        let paid = AiModel::new(UserId::generate(), draft(PricingType::PerCall)).unwrap();
        assert_eq!(paid.price_per_call(), 0.25);
        assert_eq!(paid.usage_limit_free(), 0);
    }

    #[test]
    fn test_switching_pricing_resets_unused_field() {
        let mut model = AiModel::new(UserId::generate(), draft(PricingType::PerCall)).unwrap();

        model.set_pricing_type(PricingType::Free);
        assert_eq!(model.price_per_call(), 0.0);

        model.set_price_per_call(3.0).unwrap();
        assert_eq!(model.price_per_call(), 0.0);
    }

    #[test]
    fn test_api_endpoint_slug() {
        let model = AiModel::new(UserId::generate(), draft(PricingType::Free)).unwrap();
        assert!(model.api_endpoint().starts_with("/api/models/sentiment-analyzer-"));
    }

    #[test]
    fn test_rejects_long_name() {
        let mut d = draft(PricingType::Free);
        d.name = "x".repeat(151);

        let err = AiModel::new(UserId::generate(), d).unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn test_rejects_negative_price() {
        let mut d = draft(PricingType::PerCall);
        d.price_per_call = -1.0;

        assert!(AiModel::new(UserId::generate(), d).is_err());
    }

    #[test]
    fn test_ownership() {
        let owner = UserId::generate();
        let model = AiModel::new(owner, draft(PricingType::Free)).unwrap();

        assert!(model.is_owned_by(&owner));
        assert!(!model.is_owned_by(&UserId::generate()));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("active".parse::<ModelStatus>().unwrap(), ModelStatus::Active);
        assert!("archived".parse::<ModelStatus>().is_err());
    }
}

//! Model service - catalog operations with ownership rules

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::model::{AiModel, ModelDraft, ModelId, ModelRepository, ModelStatus, PricingType};
use crate::domain::user::{User, UserId, UserRepository};
use crate::domain::DomainError;
use crate::infrastructure::storage::StorageDeadline;

/// Filters for the public catalog listing
#[derive(Debug, Clone, Default)]
pub struct ModelFilter {
    pub category: Option<String>,
    /// Without an explicit status, non-developers only see active models
    pub status: Option<ModelStatus>,
    pub developer_id: Option<UserId>,
}

/// A model joined with the account that publishes it
#[derive(Debug, Clone)]
pub struct ModelListing {
    pub model: AiModel,
    /// None when the developer account no longer exists
    pub developer: Option<User>,
}

/// Partial update of a model listing
#[derive(Debug, Clone, Default)]
pub struct ModelUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub pricing_type: Option<PricingType>,
    pub price_per_call: Option<f64>,
    pub usage_limit_free: Option<u32>,
    pub model_file_url: Option<String>,
}

#[derive(Debug)]
pub struct ModelService {
    repository: Arc<dyn ModelRepository>,
    users: Arc<dyn UserRepository>,
    deadline: StorageDeadline,
}

impl ModelService {
    pub fn new(
        repository: Arc<dyn ModelRepository>,
        users: Arc<dyn UserRepository>,
        deadline: StorageDeadline,
    ) -> Self {
        Self {
            repository,
            users,
            deadline,
        }
    }

    /// Publish a new draft listing; only developers may create models
    pub async fn create(&self, requester: &User, draft: ModelDraft) -> Result<AiModel, DomainError> {
        if !requester.is_developer() {
            warn!(user_id = %requester.id(), "Non-developer tried to create a model");
            return Err(DomainError::forbidden("Only developers can create models"));
        }

        let model = AiModel::new(*requester.id(), draft)?;
        let model = self
            .deadline
            .run("models.create", self.repository.create(model))
            .await?;

        info!(model_id = %model.id(), developer_id = %model.developer_id(), "Created model");
        Ok(model)
    }

    pub async fn find_by_id(&self, id: &ModelId) -> Result<Option<AiModel>, DomainError> {
        self.deadline
            .run("models.get", self.repository.get(id))
            .await
    }

    async fn require(&self, id: &ModelId) -> Result<AiModel, DomainError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("AI model not found"))
    }

    async fn require_owned(&self, id: &ModelId, requester: &UserId) -> Result<AiModel, DomainError> {
        let model = self.require(id).await?;

        if !model.is_owned_by(requester) {
            warn!(model_id = %id, user_id = %requester, "Rejected model access by non-owner");
            return Err(DomainError::forbidden("Access denied"));
        }

        Ok(model)
    }

    /// Fetch one model; unpublished models are visible to their developer only
    pub async fn get(&self, id: &ModelId, requester: Option<&UserId>) -> Result<AiModel, DomainError> {
        let model = self.require(id).await?;

        let is_owner = requester.is_some_and(|user| model.is_owned_by(user));
        if !model.is_active() && !is_owner {
            return Err(DomainError::forbidden("Access denied"));
        }

        debug!(model_id = %id, "Fetched model");
        Ok(model)
    }

    /// `get` joined with the publishing developer
    pub async fn get_listing(
        &self,
        id: &ModelId,
        requester: Option<&UserId>,
    ) -> Result<ModelListing, DomainError> {
        let model = self.get(id, requester).await?;
        let developer = self
            .deadline
            .run("users.get", self.users.get(model.developer_id()))
            .await?;

        Ok(ModelListing { model, developer })
    }

    /// Catalog listing joined with each model's developer, newest first
    ///
    /// Developers see every status unless they ask for one; everyone else
    /// gets active models only.
    pub async fn list(
        &self,
        filter: &ModelFilter,
        requester: Option<&User>,
    ) -> Result<Vec<ModelListing>, DomainError> {
        let status = match filter.status {
            Some(status) => Some(status),
            None if requester.is_some_and(User::is_developer) => None,
            None => Some(ModelStatus::Active),
        };

        let models = match &filter.developer_id {
            Some(developer_id) => {
                self.deadline
                    .run(
                        "models.list_by_developer",
                        self.repository.list_by_developer(developer_id),
                    )
                    .await?
            }
            None => {
                self.deadline
                    .run("models.list", self.repository.list())
                    .await?
            }
        };

        let mut models: Vec<AiModel> = models
            .into_iter()
            .filter(|m| status.is_none_or(|s| m.status() == s))
            .filter(|m| match filter.category.as_deref() {
                Some(category) => m.category() == Some(category),
                None => true,
            })
            .collect();
        sort_newest_first(&mut models);

        self.join_developers(models).await
    }

    async fn join_developers(&self, models: Vec<AiModel>) -> Result<Vec<ModelListing>, DomainError> {
        let mut developers: HashMap<UserId, Option<User>> = HashMap::new();
        let mut listings = Vec::with_capacity(models.len());

        for model in models {
            let developer_id = *model.developer_id();
            if !developers.contains_key(&developer_id) {
                let developer = self
                    .deadline
                    .run("users.get", self.users.get(&developer_id))
                    .await?;
                developers.insert(developer_id, developer);
            }

            listings.push(ModelListing {
                developer: developers.get(&developer_id).cloned().flatten(),
                model,
            });
        }

        Ok(listings)
    }

    /// Every model a developer owns, in any status, newest first
    pub async fn list_by_developer(&self, developer_id: &UserId) -> Result<Vec<AiModel>, DomainError> {
        let mut models = self
            .deadline
            .run(
                "models.list_by_developer",
                self.repository.list_by_developer(developer_id),
            )
            .await?;
        sort_newest_first(&mut models);

        Ok(models)
    }

    pub async fn update(
        &self,
        id: &ModelId,
        requester: &UserId,
        update: ModelUpdate,
    ) -> Result<AiModel, DomainError> {
        let mut model = self.require_owned(id, requester).await?;

        if let Some(name) = update.name {
            model.set_name(name)?;
        }
        if let Some(description) = update.description {
            model.set_description(description);
        }
        if let Some(category) = update.category {
            model.set_category(category)?;
        }
        if let Some(url) = update.model_file_url {
            model.set_model_file_url(url);
        }
        // Pricing type first so the price fields land on the right scheme
        if let Some(pricing_type) = update.pricing_type {
            model.set_pricing_type(pricing_type);
        }
        if let Some(price) = update.price_per_call {
            model.set_price_per_call(price)?;
        }
        if let Some(limit) = update.usage_limit_free {
            model.set_usage_limit_free(limit);
        }

        let model = self
            .deadline
            .run("models.update", self.repository.update(&model))
            .await?;

        info!(model_id = %model.id(), "Updated model");
        Ok(model)
    }

    pub async fn change_status(
        &self,
        id: &ModelId,
        requester: &UserId,
        status: &str,
    ) -> Result<AiModel, DomainError> {
        let status: ModelStatus = status.parse()?;
        let mut model = self.require_owned(id, requester).await?;

        model.set_status(status);
        let model = self
            .deadline
            .run("models.update", self.repository.update(&model))
            .await?;

        info!(model_id = %model.id(), status = %status, "Changed model status");
        Ok(model)
    }

    pub async fn delete(&self, id: &ModelId, requester: &UserId) -> Result<(), DomainError> {
        self.require_owned(id, requester).await?;

        self.deadline
            .run("models.delete", self.repository.delete(id))
            .await?;

        info!(model_id = %id, "Deleted model");
        Ok(())
    }
}

fn sort_newest_first(models: &mut [AiModel]) {
    models.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| a.id().cmp(b.id()))
    });
}

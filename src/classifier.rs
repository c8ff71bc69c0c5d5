use async_trait::async_trait;
use std::sync::Arc;

use crate::categories::{CategorySet, FALLBACK_CATEGORY};
use crate::prompt::classification_prompt;
use crate::transport::InferenceClient;

#[async_trait]
pub trait QuestionClassifier: Send + Sync {
    /// Always a member of the category set; "other" when the model fails.
    async fn classify(&self, question: &str) -> String;
}

pub struct LlmClassifier {
    tx: Arc<dyn InferenceClient>,
    categories: CategorySet,
}

impl LlmClassifier {
    pub fn new(tx: Arc<dyn InferenceClient>, categories: CategorySet) -> Self {
        Self { tx, categories }
    }

    pub fn categories(&self) -> &CategorySet {
        &self.categories
    }
}

#[async_trait]
impl QuestionClassifier for LlmClassifier {
    async fn classify(&self, question: &str) -> String {
        tracing::info!("Classifying question: {}", question);

        let prompt = classification_prompt(question, &self.categories);
        match self.tx.complete(&prompt).await {
            Ok(raw) => {
                let category = self.categories.normalize(&raw);
                if category == FALLBACK_CATEGORY && raw.trim().to_lowercase() != FALLBACK_CATEGORY {
                    tracing::debug!("Unrecognised category '{}', using '{}'", raw.trim(), category);
                }
                category
            }
            Err(e) => {
                tracing::warn!("Classification failed: {} - defaulting to '{}'", e, FALLBACK_CATEGORY);
                FALLBACK_CATEGORY.to_string()
            }
        }
    }
}

//! Bounded-concurrency batch validation.
//!
//! Records run through the pipeline in parallel, capped by
//! `batch_concurrency`. Each record is its own task, so one record's fault
//! (or even a panic) cannot take the rest of the batch down with it.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::warn;
use uuid::Uuid;

use healthatlas_common::{AtlasError, ExecutionMetadata, NormalizedProvider, ValidationOutcome};

use crate::validator::Validator;

impl Validator {
    /// Validate a batch, returning outcomes in input order. Every input gets
    /// an outcome.
    pub async fn validate_many(
        &self,
        providers: Vec<NormalizedProvider>,
    ) -> Vec<ValidationOutcome> {
        let concurrency = self.config.batch_concurrency.max(1);
        let mut indexed: Vec<(usize, ValidationOutcome)> =
            stream::iter(providers.into_iter().enumerate().map(|(index, provider)| {
                let validator = self.clone();
                async move {
                    let fallback = provider.clone();
                    let handle = tokio::spawn(async move { validator.validate(provider).await });
                    match handle.await {
                        Ok(outcome) => (index, outcome),
                        Err(e) => {
                            warn!(index, error = %e, "Record task aborted");
                            let execution =
                                ExecutionMetadata::pending(Uuid::new_v4().to_string(), Utc::now());
                            let error =
                                AtlasError::Resolve(format!("record task aborted: {e}"));
                            (index, Validator::error_outcome(&fallback, execution, &error))
                        }
                    }
                }
            }))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, outcome)| outcome).collect()
    }
}

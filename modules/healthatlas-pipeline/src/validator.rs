//! Pipeline orchestrator.
//!
//! One record moves through Normalized → Collecting → Reconciling → Scoring
//! → Finalized, strictly forward. Collecting is the only stage that touches
//! the network; Reconciling and Scoring are pure. The contract outward is
//! "always returns, never throws": source failures degrade to empty
//! evidence, and a fault in a pure stage becomes an ERROR-path outcome
//! flagged for human review.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};
use uuid::Uuid;

use healthatlas_common::{
    AtlasError, ConfidenceResult, ConfidenceTier, ConflictSet, EvidenceSet, ExecutionMetadata,
    FraudIndicatorSet, GoldenRecord, NormalizedProvider, PipelineConfig, RoutePath,
    ScoreBreakdown, ValidationOutcome, VerificationSummary,
};

use crate::fraud::{self, FraudContext};
use crate::traits::EvidenceSources;
use crate::{collect, conflict, golden, scoring};

/// Per-record pipeline stage, for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Normalized,
    Collecting,
    Reconciling,
    Scoring,
    Finalized,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Normalized => "normalized",
            Stage::Collecting => "collecting",
            Stage::Reconciling => "reconciling",
            Stage::Scoring => "scoring",
            Stage::Finalized => "finalized",
        };
        f.write_str(s)
    }
}

/// The validation pipeline. Cheap to clone and safe to share: each
/// invocation owns all of its per-record state, so concurrent calls never
/// interfere.
#[derive(Clone)]
pub struct Validator {
    sources: EvidenceSources,
    pub(crate) config: PipelineConfig,
}

impl Validator {
    pub fn new(sources: EvidenceSources, config: PipelineConfig) -> Result<Self, AtlasError> {
        config.validate()?;
        Ok(Self { sources, config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Validate one provider record against all five sources.
    pub async fn validate(&self, provider: NormalizedProvider) -> ValidationOutcome {
        self.validate_at(provider, Utc::now()).await
    }

    /// Deterministic variant: the caller supplies the clock instant used for
    /// freshness and staleness, so identical inputs replay identically.
    pub async fn validate_at(
        &self,
        provider: NormalizedProvider,
        now: DateTime<Utc>,
    ) -> ValidationOutcome {
        let run_id = Uuid::new_v4().to_string();
        debug!(run_id = %run_id, npi = %provider.npi, stage = %Stage::Normalized, "Record accepted");
        debug!(run_id = %run_id, stage = %Stage::Collecting, "Collecting evidence");

        let (evidence, executions) =
            collect::collect(&self.sources, &provider, self.config.lookup_timeout).await;
        let execution = ExecutionMetadata {
            run_id: run_id.clone(),
            started_at: now,
            sources: executions,
        };

        match self.resolve(&provider, &evidence, now) {
            Ok((conflicts, fraud_indicators, confidence)) => {
                let golden_record = golden::build(&provider, &evidence);
                let (requires_human_review, review_reason) = golden::route_review(
                    confidence.path,
                    confidence.confidence_score,
                    &conflicts,
                    &self.config,
                );
                info!(
                    run_id = %run_id,
                    stage = %Stage::Finalized,
                    score = confidence.confidence_score,
                    tier = %confidence.confidence_tier,
                    path = %confidence.path,
                    conflicts = conflicts.len(),
                    fraud_indicators = fraud_indicators.len(),
                    requires_human_review,
                    "Record finalized"
                );
                ValidationOutcome {
                    golden_record,
                    confidence,
                    conflicts,
                    fraud_indicators,
                    verification: VerificationSummary::from_evidence(&evidence),
                    execution,
                    requires_human_review,
                    review_reason,
                }
            }
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Internal fault, emitting ERROR outcome");
                Self::error_outcome(&provider, execution, &e)
            }
        }
    }

    /// The pure stages. Any error here is a programming defect, not an
    /// expected runtime condition; the caller maps it to the ERROR path.
    fn resolve(
        &self,
        provider: &NormalizedProvider,
        evidence: &EvidenceSet,
        now: DateTime<Utc>,
    ) -> Result<(ConflictSet, FraudIndicatorSet, ConfidenceResult), AtlasError> {
        debug!(stage = %Stage::Reconciling, "Detecting conflicts and fraud signals");
        let conflicts = conflict::detect(provider, evidence);
        let fraud_indicators = fraud::evaluate(&FraudContext {
            provider,
            evidence,
            conflicts: &conflicts,
            config: &self.config,
            now,
        });

        debug!(stage = %Stage::Scoring, "Scoring");
        let confidence =
            scoring::score(provider, evidence, &conflicts, &fraud_indicators, &self.config, now)?;
        Ok((conflicts, fraud_indicators, confidence))
    }

    /// Structured result for a record whose pure stages faulted. The record
    /// still comes back — flagged, never thrown.
    pub(crate) fn error_outcome(
        provider: &NormalizedProvider,
        execution: ExecutionMetadata,
        error: &AtlasError,
    ) -> ValidationOutcome {
        ValidationOutcome {
            golden_record: GoldenRecord::self_reported(provider),
            confidence: ConfidenceResult {
                confidence_score: 0.0,
                confidence_tier: ConfidenceTier::Questionable,
                path: RoutePath::Error,
                score_breakdown: ScoreBreakdown::default(),
            },
            conflicts: vec![],
            fraud_indicators: vec![],
            verification: VerificationSummary::default(),
            execution,
            requires_human_review: true,
            review_reason: format!("processing error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use healthatlas_common::EvidencePayload;

    use crate::testing;

    #[tokio::test]
    async fn malformed_evidence_surfaces_as_an_error_outcome() {
        let provider = testing::provider();
        let mut registry = testing::registry_hit(&provider);
        if let EvidencePayload::Registry(r) = &mut registry.payload {
            r.match_confidence = f64::NAN;
        }
        let mut sources = testing::clean_sources(&provider);
        sources.registry = Arc::new(testing::StaticSource::new(
            healthatlas_common::SourceKind::Registry,
            registry,
        ));
        let validator = Validator::new(sources, PipelineConfig::default()).unwrap();

        let outcome = validator.validate_at(provider, testing::fixed_now()).await;
        assert_eq!(outcome.confidence.path, RoutePath::Error);
        assert!(outcome.requires_human_review);
        assert!(outcome.review_reason.starts_with("processing error:"));
        assert_eq!(outcome.confidence.confidence_score, 0.0);
    }

    #[test]
    fn error_outcome_echoes_the_input_record() {
        let provider = testing::provider();
        let execution =
            ExecutionMetadata::pending("run".to_string(), testing::fixed_now());
        let outcome = Validator::error_outcome(
            &provider,
            execution,
            &AtlasError::Scoring("identity dimension out of range: NaN".to_string()),
        );
        assert_eq!(outcome.golden_record.full_name, provider.full_name);
        assert_eq!(outcome.confidence.path, RoutePath::Error);
        assert!(!outcome.review_reason.is_empty());
    }
}

//! Scoring engine — six dimensions, each computed from a disjoint slice of
//! the evidence, combined into one weighted confidence score.
//!
//! Tier and path come from small ordered rule tables evaluated top to
//! bottom, first match wins. The policy surface is the data in those tables
//! plus the constants in `healthatlas_common::policy`; none of it is
//! control flow.

use chrono::{DateTime, Utc};

use healthatlas_common::{
    policy, AtlasError, ConfidenceResult, ConfidenceTier, ConflictSet, EvidenceSet,
    FraudIndicatorSet, NormalizedProvider, PipelineConfig, RoutePath, ScoreBreakdown, SourceKind,
};

pub(crate) fn score(
    provider: &NormalizedProvider,
    evidence: &EvidenceSet,
    conflicts: &ConflictSet,
    fraud: &FraudIndicatorSet,
    config: &PipelineConfig,
    now: DateTime<Utc>,
) -> Result<ConfidenceResult, AtlasError> {
    let breakdown = ScoreBreakdown {
        identity: identity_dimension(evidence, conflicts),
        address: address_dimension(evidence),
        completeness: completeness_dimension(provider),
        freshness: freshness_dimension(provider, config, now),
        enrichment: enrichment_dimension(evidence),
        risk: risk_dimension(fraud),
    };

    for (name, value) in [
        ("identity", breakdown.identity),
        ("address", breakdown.address),
        ("completeness", breakdown.completeness),
        ("freshness", breakdown.freshness),
        ("enrichment", breakdown.enrichment),
        ("risk", breakdown.risk),
    ] {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(AtlasError::Scoring(format!(
                "{name} dimension out of range: {value}"
            )));
        }
    }

    let weights = &config.weights;
    let confidence_score = (weights.identity * breakdown.identity
        + weights.address * breakdown.address
        + weights.completeness * breakdown.completeness
        + weights.freshness * breakdown.freshness
        + weights.enrichment * breakdown.enrichment
        - weights.risk * breakdown.risk)
        .clamp(0.0, 1.0);

    let tier = classify_tier(&TierContext {
        score: confidence_score,
        has_high_severity_indicator: fraud.iter().any(|i| i.severity.is_high()),
        platinum_min: config.tier_platinum_min,
        gold_min: config.tier_gold_min,
    });
    let path = classify_path(&PathContext {
        tier,
        exclusion_hit: evidence.exclusion_hit(),
        fraud_free: fraud.is_empty(),
    });

    Ok(ConfidenceResult {
        confidence_score,
        confidence_tier: tier,
        path,
        score_breakdown: breakdown,
    })
}

// --- Dimensions ---

/// Registry match strength, degraded by exact-field disagreement on name or
/// NPI. No registry evidence, or a zero-match, scores zero.
fn identity_dimension(evidence: &EvidenceSet, conflicts: &ConflictSet) -> f64 {
    let Some(registry) = evidence.registry_match() else {
        return 0.0;
    };
    if registry.result_count == 0 {
        return 0.0;
    }
    let disagreements = conflicts
        .iter()
        .filter(|c| {
            c.source == SourceKind::Registry && matches!(c.field.as_str(), "full_name" | "npi")
        })
        .count() as f64;
    (registry.match_confidence.clamp(0.0, 1.0)
        - disagreements * policy::IDENTITY_CONFLICT_PENALTY)
        .clamp(0.0, 1.0)
}

fn address_dimension(evidence: &EvidenceSet) -> f64 {
    let Some(check) = evidence.address_check() else {
        return 0.0;
    };
    if !check.deliverable {
        0.0
    } else if check.facility_type.is_medical() {
        policy::ADDRESS_MEDICAL_CREDIT
    } else {
        policy::ADDRESS_NONMEDICAL_CREDIT
    }
}

/// Non-empty fraction of the identity-critical field set.
fn completeness_dimension(provider: &NormalizedProvider) -> f64 {
    let filled = policy::COMPLETENESS_FIELDS
        .iter()
        .filter(|name| provider.field(name).is_some_and(|v| !v.is_empty()))
        .count();
    filled as f64 / policy::COMPLETENESS_FIELDS.len() as f64
}

/// Full credit inside the full-credit window, linear decay to zero at the
/// horizon. Records with no parseable update date get no credit.
fn freshness_dimension(
    provider: &NormalizedProvider,
    config: &PipelineConfig,
    now: DateTime<Utc>,
) -> f64 {
    let Some(updated) = provider.last_updated_at() else {
        return 0.0;
    };
    let age_days = (now - updated).num_days();
    let full = config.freshness_full_credit_days;
    let horizon = config.freshness_horizon_days;
    if age_days <= full {
        1.0
    } else if age_days >= horizon {
        0.0
    } else {
        1.0 - (age_days - full) as f64 / (horizon - full) as f64
    }
}

fn enrichment_dimension(evidence: &EvidenceSet) -> f64 {
    evidence
        .web_presence()
        .map(|w| w.digital_footprint_score.clamp(0.0, 1.0))
        .unwrap_or(0.0)
}

/// Aggregate severity of triggered fraud indicators, saturating at
/// `RISK_SATURATION`. Subtracted from the weighted sum.
fn risk_dimension(fraud: &FraudIndicatorSet) -> f64 {
    let total: f64 = fraud.iter().map(|i| i.severity.weight()).sum();
    (total / policy::RISK_SATURATION).clamp(0.0, 1.0)
}

// --- Tier and path rule tables ---

struct TierContext {
    score: f64,
    has_high_severity_indicator: bool,
    platinum_min: f64,
    gold_min: f64,
}

static TIER_RULES: &[(fn(&TierContext) -> bool, ConfidenceTier)] = &[
    (
        |c| c.score >= c.platinum_min && !c.has_high_severity_indicator,
        ConfidenceTier::Platinum,
    ),
    (|c| c.score >= c.gold_min, ConfidenceTier::Gold),
    (|_| true, ConfidenceTier::Questionable),
];

fn classify_tier(ctx: &TierContext) -> ConfidenceTier {
    TIER_RULES
        .iter()
        .find(|(applies, _)| applies(ctx))
        .map(|(_, tier)| *tier)
        .unwrap_or(ConfidenceTier::Questionable)
}

struct PathContext {
    tier: ConfidenceTier,
    exclusion_hit: bool,
    fraud_free: bool,
}

static PATH_RULES: &[(fn(&PathContext) -> bool, RoutePath)] = &[
    // Exclusion-list hit overrides everything, whatever the score.
    (|c| c.exclusion_hit, RoutePath::Red),
    (|c| c.tier == ConfidenceTier::Questionable, RoutePath::Red),
    (
        |c| c.tier == ConfidenceTier::Platinum && c.fraud_free,
        RoutePath::Green,
    ),
    (|_| true, RoutePath::Yellow),
];

fn classify_path(ctx: &PathContext) -> RoutePath {
    PATH_RULES
        .iter()
        .find(|(applies, _)| applies(ctx))
        .map(|(_, path)| *path)
        .unwrap_or(RoutePath::Yellow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthatlas_common::{EvidenceResult, FailureReason, FraudIndicator, Severity};

    use crate::testing;

    fn clean_evidence(provider: &NormalizedProvider) -> EvidenceSet {
        testing::evidence_set(
            testing::registry_hit(provider),
            testing::exclusion_clear(),
            testing::license_with_status(provider, "Active"),
            testing::address_medical(provider),
            testing::enrichment(0.6),
        )
    }

    fn score_clean(provider: &NormalizedProvider) -> ConfidenceResult {
        let evidence = clean_evidence(provider);
        score(
            provider,
            &evidence,
            &vec![],
            &vec![],
            &PipelineConfig::default(),
            testing::fixed_now(),
        )
        .expect("scoring succeeds")
    }

    #[test]
    fn clean_record_reaches_platinum_green() {
        let result = score_clean(&testing::provider());
        assert!(result.confidence_score >= 0.85, "got {}", result.confidence_score);
        assert!(result.confidence_score <= 1.0);
        assert_eq!(result.confidence_tier, ConfidenceTier::Platinum);
        assert_eq!(result.path, RoutePath::Green);
    }

    #[test]
    fn freshness_decays_linearly_to_the_horizon() {
        let config = PipelineConfig::default();
        let now = testing::fixed_now();

        let fresh = testing::provider_with(|p| p.last_updated = "2024-01-01".to_string());
        assert_eq!(freshness_dimension(&fresh, &config, now), 1.0);

        let old = testing::provider_with(|p| p.last_updated = "2015-01-01".to_string());
        assert_eq!(freshness_dimension(&old, &config, now), 0.0);

        // Halfway between full credit and the horizon.
        let mid_days = (config.freshness_full_credit_days + config.freshness_horizon_days) / 2;
        let mid_date = now - chrono::Duration::days(mid_days);
        let mid =
            testing::provider_with(|p| p.last_updated = mid_date.format("%Y-%m-%d").to_string());
        let value = freshness_dimension(&mid, &config, now);
        assert!((value - 0.5).abs() < 0.01, "got {value}");

        let unparseable = testing::provider_with(|p| p.last_updated = "recently".to_string());
        assert_eq!(freshness_dimension(&unparseable, &config, now), 0.0);
    }

    #[test]
    fn completeness_counts_only_the_critical_fields() {
        let full = testing::provider();
        assert_eq!(completeness_dimension(&full), 1.0);

        // Dropping optional contact fields changes nothing.
        let sparse = testing::provider_with(|p| {
            p.city = String::new();
            p.zip_code = String::new();
            p.phone = String::new();
            p.website = String::new();
        });
        assert_eq!(completeness_dimension(&sparse), 1.0);

        let missing_npi = testing::provider_with(|p| p.npi = String::new());
        assert!((completeness_dimension(&missing_npi) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn identity_is_zero_without_a_registry_match() {
        let provider = testing::provider();
        let mut evidence = clean_evidence(&provider);
        evidence.registry = testing::ok(testing::registry_zero_match());
        assert_eq!(identity_dimension(&evidence, &vec![]), 0.0);

        evidence.registry = EvidenceResult::Failure { reason: FailureReason::Timeout };
        assert_eq!(identity_dimension(&evidence, &vec![]), 0.0);
    }

    #[test]
    fn identity_degrades_per_name_disagreement() {
        let provider = testing::provider();
        let evidence = clean_evidence(&provider);
        let conflict = healthatlas_common::FieldConflict {
            field: "full_name".to_string(),
            input_value: "Jane Doe".to_string(),
            source_value: "John Smith".to_string(),
            source: SourceKind::Registry,
        };
        let base = identity_dimension(&evidence, &vec![]);
        let degraded = identity_dimension(&evidence, &vec![conflict]);
        assert!((base - degraded - policy::IDENTITY_CONFLICT_PENALTY).abs() < 1e-9);
    }

    #[test]
    fn risk_saturates_and_subtracts() {
        let critical = FraudIndicator {
            code: "exclusion_list_hit".to_string(),
            detail: String::new(),
            severity: Severity::Critical,
        };
        assert_eq!(risk_dimension(&vec![critical.clone(), critical.clone()]), 1.0);
        assert_eq!(risk_dimension(&vec![critical.clone(); 5]), 1.0);
        assert_eq!(risk_dimension(&vec![]), 0.0);

        let provider = testing::provider();
        let evidence = clean_evidence(&provider);
        let config = PipelineConfig::default();
        let clean = score(&provider, &evidence, &vec![], &vec![], &config, testing::fixed_now())
            .unwrap();
        let risky =
            score(&provider, &evidence, &vec![], &vec![critical], &config, testing::fixed_now())
                .unwrap();
        assert!(risky.confidence_score < clean.confidence_score);
    }

    #[test]
    fn raising_a_positive_dimension_never_lowers_the_score() {
        let provider = testing::provider();
        let config = PipelineConfig::default();
        let low = testing::evidence_set(
            testing::registry_hit(&provider),
            testing::exclusion_clear(),
            testing::license_with_status(&provider, "Active"),
            testing::address_medical(&provider),
            testing::enrichment(0.2),
        );
        let high = testing::evidence_set(
            testing::registry_hit(&provider),
            testing::exclusion_clear(),
            testing::license_with_status(&provider, "Active"),
            testing::address_medical(&provider),
            testing::enrichment(0.8),
        );
        let low_score =
            score(&provider, &low, &vec![], &vec![], &config, testing::fixed_now()).unwrap();
        let high_score =
            score(&provider, &high, &vec![], &vec![], &config, testing::fixed_now()).unwrap();
        assert!(high_score.confidence_score >= low_score.confidence_score);
    }

    #[test]
    fn non_finite_evidence_is_an_internal_fault() {
        let provider = testing::provider();
        let mut evidence = clean_evidence(&provider);
        let mut registry = testing::registry_hit(&provider);
        if let healthatlas_common::EvidencePayload::Registry(r) = &mut registry.payload {
            r.match_confidence = f64::NAN;
        }
        evidence.registry = testing::ok(registry);
        let result = score(
            &provider,
            &evidence,
            &vec![],
            &vec![],
            &PipelineConfig::default(),
            testing::fixed_now(),
        );
        assert!(matches!(result, Err(AtlasError::Scoring(_))));
    }

    #[test]
    fn platinum_requires_a_clean_high_severity_slate() {
        let tier = classify_tier(&TierContext {
            score: 0.9,
            has_high_severity_indicator: true,
            platinum_min: 0.85,
            gold_min: 0.60,
        });
        assert_eq!(tier, ConfidenceTier::Gold);

        let tier = classify_tier(&TierContext {
            score: 0.85,
            has_high_severity_indicator: false,
            platinum_min: 0.85,
            gold_min: 0.60,
        });
        assert_eq!(tier, ConfidenceTier::Platinum);

        let tier = classify_tier(&TierContext {
            score: 0.59,
            has_high_severity_indicator: false,
            platinum_min: 0.85,
            gold_min: 0.60,
        });
        assert_eq!(tier, ConfidenceTier::Questionable);
    }

    #[test]
    fn exclusion_override_beats_a_perfect_score() {
        let path = classify_path(&PathContext {
            tier: ConfidenceTier::Platinum,
            exclusion_hit: true,
            fraud_free: false,
        });
        assert_eq!(path, RoutePath::Red);
    }

    #[test]
    fn platinum_with_any_indicator_routes_yellow() {
        let path = classify_path(&PathContext {
            tier: ConfidenceTier::Platinum,
            exclusion_hit: false,
            fraud_free: false,
        });
        assert_eq!(path, RoutePath::Yellow);

        let path = classify_path(&PathContext {
            tier: ConfidenceTier::Platinum,
            exclusion_hit: false,
            fraud_free: true,
        });
        assert_eq!(path, RoutePath::Green);
    }
}

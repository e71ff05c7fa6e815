//! Fraud heuristics — a fixed, ordered table of independent predicates.
//!
//! Each predicate is pure and self-contained; adding one never changes the
//! meaning of another. The indicator list is order-stable by definition
//! order, and each indicator carries the severity weight the risk dimension
//! aggregates.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use healthatlas_common::{
    ConflictSet, EvidenceSet, FraudIndicator, FraudIndicatorSet, NormalizedProvider,
    PipelineConfig, Severity,
};

static PO_BOX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:p\.?\s*o\.?\s*box|post\s+office\s+box)\b").expect("valid PO box pattern")
});

pub(crate) struct FraudContext<'a> {
    pub provider: &'a NormalizedProvider,
    pub evidence: &'a EvidenceSet,
    pub conflicts: &'a ConflictSet,
    pub config: &'a PipelineConfig,
    pub now: DateTime<Utc>,
}

struct Predicate {
    code: &'static str,
    severity: Severity,
    check: fn(&FraudContext) -> Option<String>,
}

const PREDICATES: &[Predicate] = &[
    Predicate {
        code: "exclusion_list_hit",
        severity: Severity::Critical,
        check: exclusion_list_hit,
    },
    Predicate {
        code: "registry_zero_match",
        severity: Severity::High,
        check: registry_zero_match,
    },
    Predicate {
        code: "license_not_active",
        severity: Severity::High,
        check: license_not_active,
    },
    Predicate {
        code: "non_medical_address",
        severity: Severity::Medium,
        check: non_medical_address,
    },
    Predicate {
        code: "po_box_address",
        severity: Severity::Medium,
        check: po_box_address,
    },
    Predicate {
        code: "unreachable_phone",
        severity: Severity::Low,
        check: unreachable_phone,
    },
    Predicate {
        code: "malformed_npi",
        severity: Severity::Medium,
        check: malformed_npi,
    },
    Predicate {
        code: "stale_record",
        severity: Severity::Medium,
        check: stale_record,
    },
    Predicate {
        code: "conflict_saturation",
        severity: Severity::Medium,
        check: conflict_saturation,
    },
];

pub(crate) fn evaluate(ctx: &FraudContext) -> FraudIndicatorSet {
    PREDICATES
        .iter()
        .filter_map(|p| {
            (p.check)(ctx).map(|detail| FraudIndicator {
                code: p.code.to_string(),
                detail,
                severity: p.severity,
            })
        })
        .collect()
}

fn exclusion_list_hit(ctx: &FraudContext) -> Option<String> {
    let screen = ctx.evidence.exclusion_screen()?;
    if !screen.is_excluded {
        return None;
    }
    Some(match &screen.matched_name {
        Some(name) => format!("provider matches exclusion list entry \"{name}\""),
        None => "provider appears on the federal exclusion list".to_string(),
    })
}

fn registry_zero_match(ctx: &FraudContext) -> Option<String> {
    let registry = ctx.evidence.registry_match()?;
    (registry.result_count == 0).then(|| {
        format!(
            "identity registry returned no match for NPI \"{}\"",
            ctx.provider.npi
        )
    })
}

fn license_not_active(ctx: &FraudContext) -> Option<String> {
    if ctx.provider.license_number.is_empty() {
        return None;
    }
    let standing = ctx.evidence.license_standing()?;
    (!standing.is_active()).then(|| {
        format!(
            "license board reports status \"{}\" for claimed license \"{}\"",
            standing.status, ctx.provider.license_number
        )
    })
}

fn non_medical_address(ctx: &FraudContext) -> Option<String> {
    let check = ctx.evidence.address_check()?;
    (!check.is_medical_facility()).then(|| {
        if check.deliverable {
            format!(
                "validated address is not a medical facility ({:?})",
                check.facility_type
            )
        } else {
            "practice address is not deliverable".to_string()
        }
    })
}

/// Fires on the input address alone, so it still works when the address
/// source is down.
fn po_box_address(ctx: &FraudContext) -> Option<String> {
    PO_BOX
        .is_match(&ctx.provider.address)
        .then(|| "practice address is a PO box".to_string())
}

fn unreachable_phone(ctx: &FraudContext) -> Option<String> {
    let digits: String = ctx
        .provider
        .phone
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return None;
    }
    let fictional_exchange = digits.len() == 10 && &digits[3..6] == "555";
    let repeated = digits.len() >= 7 && {
        let mut chars = digits.chars();
        chars.next().is_some_and(|first| chars.all(|c| c == first))
    };
    (fictional_exchange || repeated)
        .then(|| format!("phone \"{}\" matches an unreachable pattern", ctx.provider.phone))
}

fn malformed_npi(ctx: &FraudContext) -> Option<String> {
    if ctx.provider.npi.is_empty() {
        return None;
    }
    let well_formed =
        ctx.provider.npi.len() == 10 && ctx.provider.npi.chars().all(|c| c.is_ascii_digit());
    (!well_formed).then(|| format!("NPI \"{}\" is not a 10-digit identifier", ctx.provider.npi))
}

fn stale_record(ctx: &FraudContext) -> Option<String> {
    let updated = ctx.provider.last_updated_at()?;
    let age_days = (ctx.now - updated).num_days();
    (age_days > ctx.config.stale_record_days)
        .then(|| format!("record last updated {age_days} days ago"))
}

fn conflict_saturation(ctx: &FraudContext) -> Option<String> {
    let count = ctx.conflicts.len();
    (count > ctx.config.review_conflict_limit).then(|| {
        format!(
            "{count} cross-source conflicts (limit {})",
            ctx.config.review_conflict_limit
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthatlas_common::{EvidenceResult, FailureReason, FieldConflict, SourceKind};

    use crate::testing;

    fn context<'a>(
        provider: &'a NormalizedProvider,
        evidence: &'a EvidenceSet,
        conflicts: &'a ConflictSet,
        config: &'a PipelineConfig,
    ) -> FraudContext<'a> {
        FraudContext { provider, evidence, conflicts, config, now: testing::fixed_now() }
    }

    fn clean_evidence(provider: &NormalizedProvider) -> EvidenceSet {
        testing::evidence_set(
            testing::registry_hit(provider),
            testing::exclusion_clear(),
            testing::license_with_status(provider, "Active"),
            testing::address_medical(provider),
            testing::enrichment(0.6),
        )
    }

    #[test]
    fn clean_record_triggers_nothing() {
        let provider = testing::provider();
        let evidence = clean_evidence(&provider);
        let conflicts = vec![];
        let config = PipelineConfig::default();
        assert!(evaluate(&context(&provider, &evidence, &conflicts, &config)).is_empty());
    }

    #[test]
    fn exclusion_hit_is_critical_and_first() {
        let provider = testing::provider();
        let mut evidence = clean_evidence(&provider);
        evidence.exclusion = testing::ok(testing::exclusion_hit("DOE, JANE"));
        // Stack a second indicator behind it to check ordering.
        evidence.registry = testing::ok(testing::registry_zero_match());
        let conflicts = vec![];
        let config = PipelineConfig::default();
        let indicators = evaluate(&context(&provider, &evidence, &conflicts, &config));
        assert_eq!(indicators.len(), 2);
        assert_eq!(indicators[0].code, "exclusion_list_hit");
        assert_eq!(indicators[0].severity, Severity::Critical);
        assert_eq!(indicators[1].code, "registry_zero_match");
    }

    #[test]
    fn failed_exclusion_source_is_not_a_hit() {
        let provider = testing::provider();
        let mut evidence = clean_evidence(&provider);
        evidence.exclusion = EvidenceResult::Failure { reason: FailureReason::Timeout };
        let conflicts = vec![];
        let config = PipelineConfig::default();
        assert!(evaluate(&context(&provider, &evidence, &conflicts, &config)).is_empty());
    }

    #[test]
    fn inactive_license_fires_only_when_claimed() {
        let config = PipelineConfig::default();
        let conflicts = vec![];

        let claimed = testing::provider_with(|p| p.license_number = "A-12345".to_string());
        let mut evidence = clean_evidence(&claimed);
        evidence.license = testing::ok(testing::license_with_status(&claimed, "Expired"));
        let indicators = evaluate(&context(&claimed, &evidence, &conflicts, &config));
        assert!(indicators.iter().any(|i| i.code == "license_not_active"));

        let unclaimed = testing::provider_with(|p| p.license_number = String::new());
        let mut evidence = clean_evidence(&unclaimed);
        evidence.license = testing::ok(testing::license_with_status(&unclaimed, "Expired"));
        let indicators = evaluate(&context(&unclaimed, &evidence, &conflicts, &config));
        assert!(!indicators.iter().any(|i| i.code == "license_not_active"));
    }

    #[test]
    fn po_box_fires_without_address_evidence() {
        let provider = testing::provider_with(|p| p.address = "PO Box 742".to_string());
        let mut evidence = clean_evidence(&provider);
        evidence.address = EvidenceResult::Failure { reason: FailureReason::Timeout };
        let conflicts = vec![];
        let config = PipelineConfig::default();
        let indicators = evaluate(&context(&provider, &evidence, &conflicts, &config));
        assert!(indicators.iter().any(|i| i.code == "po_box_address"));
    }

    #[test]
    fn suspicious_phone_and_npi_patterns() {
        let provider = testing::provider_with(|p| {
            p.phone = "415-555-0100".to_string();
            p.npi = "12345".to_string();
        });
        let evidence = clean_evidence(&provider);
        let conflicts = vec![];
        let config = PipelineConfig::default();
        let indicators = evaluate(&context(&provider, &evidence, &conflicts, &config));
        let codes: Vec<&str> = indicators.iter().map(|i| i.code.as_str()).collect();
        assert!(codes.contains(&"unreachable_phone"));
        assert!(codes.contains(&"malformed_npi"));
    }

    #[test]
    fn stale_record_and_conflict_saturation_respect_config() {
        let provider = testing::provider_with(|p| p.last_updated = "2018-01-01".to_string());
        let evidence = clean_evidence(&provider);
        let config = PipelineConfig::default();
        let conflict = FieldConflict {
            field: "phone".to_string(),
            input_value: "1".to_string(),
            source_value: "2".to_string(),
            source: SourceKind::Registry,
        };
        let conflicts: ConflictSet = vec![conflict; config.review_conflict_limit + 1];
        let indicators = evaluate(&context(&provider, &evidence, &conflicts, &config));
        let codes: Vec<&str> = indicators.iter().map(|i| i.code.as_str()).collect();
        assert!(codes.contains(&"stale_record"));
        assert!(codes.contains(&"conflict_saturation"));
    }
}

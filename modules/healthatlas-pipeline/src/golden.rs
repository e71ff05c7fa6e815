//! Golden record builder and review router.
//!
//! Merging is a per-field priority pick: the authoritative source's value
//! when it supplied one, the input value otherwise, with provenance recorded
//! either way. Conflict resolution happens here and only here — the
//! conflict detector upstream records disagreements without touching them.

use std::collections::BTreeMap;

use healthatlas_common::{
    ConflictSet, EvidenceSet, GoldenRecord, NormalizedProvider, PipelineConfig, Provenance,
    RoutePath, SourceKind,
};

/// First non-empty candidate wins; the input value is the fallback.
fn pick(input: &str, candidates: &[(SourceKind, Option<&String>)]) -> (String, Provenance) {
    for (kind, value) in candidates {
        if let Some(v) = value {
            if !v.is_empty() {
                return ((*v).clone(), Provenance::Source(*kind));
            }
        }
    }
    (input.to_string(), Provenance::SelfReported)
}

pub(crate) fn build(provider: &NormalizedProvider, evidence: &EvidenceSet) -> GoldenRecord {
    let registry = evidence.registry_match();
    let address = evidence.address_check();
    let license = evidence.license_standing();

    let mut provenance = BTreeMap::new();
    let mut field = |name: &'static str, candidates: &[(SourceKind, Option<&String>)]| -> String {
        let input = provider.field(name).unwrap_or_default();
        let (value, origin) = pick(input, candidates);
        provenance.insert(name.to_string(), origin);
        value
    };

    let full_name = field(
        "full_name",
        &[(SourceKind::Registry, registry.and_then(|r| r.full_name.as_ref()))],
    );
    // npi is the lookup key; website and last_updated have no authoritative
    // source. All three stay self-reported.
    let npi = field("npi", &[]);
    let address_line = field(
        "address",
        &[
            (SourceKind::AddressValidation, address.and_then(|a| a.address.as_ref())),
            (SourceKind::Registry, registry.and_then(|r| r.address.as_ref())),
        ],
    );
    let city = field(
        "city",
        &[
            (SourceKind::AddressValidation, address.and_then(|a| a.city.as_ref())),
            (SourceKind::Registry, registry.and_then(|r| r.city.as_ref())),
        ],
    );
    let state = field(
        "state",
        &[
            (SourceKind::AddressValidation, address.and_then(|a| a.state.as_ref())),
            (SourceKind::Registry, registry.and_then(|r| r.state.as_ref())),
        ],
    );
    let zip_code = field(
        "zip_code",
        &[
            (SourceKind::AddressValidation, address.and_then(|a| a.zip_code.as_ref())),
            (SourceKind::Registry, registry.and_then(|r| r.zip_code.as_ref())),
        ],
    );
    let phone = field(
        "phone",
        &[(SourceKind::Registry, registry.and_then(|r| r.phone.as_ref()))],
    );
    let specialty = field(
        "specialty",
        &[(SourceKind::Registry, registry.and_then(|r| r.specialty.as_ref()))],
    );
    let license_number = field(
        "license_number",
        &[(SourceKind::LicenseBoard, license.and_then(|l| l.license_number.as_ref()))],
    );
    let website = field("website", &[]);
    let last_updated = field("last_updated", &[]);

    GoldenRecord {
        full_name,
        npi,
        address: address_line,
        city,
        state,
        zip_code,
        phone,
        specialty,
        license_number,
        website,
        last_updated,
        provenance,
    }
}

/// Review routing. The reason string enumerates every condition that fired,
/// so it is never empty when review is required.
pub(crate) fn route_review(
    path: RoutePath,
    confidence_score: f64,
    conflicts: &ConflictSet,
    config: &PipelineConfig,
) -> (bool, String) {
    let mut reasons: Vec<String> = Vec::new();
    match path {
        RoutePath::Red | RoutePath::Error => {
            reasons.push(format!("record routed to the {path} path"))
        }
        RoutePath::Yellow if confidence_score < config.review_score_floor => reasons.push(format!(
            "YELLOW path with confidence {confidence_score:.2} below the {} review floor",
            config.review_score_floor
        )),
        _ => {}
    }
    if conflicts.len() > config.review_conflict_limit {
        reasons.push(format!(
            "{} cross-source conflicts exceed the limit of {}",
            conflicts.len(),
            config.review_conflict_limit
        ));
    }
    (!reasons.is_empty(), reasons.join("; "))
}

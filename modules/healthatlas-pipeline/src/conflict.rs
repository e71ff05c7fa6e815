//! Conflict detection — field-level disagreements between the input record
//! and collected evidence.
//!
//! Comparison is normalized (case-insensitive, whitespace-collapsed, common
//! address abbreviations expanded) and purely observational: mismatches are
//! recorded, never resolved. Sources are visited in the fixed priority
//! order so the conflict list is identical for identical inputs.

use healthatlas_common::{
    ConflictSet, EvidencePayload, EvidenceSet, FieldConflict, NormalizedProvider, SourceKind,
};

/// Street-suffix and directional abbreviations expanded before comparing
/// address components.
const ADDRESS_ABBREVIATIONS: &[(&str, &str)] = &[
    ("st", "street"),
    ("ave", "avenue"),
    ("blvd", "boulevard"),
    ("dr", "drive"),
    ("rd", "road"),
    ("ln", "lane"),
    ("hwy", "highway"),
    ("ct", "court"),
    ("pl", "place"),
    ("ste", "suite"),
    ("apt", "apartment"),
    ("fl", "floor"),
    ("n", "north"),
    ("s", "south"),
    ("e", "east"),
    ("w", "west"),
];

pub(crate) fn detect(provider: &NormalizedProvider, evidence: &EvidenceSet) -> ConflictSet {
    let mut conflicts = Vec::new();
    for kind in SourceKind::PRIORITY {
        let Some(payload) = evidence.get(kind).payload() else {
            continue;
        };
        for (field, source_value) in comparable_fields(payload) {
            let Some(input_value) = provider.field(field) else {
                continue;
            };
            if input_value.is_empty() || source_value.is_empty() {
                continue;
            }
            if canonical(field, input_value) != canonical(field, source_value) {
                conflicts.push(FieldConflict {
                    field: field.to_string(),
                    input_value: input_value.to_string(),
                    source_value: source_value.to_string(),
                    source: kind,
                });
            }
        }
    }
    conflicts
}

/// The input-comparable fields a payload carries, in canonical field order.
fn comparable_fields(payload: &EvidencePayload) -> Vec<(&'static str, &str)> {
    let mut fields: Vec<(&'static str, Option<&String>)> = match payload {
        EvidencePayload::Registry(r) => vec![
            ("full_name", r.full_name.as_ref()),
            ("npi", r.npi.as_ref()),
            ("address", r.address.as_ref()),
            ("city", r.city.as_ref()),
            ("state", r.state.as_ref()),
            ("zip_code", r.zip_code.as_ref()),
            ("phone", r.phone.as_ref()),
            ("specialty", r.specialty.as_ref()),
        ],
        EvidencePayload::License(l) => vec![
            ("state", l.state.as_ref()),
            ("license_number", l.license_number.as_ref()),
        ],
        EvidencePayload::Address(a) => vec![
            ("address", a.address.as_ref()),
            ("city", a.city.as_ref()),
            ("state", a.state.as_ref()),
            ("zip_code", a.zip_code.as_ref()),
        ],
        // No input-comparable fields on these payloads.
        EvidencePayload::Exclusion(_) | EvidencePayload::Enrichment(_) => vec![],
    };
    fields
        .drain(..)
        .filter_map(|(name, value)| value.map(|v| (name, v.as_str())))
        .collect()
}

/// Canonical comparison form for one field value.
fn canonical(field: &str, raw: &str) -> String {
    match field {
        "phone" => digits(raw),
        "zip_code" => {
            let d = digits(raw);
            d.chars().take(5).collect()
        }
        "address" => words(raw)
            .map(expand_abbreviation)
            .collect::<Vec<_>>()
            .join(" "),
        _ => words(raw).collect::<Vec<_>>().join(" "),
    }
}

fn digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Lowercased tokens with surrounding punctuation stripped.
fn words(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
}

fn expand_abbreviation(word: String) -> String {
    for (short, long) in ADDRESS_ABBREVIATIONS {
        if word == *short {
            return (*long).to_string();
        }
    }
    word
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthatlas_common::{Evidence, EvidenceResult};

    use crate::testing;

    fn with_payloads(registry: Option<Evidence>, license: Option<Evidence>) -> EvidenceSet {
        let fail = || EvidenceResult::Failure {
            reason: healthatlas_common::FailureReason::NotFound,
        };
        let wrap = |e: Option<Evidence>| {
            e.map(|ev| EvidenceResult::Success { payload: ev.payload, confidence: ev.confidence })
                .unwrap_or_else(fail)
        };
        EvidenceSet {
            registry: wrap(registry),
            exclusion: fail(),
            license: wrap(license),
            address: fail(),
            enrichment: fail(),
        }
    }

    #[test]
    fn abbreviations_case_and_whitespace_do_not_conflict() {
        let provider = testing::provider_with(|p| {
            p.address = "1   Main St.".to_string();
        });
        let mut registry = testing::registry_hit(&provider);
        if let EvidencePayload::Registry(r) = &mut registry.payload {
            r.address = Some("1 MAIN STREET".to_string());
        }
        let evidence = with_payloads(Some(registry), None);
        assert!(detect(&provider, &evidence).is_empty());
    }

    #[test]
    fn phone_and_zip_compare_on_digits() {
        let provider = testing::provider_with(|p| {
            p.phone = "(415) 555-0100".to_string();
            p.zip_code = "94105-1234".to_string();
        });
        let mut registry = testing::registry_hit(&provider);
        if let EvidencePayload::Registry(r) = &mut registry.payload {
            r.phone = Some("4155550100".to_string());
            r.zip_code = Some("94105".to_string());
        }
        let evidence = with_payloads(Some(registry), None);
        assert!(detect(&provider, &evidence).is_empty());
    }

    #[test]
    fn mismatched_name_is_recorded_against_the_registry() {
        let provider = testing::provider();
        let mut registry = testing::registry_hit(&provider);
        if let EvidencePayload::Registry(r) = &mut registry.payload {
            r.full_name = Some("John Smith".to_string());
        }
        let evidence = with_payloads(Some(registry), None);
        let conflicts = detect(&provider, &evidence);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].field, "full_name");
        assert_eq!(conflicts[0].source, SourceKind::Registry);
        assert_eq!(conflicts[0].input_value, provider.full_name);
        assert_eq!(conflicts[0].source_value, "John Smith");
    }

    #[test]
    fn registry_conflicts_come_before_license_board_conflicts() {
        let provider = testing::provider_with(|p| {
            p.license_number = "A-12345".to_string();
        });
        let mut registry = testing::registry_hit(&provider);
        if let EvidencePayload::Registry(r) = &mut registry.payload {
            r.full_name = Some("Someone Else".to_string());
        }
        let license = testing::license_with_status(&provider, "Active");
        let license = Evidence {
            payload: match license.payload {
                EvidencePayload::License(mut l) => {
                    l.license_number = Some("B-99999".to_string());
                    EvidencePayload::License(l)
                }
                other => other,
            },
            confidence: license.confidence,
        };
        let evidence = with_payloads(Some(registry), Some(license));
        let conflicts = detect(&provider, &evidence);
        assert_eq!(conflicts.len(), 2);
        assert_eq!(conflicts[0].source, SourceKind::Registry);
        assert_eq!(conflicts[1].source, SourceKind::LicenseBoard);
        assert_eq!(conflicts[1].field, "license_number");
    }

    #[test]
    fn empty_input_fields_never_conflict() {
        let provider = testing::provider_with(|p| {
            p.phone = String::new();
        });
        let mut registry = testing::registry_hit(&provider);
        if let EvidencePayload::Registry(r) = &mut registry.payload {
            r.phone = Some("4155550100".to_string());
        }
        let evidence = with_payloads(Some(registry), None);
        assert!(detect(&provider, &evidence).is_empty());
    }
}

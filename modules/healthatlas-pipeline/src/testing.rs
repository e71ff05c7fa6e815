// Test support for the validation pipeline.
//
// Mock sources matching the EvidenceSource boundary:
// - StaticSource — always answers with one canned Evidence
// - RoutedRegistry — HashMap-based NPI → Evidence
// - FailingSource — always errors with a chosen failure mode
// - SlowSource — sleeps before answering (timeout tests)
// - PanickingSource — panics mid-lookup (containment tests)
//
// Plus fixture helpers for providers, payloads, and a fixed clock. All
// deterministic: no network, no wall clock, `cargo test` in seconds.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use healthatlas_common::{
    AddressCheck, Evidence, EvidencePayload, EvidenceResult, EvidenceSet, ExclusionScreen,
    FacilityType, LicenseStanding, NormalizedProvider, RegistryMatch, SourceError, SourceKind,
    WebPresence,
};

use crate::traits::{EvidenceSource, EvidenceSources};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Clock instant the deterministic tests run at.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
}

/// The reference clean record: sparse but complete on every field the
/// pipeline itself consumes.
pub fn provider() -> NormalizedProvider {
    NormalizedProvider::builder()
        .full_name("Jane Doe")
        .npi("1234567890")
        .address("1 Main St")
        .state("CA")
        .last_updated("2024-01-01")
        .build()
}

pub fn provider_with(adjust: impl FnOnce(&mut NormalizedProvider)) -> NormalizedProvider {
    let mut p = provider();
    adjust(&mut p);
    p
}

fn some_if_filled(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Registry evidence echoing the provider's own fields with a strong match.
pub fn registry_hit(provider: &NormalizedProvider) -> Evidence {
    Evidence {
        payload: EvidencePayload::Registry(RegistryMatch {
            result_count: 1,
            match_confidence: 0.95,
            npi: some_if_filled(&provider.npi),
            full_name: some_if_filled(&provider.full_name),
            address: some_if_filled(&provider.address),
            city: some_if_filled(&provider.city),
            state: some_if_filled(&provider.state),
            zip_code: some_if_filled(&provider.zip_code),
            phone: some_if_filled(&provider.phone),
            specialty: some_if_filled(&provider.specialty),
        }),
        confidence: 0.95,
    }
}

pub fn registry_zero_match() -> Evidence {
    Evidence {
        payload: EvidencePayload::Registry(RegistryMatch {
            result_count: 0,
            match_confidence: 0.0,
            npi: None,
            full_name: None,
            address: None,
            city: None,
            state: None,
            zip_code: None,
            phone: None,
            specialty: None,
        }),
        confidence: 0.0,
    }
}

pub fn exclusion_clear() -> Evidence {
    Evidence {
        payload: EvidencePayload::Exclusion(ExclusionScreen {
            is_excluded: false,
            matched_name: None,
        }),
        confidence: 0.99,
    }
}

pub fn exclusion_hit(matched_name: &str) -> Evidence {
    Evidence {
        payload: EvidencePayload::Exclusion(ExclusionScreen {
            is_excluded: true,
            matched_name: Some(matched_name.to_string()),
        }),
        confidence: 0.99,
    }
}

pub fn license_with_status(provider: &NormalizedProvider, status: &str) -> Evidence {
    Evidence {
        payload: EvidencePayload::License(LicenseStanding {
            status: status.to_string(),
            license_number: some_if_filled(&provider.license_number),
            state: some_if_filled(&provider.state),
        }),
        confidence: 0.9,
    }
}

pub fn address_medical(provider: &NormalizedProvider) -> Evidence {
    Evidence {
        payload: EvidencePayload::Address(AddressCheck {
            deliverable: true,
            facility_type: FacilityType::MedicalOffice,
            confidence: 0.92,
            address: some_if_filled(&provider.address),
            city: some_if_filled(&provider.city),
            state: some_if_filled(&provider.state),
            zip_code: some_if_filled(&provider.zip_code),
        }),
        confidence: 0.92,
    }
}

pub fn address_undeliverable() -> Evidence {
    Evidence {
        payload: EvidencePayload::Address(AddressCheck {
            deliverable: false,
            facility_type: FacilityType::Unknown,
            confidence: 0.3,
            address: None,
            city: None,
            state: None,
            zip_code: None,
        }),
        confidence: 0.3,
    }
}

pub fn enrichment(digital_footprint_score: f64) -> Evidence {
    Evidence {
        payload: EvidencePayload::Enrichment(WebPresence {
            digital_footprint_score,
            website_reachable: digital_footprint_score > 0.0,
            profile_count: 2,
        }),
        confidence: digital_footprint_score,
    }
}

pub fn ok(evidence: Evidence) -> EvidenceResult {
    EvidenceResult::Success {
        payload: evidence.payload,
        confidence: evidence.confidence,
    }
}

/// An EvidenceSet where every source succeeded with the given evidence.
pub fn evidence_set(
    registry: Evidence,
    exclusion: Evidence,
    license: Evidence,
    address: Evidence,
    enrichment: Evidence,
) -> EvidenceSet {
    EvidenceSet {
        registry: ok(registry),
        exclusion: ok(exclusion),
        license: ok(license),
        address: ok(address),
        enrichment: ok(enrichment),
    }
}

/// Sources that answer cleanly for the given provider: strong registry
/// match, clear exclusion screen, active license, validated medical
/// address, moderate web presence.
pub fn clean_sources(provider: &NormalizedProvider) -> EvidenceSources {
    EvidenceSources {
        registry: Arc::new(StaticSource::new(SourceKind::Registry, registry_hit(provider))),
        exclusion: Arc::new(StaticSource::new(SourceKind::ExclusionList, exclusion_clear())),
        license: Arc::new(StaticSource::new(
            SourceKind::LicenseBoard,
            license_with_status(provider, "Active"),
        )),
        address: Arc::new(StaticSource::new(
            SourceKind::AddressValidation,
            address_medical(provider),
        )),
        enrichment: Arc::new(StaticSource::new(SourceKind::WebEnrichment, enrichment(0.6))),
    }
}

// ---------------------------------------------------------------------------
// Mock sources
// ---------------------------------------------------------------------------

/// Always answers with one canned Evidence.
pub struct StaticSource {
    kind: SourceKind,
    evidence: Evidence,
}

impl StaticSource {
    pub fn new(kind: SourceKind, evidence: Evidence) -> Self {
        Self { kind, evidence }
    }
}

#[async_trait]
impl EvidenceSource for StaticSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn lookup(&self, _provider: &NormalizedProvider) -> Result<Evidence, SourceError> {
        Ok(self.evidence.clone())
    }
}

/// NPI-routed registry answers. Unregistered NPIs come back `NotFound`.
pub struct RoutedRegistry {
    by_npi: HashMap<String, Evidence>,
}

impl RoutedRegistry {
    pub fn new() -> Self {
        Self { by_npi: HashMap::new() }
    }

    pub fn on(mut self, npi: &str, evidence: Evidence) -> Self {
        self.by_npi.insert(npi.to_string(), evidence);
        self
    }
}

#[async_trait]
impl EvidenceSource for RoutedRegistry {
    fn kind(&self) -> SourceKind {
        SourceKind::Registry
    }

    async fn lookup(&self, provider: &NormalizedProvider) -> Result<Evidence, SourceError> {
        self.by_npi
            .get(&provider.npi)
            .cloned()
            .ok_or(SourceError::NotFound)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum FailureMode {
    NotFound,
    InvalidResponse,
    Transport,
}

/// Always errors with the chosen failure mode.
pub struct FailingSource {
    kind: SourceKind,
    mode: FailureMode,
}

impl FailingSource {
    pub fn new(kind: SourceKind, mode: FailureMode) -> Self {
        Self { kind, mode }
    }
}

#[async_trait]
impl EvidenceSource for FailingSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn lookup(&self, _provider: &NormalizedProvider) -> Result<Evidence, SourceError> {
        Err(match self.mode {
            FailureMode::NotFound => SourceError::NotFound,
            FailureMode::InvalidResponse => {
                SourceError::InvalidResponse("mock invalid response".to_string())
            }
            FailureMode::Transport => SourceError::Transport("mock transport error".to_string()),
        })
    }
}

/// Sleeps before answering, for timeout tests.
pub struct SlowSource {
    kind: SourceKind,
    delay: Duration,
    evidence: Evidence,
}

impl SlowSource {
    pub fn new(kind: SourceKind, delay: Duration, evidence: Evidence) -> Self {
        Self { kind, delay, evidence }
    }
}

#[async_trait]
impl EvidenceSource for SlowSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn lookup(&self, _provider: &NormalizedProvider) -> Result<Evidence, SourceError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.evidence.clone())
    }
}

/// Panics mid-lookup. The collector must contain this.
pub struct PanickingSource {
    kind: SourceKind,
}

impl PanickingSource {
    pub fn new(kind: SourceKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl EvidenceSource for PanickingSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn lookup(&self, _provider: &NormalizedProvider) -> Result<Evidence, SourceError> {
        panic!("PanickingSource: simulated adapter defect");
    }
}

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use typed_builder::TypedBuilder;

use crate::policy;

// --- Input record ---

/// Canonical provider record. All fields are strings; absent input fields
/// normalize to empty, never null. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, TypedBuilder)]
pub struct NormalizedProvider {
    #[builder(default, setter(into))]
    pub full_name: String,
    #[builder(default, setter(into))]
    pub npi: String,
    #[builder(default, setter(into))]
    pub address: String,
    #[builder(default, setter(into))]
    pub city: String,
    #[builder(default, setter(into))]
    pub state: String,
    #[builder(default, setter(into))]
    pub zip_code: String,
    #[builder(default, setter(into))]
    pub phone: String,
    #[builder(default, setter(into))]
    pub specialty: String,
    #[builder(default, setter(into))]
    pub license_number: String,
    #[builder(default, setter(into))]
    pub website: String,
    #[builder(default, setter(into))]
    pub last_updated: String,
}

impl NormalizedProvider {
    /// Build from an arbitrary input record, mapping common field-name
    /// variants (`full_name`|`fullName`, `NPI`|`npi`, ...) onto the
    /// canonical fields. Unknown keys are ignored; missing ones are empty.
    pub fn from_record(record: &serde_json::Map<String, Value>) -> Self {
        let pick = |keys: &[&str]| -> String {
            keys.iter()
                .filter_map(|k| record.get(*k))
                .filter_map(value_as_string)
                .find(|v| !v.is_empty())
                .unwrap_or_default()
        };
        Self {
            full_name: pick(&["full_name", "fullName"]),
            npi: pick(&["NPI", "npi"]),
            address: pick(&["address", "practice_address", "practiceAddress"]),
            city: pick(&["city"]),
            state: pick(&["state"]),
            zip_code: pick(&["zip_code", "zipCode"]),
            phone: pick(&["phone", "phone_number", "phoneNumber"]),
            specialty: pick(&["specialty", "speciality"]),
            license_number: pick(&["license_number", "license", "licenseNumber"]),
            website: pick(&["website"]),
            last_updated: pick(&["last_updated", "lastUpdated"]),
        }
    }

    /// Canonical field list, in declaration order.
    pub fn fields(&self) -> [(&'static str, &str); 11] {
        [
            ("full_name", &self.full_name),
            ("npi", &self.npi),
            ("address", &self.address),
            ("city", &self.city),
            ("state", &self.state),
            ("zip_code", &self.zip_code),
            ("phone", &self.phone),
            ("specialty", &self.specialty),
            ("license_number", &self.license_number),
            ("website", &self.website),
            ("last_updated", &self.last_updated),
        ]
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    /// Parse `last_updated`, accepting RFC 3339 plus the date formats seen
    /// in roster exports. Empty or unparseable values yield `None`.
    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.last_updated.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
            return Some(ts.and_utc());
        }
        for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
            if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
                return date.and_hms_opt(0, 0, 0).map(|ts| ts.and_utc());
            }
        }
        None
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        _ => None,
    }
}

// --- Evidence sources ---

/// The five authoritative sources consulted per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum SourceKind {
    /// NPPES NPI registry.
    #[serde(rename = "nppes")]
    Registry,
    /// OIG LEIE exclusion list.
    #[serde(rename = "oig_leie")]
    ExclusionList,
    /// State medical license board.
    #[serde(rename = "state_board")]
    LicenseBoard,
    /// Practice address validation service.
    #[serde(rename = "address")]
    AddressValidation,
    /// Web presence enrichment.
    #[serde(rename = "web_enrichment")]
    WebEnrichment,
}

impl SourceKind {
    /// All five sources, in collection order.
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Registry,
        SourceKind::ExclusionList,
        SourceKind::LicenseBoard,
        SourceKind::AddressValidation,
        SourceKind::WebEnrichment,
    ];

    /// Fixed priority order for deterministic cross-source iteration:
    /// registry first, enrichment last.
    pub const PRIORITY: [SourceKind; 5] = [
        SourceKind::Registry,
        SourceKind::LicenseBoard,
        SourceKind::AddressValidation,
        SourceKind::ExclusionList,
        SourceKind::WebEnrichment,
    ];

    pub fn metadata_key(&self) -> &'static str {
        match self {
            SourceKind::Registry => "nppes",
            SourceKind::ExclusionList => "oig_leie",
            SourceKind::LicenseBoard => "state_board",
            SourceKind::AddressValidation => "address",
            SourceKind::WebEnrichment => "web_enrichment",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.metadata_key())
    }
}

// --- Evidence payloads ---

/// Identity registry lookup result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RegistryMatch {
    pub result_count: u32,
    /// Match strength reported by the registry adapter, in [0,1].
    pub match_confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
}

/// Exclusion list screening result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExclusionScreen {
    pub is_excluded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_name: Option<String>,
}

/// License board standing. `status` is the board's own wording; anything
/// other than "Active" (case-insensitive) counts as not in good standing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LicenseStanding {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl LicenseStanding {
    pub fn is_active(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("active")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FacilityType {
    MedicalOffice,
    Hospital,
    Pharmacy,
    Commercial,
    Residential,
    PoBox,
    Unknown,
}

impl FacilityType {
    pub fn is_medical(&self) -> bool {
        matches!(
            self,
            FacilityType::MedicalOffice | FacilityType::Hospital | FacilityType::Pharmacy
        )
    }
}

/// Address validation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AddressCheck {
    pub deliverable: bool,
    pub facility_type: FacilityType,
    /// Validator's own confidence in the classification, in [0,1].
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
}

impl AddressCheck {
    pub fn is_medical_facility(&self) -> bool {
        self.deliverable && self.facility_type.is_medical()
    }
}

/// Web enrichment result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WebPresence {
    /// Digital footprint strength, in [0,1].
    pub digital_footprint_score: f64,
    #[serde(default)]
    pub website_reachable: bool,
    #[serde(default)]
    pub profile_count: u32,
}

/// One source's evidence about a provider, tagged by source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "source")]
pub enum EvidencePayload {
    #[serde(rename = "nppes")]
    Registry(RegistryMatch),
    #[serde(rename = "oig_leie")]
    Exclusion(ExclusionScreen),
    #[serde(rename = "state_board")]
    License(LicenseStanding),
    #[serde(rename = "address")]
    Address(AddressCheck),
    #[serde(rename = "web_enrichment")]
    Enrichment(WebPresence),
}

impl EvidencePayload {
    pub fn kind(&self) -> SourceKind {
        match self {
            EvidencePayload::Registry(_) => SourceKind::Registry,
            EvidencePayload::Exclusion(_) => SourceKind::ExclusionList,
            EvidencePayload::License(_) => SourceKind::LicenseBoard,
            EvidencePayload::Address(_) => SourceKind::AddressValidation,
            EvidencePayload::Enrichment(_) => SourceKind::WebEnrichment,
        }
    }
}

/// Payload plus the confidence the source itself reports for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Evidence {
    pub payload: EvidencePayload,
    pub confidence: f64,
}

// --- Evidence results ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Timeout,
    NotFound,
    TransportError,
    InvalidResponse,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::Timeout => "timeout",
            FailureReason::NotFound => "not_found",
            FailureReason::TransportError => "transport_error",
            FailureReason::InvalidResponse => "invalid_response",
        };
        f.write_str(s)
    }
}

/// Observability status of one source lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Pending,
    Ok,
    Failed,
    Timeout,
}

/// Outcome of one source lookup. A failing source yields `Failure` and the
/// pipeline substitutes empty evidence downstream; it never aborts the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EvidenceResult {
    Success { payload: EvidencePayload, confidence: f64 },
    Failure { reason: FailureReason },
}

impl EvidenceResult {
    pub fn status(&self) -> SourceStatus {
        match self {
            EvidenceResult::Success { .. } => SourceStatus::Ok,
            EvidenceResult::Failure { reason: FailureReason::Timeout } => SourceStatus::Timeout,
            EvidenceResult::Failure { .. } => SourceStatus::Failed,
        }
    }

    pub fn payload(&self) -> Option<&EvidencePayload> {
        match self {
            EvidenceResult::Success { payload, .. } => Some(payload),
            EvidenceResult::Failure { .. } => None,
        }
    }

    pub fn reported_confidence(&self) -> Option<f64> {
        match self {
            EvidenceResult::Success { confidence, .. } => Some(*confidence),
            EvidenceResult::Failure { .. } => None,
        }
    }
}

/// The five evidence results for one record's run. Owned by the orchestrator
/// for the duration of that run, never shared across records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EvidenceSet {
    pub registry: EvidenceResult,
    pub exclusion: EvidenceResult,
    pub license: EvidenceResult,
    pub address: EvidenceResult,
    pub enrichment: EvidenceResult,
}

impl EvidenceSet {
    pub fn get(&self, kind: SourceKind) -> &EvidenceResult {
        match kind {
            SourceKind::Registry => &self.registry,
            SourceKind::ExclusionList => &self.exclusion,
            SourceKind::LicenseBoard => &self.license,
            SourceKind::AddressValidation => &self.address,
            SourceKind::WebEnrichment => &self.enrichment,
        }
    }

    pub fn registry_match(&self) -> Option<&RegistryMatch> {
        match self.registry.payload() {
            Some(EvidencePayload::Registry(m)) => Some(m),
            _ => None,
        }
    }

    pub fn exclusion_screen(&self) -> Option<&ExclusionScreen> {
        match self.exclusion.payload() {
            Some(EvidencePayload::Exclusion(s)) => Some(s),
            _ => None,
        }
    }

    pub fn license_standing(&self) -> Option<&LicenseStanding> {
        match self.license.payload() {
            Some(EvidencePayload::License(l)) => Some(l),
            _ => None,
        }
    }

    pub fn address_check(&self) -> Option<&AddressCheck> {
        match self.address.payload() {
            Some(EvidencePayload::Address(a)) => Some(a),
            _ => None,
        }
    }

    pub fn web_presence(&self) -> Option<&WebPresence> {
        match self.enrichment.payload() {
            Some(EvidencePayload::Enrichment(w)) => Some(w),
            _ => None,
        }
    }

    /// Absolute override condition: the provider appears on the exclusion
    /// list.
    pub fn exclusion_hit(&self) -> bool {
        self.exclusion_screen().is_some_and(|s| s.is_excluded)
    }
}

// --- Conflicts ---

/// A field-level disagreement between the input record and one source.
/// Detection only records the disagreement; resolution belongs to the
/// golden record builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FieldConflict {
    pub field: String,
    pub input_value: String,
    pub source_value: String,
    pub source: SourceKind,
}

pub type ConflictSet = Vec<FieldConflict>;

// --- Fraud indicators ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn weight(&self) -> f64 {
        match self {
            Severity::Low => policy::SEVERITY_WEIGHT_LOW,
            Severity::Medium => policy::SEVERITY_WEIGHT_MEDIUM,
            Severity::High => policy::SEVERITY_WEIGHT_HIGH,
            Severity::Critical => policy::SEVERITY_WEIGHT_CRITICAL,
        }
    }

    pub fn is_high(&self) -> bool {
        matches!(self, Severity::High | Severity::Critical)
    }
}

/// One triggered fraud heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FraudIndicator {
    pub code: String,
    pub detail: String,
    pub severity: Severity,
}

pub type FraudIndicatorSet = Vec<FraudIndicator>;

// --- Scoring ---

/// The six confidence dimensions, each in [0,1]. Risk subtracts; the rest
/// add.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ScoreBreakdown {
    pub identity: f64,
    pub address: f64,
    pub completeness: f64,
    pub freshness: f64,
    pub enrichment: f64,
    pub risk: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceTier {
    Platinum,
    Gold,
    Questionable,
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConfidenceTier::Platinum => "PLATINUM",
            ConfidenceTier::Gold => "GOLD",
            ConfidenceTier::Questionable => "QUESTIONABLE",
        };
        f.write_str(s)
    }
}

/// Routing decision. ERROR marks an internal fault in a pure stage — the
/// record still gets a structured result, flagged for human review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoutePath {
    Green,
    Yellow,
    Red,
    Error,
}

impl fmt::Display for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoutePath::Green => "GREEN",
            RoutePath::Yellow => "YELLOW",
            RoutePath::Red => "RED",
            RoutePath::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Final confidence verdict. Tier and path are pure functions of the score,
/// fraud indicators, and the exclusion override — never set independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConfidenceResult {
    pub confidence_score: f64,
    pub confidence_tier: ConfidenceTier,
    pub path: RoutePath,
    pub score_breakdown: ScoreBreakdown,
}

// --- Golden record ---

/// Which source supplied a golden record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    SelfReported,
    Source(SourceKind),
}

/// The merged, authoritative version of the provider record, with per-field
/// provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GoldenRecord {
    pub full_name: String,
    pub npi: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub phone: String,
    pub specialty: String,
    pub license_number: String,
    pub website: String,
    pub last_updated: String,
    pub provenance: BTreeMap<String, Provenance>,
}

impl GoldenRecord {
    /// A golden record that takes every field from the input as-is. Used
    /// when no authoritative evidence is available (including the ERROR
    /// path).
    pub fn self_reported(provider: &NormalizedProvider) -> Self {
        let provenance = provider
            .fields()
            .into_iter()
            .map(|(name, _)| (name.to_string(), Provenance::SelfReported))
            .collect();
        Self {
            full_name: provider.full_name.clone(),
            npi: provider.npi.clone(),
            address: provider.address.clone(),
            city: provider.city.clone(),
            state: provider.state.clone(),
            zip_code: provider.zip_code.clone(),
            phone: provider.phone.clone(),
            specialty: provider.specialty.clone(),
            license_number: provider.license_number.clone(),
            website: provider.website.clone(),
            last_updated: provider.last_updated.clone(),
            provenance,
        }
    }
}

// --- Execution metadata ---

/// Per-source observability for one run. Never consulted by scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceExecution {
    pub status: SourceStatus,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionMetadata {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub sources: BTreeMap<String, SourceExecution>,
}

impl ExecutionMetadata {
    /// Metadata for a run that never reached the collecting stage.
    pub fn pending(run_id: String, started_at: DateTime<Utc>) -> Self {
        let sources = SourceKind::ALL
            .into_iter()
            .map(|kind| {
                (
                    kind.metadata_key().to_string(),
                    SourceExecution {
                        status: SourceStatus::Pending,
                        latency_ms: 0,
                        reported_confidence: None,
                    },
                )
            })
            .collect();
        Self { run_id, started_at, sources }
    }
}

// --- Outcome ---

/// Boolean verification roll-up for downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct VerificationSummary {
    pub nppes_verified: bool,
    pub oig_clear: bool,
    pub license_active: bool,
    pub address_validated: bool,
    pub digital_footprint_score: f64,
}

impl VerificationSummary {
    pub fn from_evidence(evidence: &EvidenceSet) -> Self {
        Self {
            nppes_verified: evidence
                .registry_match()
                .is_some_and(|m| m.result_count > 0),
            oig_clear: !evidence.exclusion_hit(),
            license_active: evidence.license_standing().is_some_and(|l| l.is_active()),
            address_validated: evidence
                .address_check()
                .is_some_and(|a| a.is_medical_facility()),
            digital_footprint_score: evidence
                .web_presence()
                .map(|w| w.digital_footprint_score.clamp(0.0, 1.0))
                .unwrap_or(0.0),
        }
    }
}

/// The single structured result `validate` always produces, whatever happens
/// during the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationOutcome {
    pub golden_record: GoldenRecord,
    pub confidence: ConfidenceResult,
    pub conflicts: ConflictSet,
    pub fraud_indicators: FraudIndicatorSet,
    pub verification: VerificationSummary,
    pub execution: ExecutionMetadata,
    pub requires_human_review: bool,
    pub review_reason: String,
}

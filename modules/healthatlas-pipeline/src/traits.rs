// Trait boundary for evidence lookups.
//
// Each authoritative source sits behind EvidenceSource — network adapters in
// `sources`, deterministic mocks in `testing`. The orchestrator only ever
// sees EvidenceResults, so a slow or broken source degrades to empty
// evidence instead of failing the record. `cargo test` needs no network.

use std::sync::Arc;

use async_trait::async_trait;

use healthatlas_common::{Evidence, NormalizedProvider, SourceError, SourceKind};

#[async_trait]
pub trait EvidenceSource: Send + Sync {
    /// Which of the five authoritative sources this is.
    fn kind(&self) -> SourceKind;

    /// Look up evidence for one provider. Implementations may retry or pool
    /// connections internally; the pipeline itself never retries.
    async fn lookup(&self, provider: &NormalizedProvider) -> Result<Evidence, SourceError>;
}

/// The full set of source capabilities one validator runs against.
#[derive(Clone)]
pub struct EvidenceSources {
    pub registry: Arc<dyn EvidenceSource>,
    pub exclusion: Arc<dyn EvidenceSource>,
    pub license: Arc<dyn EvidenceSource>,
    pub address: Arc<dyn EvidenceSource>,
    pub enrichment: Arc<dyn EvidenceSource>,
}

impl EvidenceSources {
    pub fn get(&self, kind: SourceKind) -> &Arc<dyn EvidenceSource> {
        match kind {
            SourceKind::Registry => &self.registry,
            SourceKind::ExclusionList => &self.exclusion,
            SourceKind::LicenseBoard => &self.license,
            SourceKind::AddressValidation => &self.address,
            SourceKind::WebEnrichment => &self.enrichment,
        }
    }
}

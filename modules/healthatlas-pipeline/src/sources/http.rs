//! Generic JSON-over-HTTP evidence adapter.
//!
//! Posts the normalized provider record to a host-supplied service and
//! expects an `Evidence` document back, payload tagged with the source name
//! (`oig_leie`, `state_board`, `address`, `web_enrichment`). One adapter
//! type covers all four host services; which one it is comes from
//! configuration.

use async_trait::async_trait;
use url::Url;

use healthatlas_common::{
    AtlasError, Evidence, NormalizedProvider, SourceError, SourceKind,
};

use crate::traits::EvidenceSource;

pub struct JsonLookupSource {
    kind: SourceKind,
    client: reqwest::Client,
    endpoint: Url,
}

impl JsonLookupSource {
    pub fn new(kind: SourceKind, endpoint: &str) -> Result<Self, AtlasError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| AtlasError::Config(format!("invalid {kind} endpoint: {e}")))?;
        Ok(Self { kind, client: reqwest::Client::new(), endpoint })
    }
}

#[async_trait]
impl EvidenceSource for JsonLookupSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn lookup(&self, provider: &NormalizedProvider) -> Result<Evidence, SourceError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(provider)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound);
        }
        if !status.is_success() {
            return Err(SourceError::Transport(format!(
                "{} returned HTTP {status}",
                self.kind
            )));
        }

        let evidence: Evidence = response
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;
        if evidence.payload.kind() != self.kind {
            return Err(SourceError::InvalidResponse(format!(
                "expected a {} payload, got {}",
                self.kind,
                evidence.payload.kind()
            )));
        }
        Ok(evidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unparseable_endpoints() {
        assert!(JsonLookupSource::new(SourceKind::LicenseBoard, "not a url").is_err());
        assert!(JsonLookupSource::new(SourceKind::LicenseBoard, "https://boards.example/lookup")
            .is_ok());
    }
}

//! Collecting stage — concurrent evidence fan-out.
//!
//! All five lookups run as parallel tasks with a per-call timeout, so the
//! stage is bounded by the single slowest source, never the sum. Every
//! failure mode (timeout, lookup error, wrong payload, panicked adapter) is
//! folded into `EvidenceResult::Failure` here; nothing escapes to fail the
//! record.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use healthatlas_common::{
    EvidenceResult, EvidenceSet, FailureReason, NormalizedProvider, SourceExecution, SourceKind,
};

use crate::traits::{EvidenceSource, EvidenceSources};

pub(crate) async fn collect(
    sources: &EvidenceSources,
    provider: &NormalizedProvider,
    timeout: Duration,
) -> (EvidenceSet, BTreeMap<String, SourceExecution>) {
    let (registry, exclusion, license, address, enrichment) = tokio::join!(
        guarded_lookup(sources, SourceKind::Registry, provider, timeout),
        guarded_lookup(sources, SourceKind::ExclusionList, provider, timeout),
        guarded_lookup(sources, SourceKind::LicenseBoard, provider, timeout),
        guarded_lookup(sources, SourceKind::AddressValidation, provider, timeout),
        guarded_lookup(sources, SourceKind::WebEnrichment, provider, timeout),
    );

    let mut executions = BTreeMap::new();
    let mut store = |kind: SourceKind, pair: (EvidenceResult, SourceExecution)| {
        executions.insert(kind.metadata_key().to_string(), pair.1);
        pair.0
    };

    let evidence = EvidenceSet {
        registry: store(SourceKind::Registry, registry),
        exclusion: store(SourceKind::ExclusionList, exclusion),
        license: store(SourceKind::LicenseBoard, license),
        address: store(SourceKind::AddressValidation, address),
        enrichment: store(SourceKind::WebEnrichment, enrichment),
    };
    (evidence, executions)
}

/// Run one lookup on its own task. A panicking adapter surfaces as a
/// `JoinError`, which becomes a transport failure like any other — and if
/// the caller is dropped mid-flight, the task still runs to completion
/// without touching anything shared.
async fn guarded_lookup(
    sources: &EvidenceSources,
    kind: SourceKind,
    provider: &NormalizedProvider,
    timeout: Duration,
) -> (EvidenceResult, SourceExecution) {
    let source = Arc::clone(sources.get(kind));
    let provider = provider.clone();
    let started = Instant::now();

    let handle =
        tokio::spawn(async move { lookup_with_timeout(source, kind, &provider, timeout).await });

    match handle.await {
        Ok(pair) => pair,
        Err(e) => {
            warn!(source = %kind, error = %e, "Evidence lookup task aborted");
            let result = EvidenceResult::Failure { reason: FailureReason::TransportError };
            let execution = SourceExecution {
                status: result.status(),
                latency_ms: started.elapsed().as_millis() as u64,
                reported_confidence: None,
            };
            (result, execution)
        }
    }
}

async fn lookup_with_timeout(
    source: Arc<dyn EvidenceSource>,
    kind: SourceKind,
    provider: &NormalizedProvider,
    timeout: Duration,
) -> (EvidenceResult, SourceExecution) {
    let started = Instant::now();
    let result = match tokio::time::timeout(timeout, source.lookup(provider)).await {
        Ok(Ok(evidence)) => {
            if evidence.payload.kind() != kind {
                warn!(
                    source = %kind,
                    got = %evidence.payload.kind(),
                    "Source answered for the wrong source"
                );
                EvidenceResult::Failure { reason: FailureReason::InvalidResponse }
            } else if !evidence.confidence.is_finite() {
                warn!(source = %kind, "Source reported a non-finite confidence");
                EvidenceResult::Failure { reason: FailureReason::InvalidResponse }
            } else {
                EvidenceResult::Success {
                    payload: evidence.payload,
                    confidence: evidence.confidence.clamp(0.0, 1.0),
                }
            }
        }
        Ok(Err(e)) => {
            warn!(source = %kind, error = %e, "Evidence lookup failed");
            EvidenceResult::Failure { reason: e.failure_reason() }
        }
        Err(_) => {
            warn!(source = %kind, timeout_ms = timeout.as_millis() as u64, "Evidence lookup timed out");
            EvidenceResult::Failure { reason: FailureReason::Timeout }
        }
    };

    let execution = SourceExecution {
        status: result.status(),
        latency_ms: started.elapsed().as_millis() as u64,
        reported_confidence: result.reported_confidence(),
    };
    (result, execution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthatlas_common::{Evidence, EvidencePayload, SourceStatus, WebPresence};

    use crate::testing::{self, FailureMode};

    #[tokio::test]
    async fn timeout_becomes_failure_not_error() {
        let provider = testing::provider();
        let mut sources = testing::clean_sources(&provider);
        sources.enrichment = Arc::new(testing::SlowSource::new(
            SourceKind::WebEnrichment,
            Duration::from_secs(5),
            testing::enrichment(0.6),
        ));

        let (evidence, executions) =
            collect(&sources, &provider, Duration::from_millis(20)).await;

        assert_eq!(
            evidence.enrichment,
            EvidenceResult::Failure { reason: FailureReason::Timeout }
        );
        assert_eq!(executions["web_enrichment"].status, SourceStatus::Timeout);
        assert_eq!(executions["nppes"].status, SourceStatus::Ok);
    }

    #[tokio::test]
    async fn wrong_payload_kind_is_invalid_response() {
        let provider = testing::provider();
        let mut sources = testing::clean_sources(&provider);
        // A registry source answering with enrichment data.
        sources.registry = Arc::new(testing::StaticSource::new(
            SourceKind::Registry,
            Evidence {
                payload: EvidencePayload::Enrichment(WebPresence {
                    digital_footprint_score: 0.9,
                    website_reachable: true,
                    profile_count: 3,
                }),
                confidence: 0.9,
            },
        ));

        let (evidence, _) = collect(&sources, &provider, Duration::from_secs(1)).await;
        assert_eq!(
            evidence.registry,
            EvidenceResult::Failure { reason: FailureReason::InvalidResponse }
        );
    }

    #[tokio::test]
    async fn lookup_errors_map_to_their_reason_codes() {
        let provider = testing::provider();
        let mut sources = testing::clean_sources(&provider);
        sources.license = Arc::new(testing::FailingSource::new(
            SourceKind::LicenseBoard,
            FailureMode::NotFound,
        ));
        sources.address = Arc::new(testing::FailingSource::new(
            SourceKind::AddressValidation,
            FailureMode::Transport,
        ));

        let (evidence, executions) = collect(&sources, &provider, Duration::from_secs(1)).await;
        assert_eq!(
            evidence.license,
            EvidenceResult::Failure { reason: FailureReason::NotFound }
        );
        assert_eq!(
            evidence.address,
            EvidenceResult::Failure { reason: FailureReason::TransportError }
        );
        assert_eq!(executions["state_board"].status, SourceStatus::Failed);
    }

    #[tokio::test]
    async fn panicking_source_is_contained() {
        let provider = testing::provider();
        let mut sources = testing::clean_sources(&provider);
        sources.exclusion = Arc::new(testing::PanickingSource::new(SourceKind::ExclusionList));

        let (evidence, executions) = collect(&sources, &provider, Duration::from_secs(1)).await;
        assert_eq!(
            evidence.exclusion,
            EvidenceResult::Failure { reason: FailureReason::TransportError }
        );
        assert_eq!(executions["oig_leie"].status, SourceStatus::Failed);
        // The other four lookups are unaffected.
        assert_eq!(executions["nppes"].status, SourceStatus::Ok);
    }
}

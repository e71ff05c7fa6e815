//! Evidence source adapters.
//!
//! The identity registry speaks the public NPPES API; the other four
//! sources are host-supplied services reached through the generic JSON
//! adapter. Anything else (caching, retries, connection pooling) belongs to
//! the service side of those endpoints, not here.

use std::sync::Arc;

use healthatlas_common::{AtlasError, ServiceConfig, SourceKind};

use crate::traits::EvidenceSources;

mod http;
mod nppes;

pub use http::JsonLookupSource;
pub use nppes::NppesRegistry;

/// Wire the full source set from service configuration. Every endpoint
/// except the public NPPES default must be configured explicitly.
pub fn from_config(services: &ServiceConfig) -> Result<EvidenceSources, AtlasError> {
    let require = |name: &str, value: &Option<String>| -> Result<String, AtlasError> {
        value
            .clone()
            .ok_or_else(|| AtlasError::Config(format!("{name} is required to wire evidence sources")))
    };

    Ok(EvidenceSources {
        registry: Arc::new(NppesRegistry::new(&services.nppes_api_url)?),
        exclusion: Arc::new(JsonLookupSource::new(
            SourceKind::ExclusionList,
            &require("EXCLUSION_API_URL", &services.exclusion_api_url)?,
        )?),
        license: Arc::new(JsonLookupSource::new(
            SourceKind::LicenseBoard,
            &require("LICENSE_API_URL", &services.license_api_url)?,
        )?),
        address: Arc::new(JsonLookupSource::new(
            SourceKind::AddressValidation,
            &require("ADDRESS_API_URL", &services.address_api_url)?,
        )?),
        enrichment: Arc::new(JsonLookupSource::new(
            SourceKind::WebEnrichment,
            &require("ENRICHMENT_API_URL", &services.enrichment_api_url)?,
        )?),
    })
}

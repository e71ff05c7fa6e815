//! NPPES NPI registry adapter (API version 2.1).
//!
//! Looks up by NPI number when the record has one, by name + state
//! otherwise. A zero-result response is evidence (the registry was asked
//! and found nothing), so it comes back as a successful zero-match payload,
//! not an error.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use healthatlas_common::{
    AtlasError, Evidence, EvidencePayload, NormalizedProvider, RegistryMatch, SourceError,
    SourceKind,
};

use crate::traits::EvidenceSource;

/// Match strength for a single exact-NPI hit.
const EXACT_NPI_MATCH: f64 = 0.95;
/// Match strength for a single name-search hit.
const NAME_MATCH: f64 = 0.7;
/// Match strength when the search is ambiguous (several candidates).
const AMBIGUOUS_MATCH: f64 = 0.5;

pub struct NppesRegistry {
    client: reqwest::Client,
    base_url: Url,
}

impl NppesRegistry {
    pub fn new(base_url: &str) -> Result<Self, AtlasError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AtlasError::Config(format!("invalid NPPES API URL: {e}")))?;
        Ok(Self { client: reqwest::Client::new(), base_url })
    }
}

#[async_trait]
impl EvidenceSource for NppesRegistry {
    fn kind(&self) -> SourceKind {
        SourceKind::Registry
    }

    async fn lookup(&self, provider: &NormalizedProvider) -> Result<Evidence, SourceError> {
        let mut query: Vec<(&str, String)> = vec![("version", "2.1".to_string())];
        let by_npi = !provider.npi.is_empty();
        if by_npi {
            query.push(("number", provider.npi.clone()));
        } else {
            let (first, last) = split_name(&provider.full_name).ok_or(SourceError::NotFound)?;
            query.push(("first_name", first));
            query.push(("last_name", last));
            if !provider.state.is_empty() {
                query.push(("state", provider.state.clone()));
            }
            query.push(("limit", "10".to_string()));
        }

        let response = self
            .client
            .get(self.base_url.clone())
            .query(&query)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(SourceError::Transport(format!(
                "NPPES returned HTTP {}",
                response.status()
            )));
        }
        let body: NppesResponse = response
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;
        if let Some(errors) = body.errors {
            return Err(SourceError::InvalidResponse(format!(
                "NPPES rejected the query: {errors:?}"
            )));
        }

        let result_count = body.result_count;
        let first = body.results.first();
        let match_confidence = match (result_count, by_npi) {
            (0, _) => 0.0,
            (1, true) => EXACT_NPI_MATCH,
            (1, false) => NAME_MATCH,
            _ => AMBIGUOUS_MATCH,
        };

        let location = first.and_then(|r| {
            r.addresses
                .iter()
                .find(|a| a.address_purpose.eq_ignore_ascii_case("LOCATION"))
                .or_else(|| r.addresses.first())
        });
        let payload = RegistryMatch {
            result_count,
            match_confidence,
            npi: first.map(|r| r.number.clone()),
            full_name: first.map(NppesResult::display_name),
            address: location.map(|a| a.address_1.clone()),
            city: location.map(|a| a.city.clone()),
            state: location.map(|a| a.state.clone()),
            zip_code: location.map(|a| a.postal_code.clone()),
            phone: location.and_then(|a| a.telephone_number.clone()),
            specialty: first.and_then(NppesResult::primary_taxonomy),
        };

        Ok(Evidence {
            payload: EvidencePayload::Registry(payload),
            confidence: match_confidence,
        })
    }
}

/// "Jane Doe" → ("Jane", "Doe"). Multi-part surnames keep everything after
/// the first token.
fn split_name(full_name: &str) -> Option<(String, String)> {
    let mut parts = full_name.split_whitespace();
    let first = parts.next()?.to_string();
    let rest: Vec<&str> = parts.collect();
    if rest.is_empty() {
        return None;
    }
    Some((first, rest.join(" ")))
}

// --- NPPES wire format ---

#[derive(Debug, Deserialize)]
struct NppesResponse {
    #[serde(default)]
    result_count: u32,
    #[serde(default)]
    results: Vec<NppesResult>,
    #[serde(rename = "Errors")]
    errors: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct NppesResult {
    #[serde(default)]
    number: String,
    #[serde(default)]
    basic: NppesBasic,
    #[serde(default)]
    addresses: Vec<NppesAddress>,
    #[serde(default)]
    taxonomies: Vec<NppesTaxonomy>,
}

impl NppesResult {
    fn display_name(&self) -> String {
        if let Some(org) = self.basic.organization_name.as_ref().filter(|o| !o.is_empty()) {
            return org.clone();
        }
        format!("{} {}", self.basic.first_name, self.basic.last_name)
            .trim()
            .to_string()
    }

    fn primary_taxonomy(&self) -> Option<String> {
        self.taxonomies
            .iter()
            .find(|t| t.primary)
            .or_else(|| self.taxonomies.first())
            .map(|t| t.desc.clone())
    }
}

#[derive(Debug, Default, Deserialize)]
struct NppesBasic {
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    organization_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NppesAddress {
    #[serde(default)]
    address_purpose: String,
    #[serde(default)]
    address_1: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    postal_code: String,
    #[serde(default)]
    telephone_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NppesTaxonomy {
    #[serde(default)]
    desc: String,
    #[serde(default)]
    primary: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_name_needs_two_parts() {
        assert_eq!(
            split_name("Jane Doe"),
            Some(("Jane".to_string(), "Doe".to_string()))
        );
        assert_eq!(
            split_name("Jane van der Berg"),
            Some(("Jane".to_string(), "van der Berg".to_string()))
        );
        assert_eq!(split_name("Cher"), None);
        assert_eq!(split_name(""), None);
    }

    #[test]
    fn zero_result_response_parses_as_zero_match() {
        let body: NppesResponse =
            serde_json::from_str(r#"{"result_count": 0, "results": []}"#).unwrap();
        assert_eq!(body.result_count, 0);
        assert!(body.results.is_empty());
        assert!(body.errors.is_none());
    }

    #[test]
    fn result_parses_name_location_and_taxonomy() {
        let raw = r#"{
            "result_count": 1,
            "results": [{
                "number": "1234567893",
                "basic": {"first_name": "Jane", "last_name": "Doe"},
                "addresses": [
                    {"address_purpose": "MAILING", "address_1": "PO Box 1", "city": "Sacramento", "state": "CA", "postal_code": "94203"},
                    {"address_purpose": "LOCATION", "address_1": "1 Main St", "city": "San Francisco", "state": "CA", "postal_code": "94105", "telephone_number": "415-555-0100"}
                ],
                "taxonomies": [{"desc": "Internal Medicine", "primary": true}]
            }]
        }"#;
        let body: NppesResponse = serde_json::from_str(raw).unwrap();
        let result = &body.results[0];
        assert_eq!(result.display_name(), "Jane Doe");
        assert_eq!(result.primary_taxonomy().as_deref(), Some("Internal Medicine"));
        let location = result
            .addresses
            .iter()
            .find(|a| a.address_purpose == "LOCATION")
            .unwrap();
        assert_eq!(location.address_1, "1 Main St");
    }
}

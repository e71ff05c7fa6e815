use std::env;
use std::time::Duration;

use crate::error::AtlasError;
use crate::policy;

/// Scoring dimension weights. Identity through enrichment add credit, risk
/// subtracts it.
#[derive(Debug, Clone, Copy)]
pub struct DimensionWeights {
    pub identity: f64,
    pub address: f64,
    pub completeness: f64,
    pub freshness: f64,
    pub enrichment: f64,
    pub risk: f64,
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            identity: policy::WEIGHT_IDENTITY,
            address: policy::WEIGHT_ADDRESS,
            completeness: policy::WEIGHT_COMPLETENESS,
            freshness: policy::WEIGHT_FRESHNESS,
            enrichment: policy::WEIGHT_ENRICHMENT,
            risk: policy::WEIGHT_RISK,
        }
    }
}

impl DimensionWeights {
    pub fn sum(&self) -> f64 {
        self.identity + self.address + self.completeness + self.freshness + self.enrichment
            + self.risk
    }

    /// All six weights must be non-negative and sum to 1.0.
    pub fn validate(&self) -> Result<(), AtlasError> {
        let all = [
            self.identity,
            self.address,
            self.completeness,
            self.freshness,
            self.enrichment,
            self.risk,
        ];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(AtlasError::Config(
                "dimension weights must be non-negative finite numbers".to_string(),
            ));
        }
        if (self.sum() - 1.0).abs() > 1e-9 {
            return Err(AtlasError::Config(format!(
                "dimension weights must sum to 1.0, got {}",
                self.sum()
            )));
        }
        Ok(())
    }
}

/// Pipeline tuning knobs, loaded from environment variables with the policy
/// defaults.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Per-source lookup timeout for the collecting stage.
    pub lookup_timeout: Duration,
    pub freshness_full_credit_days: i64,
    pub freshness_horizon_days: i64,
    pub stale_record_days: i64,
    pub review_conflict_limit: usize,
    pub review_score_floor: f64,
    pub batch_concurrency: usize,
    pub weights: DimensionWeights,
    pub tier_platinum_min: f64,
    pub tier_gold_min: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookup_timeout: Duration::from_secs(policy::LOOKUP_TIMEOUT_SECS),
            freshness_full_credit_days: policy::FRESHNESS_FULL_CREDIT_DAYS,
            freshness_horizon_days: policy::FRESHNESS_HORIZON_DAYS,
            stale_record_days: policy::STALE_RECORD_DAYS,
            review_conflict_limit: policy::REVIEW_CONFLICT_LIMIT,
            review_score_floor: policy::REVIEW_SCORE_FLOOR,
            batch_concurrency: policy::BATCH_CONCURRENCY,
            weights: DimensionWeights::default(),
            tier_platinum_min: policy::TIER_PLATINUM_MIN,
            tier_gold_min: policy::TIER_GOLD_MIN,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from `ATLAS_*` environment variables, falling back
    /// to the documented policy defaults for anything unset.
    pub fn from_env() -> Result<Self, AtlasError> {
        let defaults = Self::default();
        let config = Self {
            lookup_timeout: Duration::from_secs(env_parse(
                "ATLAS_LOOKUP_TIMEOUT_SECS",
                policy::LOOKUP_TIMEOUT_SECS,
            )?),
            freshness_full_credit_days: env_parse(
                "ATLAS_FRESHNESS_FULL_CREDIT_DAYS",
                defaults.freshness_full_credit_days,
            )?,
            freshness_horizon_days: env_parse(
                "ATLAS_FRESHNESS_HORIZON_DAYS",
                defaults.freshness_horizon_days,
            )?,
            stale_record_days: env_parse("ATLAS_STALE_RECORD_DAYS", defaults.stale_record_days)?,
            review_conflict_limit: env_parse(
                "ATLAS_REVIEW_CONFLICT_LIMIT",
                defaults.review_conflict_limit,
            )?,
            review_score_floor: env_parse("ATLAS_REVIEW_SCORE_FLOOR", defaults.review_score_floor)?,
            batch_concurrency: env_parse("ATLAS_BATCH_CONCURRENCY", defaults.batch_concurrency)?,
            weights: DimensionWeights {
                identity: env_parse("ATLAS_WEIGHT_IDENTITY", defaults.weights.identity)?,
                address: env_parse("ATLAS_WEIGHT_ADDRESS", defaults.weights.address)?,
                completeness: env_parse(
                    "ATLAS_WEIGHT_COMPLETENESS",
                    defaults.weights.completeness,
                )?,
                freshness: env_parse("ATLAS_WEIGHT_FRESHNESS", defaults.weights.freshness)?,
                enrichment: env_parse("ATLAS_WEIGHT_ENRICHMENT", defaults.weights.enrichment)?,
                risk: env_parse("ATLAS_WEIGHT_RISK", defaults.weights.risk)?,
            },
            tier_platinum_min: env_parse("ATLAS_TIER_PLATINUM_MIN", defaults.tier_platinum_min)?,
            tier_gold_min: env_parse("ATLAS_TIER_GOLD_MIN", defaults.tier_gold_min)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AtlasError> {
        self.weights.validate()?;
        if self.tier_platinum_min <= self.tier_gold_min {
            return Err(AtlasError::Config(format!(
                "PLATINUM threshold ({}) must be above GOLD threshold ({})",
                self.tier_platinum_min, self.tier_gold_min
            )));
        }
        if self.freshness_horizon_days <= self.freshness_full_credit_days {
            return Err(AtlasError::Config(
                "freshness horizon must be beyond the full-credit window".to_string(),
            ));
        }
        Ok(())
    }
}

/// Endpoints for the evidence source adapters. Only the identity registry
/// has a public default; the rest are host-supplied services.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub nppes_api_url: String,
    pub exclusion_api_url: Option<String>,
    pub license_api_url: Option<String>,
    pub address_api_url: Option<String>,
    pub enrichment_api_url: Option<String>,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self {
            nppes_api_url: env::var("NPPES_API_URL")
                .unwrap_or_else(|_| "https://npiregistry.cms.hhs.gov/api/".to_string()),
            exclusion_api_url: env::var("EXCLUSION_API_URL").ok(),
            license_api_url: env::var("LICENSE_API_URL").ok(),
            address_api_url: env::var("ADDRESS_API_URL").ok(),
            enrichment_api_url: env::var("ENRICHMENT_API_URL").ok(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AtlasError> {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AtlasError::Config(format!("{key} is not a valid value: {raw}"))),
        Err(_) => Ok(default),
    }
}

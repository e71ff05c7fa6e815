//! Default routing and scoring policy.
//!
//! Every tunable threshold lives here as a named constant. `PipelineConfig`
//! picks these up as defaults and allows env overrides; nothing in the
//! pipeline reads a bare number.

/// Importance weight of each confidence dimension. The six weights must sum
/// to 1.0 (`DimensionWeights::validate` enforces this at config load).
pub const WEIGHT_IDENTITY: f64 = 0.35;
pub const WEIGHT_ADDRESS: f64 = 0.20;
pub const WEIGHT_COMPLETENESS: f64 = 0.15;
pub const WEIGHT_FRESHNESS: f64 = 0.10;
pub const WEIGHT_ENRICHMENT: f64 = 0.15;
/// Risk is subtracted from the weighted sum, not added.
pub const WEIGHT_RISK: f64 = 0.05;

/// Minimum confidence score for the PLATINUM tier (also requires zero
/// high-severity fraud indicators).
pub const TIER_PLATINUM_MIN: f64 = 0.85;
/// Minimum confidence score for the GOLD tier.
pub const TIER_GOLD_MIN: f64 = 0.60;

/// YELLOW-path records below this score are queued for human review.
pub const REVIEW_SCORE_FLOOR: f64 = 0.5;
/// More cross-source conflicts than this forces human review regardless of
/// score, and trips the conflict-saturation fraud heuristic.
pub const REVIEW_CONFLICT_LIMIT: usize = 3;

/// Records updated within this many days get full freshness credit.
pub const FRESHNESS_FULL_CREDIT_DAYS: i64 = 90;
/// Freshness decays linearly from full credit down to zero at this horizon.
pub const FRESHNESS_HORIZON_DAYS: i64 = 1095;
/// A record untouched for this long trips the stale-record fraud heuristic.
pub const STALE_RECORD_DAYS: i64 = 730;

/// The fields every downstream stage consumes. Completeness is the non-empty
/// fraction of these; optional contact fields never count against a provider.
pub const COMPLETENESS_FIELDS: &[&str] = &["full_name", "npi", "address", "state", "last_updated"];

/// Fraud indicator severity weights, aggregated into the risk dimension.
pub const SEVERITY_WEIGHT_LOW: f64 = 0.15;
pub const SEVERITY_WEIGHT_MEDIUM: f64 = 0.35;
pub const SEVERITY_WEIGHT_HIGH: f64 = 0.6;
pub const SEVERITY_WEIGHT_CRITICAL: f64 = 1.0;
/// Summed severity weight at which the risk dimension saturates at 1.0
/// (two Critical indicators max it out).
pub const RISK_SATURATION: f64 = 2.0;

/// Identity credit lost per exact-field disagreement (name, NPI) with the
/// identity registry.
pub const IDENTITY_CONFLICT_PENALTY: f64 = 0.15;

/// Address dimension credit by validation outcome.
pub const ADDRESS_MEDICAL_CREDIT: f64 = 1.0;
pub const ADDRESS_NONMEDICAL_CREDIT: f64 = 0.55;

/// Per-source lookup timeout. The collecting stage is bounded by the single
/// slowest source, never the sum.
pub const LOOKUP_TIMEOUT_SECS: u64 = 10;

/// How many records a batch run validates concurrently.
pub const BATCH_CONCURRENCY: usize = 5;

use crate::usage::types::TokenUsage;

pub mod registry;

pub use registry::{PricingTable, DEFAULT_MODEL};

/// One step of a tiered price table: the rate charged while the token count
/// stays at or below `limit`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingTier {
    pub limit: f64,
    pub price_per_million: f64,
}

/// Tier tables for one model, one table per token class.
///
/// Tables are ordered by ascending `limit`; the last tier carries
/// `f64::INFINITY` so every count lands somewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPricing {
    pub prompt: Vec<PricingTier>,
    pub completion: Vec<PricingTier>,
    pub cache_read: Vec<PricingTier>,
    pub cache_write: Vec<PricingTier>,
}

/// Per-million rate for `tokens` drawn from `tiers`.
///
/// Zero tokens price at the first tier. Otherwise the first tier whose
/// limit covers the count wins; a table missing its infinite cap falls
/// back to its last tier, and an empty table prices at zero.
pub fn tier_price(tokens: u64, tiers: &[PricingTier]) -> f64 {
    let Some(first) = tiers.first() else {
        return 0.0;
    };
    if tokens == 0 {
        return first.price_per_million;
    }
    let count = tokens as f64;
    for tier in tiers {
        if count <= tier.limit {
            return tier.price_per_million;
        }
    }
    tiers[tiers.len() - 1].price_per_million
}

/// Dollar cost of `tokens` priced against `tiers`.
pub fn tokens_cost(tokens: u64, tiers: &[PricingTier]) -> f64 {
    if tokens == 0 {
        return 0.0;
    }
    (tokens as f64 / 1_000_000.0) * tier_price(tokens, tiers)
}

/// Total cost of one usage record.
///
/// Records that carry cache accounting charge cache-hit tokens at the
/// cache-read rate, cache-miss tokens at the prompt rate and cache-write
/// tokens at the cache-write rate; the plain prompt count already covers
/// those tokens and is not charged again. Records without cache fields
/// charge the full prompt count at the prompt rate. Completion tokens are
/// charged either way.
pub fn usage_cost(tokens: &TokenUsage, pricing: &ModelPricing) -> f64 {
    let input = if tokens.has_cache_activity() {
        tokens_cost(tokens.cache_hit_tokens, &pricing.cache_read)
            + tokens_cost(tokens.cache_miss_tokens, &pricing.prompt)
            + tokens_cost(tokens.cache_write_tokens, &pricing.cache_write)
    } else {
        tokens_cost(tokens.prompt_tokens, &pricing.prompt)
    };
    input + tokens_cost(tokens.completion_tokens, &pricing.completion)
}

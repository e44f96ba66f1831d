use std::collections::HashMap;

use super::{ModelPricing, PricingTier};
use crate::error::Error;

/// Model charged when a record does not name one, and the table every
/// unknown model id falls back to.
pub const DEFAULT_MODEL: &str = "gpt-5.1";

/// Hand-maintained price tables, per million tokens.
///
/// Vendors without context-size tiers get a single unbounded tier; the
/// Claude 4.5 long-context surcharge and the Qwen3 coder ladder are the
/// genuinely tiered entries.
pub struct PricingTable {
    models: HashMap<String, ModelPricing>,
}

impl PricingTable {
    /// Built-in tables, checked so the fallback model is always present.
    pub fn builtin() -> Result<Self, Error> {
        let table = PricingTable {
            models: builtin_models(),
        };
        if !table.models.contains_key(DEFAULT_MODEL) {
            return Err(Error::MissingDefaultPricing(DEFAULT_MODEL));
        }
        Ok(table)
    }

    /// Create a PricingTable from pre-built tables (for testing). The
    /// caller is responsible for including the default model.
    #[cfg(test)]
    pub fn from_models(models: HashMap<String, ModelPricing>) -> Self {
        PricingTable { models }
    }

    /// Tier tables for `model`; ids the registry does not carry price as
    /// the default model.
    pub fn for_model(&self, model: &str) -> &ModelPricing {
        self.models
            .get(model)
            .unwrap_or_else(|| &self.models[DEFAULT_MODEL])
    }
}

fn flat(price: f64) -> Vec<PricingTier> {
    vec![PricingTier {
        limit: f64::INFINITY,
        price_per_million: price,
    }]
}

fn tiers(steps: &[(f64, f64)]) -> Vec<PricingTier> {
    steps
        .iter()
        .map(|&(limit, price_per_million)| PricingTier {
            limit,
            price_per_million,
        })
        .collect()
}

fn add_model(
    models: &mut HashMap<String, ModelPricing>,
    name: &str,
    prompt: Vec<PricingTier>,
    completion: Vec<PricingTier>,
    cache_read: Vec<PricingTier>,
    cache_write: Vec<PricingTier>,
) {
    models.insert(
        name.to_string(),
        ModelPricing {
            prompt,
            completion,
            cache_read,
            cache_write,
        },
    );
}

fn builtin_models() -> HashMap<String, ModelPricing> {
    let mut models = HashMap::new();

    // OpenAI: cache writes are charged as plain input.
    add_model(
        &mut models,
        "gpt-5.1",
        flat(1.25),
        flat(10.0),
        flat(0.125),
        flat(1.25),
    );
    add_model(
        &mut models,
        "gpt-5.1-codex",
        flat(1.25),
        flat(10.0),
        flat(0.125),
        flat(1.25),
    );
    add_model(
        &mut models,
        "gpt-5.1-codex-mini",
        flat(0.25),
        flat(2.0),
        flat(0.025),
        flat(0.25),
    );
    add_model(
        &mut models,
        "gpt-5",
        flat(1.25),
        flat(10.0),
        flat(0.125),
        flat(1.25),
    );
    add_model(
        &mut models,
        "gpt-5-mini",
        flat(0.25),
        flat(2.0),
        flat(0.025),
        flat(0.25),
    );
    add_model(
        &mut models,
        "gpt-5-nano",
        flat(0.05),
        flat(0.4),
        flat(0.005),
        flat(0.05),
    );

    // Anthropic: sonnet charges a long-context surcharge past 200k.
    add_model(
        &mut models,
        "claude-sonnet-4-5",
        tiers(&[(200_000.0, 3.0), (f64::INFINITY, 6.0)]),
        tiers(&[(200_000.0, 15.0), (f64::INFINITY, 22.5)]),
        tiers(&[(200_000.0, 0.3), (f64::INFINITY, 0.6)]),
        tiers(&[(200_000.0, 3.75), (f64::INFINITY, 7.5)]),
    );
    add_model(
        &mut models,
        "claude-opus-4-5",
        flat(5.0),
        flat(25.0),
        flat(0.5),
        flat(6.25),
    );
    add_model(
        &mut models,
        "claude-haiku-4-5",
        flat(1.0),
        flat(5.0),
        flat(0.1),
        flat(1.25),
    );

    // Google: pro is tiered at 200k, cache writes priced as input.
    add_model(
        &mut models,
        "gemini-2.5-pro",
        tiers(&[(200_000.0, 1.25), (f64::INFINITY, 2.5)]),
        tiers(&[(200_000.0, 10.0), (f64::INFINITY, 15.0)]),
        tiers(&[(200_000.0, 0.31), (f64::INFINITY, 0.625)]),
        tiers(&[(200_000.0, 1.25), (f64::INFINITY, 2.5)]),
    );
    add_model(
        &mut models,
        "gemini-2.5-flash",
        flat(0.3),
        flat(2.5),
        flat(0.075),
        flat(0.3),
    );

    // Alibaba: the coder models ladder through four context bands.
    add_model(
        &mut models,
        "qwen3-coder-plus",
        tiers(&[
            (32_000.0, 1.0),
            (128_000.0, 1.8),
            (256_000.0, 3.0),
            (f64::INFINITY, 6.0),
        ]),
        tiers(&[
            (32_000.0, 5.0),
            (128_000.0, 9.0),
            (256_000.0, 15.0),
            (f64::INFINITY, 60.0),
        ]),
        tiers(&[
            (32_000.0, 0.1),
            (128_000.0, 0.18),
            (256_000.0, 0.3),
            (f64::INFINITY, 0.6),
        ]),
        tiers(&[
            (32_000.0, 1.0),
            (128_000.0, 1.8),
            (256_000.0, 3.0),
            (f64::INFINITY, 6.0),
        ]),
    );
    add_model(
        &mut models,
        "qwen3-coder-flash",
        tiers(&[
            (32_000.0, 0.3),
            (128_000.0, 0.45),
            (256_000.0, 0.6),
            (f64::INFINITY, 1.2),
        ]),
        tiers(&[
            (32_000.0, 1.5),
            (128_000.0, 2.25),
            (256_000.0, 3.0),
            (f64::INFINITY, 6.0),
        ]),
        tiers(&[
            (32_000.0, 0.03),
            (128_000.0, 0.045),
            (256_000.0, 0.06),
            (f64::INFINITY, 0.12),
        ]),
        tiers(&[
            (32_000.0, 0.3),
            (128_000.0, 0.45),
            (256_000.0, 0.6),
            (f64::INFINITY, 1.2),
        ]),
    );

    models
}

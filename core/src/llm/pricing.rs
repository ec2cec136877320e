//! Static price table for cost accounting.
//!
//! Prices are USD per 1000 tokens, split input/output. Unknown models are
//! billed at the cheapest hosted tier so cost totals stay conservative
//! rather than silently zero. Local inference always reports zero cost.

/// (model name, input per 1k tokens, output per 1k tokens)
const PRICES: &[(&str, f64, f64)] = &[
    ("gpt-4o", 0.0025, 0.01),
    ("gpt-4o-mini", 0.00015, 0.0006),
    ("gpt-4.1", 0.002, 0.008),
    ("gpt-4.1-mini", 0.0004, 0.0016),
    ("claude-sonnet-4", 0.003, 0.015),
    ("claude-haiku-3.5", 0.0008, 0.004),
    ("claude-opus-4", 0.015, 0.075),
];

/// Cheapest hosted tier, used for models missing from the table.
const FALLBACK: (f64, f64) = (0.00015, 0.0006);

/// Per-1k-token prices for a model.
pub fn price_for(model: &str) -> (f64, f64) {
    PRICES
        .iter()
        .find(|(name, _, _)| *name == model)
        .map(|(_, input, output)| (*input, *output))
        .unwrap_or(FALLBACK)
}

/// Dollar cost of one call given reported token usage.
pub fn cost_for(model: &str, tokens_in: u32, tokens_out: u32) -> f64 {
    let (input, output) = price_for(model);
    (tokens_in as f64 / 1000.0) * input + (tokens_out as f64 / 1000.0) * output
}

/// Rough token estimate for providers that omit usage (~4 chars per token).
pub fn estimate_tokens(text: &str) -> u32 {
    (text.chars().count() as u32 / 4).max(1)
}

use serde::Serialize;
use std::collections::HashMap;

use crate::workspace::WorkspaceMapping;

/// Token breakdown of a single usage record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub cache_hit_tokens: u64,
    pub cache_miss_tokens: u64,
    pub cache_write_tokens: u64,
}

impl TokenUsage {
    /// Whether the record carried any cache accounting at all. Decides
    /// which input-cost branch applies during pricing.
    pub fn has_cache_activity(&self) -> bool {
        self.cache_hit_tokens > 0 || self.cache_miss_tokens > 0 || self.cache_write_tokens > 0
    }
}

/// One priced interaction, keyed for aggregation
#[derive(Debug, Clone)]
pub struct UsageEvent {
    /// UTC calendar date, `YYYY-MM-DD`
    pub date: String,
    /// Opaque project token (encoded directory name or workspace hash)
    pub project: String,
    pub model: String,
    pub tokens: TokenUsage,
    pub cost: f64,
}

/// Accumulated stats for one (date, project, model) cell
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DailyModelStats {
    pub requests: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub cache_hit_tokens: u64,
    pub cache_miss_tokens: u64,
    pub cache_write_tokens: u64,
    pub cost: f64,
}

impl DailyModelStats {
    /// Token sums saturate so a record already at the cap cannot wrap
    /// the accumulator.
    pub fn add(&mut self, tokens: &TokenUsage, cost: f64) {
        self.requests += 1;
        self.prompt_tokens = self.prompt_tokens.saturating_add(tokens.prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(tokens.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(tokens.total_tokens);
        self.cache_hit_tokens = self.cache_hit_tokens.saturating_add(tokens.cache_hit_tokens);
        self.cache_miss_tokens = self.cache_miss_tokens.saturating_add(tokens.cache_miss_tokens);
        self.cache_write_tokens = self.cache_write_tokens.saturating_add(tokens.cache_write_tokens);
        self.cost += cost;
    }
}

/// Roll-up triple used for per-day, per-model and per-project totals
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SummaryStats {
    pub cost: f64,
    pub total_tokens: u64,
    pub requests: u64,
}

impl SummaryStats {
    pub fn add(&mut self, tokens: &TokenUsage, cost: f64) {
        self.requests += 1;
        self.total_tokens = self.total_tokens.saturating_add(tokens.total_tokens);
        self.cost += cost;
    }
}

/// Whole-run totals plus the cache sums behind the hit rate
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct GrandTotal {
    pub cost: f64,
    pub total_tokens: u64,
    pub requests: u64,
    pub cache_hit_tokens: u64,
    pub cache_miss_tokens: u64,
}

/// Immutable snapshot of one analysis load
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisData {
    /// Model charged to records that did not name one
    pub default_model: String,
    /// date -> project -> model -> stats
    pub daily: HashMap<String, HashMap<String, HashMap<String, DailyModelStats>>>,
    pub daily_totals: HashMap<String, SummaryStats>,
    pub model_totals: HashMap<String, SummaryStats>,
    pub project_totals: HashMap<String, SummaryStats>,
    pub grand_total: GrandTotal,
    /// Highest-cost model, ties broken by the smaller id
    pub top_model: Option<String>,
    /// Highest-cost project token, same tie-break
    pub top_project: Option<String>,
    /// cache-hit / (cache-hit + cache-miss), 0 with no cache traffic
    pub cache_hit_rate: f64,
    /// Distinct dates with at least one event
    pub active_days: usize,
    /// Workspace-hash mappings recovered from IDE storage, when any
    pub workspaces: Option<HashMap<String, WorkspaceMapping>>,
}

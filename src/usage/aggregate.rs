use std::collections::HashMap;

use crate::usage::types::{AnalysisData, DailyModelStats, GrandTotal, SummaryStats, UsageEvent};
use crate::workspace::WorkspaceMapping;

/// Mutable fold state shared by every scanner in one load. Events go in
/// one at a time, `finalize` freezes them into the snapshot consumers see.
#[derive(Debug, Default)]
pub struct Aggregator {
    daily: HashMap<String, HashMap<String, HashMap<String, DailyModelStats>>>,
    model_totals: HashMap<String, SummaryStats>,
    project_totals: HashMap<String, SummaryStats>,
    grand_total: GrandTotal,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one priced event into every dimension at once.
    pub fn fold(&mut self, event: UsageEvent) {
        let UsageEvent {
            date,
            project,
            model,
            tokens,
            cost,
        } = event;

        self.daily
            .entry(date)
            .or_default()
            .entry(project.clone())
            .or_default()
            .entry(model.clone())
            .or_default()
            .add(&tokens, cost);

        self.model_totals.entry(model).or_default().add(&tokens, cost);
        self.project_totals
            .entry(project)
            .or_default()
            .add(&tokens, cost);

        let grand = &mut self.grand_total;
        grand.requests += 1;
        grand.total_tokens = grand.total_tokens.saturating_add(tokens.total_tokens);
        grand.cost += cost;
        grand.cache_hit_tokens = grand.cache_hit_tokens.saturating_add(tokens.cache_hit_tokens);
        grand.cache_miss_tokens = grand.cache_miss_tokens.saturating_add(tokens.cache_miss_tokens);
    }

    pub fn finalize(
        self,
        default_model: String,
        workspaces: Option<HashMap<String, WorkspaceMapping>>,
    ) -> AnalysisData {
        let mut daily_totals: HashMap<String, SummaryStats> = HashMap::new();
        for (date, projects) in &self.daily {
            let day = daily_totals.entry(date.clone()).or_default();
            for models in projects.values() {
                for stats in models.values() {
                    day.requests += stats.requests;
                    day.total_tokens = day.total_tokens.saturating_add(stats.total_tokens);
                    day.cost += stats.cost;
                }
            }
        }

        let cache_reads = self
            .grand_total
            .cache_hit_tokens
            .saturating_add(self.grand_total.cache_miss_tokens);
        let cache_hit_rate = if cache_reads > 0 {
            self.grand_total.cache_hit_tokens as f64 / cache_reads as f64
        } else {
            0.0
        };

        AnalysisData {
            default_model,
            active_days: self.daily.len(),
            top_model: top_by_cost(&self.model_totals),
            top_project: top_by_cost(&self.project_totals),
            daily: self.daily,
            daily_totals,
            model_totals: self.model_totals,
            project_totals: self.project_totals,
            grand_total: self.grand_total,
            cache_hit_rate,
            workspaces,
        }
    }
}

/// Highest-cost key. Equal costs resolve to the lexicographically
/// smaller key, so repeated runs over the same files pick the same
/// winner regardless of map order.
fn top_by_cost(totals: &HashMap<String, SummaryStats>) -> Option<String> {
    let mut ranked: Vec<(&String, f64)> = totals.iter().map(|(key, s)| (key, s.cost)).collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    ranked.first().map(|(key, _)| (*key).clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::types::TokenUsage;

    fn event(date: &str, project: &str, model: &str, total: u64, cost: f64) -> UsageEvent {
        UsageEvent {
            date: date.to_string(),
            project: project.to_string(),
            model: model.to_string(),
            tokens: TokenUsage {
                prompt_tokens: total / 2,
                completion_tokens: total - total / 2,
                total_tokens: total,
                ..Default::default()
            },
            cost,
        }
    }

    #[test]
    fn test_fold_populates_every_dimension() {
        let mut agg = Aggregator::new();
        agg.fold(event("2026-03-01", "proj-a", "gpt-5.1", 100, 0.01));
        agg.fold(event("2026-03-01", "proj-a", "claude-opus-4-5", 200, 0.05));
        agg.fold(event("2026-03-02", "proj-b", "gpt-5.1", 300, 0.02));

        let data = agg.finalize("gpt-5.1".to_string(), None);

        let cell = &data.daily["2026-03-01"]["proj-a"]["gpt-5.1"];
        assert_eq!(cell.requests, 1);
        assert_eq!(cell.total_tokens, 100);

        assert_eq!(data.model_totals["gpt-5.1"].requests, 2);
        assert_eq!(data.model_totals["gpt-5.1"].total_tokens, 400);
        assert_eq!(data.project_totals["proj-a"].requests, 2);

        assert_eq!(data.grand_total.requests, 3);
        assert_eq!(data.grand_total.total_tokens, 600);
        assert!((data.grand_total.cost - 0.08).abs() < 1e-9);
        assert_eq!(data.active_days, 2);
    }

    #[test]
    fn test_daily_totals_sum_the_nested_cells() {
        let mut agg = Aggregator::new();
        agg.fold(event("2026-03-01", "proj-a", "gpt-5.1", 100, 0.01));
        agg.fold(event("2026-03-01", "proj-b", "gpt-5.1", 50, 0.02));
        agg.fold(event("2026-03-02", "proj-a", "gpt-5.1", 10, 0.001));

        let data = agg.finalize("gpt-5.1".to_string(), None);
        let day = &data.daily_totals["2026-03-01"];
        assert_eq!(day.requests, 2);
        assert_eq!(day.total_tokens, 150);
        assert!((day.cost - 0.03).abs() < 1e-9);

        let summed: f64 = data.daily_totals.values().map(|d| d.cost).sum();
        assert!((summed - data.grand_total.cost).abs() < 1e-9);
    }

    #[test]
    fn test_top_picks_highest_cost() {
        let mut agg = Aggregator::new();
        agg.fold(event("2026-03-01", "proj-a", "cheap-model", 100, 0.01));
        agg.fold(event("2026-03-01", "proj-b", "dear-model", 100, 0.50));

        let data = agg.finalize("gpt-5.1".to_string(), None);
        assert_eq!(data.top_model.as_deref(), Some("dear-model"));
        assert_eq!(data.top_project.as_deref(), Some("proj-b"));
    }

    #[test]
    fn test_top_ties_resolve_to_smaller_key() {
        let mut agg = Aggregator::new();
        agg.fold(event("2026-03-01", "zeta", "beta-model", 100, 0.25));
        agg.fold(event("2026-03-01", "alpha", "alpha-model", 100, 0.25));

        let data = agg.finalize("gpt-5.1".to_string(), None);
        assert_eq!(data.top_model.as_deref(), Some("alpha-model"));
        assert_eq!(data.top_project.as_deref(), Some("alpha"));
    }

    #[test]
    fn test_cache_hit_rate_from_grand_totals() {
        let mut agg = Aggregator::new();
        let mut hit = event("2026-03-01", "proj-a", "gpt-5.1", 100, 0.01);
        hit.tokens.cache_hit_tokens = 75;
        let mut miss = event("2026-03-01", "proj-a", "gpt-5.1", 100, 0.01);
        miss.tokens.cache_miss_tokens = 25;
        agg.fold(hit);
        agg.fold(miss);

        let data = agg.finalize("gpt-5.1".to_string(), None);
        assert!((data.cache_hit_rate - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_counts_at_the_cap_saturate_in_every_dimension() {
        let mut agg = Aggregator::new();
        let mut first = event("2026-03-01", "proj-a", "gpt-5.1", u64::MAX, 0.01);
        first.tokens.cache_hit_tokens = u64::MAX;
        let mut second = event("2026-03-01", "proj-a", "gpt-5.1", u64::MAX, 0.01);
        second.tokens.cache_miss_tokens = u64::MAX;
        agg.fold(first);
        agg.fold(second);

        let data = agg.finalize("gpt-5.1".to_string(), None);
        assert_eq!(data.grand_total.requests, 2);
        assert_eq!(data.grand_total.total_tokens, u64::MAX);
        assert_eq!(data.daily_totals["2026-03-01"].total_tokens, u64::MAX);
        assert_eq!(data.model_totals["gpt-5.1"].total_tokens, u64::MAX);
        assert_eq!(data.project_totals["proj-a"].total_tokens, u64::MAX);
        assert!(data.cache_hit_rate.is_finite());
    }

    #[test]
    fn test_empty_finalize() {
        let data = Aggregator::new().finalize("gpt-5.1".to_string(), None);
        assert_eq!(data.grand_total.requests, 0);
        assert_eq!(data.active_days, 0);
        assert!(data.daily.is_empty());
        assert!(data.top_model.is_none());
        assert!(data.top_project.is_none());
        assert_eq!(data.cache_hit_rate, 0.0);
        assert!(data.workspaces.is_none());
    }
}

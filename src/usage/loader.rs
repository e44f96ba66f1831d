use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use log::debug;
use serde_json::Value;

use crate::config::Sources;
use crate::error::Error;
use crate::pricing::{PricingTable, DEFAULT_MODEL};
use crate::usage::aggregate::Aggregator;
use crate::usage::code::scan_code_logs;
use crate::usage::ide::IdeScanner;
use crate::usage::types::AnalysisData;
use crate::workspace::build_workspace_mappings;

/// Knobs for one analysis load.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// How many days back from today to ingest; `None` means everything.
    pub lookback_days: Option<i64>,
    /// Model charged to records that do not name one. `None` falls back
    /// to the settings file, then the built-in default.
    pub default_model: Option<String>,
}

/// Run the full pipeline once: discover, ingest, price, aggregate, map.
///
/// Missing roots contribute nothing; unreadable roots and a broken
/// pricing registry are the only hard failures.
pub fn load_analysis(sources: &Sources, options: &LoadOptions) -> Result<AnalysisData, Error> {
    let pricing = PricingTable::builtin()?;

    let default_model = options
        .default_model
        .clone()
        .or_else(|| settings_model(sources.code_home.as_deref()))
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let cutoff = options
        .lookback_days
        .map(|days| (Utc::now() - Duration::days(days)).date_naive());
    debug!("loading usage: default model {default_model}, cutoff {cutoff:?}");

    let mut agg = Aggregator::new();

    if let Some(code_home) = &sources.code_home {
        scan_code_logs(&code_home.join("projects"), &default_model, &pricing, &mut agg)?;
    }

    if let Some(profiles) = &sources.ide_profiles {
        let mut ide = IdeScanner::new(&pricing, &default_model, cutoff);
        ide.scan(profiles, &mut agg)?;
    }

    let empty = PathBuf::new();
    let mappings = build_workspace_mappings(
        sources.ide_storage.as_deref().unwrap_or(&empty),
        sources.ide_profiles.as_deref().unwrap_or(&empty),
    );
    let workspaces = if mappings.is_empty() {
        None
    } else {
        Some(mappings)
    };

    Ok(agg.finalize(default_model, workspaces))
}

/// Default model recorded in the CLI settings file, when present.
fn settings_model(code_home: Option<&Path>) -> Option<String> {
    let text = fs::read_to_string(code_home?.join("settings.json")).ok()?;
    let settings: Value = serde_json::from_str(&text).ok()?;
    settings
        .get("model")
        .and_then(Value::as_str)
        .filter(|model| !model.is_empty())
        .map(str::to_string)
}

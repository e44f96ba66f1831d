use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Component, Path, PathBuf};

use log::{debug, warn};
use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::error::Error;
use crate::pricing::{usage_cost, PricingTable};
use crate::usage::aggregate::Aggregator;
use crate::usage::types::{TokenUsage, UsageEvent};
use crate::usage::{date_key, parse_timestamp};

/// Sentinel project for log files outside the `projects/<name>/` layout.
/// The project key leans on that path convention; anything nested
/// differently lands here rather than under a guessed name.
const UNKNOWN_PROJECT: &str = "unknown-project";

// Key spellings accepted for each token field. The CLI has logged both
// camelCase and snake_case over time.
const PROMPT_KEYS: &[&str] = &["promptTokens", "prompt_tokens", "input_tokens", "inputTokens"];
const COMPLETION_KEYS: &[&str] = &[
    "completionTokens",
    "completion_tokens",
    "output_tokens",
    "outputTokens",
];
const TOTAL_KEYS: &[&str] = &["totalTokens", "total_tokens"];
const CACHE_HIT_KEYS: &[&str] = &[
    "cacheHitTokens",
    "cache_hit_tokens",
    "cachedTokens",
    "cached_tokens",
    "cache_read_input_tokens",
];
const CACHE_MISS_KEYS: &[&str] = &["cacheMissTokens", "cache_miss_tokens"];
const CACHE_WRITE_KEYS: &[&str] = &[
    "cacheWriteTokens",
    "cache_write_tokens",
    "cache_creation_input_tokens",
];

/// Stream every usage record under the CLI projects root into `agg`.
///
/// A missing root contributes nothing. Corrupt lines, files and subtrees
/// are skipped; only a read failure on the root itself is an error.
pub fn scan_code_logs(
    root: &Path,
    default_model: &str,
    pricing: &PricingTable,
    agg: &mut Aggregator,
) -> Result<(), Error> {
    if !root.exists() {
        debug!("code root {} does not exist, skipping", root.display());
        return Ok(());
    }
    for path in collect_jsonl_files(root)? {
        ingest_file(&path, default_model, pricing, agg);
    }
    Ok(())
}

/// Collect all .jsonl files recursively, skipping empty ones.
fn collect_jsonl_files(root: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                if err.path() == Some(root) {
                    return Err(Error::RootIo {
                        path: root.to_path_buf(),
                        source: err.into(),
                    });
                }
                warn!("skipping unreadable entry under {}: {err}", root.display());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        // Zero-length files carry nothing worth opening.
        if entry.metadata().map(|meta| meta.len() == 0).unwrap_or(true) {
            continue;
        }
        files.push(entry.into_path());
    }
    Ok(files)
}

/// Parse one JSONL log file, folding every usable record.
fn ingest_file(path: &Path, default_model: &str, pricing: &PricingTable, agg: &mut Aggregator) {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            debug!("cannot open {}: {err}", path.display());
            return;
        }
    };

    let project = project_token(path);
    let reader = BufReader::new(file);

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => continue,
        };
        if line.trim().is_empty() {
            continue;
        }
        // Quick filter: only parse lines that can carry a usage payload.
        if !line.contains("\"usage\"") {
            continue;
        }

        let record: Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(_) => continue,
        };
        let Some(tokens) = record_usage(&record) else {
            continue;
        };
        let Some(when) = record
            .get("timestamp")
            .or_else(|| record.get("ts"))
            .and_then(parse_timestamp)
        else {
            continue;
        };
        let model = record_model(&record).unwrap_or_else(|| default_model.to_string());
        let cost = usage_cost(&tokens, pricing.for_model(&model));

        agg.fold(UsageEvent {
            date: date_key(&when),
            project: project.clone(),
            model,
            tokens,
            cost,
        });
    }
}

/// Project token for a log file: the path segment immediately after a
/// `projects` directory component.
fn project_token(path: &Path) -> String {
    let mut components = path.components();
    while let Some(part) = components.next() {
        if part.as_os_str() == "projects" {
            if let Some(Component::Normal(name)) = components.next() {
                return name.to_string_lossy().into_owned();
            }
        }
    }
    UNKNOWN_PROJECT.to_string()
}

/// Token counts from a record's usage payload, top-level or under
/// `message`. `None` when the record carries no usage object.
fn record_usage(record: &Value) -> Option<TokenUsage> {
    let usage = record
        .get("usage")
        .or_else(|| record.get("message").and_then(|m| m.get("usage")))?
        .as_object()?;

    let prompt_tokens = read_count(usage, PROMPT_KEYS);
    let completion_tokens = read_count(usage, COMPLETION_KEYS);
    Some(TokenUsage {
        prompt_tokens,
        completion_tokens,
        // Saturating: one absurd count must not abort the whole file.
        total_tokens: read_total(usage)
            .unwrap_or_else(|| prompt_tokens.saturating_add(completion_tokens)),
        cache_hit_tokens: read_count(usage, CACHE_HIT_KEYS),
        cache_miss_tokens: read_count(usage, CACHE_MISS_KEYS),
        cache_write_tokens: read_count(usage, CACHE_WRITE_KEYS),
    })
}

/// Explicit total when the record carries one, else `None` so the caller
/// can derive prompt + completion.
fn read_total(map: &Map<String, Value>) -> Option<u64> {
    for key in TOTAL_KEYS {
        if let Some(value) = map.get(*key) {
            if let Some(count) = value.as_u64() {
                return Some(count);
            }
            if let Some(count) = value.as_f64() {
                if count.is_finite() && count >= 0.0 {
                    return Some(count as u64);
                }
            }
        }
    }
    None
}

/// First usable count under any accepted spelling, zero when absent.
fn read_count(map: &Map<String, Value>, keys: &[&str]) -> u64 {
    for key in keys {
        if let Some(value) = map.get(*key) {
            if let Some(count) = value.as_u64() {
                return count;
            }
            if let Some(count) = value.as_f64() {
                if count.is_finite() && count > 0.0 {
                    return count as u64;
                }
            }
        }
    }
    0
}

/// Model id named by the record, if any.
fn record_model(record: &Value) -> Option<String> {
    let model = record
        .get("model")
        .or_else(|| record.get("modelId"))
        .or_else(|| record.get("message").and_then(|m| m.get("model")))
        .and_then(Value::as_str)?;
    if model.is_empty() {
        return None;
    }
    Some(model.to_string())
}

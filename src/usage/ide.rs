use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::Error;
use crate::pricing::{usage_cost, PricingTable};
use crate::usage::aggregate::Aggregator;
use crate::usage::types::{TokenUsage, UsageEvent};
use crate::usage::{date_key, parse_timestamp};

/// How much of a message file is worth reading when hunting for the
/// model id. The field sits in the leading metadata of the payload.
const MESSAGE_HEAD_BYTES: usize = 64 * 1024;

/// How many referenced messages to peek at per request before giving up.
const MESSAGE_PROBE_LIMIT: usize = 3;

// Index files are either bare arrays or objects wrapping one.
const CONVERSATION_WRAPPERS: &[&str] = &["conversations", "items", "entries"];
const REQUEST_WRAPPERS: &[&str] = &["requests", "items", "entries"];

const INPUT_KEYS: &[&str] = &["inputTokens", "input_tokens", "input"];
const OUTPUT_KEYS: &[&str] = &["outputTokens", "output_tokens", "output"];
const TOTAL_KEYS: &[&str] = &["totalTokens", "total_tokens", "total"];

/// Model ids are buried in JSON-in-JSON payloads, so the quotes around
/// them can sit behind any depth of string escaping.
static MODEL_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\\*"model(?:Id|Name)\\*"\s*:\s*\\*"([^"\\]+)"#).unwrap()
});

/// Walks the IDE chat history (profiles -> workspaces -> conversations ->
/// requests) and folds every usable request. Owns the per-run caches, so
/// one scanner serves exactly one load.
pub struct IdeScanner<'a> {
    pricing: &'a PricingTable,
    default_model: &'a str,
    cutoff: Option<NaiveDate>,
    model_cache: HashMap<String, String>,
}

impl<'a> IdeScanner<'a> {
    pub fn new(
        pricing: &'a PricingTable,
        default_model: &'a str,
        cutoff: Option<NaiveDate>,
    ) -> Self {
        IdeScanner {
            pricing,
            default_model,
            cutoff,
            model_cache: HashMap::new(),
        }
    }

    /// Scan every profile under `root` into `agg`.
    ///
    /// A missing root contributes nothing; an unreadable root is an
    /// error. Everything below the root degrades to skipping the
    /// malformed unit.
    pub fn scan(&mut self, root: &Path, agg: &mut Aggregator) -> Result<(), Error> {
        if !root.exists() {
            debug!("ide root {} does not exist, skipping", root.display());
            return Ok(());
        }
        let profiles = fs::read_dir(root).map_err(|source| Error::RootIo {
            path: root.to_path_buf(),
            source,
        })?;
        for profile in profiles.flatten() {
            let path = profile.path();
            if path.is_dir() {
                self.scan_profile(&path, agg);
            }
        }
        Ok(())
    }

    fn scan_profile(&mut self, profile_dir: &Path, agg: &mut Aggregator) {
        // Profiles without chat history simply have no history tree.
        let history = profile_dir.join("history");
        let Ok(workspaces) = fs::read_dir(&history) else {
            return;
        };
        for workspace in workspaces.flatten() {
            let path = workspace.path();
            if !path.is_dir() {
                continue;
            }
            let hash = workspace.file_name().to_string_lossy().into_owned();
            self.scan_workspace(&hash, &path, agg);
        }
    }

    /// One workspace: read its conversation index and descend into every
    /// conversation that survives the date cutoff.
    fn scan_workspace(&mut self, hash: &str, workspace_dir: &Path, agg: &mut Aggregator) {
        let Some(conversations) =
            read_index_array(&workspace_dir.join("index.json"), CONVERSATION_WRAPPERS)
        else {
            debug!(
                "unreadable conversation index in {}, skipping workspace",
                workspace_dir.display()
            );
            return;
        };
        for conversation in &conversations {
            let Some(entry) = conversation.as_object() else {
                continue;
            };
            let Some(when) = entry
                .get("lastMessageAt")
                .or_else(|| entry.get("createdAt"))
                .and_then(parse_timestamp)
            else {
                continue;
            };
            if let Some(cutoff) = self.cutoff {
                if when.date_naive() < cutoff {
                    continue;
                }
            }
            let Some(id) = entry
                .get("id")
                .or_else(|| entry.get("conversationId"))
                .and_then(Value::as_str)
            else {
                continue;
            };
            self.scan_conversation(hash, &date_key(&when), &workspace_dir.join(id), agg);
        }
    }

    /// One conversation: read its request index and fold each request.
    fn scan_conversation(&mut self, hash: &str, date: &str, conv_dir: &Path, agg: &mut Aggregator) {
        let Some(requests) = read_index_array(&conv_dir.join("index.json"), REQUEST_WRAPPERS)
        else {
            return;
        };
        for request in &requests {
            let Some(request) = request.as_object() else {
                continue;
            };
            let counts = request
                .get("tokens")
                .or_else(|| request.get("usage"))
                .and_then(Value::as_object)
                .unwrap_or(request);

            let Some(input) = count_field(counts, INPUT_KEYS) else {
                continue;
            };
            let Some(output) = count_field(counts, OUTPUT_KEYS) else {
                continue;
            };
            let total = total_field(counts, input.saturating_add(output));

            let model = self.request_model(conv_dir, request);
            let tokens = TokenUsage {
                prompt_tokens: input,
                completion_tokens: output,
                total_tokens: total,
                ..Default::default()
            };
            let cost = usage_cost(&tokens, self.pricing.for_model(&model));

            agg.fold(UsageEvent {
                date: date.to_string(),
                project: hash.to_string(),
                model,
                tokens,
                cost,
            });
        }
    }

    /// Model for one request: peek at the first few referenced messages,
    /// falling back to the run default when none of them names one.
    fn request_model(&mut self, conv_dir: &Path, request: &Map<String, Value>) -> String {
        let ids = request
            .get("messageIds")
            .or_else(|| request.get("messages"))
            .and_then(Value::as_array);
        if let Some(ids) = ids {
            let messages_dir = conv_dir.join("messages");
            for id in ids
                .iter()
                .filter_map(Value::as_str)
                .take(MESSAGE_PROBE_LIMIT)
            {
                if let Some(model) = self.message_model(&messages_dir, id) {
                    return model;
                }
            }
        }
        self.default_model.to_string()
    }

    /// Model id embedded in a message payload, reading at most the head
    /// of the file. Successful lookups are cached for the whole run.
    fn message_model(&mut self, messages_dir: &Path, id: &str) -> Option<String> {
        if let Some(model) = self.model_cache.get(id) {
            return Some(model.clone());
        }
        let file = File::open(messages_dir.join(format!("{id}.json"))).ok()?;
        let mut head = Vec::with_capacity(MESSAGE_HEAD_BYTES);
        file.take(MESSAGE_HEAD_BYTES as u64)
            .read_to_end(&mut head)
            .ok()?;
        let head = String::from_utf8_lossy(&head);
        let model = MODEL_ID_RE
            .captures(&head)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())?;
        self.model_cache.insert(id.to_string(), model.clone());
        Some(model)
    }
}

/// Load a JSON index file that is either a bare array or an object
/// wrapping the array under one of `wrappers`.
fn read_index_array(path: &Path, wrappers: &[&str]) -> Option<Vec<Value>> {
    let text = fs::read_to_string(path).ok()?;
    let value: Value = serde_json::from_str(&text).ok()?;
    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => {
            for key in wrappers {
                if let Some(Value::Array(items)) = map.remove(*key) {
                    return Some(items);
                }
            }
            None
        }
        _ => None,
    }
}

/// Input/output count: absent means zero, but a present field that is
/// not a usable finite number poisons the whole request (`None`).
fn count_field(counts: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    for key in keys {
        if let Some(value) = counts.get(*key) {
            return value
                .as_f64()
                .filter(|n| n.is_finite() && *n >= 0.0)
                .map(|n| n as u64);
        }
    }
    Some(0)
}

/// Total count: any usable number wins, everything else falls back to
/// input + output.
fn total_field(counts: &Map<String, Value>, fallback: u64) -> u64 {
    for key in TOTAL_KEYS {
        if let Some(number) = counts.get(*key).and_then(Value::as_f64) {
            if number.is_finite() && number >= 0.0 {
                return number as u64;
            }
        }
    }
    fallback
}

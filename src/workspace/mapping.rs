use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use walkdir::WalkDir;

use crate::workspace::{is_workspace_hash, shorten_home};

/// Depth cap when hunting through storage artifacts. The trees under a
/// workspace hash are reconstructed from loose on-disk state, so the
/// walk is bounded instead of trusted.
const ARTIFACT_SCAN_DEPTH: usize = 10;

/// Artifacts can be big (editor state databases); only their head is
/// searched for embedded paths.
const ARTIFACT_HEAD_BYTES: usize = 256 * 1024;

/// Absolute POSIX paths as they show up inside artifacts, with or
/// without a file:// scheme. Percent-escapes count as path characters
/// so encoded folder URIs can be rebuilt verbatim.
static PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:file://)?(/(?:[A-Za-z0-9._~%@-]+/)*[A-Za-z0-9._~%@-]+)").unwrap()
});

/// Resolved identity of one workspace-storage hash.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceMapping {
    pub hash: String,
    /// Folder URI the hash was derived from, e.g. `file:///home/u/proj`
    pub folder_uri: String,
    /// Decoded path with the home prefix shortened to `~`
    pub display_path: String,
}

/// Build the hash -> mapping table for one load.
///
/// Storage folders that kept their `workspace.json` are authoritative:
/// the folder URI is hashed directly. Hashes without one (remote
/// sessions, cleaned-up folders) get a best-effort recovery pass over
/// their artifacts. Once a hash is mapped it is never overwritten.
pub fn build_workspace_mappings(
    storage_root: &Path,
    profiles_root: &Path,
) -> HashMap<String, WorkspaceMapping> {
    let mut mappings = HashMap::new();

    if let Ok(entries) = fs::read_dir(storage_root) {
        for entry in entries.flatten() {
            let Some(uri) = stored_folder_uri(&entry.path()) else {
                continue;
            };
            let hash = format!("{:x}", md5::compute(uri.as_bytes()));
            if !mappings.contains_key(&hash) {
                let mapping = WorkspaceMapping {
                    hash: hash.clone(),
                    display_path: display_path_for_uri(&uri),
                    folder_uri: uri,
                };
                mappings.insert(hash, mapping);
            }
        }
    }

    for (hash, dir) in candidate_dirs(storage_root, profiles_root) {
        if mappings.contains_key(&hash) {
            continue;
        }
        if let Some(mapping) = recover_from_artifacts(&hash, &dir) {
            debug!("recovered workspace {hash} from artifacts under {}", dir.display());
            mappings.insert(hash, mapping);
        }
    }

    mappings
}

/// Folder URI recorded in a storage folder's `workspace.json`, if any.
fn stored_folder_uri(dir: &Path) -> Option<String> {
    let text = fs::read_to_string(dir.join("workspace.json")).ok()?;
    let meta: Value = serde_json::from_str(&text).ok()?;
    ["folder", "workspace"]
        .iter()
        .find_map(|key| meta.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

/// Every hash-named directory that could hold recovery artifacts:
/// storage folders plus each profile's history workspaces.
fn candidate_dirs(storage_root: &Path, profiles_root: &Path) -> Vec<(String, PathBuf)> {
    let mut dirs = Vec::new();
    push_hash_dirs(storage_root, &mut dirs);
    if let Ok(profiles) = fs::read_dir(profiles_root) {
        for profile in profiles.flatten() {
            push_hash_dirs(&profile.path().join("history"), &mut dirs);
        }
    }
    dirs
}

fn push_hash_dirs(root: &Path, out: &mut Vec<(String, PathBuf)>) {
    let Ok(entries) = fs::read_dir(root) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();
        if path.is_dir() && is_workspace_hash(&name) {
            out.push((name.to_lowercase(), path));
        }
    }
}

/// Search the files under `dir` for an embedded path whose ancestor
/// chain hashes to `hash`. First confirmed match wins.
fn recover_from_artifacts(hash: &str, dir: &Path) -> Option<WorkspaceMapping> {
    for entry in WalkDir::new(dir)
        .max_depth(ARTIFACT_SCAN_DEPTH)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(head) = read_head(entry.path()) else {
            continue;
        };
        for caps in PATH_RE.captures_iter(&head) {
            let Some(found) = caps.get(1) else {
                continue;
            };
            if let Some(mapping) = match_ancestors(hash, Path::new(found.as_str())) {
                return Some(mapping);
            }
        }
    }
    None
}

/// Hash every ancestor of `path` until one reproduces `hash`.
fn match_ancestors(hash: &str, path: &Path) -> Option<WorkspaceMapping> {
    for ancestor in path.ancestors() {
        if ancestor.as_os_str().is_empty() || ancestor == Path::new("/") {
            break;
        }
        if let Some(uri) = matching_uri(hash, ancestor) {
            return Some(WorkspaceMapping {
                hash: hash.to_string(),
                display_path: display_path_for_uri(&uri),
                folder_uri: uri,
            });
        }
    }
    None
}

/// The URI spelling (scheme-prefixed or bare) whose md5 equals `hash`.
fn matching_uri(hash: &str, path: &Path) -> Option<String> {
    let forms = [
        format!("file://{}", path.display()),
        path.display().to_string(),
    ];
    forms
        .into_iter()
        .find(|form| format!("{:x}", md5::compute(form.as_bytes())).eq_ignore_ascii_case(hash))
}

fn display_path_for_uri(uri: &str) -> String {
    let path = uri.strip_prefix("file://").unwrap_or(uri);
    let path = match urlencoding::decode(path) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => path.to_string(),
    };
    shorten_home(Path::new(&path))
}

fn read_head(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    let mut head = Vec::new();
    file.take(ARTIFACT_HEAD_BYTES as u64)
        .read_to_end(&mut head)
        .ok()?;
    Some(String::from_utf8_lossy(&head).into_owned())
}

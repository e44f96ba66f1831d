use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::workspace::{is_workspace_hash, shorten_home, WorkspaceMapping};

/// Per-load resolver turning opaque project tokens back into readable
/// paths. Decoding probes the live filesystem, so every answer is
/// cached for the lifetime of the resolver.
#[derive(Debug, Default)]
pub struct NameResolver {
    cache: HashMap<String, String>,
}

impl NameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve one project token.
    ///
    /// Workspace hashes use the mapping table built during the load,
    /// mangled path tokens are re-segmented against the filesystem, and
    /// anything unresolvable comes back unchanged.
    pub fn resolve(
        &mut self,
        token: &str,
        mappings: Option<&HashMap<String, WorkspaceMapping>>,
    ) -> String {
        if let Some(cached) = self.cache.get(token) {
            return cached.clone();
        }
        let resolved = lookup(token, mappings);
        self.cache.insert(token.to_string(), resolved.clone());
        resolved
    }
}

fn lookup(token: &str, mappings: Option<&HashMap<String, WorkspaceMapping>>) -> String {
    if is_workspace_hash(token) {
        // Mapping keys are lowercase hex; the on-disk directory name
        // behind the token is not guaranteed to be.
        let key = token.to_ascii_lowercase();
        if let Some(mapping) = mappings.and_then(|table| table.get(&key)) {
            return mapping.display_path.clone();
        }
    }
    if looks_encoded(token) {
        if let Some(path) = decode_project_dir(token) {
            return shorten_home(&path);
        }
    }
    token.to_string()
}

/// Mangled absolute paths start with a letter (after the optional
/// leading separator dash) and still carry dash-separated fragments.
fn looks_encoded(token: &str) -> bool {
    let trimmed = token.strip_prefix('-').unwrap_or(token);
    trimmed
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic())
        && trimmed.contains('-')
}

/// Re-merge dash-separated fragments into an absolute path that exists.
/// Fragment boundaries are ambiguous because component names may
/// themselves contain dashes.
fn decode_project_dir(token: &str) -> Option<PathBuf> {
    let trimmed = token.trim_start_matches('-');
    let fragments: Vec<&str> = trimmed.split('-').collect();
    segment_search(Path::new("/"), &fragments)
}

/// Depth-first search over fragment merges, smallest merge first,
/// pruned by requiring every prefix to exist on disk.
fn segment_search(base: &Path, fragments: &[&str]) -> Option<PathBuf> {
    if fragments.is_empty() {
        return Some(base.to_path_buf());
    }
    let mut component = String::new();
    for (index, fragment) in fragments.iter().enumerate() {
        if index > 0 {
            component.push('-');
        }
        component.push_str(fragment);
        let candidate = base.join(&component);
        if candidate.exists() {
            if let Some(found) = segment_search(&candidate, &fragments[index + 1..]) {
                return Some(found);
            }
        }
    }
    None
}

pub mod mapping;
pub mod resolver;

pub use mapping::{build_workspace_mappings, WorkspaceMapping};
pub use resolver::NameResolver;

use std::path::Path;

/// Whether a project token has the shape of an IDE workspace-storage
/// hash: exactly 32 hex characters.
pub fn is_workspace_hash(token: &str) -> bool {
    token.len() == 32 && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Replace the home-directory prefix with `~` for display.
pub(crate) fn shorten_home(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(rest) = path.strip_prefix(&home) {
            if rest.as_os_str().is_empty() {
                return "~".to_string();
            }
            return format!("~/{}", rest.display());
        }
    }
    path.display().to_string()
}

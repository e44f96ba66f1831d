use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a whole analysis load.
///
/// Everything recoverable (corrupt lines, unreadable subtrees, unresolvable
/// tokens) is skipped during scanning instead of surfacing here.
#[derive(Debug, Error)]
pub enum Error {
    /// The pricing registry lost its fallback entry. Nothing can be costed
    /// without it, so the load stops before scanning anything.
    #[error("pricing registry has no entry for the default model {0:?}")]
    MissingDefaultPricing(&'static str),

    /// A configured source root exists but could not be read.
    #[error("failed to read source root {}: {source}", path.display())]
    RootIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

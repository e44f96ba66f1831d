//! Local AI-assistant usage analytics.
//!
//! costlens ingests the usage logs coding assistants leave on disk (the
//! `code` CLI's line-JSON session logs and the IDE extension's chat
//! history), prices every interaction against tiered per-model tables,
//! and folds everything into per-day, per-model and per-project
//! summaries. A small resolver turns the opaque project tokens the logs
//! carry (mangled paths, workspace-storage hashes) back into readable
//! paths.
//!
//! ```no_run
//! use costlens::{load, LoadOptions, NameResolver};
//!
//! let data = load(&LoadOptions::default())?;
//! let mut names = NameResolver::new();
//! for (project, stats) in &data.project_totals {
//!     let name = names.resolve(project, data.workspaces.as_ref());
//!     println!("{name}: ${:.2} over {} requests", stats.cost, stats.requests);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod pricing;
pub mod usage;
pub mod workspace;

pub use config::{load_config, Config, Sources};
pub use error::Error;
pub use usage::loader::{load_analysis, LoadOptions};
pub use usage::types::{AnalysisData, TokenUsage, UsageEvent};
pub use workspace::{build_workspace_mappings, NameResolver, WorkspaceMapping};

use anyhow::Context;

/// Config-driven front door: load the user config, resolve the source
/// roots and run one analysis.
pub fn load(options: &LoadOptions) -> anyhow::Result<AnalysisData> {
    let config = load_config().context("failed to load configuration")?;
    let sources = Sources::resolve(&config);

    let mut options = options.clone();
    if options.lookback_days.is_none() {
        options.lookback_days = config.lookback_days;
    }
    if options.default_model.is_none() {
        options.default_model = config.default_model.clone();
    }

    let data = load_analysis(&sources, &options).context("usage analysis failed")?;
    Ok(data)
}

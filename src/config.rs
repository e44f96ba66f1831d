use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// User-level overrides, persisted in the platform config directory.
/// Every field is optional; unset fields fall back to environment
/// variables and conventional locations at resolution time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// CLI home directory, the parent of `projects/` and `settings.json`
    pub code_home: Option<String>,
    /// IDE profiles root, the parent of per-profile history trees
    pub ide_profiles: Option<String>,
    /// IDE workspace-storage root
    pub ide_storage: Option<String>,
    /// Model charged to records that do not name one
    pub default_model: Option<String>,
    /// Days of history to ingest; unset means everything
    pub lookback_days: Option<i64>,
}

pub fn load_config() -> Result<Config, confy::ConfyError> {
    confy::load("costlens", None)
}

/// Injected root paths for one load, after all precedence is applied.
/// A root that cannot be resolved stays `None` and that source simply
/// contributes nothing.
#[derive(Debug, Clone, Default)]
pub struct Sources {
    pub code_home: Option<PathBuf>,
    pub ide_profiles: Option<PathBuf>,
    pub ide_storage: Option<PathBuf>,
}

impl Sources {
    /// Resolve the three roots. Precedence per root: environment
    /// variable, then config override, then conventional location.
    pub fn resolve(config: &Config) -> Self {
        Sources {
            code_home: root_from("CODE_HOME", config.code_home.as_deref(), default_code_home),
            ide_profiles: root_from(
                "COSTLENS_IDE_PROFILES",
                config.ide_profiles.as_deref(),
                default_ide_profiles,
            ),
            ide_storage: root_from(
                "COSTLENS_IDE_STORAGE",
                config.ide_storage.as_deref(),
                default_ide_storage,
            ),
        }
    }
}

fn root_from(
    env_var: &str,
    configured: Option<&str>,
    conventional: fn() -> Option<PathBuf>,
) -> Option<PathBuf> {
    if let Ok(path) = std::env::var(env_var) {
        if !path.is_empty() {
            return Some(expand(&path));
        }
    }
    if let Some(path) = configured {
        return Some(expand(path));
    }
    conventional()
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

fn default_code_home() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".code"))
}

fn default_ide_profiles() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("Code/User/profiles"))
}

fn default_ide_storage() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("Code/User/workspaceStorage"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_wins_over_config() {
        // Dedicated variable name keeps parallel tests from colliding.
        std::env::set_var("COSTLENS_TEST_ROOT_A", "/from/env");
        let root = root_from("COSTLENS_TEST_ROOT_A", Some("/from/config"), || {
            Some(PathBuf::from("/conventional"))
        });
        assert_eq!(root, Some(PathBuf::from("/from/env")));
    }

    #[test]
    fn test_empty_env_var_is_ignored() {
        std::env::set_var("COSTLENS_TEST_ROOT_B", "");
        let root = root_from("COSTLENS_TEST_ROOT_B", Some("/from/config"), || {
            Some(PathBuf::from("/conventional"))
        });
        assert_eq!(root, Some(PathBuf::from("/from/config")));
    }

    #[test]
    fn test_config_beats_conventional_and_expands_tilde() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let root = root_from("COSTLENS_TEST_ROOT_C", Some("~/projects"), || {
            Some(PathBuf::from("/conventional"))
        });
        assert_eq!(root, Some(home.join("projects")));
    }

    #[test]
    fn test_conventional_location_is_the_last_resort() {
        let root = root_from("COSTLENS_TEST_ROOT_D", None, || {
            Some(PathBuf::from("/conventional"))
        });
        assert_eq!(root, Some(PathBuf::from("/conventional")));
    }

    #[test]
    fn test_resolve_defaults_point_at_known_layouts() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        std::env::remove_var("CODE_HOME");
        let sources = Sources::resolve(&Config::default());
        assert_eq!(sources.code_home, Some(home.join(".code")));
        if let Some(profiles) = sources.ide_profiles {
            assert!(profiles.ends_with("Code/User/profiles"));
        }
    }
}

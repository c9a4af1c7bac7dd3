//! Configuration file loading and merging.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::config::FileConfig;
use crate::domain::error::{TermLinkError, TermLinkResult};

/// Locates and loads configuration files.
///
/// Sources, weakest first: the global file under the user's config
/// directory, a project-local `.termlink/config.toml` found by walking
/// up from the working directory, and an explicitly passed path.
pub struct ConfigManager {
    explicit_path: Option<PathBuf>,
    global_config_path: Option<PathBuf>,
    project_config_path: Option<PathBuf>,
}

impl ConfigManager {
    pub fn new(explicit_path: Option<PathBuf>) -> Self {
        Self {
            explicit_path,
            global_config_path: Self::global_config_path(),
            project_config_path: Self::find_project_config_path(),
        }
    }

    /// Load and merge all applicable files. Returns the merged config
    /// plus the strongest path that actually existed, for diagnostics.
    pub fn load(&self) -> TermLinkResult<(FileConfig, Option<PathBuf>)> {
        let mut config = FileConfig::default();
        let mut source = None;

        if let Some(path) = &self.global_config_path {
            if path.exists() {
                config = config.merge(Self::load_path(path)?);
                source = Some(path.clone());
            }
        }

        if let Some(path) = &self.project_config_path {
            if path.exists() {
                config = config.merge(Self::load_path(path)?);
                source = Some(path.clone());
            }
        }

        if let Some(path) = &self.explicit_path {
            // An explicitly named file must exist.
            config = config.merge(Self::load_path(path)?);
            source = Some(path.clone());
        }

        Ok((config, source))
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("termlink").join("config.toml"))
    }

    /// Walk up from the working directory looking for a project file.
    fn find_project_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        let mut path = current_dir.as_path();

        loop {
            let config_path = path.join(".termlink").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }
            path = path.parent()?;
        }
    }

    pub fn load_path(path: &Path) -> TermLinkResult<FileConfig> {
        let content = fs::read_to_string(path).map_err(|err| {
            TermLinkError::ConfigFile(format!("could not read {}: {err}", path.display()))
        })?;
        toml::from_str(&content).map_err(|err| {
            TermLinkError::ConfigFile(format!("could not parse {}: {err}", path.display()))
        })
    }
}

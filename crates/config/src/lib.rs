//! Layered configuration for the mirror.
//!
//! Values are resolved from, in increasing priority: built-in defaults, a
//! configuration file and `WHARF_`-prefixed environment variables (nested
//! keys separated by `__`, e.g. `WHARF_SYNC__CONCURRENCY=4`).

pub mod error;
mod model;

pub use crate::model::{Config, DatabaseConfig, RemoteConfig, StorageConfig, SyncConfig};
use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_PREFIX: &str = "WHARF_";
const FILE_STEM: &str = "wharf";

pub(crate) fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "wharf")
}

/// Platform configuration directory, if the platform has one.
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

impl Config {
    /// The provider stack without extraction, for callers that merge in
    /// their own overrides.
    ///
    /// With no explicit `path`, `wharf.toml`, `wharf.yaml` and `wharf.json`
    /// are looked up in the platform configuration directory; missing files
    /// are skipped.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match path {
            Some(path) => {
                figment = match path.extension().and_then(|ext| ext.to_str()) {
                    Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                    Some("json") => figment.merge(Json::file(path)),
                    _ => figment.merge(Toml::file(path)),
                };
            },
            None => {
                if let Some(dir) = config_dir() {
                    figment = figment
                        .merge(Toml::file(dir.join(format!("{FILE_STEM}.toml"))))
                        .merge(Yaml::file(dir.join(format!("{FILE_STEM}.yaml"))))
                        .merge(Json::file(dir.join(format!("{FILE_STEM}.json"))));
                }
            },
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Resolve and validate the configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(path))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        debug!(database = %config.database.path.display(), "configuration loaded");
        Ok(config)
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use engine_logging::{engine_info, engine_warn};
use harvester_core::FilterConfig;
use harvester_engine::{AtomicFileWriter, AuthProbe, EngineConfig};
use serde::{Deserialize, Serialize};

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "harvester.ron";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Chromium over CDP; needed for script-rendered catalogs.
    Chromium,
    /// Plain HTTP; server-rendered pages and replay fixtures.
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: Backend,
    pub headless: bool,
    pub chromium_executable: Option<PathBuf>,
    /// Cookie jar written by an out-of-band login.
    pub session_path: PathBuf,
    pub output_dir: PathBuf,
    pub auth: AuthProbe,
    pub engine: EngineConfig,
    pub filter: FilterConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Chromium,
            headless: true,
            chromium_executable: None,
            session_path: PathBuf::from("session.json"),
            output_dir: PathBuf::from("output"),
            auth: AuthProbe::default(),
            engine: EngineConfig::default(),
            filter: FilterConfig::default(),
        }
    }
}

impl AppConfig {
    /// An explicit path must exist; the default file is optional.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        if !path.exists() {
            if required {
                bail!("config file {:?} does not exist", path);
            }
            engine_info!("no {} found, using defaults", DEFAULT_CONFIG_FILE);
            return Ok(Self::default());
        }
        let content =
            fs::read_to_string(&path).with_context(|| format!("reading config {path:?}"))?;
        let config = Self::from_ron(&content).with_context(|| format!("parsing config {path:?}"))?;
        engine_info!("loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_ron(content: &str) -> anyhow::Result<Self> {
        Ok(ron::from_str(content)?)
    }

    pub fn to_ron(&self) -> anyhow::Result<String> {
        let pretty = ron::ser::PrettyConfig::new();
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    /// Writes the defaults as a starting point for editing.
    pub fn write_default(path: &Path, overwrite: bool) -> anyhow::Result<PathBuf> {
        if path.exists() && !overwrite {
            bail!("{:?} already exists (use --force to replace it)", path);
        }
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            bail!("{:?} is not a file path", path);
        };
        let content = Self::default().to_ron()?;
        let written = AtomicFileWriter::new(dir).write(name, &content)?;
        if overwrite {
            engine_warn!("replaced {:?} with defaults", written);
        }
        Ok(written)
    }
}

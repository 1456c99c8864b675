use std::fs::{read_to_string, write};

use camino::{Utf8Path, Utf8PathBuf};
use eyre::{Result as EyreResult, WrapErr};
use flowkv_pipeline::graph::GraphConfig;
use flowkv_pipeline::scanner::MIN_SCAN_LIMIT;
use flowkv_pipeline::source::MAX_RAW_SCAN_LIMIT;
use flowkv_pipeline::{PipelineConfig, SchemaConfig, SchemaRegistry};
use serde::{Deserialize, Serialize};

pub mod dirs;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Clone, Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct ConfigFile {
    pub source: SourceConfig,

    pub destination: DataStoreConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default = "SchemaConfig::defaults")]
    pub schemas: Vec<SchemaConfig>,

    #[serde(default)]
    pub graph: GraphConfig,
}

/// Local raw-record store.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct SourceConfig {
    pub path: Utf8PathBuf,
    #[serde(default = "default_max_scan_limit")]
    pub max_scan_limit: usize,
}

const fn default_max_scan_limit() -> usize {
    MAX_RAW_SCAN_LIMIT
}

impl SourceConfig {
    #[must_use]
    pub const fn new(path: Utf8PathBuf) -> Self {
        Self {
            path,
            max_scan_limit: MAX_RAW_SCAN_LIMIT,
        }
    }
}

/// Flow store.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct DataStoreConfig {
    pub path: Utf8PathBuf,
}

impl DataStoreConfig {
    #[must_use]
    pub const fn new(path: Utf8PathBuf) -> Self {
        Self { path }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new(
            SourceConfig::new("records".into()),
            DataStoreConfig::new("flows".into()),
            PipelineConfig::default(),
            SchemaConfig::defaults(),
            GraphConfig::default(),
        )
    }
}

impl ConfigFile {
    #[must_use]
    pub const fn new(
        source: SourceConfig,
        destination: DataStoreConfig,
        pipeline: PipelineConfig,
        schemas: Vec<SchemaConfig>,
        graph: GraphConfig,
    ) -> Self {
        Self {
            source,
            destination,
            pipeline,
            schemas,
            graph,
        }
    }

    #[must_use]
    pub fn exists(dir: &Utf8Path) -> bool {
        dir.join(CONFIG_FILE).is_file()
    }

    pub fn load(dir: &Utf8Path) -> EyreResult<Self> {
        let path = dir.join(CONFIG_FILE);
        let content = read_to_string(&path)
            .wrap_err_with(|| format!("failed to read configuration from {path:?}"))?;

        toml::from_str(&content).wrap_err_with(|| format!("failed to parse configuration {path:?}"))
    }

    pub fn save(&self, dir: &Utf8Path) -> EyreResult<()> {
        let path = dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)?;

        write(&path, content)
            .wrap_err_with(|| format!("failed to write configuration to {path:?}"))?;

        Ok(())
    }

    /// Checks pipeline bounds and builds the schema registry.
    pub fn validate(&self) -> EyreResult<SchemaRegistry> {
        self.pipeline.validate()?;

        if self.source.max_scan_limit < MIN_SCAN_LIMIT {
            eyre::bail!("source max_scan_limit must be at least {MIN_SCAN_LIMIT}");
        }

        let registry = SchemaRegistry::new(&self.schemas)?;

        Ok(registry)
    }
}

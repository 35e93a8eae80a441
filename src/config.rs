use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use anyhow::Result;

use crate::common::{DomainError, DomainResult};
use crate::domains::path_planning::{GraphConfig, GridPlannerConfig, PathfinderConfig, SnapConfig};

/// Prefix for environment overrides, e.g. `GRYPHON_ROUTING__GRID__PADDING_RATIO=0.5`.
pub const ENV_PREFIX: &str = "GRYPHON_ROUTING";
pub const DEFAULT_CONFIG_FILE: &str = "gryphon-routing.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub graph: GraphConfig,
    pub snap: SnapConfig,
    pub pathfinder: PathfinderConfig,
    pub grid: GridPlannerConfig,
    pub data: DataConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Falls back to `FilesystemDataSource`'s own lookup when unset.
    pub dir: Option<PathBuf>,
    /// GeoJSON file under `<dir>/geojson` to build the graph from.
    pub map: String,
    /// Stored graph name under `<dir>/graphs`; loaded in preference to `map` when present.
    pub graph: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Domain log file; console only when unset.
    pub file: Option<String>,
    pub level: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: None,
            map: "map.geojson".to_string(),
            graph: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: None,
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Layer `path` (or an optional `gryphon-routing.toml` in the working directory)
    /// under `GRYPHON_ROUTING__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => ::config::File::from(p).required(true),
            None => ::config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let config: Config = ::config::Config::builder()
            .add_source(file)
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DomainResult<()> {
        self.graph.validate()?;
        self.snap.validate()?;
        self.pathfinder.validate()?;
        self.grid.validate()?;
        if self.snap.precision != self.graph.precision {
            return Err(DomainError::InvalidCommand {
                reason: format!(
                    "snap.precision ({}) must equal graph.precision ({})",
                    self.snap.precision, self.graph.precision
                ),
            });
        }
        Ok(())
    }
}

use serde::Deserialize;
use std::fs;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImportConfig {
    /// Create meters named in the import file that do not exist yet.
    #[serde(default)]
    pub create_missing_meters: bool,
    #[serde(default = "default_unit")]
    pub default_unit: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            create_missing_meters: false,
            default_unit: default_unit(),
        }
    }
}

fn default_unit() -> String {
    "kWh".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("UTILITY_CONFIG").unwrap_or_else(|_| "utility-config.toml".to_string());
        let contents = fs::read_to_string(&path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        Ok(cfg)
    }
}

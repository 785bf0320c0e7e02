use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    pub path: String,
    pub pool_size: u32,
    pub busy_timeout_ms: u32,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // 1. Try to load from settings.toml (optional for deployment)
        let config_file_name = "settings.toml";

        let current_dir_path = PathBuf::from(config_file_name);
        if current_dir_path.exists() {
            builder = builder.add_source(File::from(current_dir_path).required(false));
        }

        // Check in pictogram-store directory (for development)
        let dev_path = PathBuf::from("pictogram-store").join(config_file_name);
        if dev_path.exists() {
            builder = builder.add_source(File::from(dev_path).required(false));
        }

        builder = builder
            .set_default("database.path", "pictogram.db")?
            .set_default("database.pool_size", 10)?
            .set_default("database.busy_timeout_ms", 5000)?;

        // 2. Override with environment variables (highest priority)
        if let Ok(db_path) = std::env::var("PICTOGRAM_DB_PATH") {
            builder = builder.set_override("database.path", db_path)?;
        }
        if let Ok(pool_size) = std::env::var("PICTOGRAM_POOL_SIZE") {
            builder = builder.set_override("database.pool_size", pool_size)?;
        }

        let s = builder.build()?;
        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_config_file() {
        let settings = Settings::new().expect("settings should build from defaults");
        assert_eq!(settings.database.pool_size, 10);
        assert_eq!(settings.database.busy_timeout_ms, 5000);
        assert!(!settings.database.path.is_empty());
    }
}

use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_port() -> u16 {
    3001
}

fn default_database_path() -> String {
    "agenda.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            database_path: default_database_path(),
            log_level: default_log_level(),
        }
    }
}

impl ServerConfig {
    /// Layered load: defaults, then an optional `config/{RUN_MODE}` file,
    /// then `SERVER_*` environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let settings = config::Config::builder()
            .set_default("port", i64::from(default_port()))?
            .set_default("database_path", default_database_path())?
            .set_default("log_level", default_log_level())?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("SERVER"))
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_deployment() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3001);
        assert_eq!(config.database_path, "agenda.db");
        assert_eq!(config.log_level, "info");
    }
}

use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_password_min_length")]
    pub password_min_length: usize,

    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    database_url: Option<String>,
    listen_addr: Option<String>,
    log_dir: Option<String>,
    password_min_length: Option<usize>,
    bcrypt_cost: Option<u32>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_password_min_length() -> usize {
    5
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

impl ServerConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config: PartialServerConfig = match config_path {
            Some(path_str) => {
                let path = Path::new(path_str);
                if path.exists() {
                    let contents = fs::read_to_string(path)
                        .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
                    toml::from_str(&contents).map_err(|e| {
                        format!("Failed to parse TOML from config file at {path:?}: {e}")
                    })?
                } else {
                    PartialServerConfig::default()
                }
            }
            None => PartialServerConfig::default(),
        };

        // 2. Load from environment variables
        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        // 3. Merge: environment overrides file
        Self::merge(env_config, file_config)
    }

    fn merge(env: PartialServerConfig, file: PartialServerConfig) -> Result<Self, String> {
        let config = ServerConfig {
            database_url: env
                .database_url
                .or(file.database_url)
                .ok_or("DATABASE_URL is required")?,
            listen_addr: env
                .listen_addr
                .or(file.listen_addr)
                .unwrap_or_else(default_listen_addr),
            log_dir: env.log_dir.or(file.log_dir).unwrap_or_else(default_log_dir),
            password_min_length: env
                .password_min_length
                .or(file.password_min_length)
                .unwrap_or_else(default_password_min_length),
            bcrypt_cost: env
                .bcrypt_cost
                .or(file.bcrypt_cost)
                .unwrap_or_else(default_bcrypt_cost),
        };

        if !(4..=31).contains(&config.bcrypt_cost) {
            return Err(format!(
                "BCRYPT_COST must be between 4 and 31, got {}",
                config.bcrypt_cost
            ));
        }

        Ok(config)
    }
}

use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pix: PixConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Credentials and endpoints for the PSP's Pix API.
#[derive(Debug, Deserialize, Clone)]
pub struct PixConfig {
    #[serde(default)]
    pub environment: PixEnvironment,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub app_key: String,
    /// Name of the static API-key query parameter appended to charge URLs.
    #[serde(default = "default_app_key_param")]
    pub app_key_param: String,
    pub token_url: String,
    /// Immediate charge resource base; the txid is appended verbatim.
    pub cob_url: String,
    /// Due-date charge resource base; the txid is appended verbatim.
    pub cobv_url: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PixEnvironment {
    #[default]
    Homologacao,
    Producao,
}

impl PixEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            PixEnvironment::Homologacao => "homologacao",
            PixEnvironment::Producao => "producao",
        }
    }
}

impl PixConfig {
    pub fn is_production(&self) -> bool {
        self.environment == PixEnvironment::Producao
    }
}

fn default_app_key_param() -> String {
    "gw-dev-app-key".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for PixConfig {
    fn default() -> Self {
        Self {
            environment: PixEnvironment::Homologacao,
            client_id: String::new(),
            client_secret: String::new(),
            app_key: String::new(),
            app_key_param: default_app_key_param(),
            token_url: "https://oauth.hm.bb.com.br/oauth/token".to_string(),
            cob_url: "https://api.hm.bb.com.br/pix/v2/cob/".to_string(),
            cobv_url: "https://api.hm.bb.com.br/pix/v2/cobv/".to_string(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "sqlite://pix-bridge.db")?
            .set_default("database.max_connections", 10)?
            .set_default("pix.environment", "homologacao")?
            .set_default("pix.token_url", "https://oauth.hm.bb.com.br/oauth/token")?
            .set_default("pix.cob_url", "https://api.hm.bb.com.br/pix/v2/cob/")?
            .set_default("pix.cobv_url", "https://api.hm.bb.com.br/pix/v2/cobv/")?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with PIXBRIDGE__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("PIXBRIDGE").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "sqlite://pix-bridge.db".to_string(),
                max_connections: 10,
            },
            pix: PixConfig::default(),
        }
    }
}

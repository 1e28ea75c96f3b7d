use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub appwrite: AppwriteConfig,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Which provider serves documents, blobs and accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Appwrite,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(BackendKind::Local),
            "appwrite" => Ok(BackendKind::Appwrite),
            other => Err(format!("unknown backend kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppwriteConfig {
    #[serde(default = "default_appwrite_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub database_id: String,
    #[serde(default = "default_users_collection")]
    pub users_collection_id: String,
    #[serde(default = "default_files_collection")]
    pub files_collection_id: String,
    #[serde(default)]
    pub bucket_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalConfig {
    #[serde(default = "default_local_db_path")]
    pub database_path: String,
    #[serde(default = "default_local_storage_path")]
    pub storage_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_secure")]
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Cap on a whole upload request body, across all files in it
    #[serde(default = "default_max_request_size")]
    pub max_request_size: u64,
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_appwrite_endpoint() -> String {
    "https://cloud.appwrite.io/v1".to_string()
}

fn default_users_collection() -> String {
    "users".to_string()
}

fn default_files_collection() -> String {
    "files".to_string()
}

fn default_local_db_path() -> String {
    "data/cloudstash.db".to_string()
}

fn default_local_storage_path() -> String {
    "data/blobs".to_string()
}

fn default_cookie_secure() -> bool {
    true
}

fn default_max_file_size() -> u64 {
    50 * 1024 * 1024
}

fn default_max_request_size() -> u64 {
    200 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for AppwriteConfig {
    fn default() -> Self {
        Self {
            endpoint: default_appwrite_endpoint(),
            project_id: String::new(),
            api_key: String::new(),
            database_id: String::new(),
            users_collection_id: default_users_collection(),
            files_collection_id: default_files_collection(),
            bucket_id: String::new(),
        }
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            database_path: default_local_db_path(),
            storage_path: default_local_storage_path(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_secure: default_cookie_secure(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            max_request_size: default_max_request_size(),
        }
    }
}

impl Config {
    /// Load configuration from `.env`, config file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::load_from_file()?;
        config.apply_env_overrides();
        config.validate()?;
        if config.backend.kind == BackendKind::Local {
            config.ensure_directories()?;
        }
        tracing::info!(
            "Backend: {:?}, max upload size: {} bytes",
            config.backend.kind,
            config.upload.max_file_size
        );
        Ok(config)
    }

    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = ["config.toml", "data/config.toml"];

        for path in config_paths {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                let config = Self::from_toml(&content)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment variable overrides
    /// Format: CS_CONF_<SECTION>_<KEY>
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("CS_CONF_SERVER_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = env::var("CS_CONF_SERVER_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }

        if let Ok(val) = env::var("CS_CONF_BACKEND_KIND") {
            match val.parse::<BackendKind>() {
                Ok(kind) => self.backend.kind = kind,
                Err(e) => tracing::warn!("Ignoring {}", e),
            }
        }

        let appwrite = &mut self.appwrite;
        for (key, slot) in [
            ("CS_CONF_APPWRITE_ENDPOINT", &mut appwrite.endpoint),
            ("CS_CONF_APPWRITE_PROJECT_ID", &mut appwrite.project_id),
            ("CS_CONF_APPWRITE_API_KEY", &mut appwrite.api_key),
            ("CS_CONF_APPWRITE_DATABASE_ID", &mut appwrite.database_id),
            ("CS_CONF_APPWRITE_USERS_COLLECTION_ID", &mut appwrite.users_collection_id),
            ("CS_CONF_APPWRITE_FILES_COLLECTION_ID", &mut appwrite.files_collection_id),
            ("CS_CONF_APPWRITE_BUCKET_ID", &mut appwrite.bucket_id),
        ] {
            if let Ok(val) = env::var(key) {
                if !val.trim().is_empty() {
                    *slot = val;
                }
            }
        }

        if let Ok(val) = env::var("CS_CONF_LOCAL_DATABASE_PATH") {
            self.local.database_path = val;
        }
        if let Ok(val) = env::var("CS_CONF_LOCAL_STORAGE_PATH") {
            self.local.storage_path = val;
        }

        if let Ok(val) = env::var("CS_CONF_SESSION_COOKIE_SECURE") {
            if let Ok(v) = val.parse() {
                self.session.cookie_secure = v;
            }
        }

        if let Ok(val) = env::var("CS_CONF_UPLOAD_MAX_FILE_SIZE") {
            if let Ok(size) = val.parse() {
                self.upload.max_file_size = size;
            }
        }
        if let Ok(val) = env::var("CS_CONF_UPLOAD_MAX_REQUEST_SIZE") {
            if let Ok(size) = val.parse() {
                self.upload.max_request_size = size;
            }
        }
    }

    /// The hosted provider cannot be reached without its identifiers
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.upload.max_request_size < self.upload.max_file_size {
            anyhow::bail!("'upload.max_request_size' must be at least 'upload.max_file_size'");
        }

        if self.backend.kind != BackendKind::Appwrite {
            return Ok(());
        }

        let required = [
            ("endpoint", &self.appwrite.endpoint),
            ("project_id", &self.appwrite.project_id),
            ("api_key", &self.appwrite.api_key),
            ("database_id", &self.appwrite.database_id),
            ("users_collection_id", &self.appwrite.users_collection_id),
            ("files_collection_id", &self.appwrite.files_collection_id),
            ("bucket_id", &self.appwrite.bucket_id),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                anyhow::bail!("Appwrite backend requires 'appwrite.{}'", field);
            }
        }

        Ok(())
    }

    fn ensure_directories(&self) -> anyhow::Result<()> {
        if let Some(parent) = Path::new(&self.local.database_path).parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(&self.local.storage_path)?;
        Ok(())
    }
}

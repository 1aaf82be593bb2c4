use std::env;
use std::path::PathBuf;

use crate::constants::DEFAULT_MAX_UPLOAD_BYTES;
use crate::security::HashParams;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_path: PathBuf,
    pub files_directory: PathBuf,
    /// `["*"]` allows any origin
    pub allowed_origins: Vec<String>,
    pub environment: String,
    /// Wipe the database and files directory on startup
    pub reset: bool,
    pub cookie_secure: bool,
    pub max_upload_bytes: usize,
    pub hash_params: HashParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            database_path: PathBuf::from("./database.db"),
            files_directory: PathBuf::from("./files"),
            allowed_origins: vec!["*".to_string()],
            environment: "development".to_string(),
            reset: false,
            cookie_secure: false,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            hash_params: HashParams::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists (development)
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let server_host = env::var("SERVER_HOST").unwrap_or(defaults.server_host);
        let server_port = parse_var("SERVER_PORT", defaults.server_port)?;

        let database_path = env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);
        let files_directory = env::var("FILES_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or(defaults.files_directory);

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.allowed_origins);

        let environment = env::var("ENVIRONMENT").unwrap_or(defaults.environment);

        let reset = parse_flag("RESET", defaults.reset)?;
        let cookie_secure = parse_flag("COOKIE_SECURE", defaults.cookie_secure)?;
        let max_upload_bytes = parse_var("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?;

        let hash_params = HashParams {
            memory_cost: parse_var("HASH_MEMORY_KIB", defaults.hash_params.memory_cost)?,
            iterations: parse_var("HASH_ITERATIONS", defaults.hash_params.iterations)?,
            parallelism: parse_var("HASH_PARALLELISM", defaults.hash_params.parallelism)?,
            ..defaults.hash_params
        };

        Ok(Config {
            server_host,
            server_port,
            database_path,
            files_directory,
            allowed_origins,
            environment,
            reset,
            cookie_secure,
            max_upload_bytes,
            hash_params,
        })
    }

    /// Get server address as string
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, String> {
    match env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| format!("Invalid {}", name)),
        Err(_) => Ok(default),
    }
}

fn parse_flag(name: &str, default: bool) -> Result<bool, String> {
    match env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(format!("Invalid {}", name)),
        },
        Err(_) => Ok(default),
    }
}

use once_cell::sync::OnceCell;

#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub summary_model: String,
    pub summary_temperature: f64,
    pub summary_request_timeout_seconds: u64,
    pub port: u16,
    pub node_env: String,
    pub host: String,
    pub log_level: String,
    pub log_dir: String,
    pub log_max_files: String,
    pub cors_origins: Vec<String>,
    pub upload_dir: String,
    pub output_dir: String,
    pub max_upload_bytes: usize,
}

static CONFIG: OnceCell<Config> = OnceCell::new();

impl Config {
    pub fn init_global() -> Result<&'static Config, String> {
        let cfg = Config::from_env()?;
        CONFIG
            .set(cfg)
            .map_err(|_| "Config already initialized".to_string())?;
        CONFIG
            .get()
            .ok_or_else(|| "Config not initialized".to_string())
    }

    fn from_env() -> Result<Config, String> {
        let read_u64 = |key: &str, def: u64| -> u64 {
            match std::env::var(key) {
                Ok(v) => v.trim().parse::<u64>().unwrap_or(def),
                Err(_) => def,
            }
        };
        let read_num = |key: &str, def: f64| -> f64 {
            match std::env::var(key) {
                Ok(v) => v.trim().parse::<f64>().unwrap_or(def),
                Err(_) => def,
            }
        };
        let read_str = |key: &str, def: &str| -> String {
            std::env::var(key)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| def.to_string())
        };

        let openai_api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        let openai_base_url = read_str("OPENAI_BASE_URL", "https://api.openai.com/v1");
        url::Url::parse(&openai_base_url)
            .map_err(|e| format!("invalid OPENAI_BASE_URL {openai_base_url}: {e}"))?;
        let summary_model = read_str("SUMMARY_MODEL", "gpt-3.5-turbo");
        let summary_temperature = read_num("SUMMARY_TEMPERATURE", 0.2);
        let summary_request_timeout_seconds =
            read_u64("SUMMARY_REQUEST_TIMEOUT_SECONDS", 60).max(1);

        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(3001);
        let node_env = read_str("NODE_ENV", "development");
        let host = read_str("HOST", "0.0.0.0");

        let log_level = read_str("LOG_LEVEL", "info");
        let log_dir = read_str("LOG_DIR", "logs");
        let log_max_files = read_str("LOG_MAX_FILES", "7d");

        let cors_origins = match std::env::var("CORS_ORIGINS") {
            Ok(v) => v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => vec!["*".to_string()],
        };

        let upload_dir = read_str("UPLOAD_DIR", "uploads");
        let output_dir = read_str("OUTPUT_DIR", "outputs");
        let max_upload_bytes = read_u64("MAX_UPLOAD_BYTES", 50 * 1024 * 1024).max(1) as usize;

        Ok(Config {
            openai_api_key,
            openai_base_url,
            summary_model,
            summary_temperature,
            summary_request_timeout_seconds,
            port,
            node_env,
            host,
            log_level,
            log_dir,
            log_max_files,
            cors_origins,
            upload_dir,
            output_dir,
            max_upload_bytes,
        })
    }

    pub fn print(&self) {
        println!("Current configuration:");
        println!("  - NODE_ENV: {}", self.node_env);
        println!("  - PORT: {}", self.port);
        println!("  - HOST: {}", self.host);
        println!("  - OPENAI_BASE_URL: {}", self.openai_base_url);
        println!(
            "  - OPENAI_API_KEY: {}",
            if self.openai_api_key.is_empty() { "not set" } else { "set" }
        );
        println!("  - SUMMARY_MODEL: {}", self.summary_model);
        println!("  - LOG_LEVEL: {}", self.log_level);
        println!("  - UPLOAD_DIR: {}", self.upload_dir);
        println!("  - OUTPUT_DIR: {}", self.output_dir);
        println!("  - MAX_UPLOAD_BYTES: {}", self.max_upload_bytes);
    }
}

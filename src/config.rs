use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub admin_password: Option<String>,
    pub cors_origins: Vec<String>,
    pub trusted_hosts: Vec<String>,
    pub api_key_enabled: bool,
    pub api_key: Option<String>,
    pub upload_dir: PathBuf,
    pub push_endpoint: String,
    pub push_key: Option<String>,
}

fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

impl Config {
    pub fn load() -> Self {
        Self {
            listen: env::var("INTERNHUB_LISTEN").unwrap_or_else(|_| "0.0.0.0:8000".into()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:data/internhub.db".into()),
            jwt_secret: env::var("INTERNHUB_JWT_SECRET")
                .unwrap_or_else(|_| "dev-secret-change-in-production".into()),
            token_ttl_minutes: env::var("INTERNHUB_TOKEN_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            admin_password: env::var("INTERNHUB_ADMIN_PASSWORD").ok(),
            cors_origins: env::var("INTERNHUB_CORS_ORIGINS")
                .ok()
                .map_or_else(Vec::new, |v| parse_list(&v)),
            trusted_hosts: env::var("INTERNHUB_TRUSTED_HOSTS")
                .ok()
                .map_or_else(Vec::new, |v| parse_list(&v)),
            api_key_enabled: env::var("INTERNHUB_API_KEY_ENABLED")
                .ok()
                .is_some_and(|v| v == "true"),
            api_key: env::var("INTERNHUB_API_KEY").ok(),
            upload_dir: env::var("INTERNHUB_UPLOAD_DIR")
                .map_or_else(|_| PathBuf::from("uploads"), PathBuf::from),
            push_endpoint: env::var("INTERNHUB_PUSH_ENDPOINT")
                .unwrap_or_else(|_| "https://fcm.googleapis.com/fcm/send".into()),
            push_key: env::var("INTERNHUB_PUSH_KEY").ok(),
        }
    }
}

use std::{env, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackend {
    Memory,
    Redis,
}

impl FromStr for SessionBackend {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" | "Memory" => Ok(SessionBackend::Memory),
            "redis" | "Redis" => Ok(SessionBackend::Redis),
            _ => Err(format!("Unknown SessionBackend: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub upload_dir: String,
    pub max_file_size: usize,

    // Sessions
    pub session_backend: SessionBackend,
    pub redis_url: String,
    pub session_ttl_seconds: u64,
    pub cookie_secure: bool,

    // Accounts
    pub bcrypt_cost: u32,
    pub reset_token_ttl_minutes: i64,
    pub posts_per_page: u32,

    // Mail API
    pub mail_api_url: String,
    pub mail_api_key: Option<String>,
    pub mail_from_email: String,
    pub mail_from_name: String,

    // App settings
    pub app_name: String,
    pub base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://forum.db".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            upload_dir: "./uploads".to_string(),
            max_file_size: 10 * 1024 * 1024,
            session_backend: SessionBackend::Memory,
            redis_url: "redis://localhost:6379".to_string(),
            session_ttl_seconds: 86400,
            cookie_secure: false,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            reset_token_ttl_minutes: 60,
            posts_per_page: 10,
            mail_api_url: "https://api.sendgrid.com/v3/mail/send".to_string(),
            mail_api_key: None,
            mail_from_email: "no-reply@literarylions.local".to_string(),
            mail_from_name: "Literary Lions".to_string(),
            app_name: "Literary Lions Forum".to_string(),
            base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        Ok(Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", defaults.port)?,
            upload_dir: env::var("UPLOAD_DIR").unwrap_or(defaults.upload_dir),
            max_file_size: parse_var("MAX_FILE_SIZE", defaults.max_file_size)?,

            session_backend: parse_var("SESSION_BACKEND", defaults.session_backend)?,
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            session_ttl_seconds: parse_var("SESSION_TTL_SECONDS", defaults.session_ttl_seconds)?,
            cookie_secure: parse_var("COOKIE_SECURE", defaults.cookie_secure)?,

            bcrypt_cost: parse_var("BCRYPT_COST", defaults.bcrypt_cost)?,
            reset_token_ttl_minutes: parse_var(
                "RESET_TOKEN_TTL_MINUTES",
                defaults.reset_token_ttl_minutes,
            )?,
            posts_per_page: parse_var("POSTS_PER_PAGE", defaults.posts_per_page)?,

            mail_api_url: env::var("MAIL_API_URL").unwrap_or(defaults.mail_api_url),
            mail_api_key: env::var("MAIL_API_KEY").ok().filter(|key| !key.is_empty()),
            mail_from_email: env::var("MAIL_FROM_EMAIL").unwrap_or(defaults.mail_from_email),
            mail_from_name: env::var("MAIL_FROM_NAME").unwrap_or(defaults.mail_from_name),

            app_name: env::var("APP_NAME").unwrap_or(defaults.app_name),
            base_url: env::var("BASE_URL").unwrap_or(defaults.base_url),
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("Invalid value for {}: {}", name, e)),
        Err(_) => Ok(default),
    }
}
